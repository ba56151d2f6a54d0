//! # NRS Common Library
//!
//! Shared code for the NRS catalog tooling including:
//! - Configuration loading (TOML bootstrap, env overrides)
//! - Logging initialization
//! - Error types
//! - Track length formatting

pub mod config;
pub mod error;
pub mod human_time;
pub mod logging;

pub use error::{Error, Result};
