//! nrs-enrich: cross-source reference resolution for catalog entries
//!
//! Pipeline: catalog entry → reference expansion (adapter registry) →
//! fragment merge → reconciliation into the entry. Reference list
//! canonicalization and anime id enrichment run as separate passes.
//!
//! Concrete source adapters are supplied by the caller through
//! [`services::Adapter`] and [`services::AnimeLookup`].
//!
//! # Adapter toolkit
//! The engine never calls these itself; they exist for adapter authors:
//! - [`services::fetch::Fetcher`] and [`services::fetch::build_url`] for HTTP with a
//!   shared response cache
//! - [`services::credentials::CredentialStore`] for bearer tokens
//! - [`services::tracks::StaticTracks`] and [`services::tracks::Paginator`] for
//!   album track lists
//! - [`types::locate_track`] to map a flat track index onto discs
//! - [`types::pick_title`] to choose a title from a localized name table
//! - [`nrs_common::human_time::parse_track_length`] for `m:ss` lengths

pub mod canonicalize;
pub mod catalog;
pub mod error;
pub mod fusion;
pub mod reconcile;
pub mod services;
pub mod types;
pub mod workflow;

pub use crate::canonicalize::{CanonicalizeStats, Canonicalizer};
pub use crate::catalog::{CatalogDocument, CatalogEntry, DocumentStore, MemoryStore};
pub use crate::error::{AdapterError, AdapterResult, EnrichError, Result};
pub use crate::fusion::{resolve_references, Resolution, ResolutionSettings};
pub use crate::services::{Adapter, AdapterRegistry, AnimeLookup};
pub use crate::types::{AggregateRecord, Provenance, Reference, ServiceRecord};
pub use crate::workflow::{canonicalize_store, AnimeEnricher, Enricher, RunStats};
