//! Error types for nrs-enrich
//!
//! "Unroutable reference", "no data found" and "pagination exhausted" are
//! not errors: they surface as `None` / skipped fragments. Only malformed
//! upstream payloads, transport failures and invalid catalog data reach
//! these types.

use thiserror::Error;

/// Failure raised by an adapter or a lazy track source
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Upstream payload is missing expected structure
    #[error("Unexpected upstream payload: {0}")]
    UpstreamShape(String),

    /// Fetch failed
    #[error("Network error: {0}")]
    Network(#[from] FetchError),

    /// Credentials for a gated source are unavailable
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Anything else an adapter wants to bubble up
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::UpstreamShape(err.to_string())
    }
}

/// Fetch errors from the shared HTTP layer
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

/// Errors that stop resolution of an entry (or the whole run)
#[derive(Debug, Error)]
pub enum EnrichError {
    /// Adapter failure, with enough context to find the offending reference
    #[error("Adapter '{source_name}' failed for entry {entry_id} ({reference}): {error}")]
    Upstream {
        entry_id: String,
        source_name: String,
        reference: String,
        #[source]
        error: AdapterError,
    },

    /// Catalog id has a recognised prefix but an invalid shape
    #[error("Invalid catalog id: {0}")]
    InvalidCatalogId(String),

    /// Placeholder id without an enclosing entry
    #[error("Placeholder id {0} has no parent entry")]
    MissingParent(String),

    /// Canonicalizer rule failed to compile
    #[error("Invalid reference rule: {0}")]
    Rule(#[from] regex::Error),

    /// Document store failure
    #[error("Document store error: {0}")]
    Store(String),

    /// nrs-common error
    #[error("Common error: {0}")]
    Common(#[from] nrs_common::Error),
}

impl EnrichError {
    /// Errors that the isolate policy may downgrade to a skipped entry
    pub fn is_entry_local(&self) -> bool {
        matches!(
            self,
            EnrichError::Upstream { .. }
                | EnrichError::InvalidCatalogId(_)
                | EnrichError::MissingParent(_)
        )
    }
}

/// Result type for adapter calls
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// Result type for enrichment operations
pub type Result<T> = std::result::Result<T, EnrichError>;
