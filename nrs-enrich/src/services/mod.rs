//! External source adapters and the facilities they share
//!
//! An adapter understands one metadata source: it recognizes the source's
//! reference shape (`parse_url`) and turns a recognized reference into a
//! [`ServiceRecord`] (`load`). Concrete adapters live with the caller; this
//! module defines the contract, the routing table and the shared fetch
//! layer (response cache, transport, credentials).

pub mod anime;
pub mod credentials;
pub mod fetch;
pub mod registry;
pub mod tracks;

pub use anime::AnimeLookup;
pub use registry::{AdapterRegistry, Route, SourceMatcher};

use crate::error::AdapterResult;
use crate::types::ServiceRecord;
use async_trait::async_trait;

/// Adapter trait - one implementation per external source
///
/// # Example
/// ```rust,ignore
/// use nrs_enrich::services::Adapter;
///
/// pub struct VgmdbAdapter { fetcher: Fetcher, api_prefix: String }
///
/// #[async_trait::async_trait]
/// impl Adapter for VgmdbAdapter {
///     type Url = VgmdbUrl;
///
///     async fn parse_url(&self, raw: &str) -> AdapterResult<Option<VgmdbUrl>> {
///         Ok(VgmdbUrl::parse(&self.api_prefix, raw))
///     }
///
///     async fn load(&self, url: &VgmdbUrl) -> AdapterResult<Option<ServiceRecord>> {
///         let json: AlbumJson = self.fetcher.fetch_json(&url.api_url, None).await?;
///         Ok(Some(json.into_record()))
///     }
/// }
/// ```
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Adapter-specific parsed reference
    type Url: Send + Sync;

    /// Recognize a raw reference URL.
    ///
    /// Returns `Ok(None)` for well-formed input this adapter does not handle.
    async fn parse_url(&self, raw: &str) -> AdapterResult<Option<Self::Url>>;

    /// Fetch the record behind a recognized reference.
    ///
    /// Returns `Ok(None)` when upstream has nothing usable and an error when
    /// the upstream payload is malformed.
    async fn load(&self, url: &Self::Url) -> AdapterResult<Option<ServiceRecord>>;
}

/// Outcome of routing one raw reference through an adapter
#[derive(Debug)]
pub enum Dispatch {
    /// `parse_url` did not recognize the reference
    Unrecognized,
    /// Recognized, but upstream returned nothing usable
    NoData,
    Record(ServiceRecord),
}

/// Object-safe view of an [`Adapter`], used by the registry
#[async_trait]
pub trait DynAdapter: Send + Sync {
    async fn dispatch(&self, raw: &str) -> AdapterResult<Dispatch>;
}

#[async_trait]
impl<A> DynAdapter for A
where
    A: Adapter,
{
    async fn dispatch(&self, raw: &str) -> AdapterResult<Dispatch> {
        let Some(url) = self.parse_url(raw).await? else {
            return Ok(Dispatch::Unrecognized);
        };

        Ok(match self.load(&url).await? {
            Some(record) => Dispatch::Record(record),
            None => Dispatch::NoData,
        })
    }
}
