//! Lazy, indexed access to an album's tracks
//!
//! Indices are 0-based in the flattened disc/track space. An index past the
//! end yields `Ok(None)`: callers treat that as "unknown", not as a failure.

use crate::error::AdapterResult;
use crate::types::TrackRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[async_trait]
pub trait TrackSource: Send + Sync {
    async fn track(&self, index: usize) -> AdapterResult<Option<TrackRecord>>;
}

/// Track list that arrived whole with the album payload
#[derive(Debug, Clone, Default)]
pub struct StaticTracks {
    tracks: Vec<TrackRecord>,
}

impl StaticTracks {
    pub fn new(tracks: Vec<TrackRecord>) -> Self {
        Self { tracks }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[async_trait]
impl TrackSource for StaticTracks {
    async fn track(&self, index: usize) -> AdapterResult<Option<TrackRecord>> {
        Ok(self.tracks.get(index).cloned())
    }
}

/// Fetches one page of tracks from a paged upstream listing
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch page `page` (0-based) holding at most `page_size` tracks
    async fn fetch_page(&self, page: usize, page_size: usize) -> AdapterResult<Vec<TrackRecord>>;
}

/// Memoizing track source over a paged listing.
///
/// Pages are fetched on first use and kept for the paginator's lifetime.
/// A failed fetch is not cached, so a later lookup retries it.
pub struct Paginator<F> {
    page_size: usize,
    pages: Mutex<HashMap<usize, Arc<Vec<TrackRecord>>>>,
    fetcher: F,
}

impl<F: PageFetcher> Paginator<F> {
    pub fn new(page_size: usize, fetcher: F) -> Self {
        Self {
            page_size: page_size.max(1),
            pages: Mutex::new(HashMap::new()),
            fetcher,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages fetched so far
    pub async fn cached_pages(&self) -> usize {
        self.pages.lock().await.len()
    }

    async fn page(&self, page_number: usize) -> AdapterResult<Arc<Vec<TrackRecord>>> {
        let mut pages = self.pages.lock().await;
        if let Some(page) = pages.get(&page_number) {
            return Ok(Arc::clone(page));
        }

        debug!("Fetching track page {} (size {})", page_number, self.page_size);
        let page = Arc::new(self.fetcher.fetch_page(page_number, self.page_size).await?);
        pages.insert(page_number, Arc::clone(&page));
        Ok(page)
    }
}

#[async_trait]
impl<F: PageFetcher> TrackSource for Paginator<F> {
    async fn track(&self, index: usize) -> AdapterResult<Option<TrackRecord>> {
        let page_number = index / self.page_size;
        let page = self.page(page_number).await?;
        Ok(page.get(index - page_number * self.page_size).cloned())
    }
}
