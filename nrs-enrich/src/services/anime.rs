//! Anime lookups
//!
//! Anime entries are not resolved through the reference registry. Their
//! title comes from the entry's own database and their cross-database ids
//! from an id relation service; one [`AnimeLookup`] implementation answers
//! both.

use crate::catalog::id::AnimeDatabase;
use crate::error::AdapterResult;
use crate::types::AnimeIds;
use async_trait::async_trait;

#[async_trait]
pub trait AnimeLookup: Send + Sync {
    /// Display title for an anime entry id; `None` when the id's database is
    /// not supported or knows no title
    async fn title(&self, entry_id: &str) -> AdapterResult<Option<String>>;

    /// Ids of the show `id` (local to `database`) in every known database
    async fn cross_ids(&self, database: AnimeDatabase, id: &str) -> AdapterResult<Option<AnimeIds>>;
}
