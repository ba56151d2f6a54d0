//! Anime enrichment driver
//!
//! Visits every entry whose id starts with `A`, at any depth. An entry with
//! an empty title gets its title looked up; an entry without a `source`
//! block gets its cross-database ids looked up and written as a generated
//! id block. Entries that already have both are not looked up at all.
//!
//! # Error Handling
//! A failed lookup skips the entry untouched under `ErrorPolicy::Isolate`,
//! so a transient failure never leaves a permanent suppression behind.
//! Under `ErrorPolicy::Abort` it stops the run.

use super::RunStats;
use crate::catalog::id::{is_anime_id, parse_anime_id};
use crate::catalog::{CatalogDocument, CatalogEntry, DocumentStore};
use crate::error::{AdapterError, EnrichError, Result};
use crate::fusion::ResolutionSettings;
use crate::reconcile::reconcile_anime;
use crate::services::AnimeLookup;
use crate::types::AnimeRecord;
use nrs_common::config::{EnrichConfig, ErrorPolicy};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Source label used in errors raised by the lookup
const ANIME_SOURCE: &str = "anime";

pub struct AnimeEnricher {
    lookup: Arc<dyn AnimeLookup>,
    settings: ResolutionSettings,
}

impl AnimeEnricher {
    pub fn new(lookup: Arc<dyn AnimeLookup>, settings: ResolutionSettings) -> Self {
        Self { lookup, settings }
    }

    pub fn from_config(lookup: Arc<dyn AnimeLookup>, config: &EnrichConfig) -> Self {
        Self::new(lookup, ResolutionSettings::from_config(config))
    }

    pub async fn enrich_document(&self, document: &mut CatalogDocument) -> Result<RunStats> {
        let mut stats = RunStats {
            documents: 1,
            ..RunStats::default()
        };

        let mut pending: Vec<&mut CatalogEntry> = document.entries.iter_mut().rev().collect();
        while let Some(entry) = pending.pop() {
            if is_anime_id(&entry.id) {
                self.enrich_entry(entry, &mut stats).await?;
            }
            pending.extend(entry.children.iter_mut().rev());
        }

        info!(
            "{}: {} anime entries visited, {} id blocks added, {} skipped",
            document.path.display(),
            stats.entries_visited,
            stats.sources_added,
            stats.entries_skipped
        );
        Ok(stats)
    }

    pub async fn enrich_store(&self, store: &dyn DocumentStore, pattern: &str) -> Result<RunStats> {
        let mut total = RunStats::default();
        for handle in store.list(pattern).await? {
            let mut document = store.load(&handle).await?;
            let stats = self.enrich_document(&mut document).await?;
            store.save(&document).await?;
            total.absorb(&stats);
        }

        info!(
            "Anime enrichment complete: {} documents, {} titles set, {} id blocks added",
            total.documents, total.titles_set, total.sources_added
        );
        Ok(total)
    }

    async fn enrich_entry(&self, entry: &mut CatalogEntry, stats: &mut RunStats) -> Result<()> {
        stats.entries_visited += 1;

        let record = match self.lookup_entry(entry).await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(()),
            Err(error) => {
                let error = EnrichError::Upstream {
                    entry_id: entry.id.clone(),
                    source_name: ANIME_SOURCE.to_string(),
                    reference: entry.id.clone(),
                    error,
                };
                if self.settings.error_policy == ErrorPolicy::Abort {
                    return Err(error);
                }
                warn!("{}: skipped: {}", entry.id, error);
                stats.entries_skipped += 1;
                return Ok(());
            }
        };

        if record.title.is_none() && record.ids.is_none() {
            stats.entries_unresolved += 1;
        } else {
            stats.entries_resolved += 1;
        }
        let outcome = reconcile_anime(entry, &record, &self.settings.generated_by);
        stats.record_anime(&outcome);
        Ok(())
    }

    /// `None` when the entry needs nothing
    async fn lookup_entry(&self, entry: &CatalogEntry) -> std::result::Result<Option<AnimeRecord>, AdapterError> {
        let wants_title = !entry.has_title();
        let wants_ids = !entry.has_source_block();
        if !wants_title && !wants_ids {
            debug!("{}: nothing to fill", entry.id);
            return Ok(None);
        }

        let mut record = AnimeRecord::default();
        if wants_title {
            record.title = self.lookup.title(&entry.id).await?;
        }
        if wants_ids {
            if let Some((database, id)) = parse_anime_id(&entry.id) {
                record.ids = self
                    .lookup
                    .cross_ids(database, id)
                    .await?
                    .filter(|ids| !ids.is_empty());
            } else {
                debug!("{}: no cross-database lookup for this id", entry.id);
            }
        }
        Ok(Some(record))
    }
}
