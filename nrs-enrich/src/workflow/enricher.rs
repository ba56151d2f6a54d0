//! Batch enrichment driver
//!
//! Walks catalog documents entry by entry, resolves every entry whose title
//! is still empty and writes the result back.
//!
//! # Entry kinds
//! - **Direct**: seeds are the id-derived reference (if any) followed by the
//!   entry's own references; the aggregate is reconciled with reference
//!   append.
//! - **Placeholder** (`$` in the id): the parent's aggregate is resolved once
//!   per parent. An album parent hands out the child's track through its
//!   track accessor. A track parent stands in for child 1 only (the album is
//!   assumed to be a single) and contributes no references.
//!
//! # Error Handling
//! - `ErrorPolicy::Abort`: the first error stops the run
//! - `ErrorPolicy::Isolate`: adapter failures inside expansion count as "no
//!   data"; other entry-local failures skip the entry and the run continues
//!
//! # Example
//! ```rust,ignore
//! let enricher = Enricher::from_config(registry, &config.enrich);
//! let stats = enricher.enrich_store(&store, "**/*.xml").await?;
//! ```

use super::RunStats;
use crate::catalog::id::{child_track_index, derive_primary_reference, resolve_entry_id};
use crate::catalog::{CatalogDocument, CatalogEntry, DocumentStore};
use crate::error::{EnrichError, Result};
use crate::fusion::{resolve_references, Resolution, ResolutionSettings};
use crate::reconcile::{reconcile, ReconcileOutcome};
use crate::services::AdapterRegistry;
use crate::types::{AggregateRecord, AlbumRecord, RecordKind, Reference, ServiceRecord};
use futures::future::BoxFuture;
use nrs_common::config::{EnrichConfig, ErrorPolicy};
use tracing::{debug, info, warn};

/// Label used for failures raised by an album's track accessor
const TRACK_LIST_SOURCE: &str = "track list";

/// Enclosing entry of placeholder children, with its aggregate resolved
/// on first demand
struct ParentScope {
    id: String,
    references: Vec<Reference>,
    record: Option<Option<AggregateRecord>>,
}

impl ParentScope {
    fn new(id: String, references: Vec<Reference>) -> Self {
        Self {
            id,
            references,
            record: None,
        }
    }

    async fn record(&mut self, enricher: &Enricher) -> Result<Option<&AggregateRecord>> {
        if self.record.is_none() {
            match enricher.resolve(&self.id, &self.references).await {
                Ok(resolution) => self.record = Some(resolution.aggregate),
                Err(e) => {
                    // Later siblings see "no data" instead of the same failure
                    self.record = Some(None);
                    return Err(e);
                }
            }
        }
        Ok(self.record.as_ref().and_then(Option::as_ref))
    }
}

pub struct Enricher {
    registry: AdapterRegistry,
    settings: ResolutionSettings,
}

impl Enricher {
    pub fn new(registry: AdapterRegistry, settings: ResolutionSettings) -> Self {
        Self { registry, settings }
    }

    pub fn from_config(registry: AdapterRegistry, config: &EnrichConfig) -> Self {
        Self::new(registry, ResolutionSettings::from_config(config))
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ResolutionSettings {
        &self.settings
    }

    /// Resolve one entry id with its current references
    pub async fn resolve(&self, entry_id: &str, references: &[Reference]) -> Result<Resolution> {
        let mut seeds = Vec::with_capacity(references.len() + 1);
        if let Some(mut primary) = derive_primary_reference(entry_id)? {
            primary.mark_generated(self.settings.generated_by.as_str());
            seeds.push(primary);
        }
        seeds.extend(references.iter().cloned());

        resolve_references(&self.registry, &self.settings, entry_id, seeds).await
    }

    /// Enrich every entry of one document in place
    pub async fn enrich_document(&self, document: &mut CatalogDocument) -> Result<RunStats> {
        let mut stats = RunStats {
            documents: 1,
            ..RunStats::default()
        };
        for entry in &mut document.entries {
            self.visit(entry, None, &mut stats).await?;
        }

        info!(
            "{}: {} entries visited, {} resolved, {} unresolved, {} skipped",
            document.path.display(),
            stats.entries_visited,
            stats.entries_resolved,
            stats.entries_unresolved,
            stats.entries_skipped
        );
        Ok(stats)
    }

    /// Enrich every matching document and save each one when done
    pub async fn enrich_store(&self, store: &dyn DocumentStore, pattern: &str) -> Result<RunStats> {
        let handles = store.list(pattern).await?;
        info!("Enriching {} documents matching {}", handles.len(), pattern);

        let mut total = RunStats::default();
        for handle in handles {
            let mut document = store.load(&handle).await?;
            let stats = self.enrich_document(&mut document).await?;
            store.save(&document).await?;
            total.absorb(&stats);
        }

        info!(
            "Enrichment complete: {} documents, {} entries resolved, {} references appended",
            total.documents, total.entries_resolved, total.references_appended
        );
        Ok(total)
    }

    fn visit<'a>(
        &'a self,
        entry: &'a mut CatalogEntry,
        parent: Option<&'a mut ParentScope>,
        stats: &'a mut RunStats,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            stats.entries_visited += 1;

            let resolved_id =
                match resolve_entry_id(&entry.id, parent.as_ref().map(|scope| scope.id.as_str())) {
                    Ok(id) => id,
                    Err(e) => return self.skip_or_abort(&entry.id, e, stats),
                };

            if !entry.has_title() {
                let outcome = if entry.is_placeholder() {
                    self.enrich_placeholder(entry, &resolved_id, parent).await
                } else {
                    self.enrich_direct(entry, &resolved_id, stats).await
                };

                match outcome {
                    Ok(Some(outcome)) => {
                        info!("{}: resolved", resolved_id);
                        stats.record(&outcome);
                    }
                    Ok(None) => {
                        info!("{}: no data found", resolved_id);
                        stats.entries_unresolved += 1;
                    }
                    Err(e) => self.skip_or_abort(&resolved_id, e, stats)?,
                }
            }

            if !entry.children.is_empty() {
                let mut scope = ParentScope::new(resolved_id, entry.references().to_vec());
                for child in &mut entry.children {
                    self.visit(child, Some(&mut scope), stats).await?;
                }
            }
            Ok(())
        })
    }

    async fn enrich_direct(
        &self,
        entry: &mut CatalogEntry,
        resolved_id: &str,
        stats: &mut RunStats,
    ) -> Result<Option<ReconcileOutcome>> {
        let resolution = self.resolve(resolved_id, entry.references()).await?;
        stats.isolated_failures += resolution.isolated_failures;
        if !resolution.converged {
            stats.entries_unconverged += 1;
        }
        Ok(resolution
            .aggregate
            .map(|aggregate| reconcile(entry, &aggregate, true)))
    }

    async fn enrich_placeholder(
        &self,
        entry: &mut CatalogEntry,
        resolved_id: &str,
        parent: Option<&mut ParentScope>,
    ) -> Result<Option<ReconcileOutcome>> {
        let scope = parent.ok_or_else(|| EnrichError::MissingParent(entry.id.clone()))?;
        let index = child_track_index(resolved_id)?;
        let parent_id = scope.id.clone();

        match scope.record(self).await? {
            Some(ServiceRecord::Album(AlbumRecord {
                tracks: Some(tracks),
                ..
            })) => {
                let track = tracks.source().track(index).await.map_err(|error| {
                    EnrichError::Upstream {
                        entry_id: resolved_id.to_string(),
                        source_name: TRACK_LIST_SOURCE.to_string(),
                        reference: parent_id.clone(),
                        error,
                    }
                })?;
                let Some(mut track) = track else {
                    debug!("{}: track {} not in {}", resolved_id, index, parent_id);
                    return Ok(None);
                };
                for reference in &mut track.references {
                    reference.mark_generated(self.settings.generated_by.as_str());
                }
                Ok(Some(reconcile(entry, &ServiceRecord::Track(track), true)))
            }
            Some(record) if record.kind() == RecordKind::Track && index == 0 => {
                warn!("assuming album {} is a single", parent_id);
                Ok(Some(reconcile(entry, record, false)))
            }
            _ => Ok(None),
        }
    }

    fn skip_or_abort(&self, entry_id: &str, error: EnrichError, stats: &mut RunStats) -> Result<()> {
        if self.settings.error_policy == ErrorPolicy::Abort || !error.is_entry_local() {
            return Err(error);
        }
        warn!("{}: skipped: {}", entry_id, error);
        stats.entries_skipped += 1;
        Ok(())
    }
}
