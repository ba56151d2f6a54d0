//! Batch drivers over a document store
//!
//! Documents are processed one at a time in store order, entries one at a
//! time in document order. Each document is saved once all of its entries
//! are done.

pub mod anime;
pub mod enricher;

pub use anime::AnimeEnricher;
pub use enricher::Enricher;

use crate::canonicalize::{CanonicalizeStats, Canonicalizer};
use crate::catalog::DocumentStore;
use crate::error::Result;
use crate::reconcile::{AnimeOutcome, ReconcileOutcome};
use tracing::info;

/// Counters for an enrichment run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub documents: usize,
    pub entries_visited: usize,
    /// Entries that received an aggregate record
    pub entries_resolved: usize,
    /// Entries no adapter had data for
    pub entries_unresolved: usize,
    /// Entries skipped after an entry-local error
    pub entries_skipped: usize,
    /// Entries whose expansion hit the pass bound
    pub entries_unconverged: usize,
    pub titles_set: usize,
    pub lengths_set: usize,
    pub references_appended: usize,
    /// Adapter failures treated as "no data"
    pub isolated_failures: usize,
    /// Anime id blocks added
    pub sources_added: usize,
    /// Anime entries newly marked `dah-no-anime-altsrc`
    pub suppressions_added: usize,
}

impl RunStats {
    pub fn record(&mut self, outcome: &ReconcileOutcome) {
        self.entries_resolved += 1;
        self.titles_set += usize::from(outcome.title_set);
        self.lengths_set += usize::from(outcome.length_set);
        self.references_appended += outcome.references_appended;
    }

    pub fn record_anime(&mut self, outcome: &AnimeOutcome) {
        self.titles_set += usize::from(outcome.title_set);
        self.sources_added += usize::from(outcome.source_added);
        self.suppressions_added += usize::from(outcome.suppression_added);
    }

    pub fn absorb(&mut self, other: &RunStats) {
        self.documents += other.documents;
        self.entries_visited += other.entries_visited;
        self.entries_resolved += other.entries_resolved;
        self.entries_unresolved += other.entries_unresolved;
        self.entries_skipped += other.entries_skipped;
        self.entries_unconverged += other.entries_unconverged;
        self.titles_set += other.titles_set;
        self.lengths_set += other.lengths_set;
        self.references_appended += other.references_appended;
        self.isolated_failures += other.isolated_failures;
        self.sources_added += other.sources_added;
        self.suppressions_added += other.suppressions_added;
    }
}

/// Canonicalize every matching document and save each one
pub async fn canonicalize_store(
    canonicalizer: &Canonicalizer,
    store: &dyn DocumentStore,
    pattern: &str,
) -> Result<CanonicalizeStats> {
    let mut total = CanonicalizeStats::default();
    let mut documents = 0;

    for handle in store.list(pattern).await? {
        let mut document = store.load(&handle).await?;
        let stats = canonicalizer.canonicalize_document(&mut document);
        store.save(&document).await?;

        documents += 1;
        total.entries_changed += stats.entries_changed;
        total.references_removed += stats.references_removed;
    }

    info!(
        "Canonicalized {} documents: {} entries changed, {} references removed",
        documents, total.entries_changed, total.references_removed
    );
    Ok(total)
}
