//! Document Reconciler
//!
//! Writes an aggregate record back into a catalog entry. Title and track
//! length are filled only when empty, so re-running leaves them alone.
//! References are appended without deduplication; repeated runs grow the
//! list until the canonicalizer folds it.
//!
//! Anime entries have their own write-back ([`reconcile_anime`]): title,
//! then a generated cross-database id block when the entry has no `source`
//! block yet.

use crate::catalog::{AnimeSource, CatalogEntry, Progress, NO_ANIME_ALTSRC_RULE, NO_PROGRESS_RULE};
use crate::types::{AggregateRecord, AnimeRecord, ServiceRecord};
use nrs_common::human_time::format_track_length;
use tracing::debug;

/// What a reconcile call changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub title_set: bool,
    pub length_set: bool,
    pub references_appended: usize,
}

impl ReconcileOutcome {
    pub fn changed(&self) -> bool {
        self.title_set || self.length_set || self.references_appended > 0
    }
}

/// Apply `record` to `entry`; `append_references` controls whether the
/// record's references are copied into the entry's reference list.
pub fn reconcile(
    entry: &mut CatalogEntry,
    record: &AggregateRecord,
    append_references: bool,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();

    if !entry.has_title() {
        if let Some(title) = record.title().filter(|t| !t.is_empty()) {
            entry.title = Some(title.to_string());
            outcome.title_set = true;
        }
    }

    if let ServiceRecord::Track(track) = record {
        if let Some(length) = track.length {
            if !entry.suppresses(NO_PROGRESS_RULE) && entry.progress_length().is_none() {
                entry
                    .progress
                    .get_or_insert_with(Progress::default)
                    .length = Some(format_track_length(length));
                outcome.length_set = true;
            }
        }
    }

    if append_references && !record.references().is_empty() {
        entry
            .references_mut()
            .extend(record.references().iter().cloned());
        outcome.references_appended = record.references().len();
    }

    debug!(
        "{}: reconciled (title: {}, length: {}, references: +{})",
        entry.id, outcome.title_set, outcome.length_set, outcome.references_appended
    );
    outcome
}

/// What an anime reconcile call changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnimeOutcome {
    pub title_set: bool,
    pub source_added: bool,
    pub suppression_added: bool,
}

impl AnimeOutcome {
    pub fn changed(&self) -> bool {
        self.title_set || self.source_added || self.suppression_added
    }
}

/// Apply anime lookups to `entry`.
///
/// An id block is only added to an entry without any `source` block. If
/// the lookup came back empty or incomplete the entry also gets the
/// `dah-no-anime-altsrc` suppression so the validator stops asking.
pub fn reconcile_anime(entry: &mut CatalogEntry, record: &AnimeRecord, generated_by: &str) -> AnimeOutcome {
    let mut outcome = AnimeOutcome::default();

    if !entry.has_title() {
        if let Some(title) = record.title.as_deref().filter(|t| !t.is_empty()) {
            entry.title = Some(title.to_string());
            outcome.title_set = true;
        }
    }

    if !entry.has_source_block() {
        let ids = record.ids.clone().unwrap_or_default();
        let complete = ids.is_complete();
        entry.anime_source = Some(AnimeSource {
            generated_by: Some(generated_by.to_string()),
            ids,
        });
        outcome.source_added = true;

        if !complete && !entry.suppresses(NO_ANIME_ALTSRC_RULE) {
            entry.add_suppression_rules(NO_ANIME_ALTSRC_RULE);
            outcome.suppression_added = true;
        }
    }

    debug!(
        "{}: reconciled anime (title: {}, source: {}, suppression: {})",
        entry.id, outcome.title_set, outcome.source_added, outcome.suppression_added
    );
    outcome
}
