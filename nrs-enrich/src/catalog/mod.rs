//! In-memory view of catalog documents
//!
//! The persisted format belongs to the document store. The engine only sees
//! the attributes it reads or fills: id, title, the reference list, the
//! anime id block, the progress length and validator suppression rules.

pub mod id;
pub mod store;

pub use store::{compile_glob, DocumentHandle, DocumentStore, MemoryStore};

use crate::types::{AnimeIds, Reference};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Suppression rule that disables track length filling
pub const NO_PROGRESS_RULE: &str = "dah-no-progress";

/// Suppression rule for anime entries missing some cross-database id
pub const NO_ANIME_ALTSRC_RULE: &str = "dah-no-anime-altsrc";

/// One catalog file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub path: PathBuf,
    pub entries: Vec<CatalogEntry>,
}

impl CatalogDocument {
    pub fn new(path: impl Into<PathBuf>, entries: Vec<CatalogEntry>) -> Self {
        Self {
            path: path.into(),
            entries,
        }
    }

    /// Number of entries including nested ones
    pub fn entry_count(&self) -> usize {
        self.entries.iter().map(CatalogEntry::subtree_len).sum()
    }
}

/// Reference container (`source/urls`), stored ahead of the entry's other
/// children
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceList {
    pub urls: Vec<Reference>,
}

/// Cross-database id block of an anime entry (`source` with `mal`, `al`,
/// `kitsu`, `anidb` children)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimeSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_by: Option<String>,
    #[serde(default)]
    pub ids: AnimeIds,
}

/// Consumption progress block (`musicConsumedProgress`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Track length as `m:ss` or `h:mm:ss`
    pub length: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Hierarchical id; may contain `$` placeholders for the parent id
    pub id: String,
    /// Empty or absent means unresolved
    pub title: Option<String>,
    pub references: Option<ReferenceList>,
    #[serde(default)]
    pub anime_source: Option<AnimeSource>,
    pub progress: Option<Progress>,
    /// Validator rules suppressed for this entry
    #[serde(default)]
    pub suppressed_rules: Vec<String>,
    /// Nested entries (album tracks)
    #[serde(default)]
    pub children: Vec<CatalogEntry>,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.references_mut().push(reference);
        self
    }

    pub fn with_child(mut self, child: CatalogEntry) -> Self {
        self.children.push(child);
        self
    }

    pub fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Entry carries a `source` block of either shape
    pub fn has_source_block(&self) -> bool {
        self.references.is_some() || self.anime_source.is_some()
    }

    pub fn is_placeholder(&self) -> bool {
        id::is_placeholder(&self.id)
    }

    pub fn references(&self) -> &[Reference] {
        self.references
            .as_ref()
            .map(|list| list.urls.as_slice())
            .unwrap_or_default()
    }

    /// Reference list, creating an empty container when absent
    pub fn references_mut(&mut self) -> &mut Vec<Reference> {
        &mut self.references.get_or_insert_with(ReferenceList::default).urls
    }

    /// Record rules from a `;`-separated `validatorSuppress` attribute
    pub fn add_suppression_rules(&mut self, rules: &str) {
        for rule in rules.split(';').map(str::trim).filter(|r| !r.is_empty()) {
            if !self.suppresses(rule) {
                self.suppressed_rules.push(rule.to_string());
            }
        }
    }

    pub fn suppresses(&self, rule: &str) -> bool {
        self.suppressed_rules.iter().any(|r| r == rule)
    }

    pub fn progress_length(&self) -> Option<&str> {
        self.progress
            .as_ref()
            .and_then(|p| p.length.as_deref())
            .filter(|length| !length.is_empty())
    }

    fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(CatalogEntry::subtree_len).sum::<usize>()
    }
}
