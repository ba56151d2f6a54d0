//! Core types shared by adapters, the resolution engine and the reconciler
//!
//! - [`Reference`]: a (source name, source URL) pair with provenance
//! - [`ServiceRecord`]: one adapter's view of an Artist, Album or Track
//! - [`AggregateRecord`]: the merged view across adapters (same shape)

use crate::services::tracks::TrackSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Attribute marking a reference as produced by the resolution engine
pub const GENERATED_BY_ATTR: &str = "generatedBy";

// ============================================================================
// References
// ============================================================================

/// Where a reference came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Produced by the resolution engine
    Generated,
    /// Hand-curated
    Manual,
}

/// A (source name, source URL) pair attached to a catalog entry.
///
/// `attributes` holds any extra node attributes besides `name`/`src`.
/// Provenance is `Generated` exactly when a `generatedBy` attribute exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    pub src: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// Normalized identity of a reference; provenance is not part of it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceKey {
    pub name: String,
    pub url: String,
}

impl Reference {
    /// Hand-curated reference
    pub fn new(name: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            src: src.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Reference produced by the engine, tagged with `generated_by`
    pub fn generated(
        name: impl Into<String>,
        src: impl Into<String>,
        generated_by: impl Into<String>,
    ) -> Self {
        let mut reference = Self::new(name, src);
        reference.mark_generated(generated_by);
        reference
    }

    pub fn mark_generated(&mut self, generated_by: impl Into<String>) {
        self.attributes
            .insert(GENERATED_BY_ATTR.to_string(), generated_by.into());
    }

    pub fn provenance(&self) -> Provenance {
        if self.attributes.contains_key(GENERATED_BY_ATTR) {
            Provenance::Generated
        } else {
            Provenance::Manual
        }
    }

    pub fn key(&self) -> ReferenceKey {
        let url = self.src.trim();
        ReferenceKey {
            name: self.name.trim().to_lowercase(),
            url: url.strip_suffix('/').unwrap_or(url).to_string(),
        }
    }

    /// Look up any attribute, including `name` and `src`
    pub fn attribute(&self, attr: &str) -> Option<&str> {
        match attr {
            "name" => Some(&self.name),
            "src" => Some(&self.src),
            other => self.attributes.get(other).map(String::as_str),
        }
    }

    /// All attributes as (name, value) pairs, `name` and `src` first
    pub fn attribute_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        [("name", self.name.as_str()), ("src", self.src.as_str())]
            .into_iter()
            .chain(
                self.attributes
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            )
    }

    pub fn attribute_count(&self) -> usize {
        2 + self.attributes.len()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.src)
    }
}

// ============================================================================
// Service records
// ============================================================================

/// One disc of an album
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disc {
    pub name: String,
    pub track_count: usize,
}

/// Map a 0-based index in the flattened disc/track space to
/// (disc index, index within disc).
pub fn locate_track(discs: &[Disc], index: usize) -> Option<(usize, usize)> {
    let mut remaining = index;
    for (disc_index, disc) in discs.iter().enumerate() {
        if remaining < disc.track_count {
            return Some((disc_index, remaining));
        }
        remaining -= disc.track_count;
    }
    None
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtistRecord {
    pub title: Option<String>,
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackRecord {
    pub title: Option<String>,
    pub artists: Option<Vec<String>>,
    pub length: Option<Duration>,
    pub references: Vec<Reference>,
}

/// Shared handle to an album's lazy track list
#[derive(Clone)]
pub struct TrackAccessor(pub Arc<dyn TrackSource>);

impl TrackAccessor {
    pub fn new(source: impl TrackSource + 'static) -> Self {
        Self(Arc::new(source))
    }

    pub fn source(&self) -> &dyn TrackSource {
        self.0.as_ref()
    }

    pub fn same_source(&self, other: &TrackAccessor) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for TrackAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TrackAccessor(..)")
    }
}

#[derive(Debug, Clone, Default)]
pub struct AlbumRecord {
    pub title: Option<String>,
    pub artists: Option<Vec<String>>,
    pub discs: Option<Vec<Disc>>,
    pub tracks: Option<TrackAccessor>,
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Artist,
    Album,
    Track,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Artist => write!(f, "artist"),
            RecordKind::Album => write!(f, "album"),
            RecordKind::Track => write!(f, "track"),
        }
    }
}

/// What one adapter returns for one reference
#[derive(Debug, Clone)]
pub enum ServiceRecord {
    Artist(ArtistRecord),
    Album(AlbumRecord),
    Track(TrackRecord),
}

/// Merged record built from same-kind fragments
pub type AggregateRecord = ServiceRecord;

impl ServiceRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            ServiceRecord::Artist(_) => RecordKind::Artist,
            ServiceRecord::Album(_) => RecordKind::Album,
            ServiceRecord::Track(_) => RecordKind::Track,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            ServiceRecord::Artist(r) => r.title.as_deref(),
            ServiceRecord::Album(r) => r.title.as_deref(),
            ServiceRecord::Track(r) => r.title.as_deref(),
        }
    }

    pub fn references(&self) -> &[Reference] {
        match self {
            ServiceRecord::Artist(r) => &r.references,
            ServiceRecord::Album(r) => &r.references,
            ServiceRecord::Track(r) => &r.references,
        }
    }

    pub fn references_mut(&mut self) -> &mut Vec<Reference> {
        match self {
            ServiceRecord::Artist(r) => &mut r.references,
            ServiceRecord::Album(r) => &mut r.references,
            ServiceRecord::Track(r) => &mut r.references,
        }
    }

    pub fn as_album(&self) -> Option<&AlbumRecord> {
        match self {
            ServiceRecord::Album(album) => Some(album),
            _ => None,
        }
    }

    pub fn as_track(&self) -> Option<&TrackRecord> {
        match self {
            ServiceRecord::Track(track) => Some(track),
            _ => None,
        }
    }
}

// ============================================================================
// Anime records
// ============================================================================

/// Ids of one show across the anime databases
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimeIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anilist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kitsu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anidb: Option<String>,
}

impl AnimeIds {
    fn slots(&self) -> [&Option<String>; 4] {
        [&self.mal, &self.anilist, &self.kitsu, &self.anidb]
    }

    pub fn is_empty(&self) -> bool {
        self.slots().iter().all(|id| id.is_none())
    }

    /// All four databases know the show
    pub fn is_complete(&self) -> bool {
        self.slots().iter().all(|id| id.is_some())
    }
}

/// What the anime lookups found for one entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimeRecord {
    pub title: Option<String>,
    /// `None` when no lookup was made or no database knew the show
    pub ids: Option<AnimeIds>,
}

// ============================================================================
// Title selection
// ============================================================================

const TITLE_PREFERENCE: &[&[&str]] = &[
    &["default", "romaji", "ja-latn"],
    &["english", "en", "nameen"],
    &["japanese", "jp", "ja", "nameja", "namekana"],
];

/// Pick a display title from a localized name table.
///
/// Keys are compared case-insensitively in preference order: romanized,
/// then English, then Japanese; otherwise the first entry wins.
pub fn pick_title<K, V>(names: impl IntoIterator<Item = (K, V)>) -> Option<String>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let names: Vec<(K, V)> = names.into_iter().collect();
    for group in TITLE_PREFERENCE {
        for wanted in *group {
            if let Some((_, value)) = names
                .iter()
                .find(|(key, _)| key.as_ref().to_lowercase() == *wanted)
            {
                return Some(value.as_ref().to_string());
            }
        }
    }
    names.first().map(|(_, value)| value.as_ref().to_string())
}
