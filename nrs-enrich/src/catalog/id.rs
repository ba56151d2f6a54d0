//! Catalog id conventions
//!
//! - `$` in an id stands for the nearest ancestor entry's resolved id
//!   (`$-3` under `M-VGMDB-AL-100` is `M-VGMDB-AL-100-3`)
//! - `M-VGMDB-AL-<n>[-<track>]` and `M-VGMDB-AR-<n>` resolve directly to a
//!   VGMdb page without an explicit reference on the entry
//! - `A-<DB>-<n>` names a show in one anime database (`MAL`, `AL`, `KS`,
//!   `ADB`); any id starting with `A` is an anime entry

use crate::error::{EnrichError, Result};
use crate::types::Reference;

const PLACEHOLDER: char = '$';
const VGMDB_SOURCE: &str = "vgmdb";
const VGMDB_BASE: &str = "https://vgmdb.net";

/// Anime database an `A-<DB>-<n>` id points into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimeDatabase {
    MyAnimeList,
    AniList,
    Kitsu,
    AniDb,
}

impl AnimeDatabase {
    fn from_code(code: &str) -> Option<Self> {
        match code {
            "MAL" => Some(Self::MyAnimeList),
            "AL" => Some(Self::AniList),
            "KS" => Some(Self::Kitsu),
            "ADB" => Some(Self::AniDb),
            _ => None,
        }
    }

    /// Name used by id relation services
    pub fn relation_name(&self) -> &'static str {
        match self {
            Self::MyAnimeList => "myanimelist",
            Self::AniList => "anilist",
            Self::Kitsu => "kitsu",
            Self::AniDb => "anidb",
        }
    }
}

pub fn is_anime_id(id: &str) -> bool {
    id.starts_with('A')
}

/// Database and database-local id of an `A-<DB>-<n>` entry id
pub fn parse_anime_id(id: &str) -> Option<(AnimeDatabase, &str)> {
    let tokens: Vec<&str> = id.split('-').collect();
    match tokens.as_slice() {
        ["A", code, number] if !number.is_empty() => {
            AnimeDatabase::from_code(code).map(|database| (database, *number))
        }
        _ => None,
    }
}

pub fn is_placeholder(id: &str) -> bool {
    id.contains(PLACEHOLDER)
}

/// Substitute the parent's resolved id for every `$`
pub fn resolve_entry_id(raw: &str, parent_id: Option<&str>) -> Result<String> {
    if !is_placeholder(raw) {
        return Ok(raw.to_string());
    }
    let parent_id = parent_id.ok_or_else(|| EnrichError::MissingParent(raw.to_string()))?;
    Ok(raw.replace(PLACEHOLDER, parent_id))
}

/// 0-based track index of a placeholder child (last `-` token, 1-based)
pub fn child_track_index(resolved_id: &str) -> Result<usize> {
    resolved_id
        .rsplit('-')
        .next()
        .and_then(|token| token.parse::<usize>().ok())
        .and_then(|position| position.checked_sub(1))
        .ok_or_else(|| EnrichError::InvalidCatalogId(resolved_id.to_string()))
}

/// Reference implied by the id alone, if any
pub fn derive_primary_reference(id: &str) -> Result<Option<Reference>> {
    if !id.starts_with("M-VGMDB") {
        return Ok(None);
    }

    let invalid = || EnrichError::InvalidCatalogId(id.to_string());
    let tokens: Vec<&str> = id.split('-').collect();
    if !(tokens.len() == 4 || tokens.len() == 5) || tokens[0] != "M" || tokens[1] != "VGMDB" {
        return Err(invalid());
    }

    let number = tokens[3];
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let url = match (tokens[2], tokens.get(4)) {
        ("AL", None) => format!("{}/album/{}", VGMDB_BASE, number),
        ("AL", Some(track)) => {
            let index = track
                .parse::<usize>()
                .ok()
                .and_then(|t| t.checked_sub(1))
                .ok_or_else(invalid)?;
            format!("{}/album/{}?trackindex={}", VGMDB_BASE, number, index)
        }
        ("AR", None) => format!("{}/artist/{}", VGMDB_BASE, number),
        _ => return Err(invalid()),
    };

    Ok(Some(Reference::new(VGMDB_SOURCE, url)))
}
