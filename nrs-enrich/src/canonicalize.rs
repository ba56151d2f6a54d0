//! Reference List Canonicalizer
//!
//! Normalizes one entry's reference list in a fixed order of steps:
//!
//! 1. `http://` upgraded to `https://`, host aliases rewritten
//! 2. low-value references dropped (per-source URL patterns)
//! 3. duplicates by identity key removed, `generated` beating `manual`
//! 4. stable sort by source name
//! 5. adjacent references that agree on every shared attribute folded,
//!    keeping the one with more attributes
//!
//! Applying it to its own output changes nothing.

use crate::catalog::{CatalogDocument, CatalogEntry};
use crate::error::Result;
use crate::types::{Provenance, Reference, ReferenceKey};
use nrs_common::config::CanonicalizeConfig;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

struct DropRule {
    source: String,
    pattern: Regex,
}

impl DropRule {
    fn matches(&self, reference: &Reference) -> bool {
        reference.name.starts_with(self.source.as_str()) && self.pattern.is_match(&reference.src)
    }
}

/// Totals for one canonicalized document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanonicalizeStats {
    pub entries_changed: usize,
    pub references_removed: usize,
}

pub struct Canonicalizer {
    upgrade_scheme: bool,
    host_aliases: BTreeMap<String, String>,
    drop_rules: Vec<DropRule>,
}

impl Canonicalizer {
    /// Build from configuration; fails if a drop pattern is not a valid regex
    pub fn new(config: &CanonicalizeConfig) -> Result<Self> {
        let drop_rules = config
            .drop_rules
            .iter()
            .map(|rule| {
                Ok(DropRule {
                    source: rule.source.clone(),
                    pattern: Regex::new(&rule.pattern)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            upgrade_scheme: config.upgrade_scheme,
            host_aliases: config
                .host_aliases
                .iter()
                .map(|(alias, host)| (alias.to_lowercase(), host.clone()))
                .collect(),
            drop_rules,
        })
    }

    pub fn canonicalize(&self, references: Vec<Reference>) -> Vec<Reference> {
        let rewritten = references.into_iter().map(|mut reference| {
            reference.src = self.rewrite_url(&reference.src);
            reference
        });

        let kept: Vec<Reference> = rewritten
            .filter(|reference| {
                let dropped = self.drop_rules.iter().any(|rule| rule.matches(reference));
                if dropped {
                    debug!("Dropping low-value reference {}", reference);
                }
                !dropped
            })
            .collect();

        let mut unique = dedup_by_key(kept);
        unique.sort_by(|a, b| a.name.cmp(&b.name));
        fold_adjacent(unique)
    }

    /// Canonicalize an entry's own reference list; returns whether it changed
    pub fn canonicalize_entry(&self, entry: &mut CatalogEntry) -> bool {
        let Some(list) = entry.references.as_mut() else {
            return false;
        };
        let canonical = self.canonicalize(list.urls.clone());
        if canonical == list.urls {
            return false;
        }
        debug!(
            "{}: references {} -> {}",
            entry.id,
            list.urls.len(),
            canonical.len()
        );
        list.urls = canonical;
        true
    }

    /// Canonicalize every entry in a document, nested entries included
    pub fn canonicalize_document(&self, document: &mut CatalogDocument) -> CanonicalizeStats {
        let mut stats = CanonicalizeStats::default();
        for entry in &mut document.entries {
            self.canonicalize_tree(entry, &mut stats);
        }
        info!(
            "{}: canonicalized {} entries, removed {} references",
            document.path.display(),
            stats.entries_changed,
            stats.references_removed
        );
        stats
    }

    fn canonicalize_tree(&self, entry: &mut CatalogEntry, stats: &mut CanonicalizeStats) {
        let before = entry.references().len();
        if self.canonicalize_entry(entry) {
            stats.entries_changed += 1;
            stats.references_removed += before - entry.references().len();
        }
        for child in &mut entry.children {
            self.canonicalize_tree(child, stats);
        }
    }

    fn rewrite_url(&self, url: &str) -> String {
        let mut url = url.to_string();
        if self.upgrade_scheme {
            if let Some(rest) = url.strip_prefix("http://") {
                url = format!("https://{}", rest);
            }
        }

        let Some(scheme_end) = scheme_prefix_len(&url) else {
            return url;
        };
        let host_end = url[scheme_end..]
            .find(|c| matches!(c, '/' | '?' | '#' | ':'))
            .map_or(url.len(), |i| scheme_end + i);

        match self.host_aliases.get(&url[scheme_end..host_end].to_lowercase()) {
            Some(canonical) => format!("{}{}{}", &url[..scheme_end], canonical, &url[host_end..]),
            None => url,
        }
    }
}

/// Length of a leading `scheme://`, if the URL has one
fn scheme_prefix_len(url: &str) -> Option<usize> {
    let scheme = &url[..url.find("://")?];
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme.len() + 3)
}

/// Keep one reference per key at the key's first position; a generated
/// duplicate replaces a manual one.
fn dedup_by_key(references: Vec<Reference>) -> Vec<Reference> {
    let mut slots: HashMap<ReferenceKey, usize> = HashMap::new();
    let mut unique: Vec<Reference> = Vec::with_capacity(references.len());

    for reference in references {
        match slots.get(&reference.key()) {
            Some(&slot) => {
                if unique[slot].provenance() == Provenance::Manual
                    && reference.provenance() == Provenance::Generated
                {
                    unique[slot] = reference;
                }
            }
            None => {
                slots.insert(reference.key(), unique.len());
                unique.push(reference);
            }
        }
    }
    unique
}

/// Every attribute defined on both sides has the same value
fn compatible(a: &Reference, b: &Reference) -> bool {
    a.attribute_pairs()
        .all(|(name, value)| b.attribute(name).map_or(true, |other| other == value))
}

fn fold_adjacent(references: Vec<Reference>) -> Vec<Reference> {
    let mut folded: Vec<Reference> = Vec::with_capacity(references.len());
    for reference in references {
        match folded.last_mut() {
            Some(last) if compatible(last, &reference) => {
                if reference.attribute_count() > last.attribute_count() {
                    *last = reference;
                }
            }
            _ => folded.push(reference),
        }
    }
    folded
}
