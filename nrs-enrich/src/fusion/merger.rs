// Field Merge Resolver - fill-only merge of same-kind fragments
//
// The first fragment fixes the record kind; fragments of another kind are
// dropped whole. Every other field takes the first non-empty value in
// fragment order and is never overwritten afterwards.

use super::Fragment;
use crate::types::{
    AggregateRecord, AlbumRecord, ArtistRecord, Reference, ServiceRecord, TrackRecord,
};
use tracing::debug;

/// Merge fragments (already in precedence order) into one aggregate.
///
/// The aggregate's references are the expansion's working list. Returns
/// `None` when no fragment was produced.
pub fn merge_fragments(
    fragments: Vec<Fragment>,
    references: Vec<Reference>,
) -> Option<AggregateRecord> {
    let mut fragments = fragments.into_iter();
    let first = fragments.next()?;
    let mut aggregate = empty_like(&first.record);
    let kind = aggregate.kind();

    for fragment in std::iter::once(first).chain(fragments) {
        if fragment.record.kind() != kind {
            debug!(
                "Skipping {} fragment from {}: aggregate is {}",
                fragment.record.kind(),
                fragment.source,
                kind
            );
            continue;
        }
        fill_from(&mut aggregate, fragment.record);
    }

    *aggregate.references_mut() = references;
    Some(aggregate)
}

fn empty_like(record: &ServiceRecord) -> AggregateRecord {
    match record {
        ServiceRecord::Artist(_) => ServiceRecord::Artist(ArtistRecord::default()),
        ServiceRecord::Album(_) => ServiceRecord::Album(AlbumRecord::default()),
        ServiceRecord::Track(_) => ServiceRecord::Track(TrackRecord::default()),
    }
}

fn fill_from(aggregate: &mut AggregateRecord, record: ServiceRecord) {
    match (aggregate, record) {
        (ServiceRecord::Artist(into), ServiceRecord::Artist(from)) => {
            fill_text(&mut into.title, from.title);
        }
        (ServiceRecord::Album(into), ServiceRecord::Album(from)) => {
            fill_text(&mut into.title, from.title);
            fill_list(&mut into.artists, from.artists);
            fill_list(&mut into.discs, from.discs);
            if into.tracks.is_none() {
                into.tracks = from.tracks;
            }
        }
        (ServiceRecord::Track(into), ServiceRecord::Track(from)) => {
            fill_text(&mut into.title, from.title);
            fill_list(&mut into.artists, from.artists);
            if into.length.is_none() {
                into.length = from.length;
            }
        }
        _ => {}
    }
}

fn fill_text(slot: &mut Option<String>, value: Option<String>) {
    if slot.as_deref().map_or(true, str::is_empty) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            *slot = Some(value);
        }
    }
}

fn fill_list<T>(slot: &mut Option<Vec<T>>, value: Option<Vec<T>>) {
    if slot.as_ref().map_or(true, Vec::is_empty) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            *slot = Some(value);
        }
    }
}
