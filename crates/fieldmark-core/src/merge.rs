//! Deterministic reconciliation of marking collections.
//!
//! Pure last-writer-wins merge over the identity rules in
//! [`Marking::same_entity`]. No I/O, no errors: malformed records ride along
//! untouched and only ever fail to *match*, never fail the merge.

use crate::models::Marking;

/// Outcome of one merge pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    /// The reconciled collection, newest creation first.
    pub markings: Vec<Marking>,
    /// Remote records appended because nothing local matched.
    pub added: usize,
    /// Local records replaced by a strictly newer remote version.
    pub replaced: usize,
}

/// Merge `remote` into `local`, producing a deduplicated union.
///
/// For every remote record the first matching local entry (by
/// [`Marking::same_entity`]) is found; an unmatched record is appended, a
/// matched one replaces the local entry only when strictly newer by
/// [`Marking::effective_modified`]. Equal timestamps keep the local entry:
/// the tie deliberately favors locally-visible state.
///
/// The result is sorted by creation timestamp descending as a stable
/// presentation order; the ordering carries no identity meaning.
#[must_use]
pub fn merge_markings(local: &[Marking], remote: &[Marking]) -> MergeResult {
    let mut markings: Vec<Marking> = local.to_vec();
    let mut added = 0;
    let mut replaced = 0;

    for incoming in remote {
        match markings
            .iter()
            .position(|existing| existing.same_entity(incoming))
        {
            Some(index) => {
                if incoming.is_newer_than(&markings[index]) {
                    markings[index] = incoming.clone();
                    replaced += 1;
                }
            }
            None => {
                markings.push(incoming.clone());
                added += 1;
            }
        }
    }

    markings.sort_by_key(|marking| std::cmp::Reverse(marking.timestamp.unwrap_or(0)));

    MergeResult {
        markings,
        added,
        replaced,
    }
}
