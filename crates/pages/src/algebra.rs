//! Set operations over page range lists.
//!
//! A list is *normalized* when its ranges are sorted by start and no two of
//! them overlap or touch. `All` absorbs everything, so a normalized list that
//! mentions `All` is exactly `[All]`.

use std::borrow::Cow;

use crate::range::{PageRange, PageRangeError};

/// Sorts `ranges` and merges overlapping or adjacent entries. Ranges built
/// with inverted bounds are read with their bounds swapped.
///
/// Idempotent and independent of input order.
pub fn normalize(ranges: &[PageRange]) -> Vec<PageRange> {
    if ranges.iter().any(PageRange::is_all) {
        return vec![PageRange::All];
    }
    let mut sorted: Vec<PageRange> = ranges.iter().map(|range| range.ordered()).collect();
    if sorted.len() <= 1 {
        return sorted;
    }

    sorted.sort_unstable_by_key(|range| (range.start(), range.end()));

    let mut merged: Vec<PageRange> = Vec::with_capacity(sorted.len());
    for range in sorted {
        match merged.last_mut() {
            Some(last) if last.end().saturating_add(1) >= range.start() => {
                *last = PageRange::Range {
                    start: last.start(),
                    end: last.end().max(range.end()),
                };
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Returns `true` when `ranges` is already in normalized form.
pub fn is_normalized(ranges: &[PageRange]) -> bool {
    if ranges.iter().any(|range| range.start() > range.end()) {
        return false;
    }
    if ranges.len() <= 1 {
        return true;
    }
    ranges.windows(2).all(|pair| {
        !pair[0].is_all()
            && !pair[1].is_all()
            && pair[0].end() < pair[1].start()
            && pair[1].start() - pair[0].end() > 1
    })
}

fn normalized(ranges: &[PageRange]) -> Cow<'_, [PageRange]> {
    if is_normalized(ranges) {
        Cow::Borrowed(ranges)
    } else {
        Cow::Owned(normalize(ranges))
    }
}

/// Whether every page in `contained` is also in `container`.
///
/// Both lists are normalized first when needed, then walked once in
/// lockstep, so the check is linear in the size of the normalized inputs.
pub fn contains(container: &[PageRange], contained: &[PageRange]) -> bool {
    let ours = normalized(container);
    if matches!(ours.as_ref(), [PageRange::All]) {
        return true;
    }
    let theirs = normalized(contained);
    if theirs.iter().any(PageRange::is_all) {
        return false;
    }

    let mut cursor = 0;
    for our in ours.iter() {
        while let Some(other) = theirs.get(cursor) {
            if other.start() > our.end() {
                break;
            }
            if !our.covers(other) {
                return false;
            }
            cursor += 1;
        }
    }
    cursor == theirs.len()
}

/// Shifts every numeric range by `delta`; `All` is left untouched.
///
/// Fails when a shifted bound would leave `0..=u32::MAX`.
pub fn offset(ranges: &[PageRange], delta: i64) -> Result<Vec<PageRange>, PageRangeError> {
    if delta == 0 {
        return Ok(ranges.to_vec());
    }
    ranges
        .iter()
        .map(|range| match *range {
            PageRange::All => Ok(PageRange::All),
            PageRange::Range { start, end } => {
                let shift = |bound: u32| u32::try_from(i64::from(bound) + delta).ok();
                match (shift(start), shift(end)) {
                    (Some(start), Some(end)) => Ok(PageRange::Range { start, end }),
                    _ => Err(PageRangeError::OffsetOutOfBounds {
                        range: *range,
                        delta,
                    }),
                }
            }
        })
        .collect()
}
