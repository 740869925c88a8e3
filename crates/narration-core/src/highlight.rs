//! Resolve the live word for a playback position.

use crate::alignment::AlignmentEntry;

/// Margin added on both sides of every word interval to absorb decoder and
/// tick jitter.
pub const HIGHLIGHT_TOLERANCE_MS: f64 = 50.0;

/// Binary search over `entries` (sorted by start) for an interval containing
/// `position_ms` once widened by `tolerance_ms`. Returns the first probed
/// match; when the widened windows of neighbouring words overlap either
/// neighbour may be returned.
pub fn resolve_with_tolerance(
    entries: &[AlignmentEntry],
    position_ms: f64,
    tolerance_ms: f64,
) -> Option<usize> {
    let mut low = 0usize;
    let mut high = entries.len();

    while low < high {
        let mid = low + (high - low) / 2;
        let entry = &entries[mid];
        if position_ms + tolerance_ms >= entry.start_ms && position_ms - tolerance_ms <= entry.end_ms
        {
            return Some(entry.token_index);
        }
        if position_ms < entry.start_ms {
            high = mid;
        } else {
            low = mid + 1;
        }
    }

    None
}

pub fn resolve(entries: &[AlignmentEntry], position_ms: f64) -> Option<usize> {
    resolve_with_tolerance(entries, position_ms, HIGHLIGHT_TOLERANCE_MS)
}
