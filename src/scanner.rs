use tracing::debug;

use crate::domain::types::{EngineError, SignalOccurrence};
use crate::ledger::LedgerPort;

/// Splits the inclusive height range `[from, to]` into contiguous batches of
/// at most `batch_width` heights, in ascending order.
pub fn partition_ranges(from: u64, to: u64, batch_width: u64) -> Vec<(u64, u64)> {
    if from > to {
        return Vec::new();
    }
    let width = batch_width.max(1);

    let mut ranges = Vec::new();
    let mut start = from;
    loop {
        let end = start.saturating_add(width - 1).min(to);
        ranges.push((start, end));
        if end == to {
            return ranges;
        }
        start = end + 1;
    }
}

/// Drains the backlog of Ping occurrences in `[from, to]`, one bounded range
/// query per batch, sequentially, preserving (height, log index) order. A
/// failed batch fails the whole pass; the caller restarts from the persisted
/// cursor, never from the failed sub-range.
pub async fn backfill(
    ledger: &dyn LedgerPort,
    from: u64,
    to: u64,
    batch_width: u64,
) -> Result<Vec<SignalOccurrence>, EngineError> {
    let mut occurrences = Vec::new();
    for (start, end) in partition_ranges(from, to, batch_width) {
        let batch = ledger
            .query_logs(start, end)
            .await
            .map_err(EngineError::Query)?;
        debug!(start, end, count = batch.len(), "backfill_batch");
        occurrences.extend(batch);
    }
    Ok(occurrences)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_of_width_w_yields_ceil_w_over_b_batches() {
        // 120 heights at batch width 50: three batches, no gaps, no overlaps.
        let ranges = partition_ranges(101, 220, 50);
        assert_eq!(ranges, vec![(101, 150), (151, 200), (201, 220)]);
    }

    #[test]
    fn batches_cover_the_range_exactly() {
        let ranges = partition_ranges(7, 1_000, 33);
        assert_eq!(ranges.first().map(|range| range.0), Some(7));
        assert_eq!(ranges.last().map(|range| range.1), Some(1_000));
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].1 + 1, pair[1].0, "batches must be contiguous");
        }
        let covered: u64 = ranges.iter().map(|(start, end)| end - start + 1).sum();
        assert_eq!(covered, 1_000 - 7 + 1);
    }

    #[test]
    fn narrow_ranges_fit_a_single_batch() {
        assert_eq!(partition_ranges(101, 130, 50), vec![(101, 130)]);
        assert_eq!(partition_ranges(42, 42, 50), vec![(42, 42)]);
    }

    #[test]
    fn inverted_range_is_empty() {
        assert!(partition_ranges(10, 9, 50).is_empty());
    }

    #[test]
    fn zero_batch_width_is_clamped_to_one() {
        assert_eq!(partition_ranges(1, 3, 0), vec![(1, 1), (2, 2), (3, 3)]);
    }
}
