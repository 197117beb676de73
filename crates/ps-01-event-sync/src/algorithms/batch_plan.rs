//! # Batch Planning
//!
//! Splits `[fromBlock, head]` into sub-ranges for the log fetcher.
//!
//! Ranges shorter than one sync interval are fetched in a single call.
//! Longer ranges are cut into `ceil(difference / interval)` digests of equal
//! span, then grouped into batches of at most `batch_size` concurrent
//! requests. Sub-ranges are disjoint and their union is exactly the input.

use shared_types::BlockNumber;

use crate::domain::BlockRange;

/// How a block range will be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPlan {
    /// Nothing to fetch (`from > head`).
    Empty,
    /// One request over the whole range.
    Single(BlockRange),
    /// Sequential batches of concurrent sub-range requests.
    Batched(Vec<Vec<BlockRange>>),
}

impl FetchPlan {
    /// Total number of sub-range requests in the plan.
    pub fn request_count(&self) -> usize {
        match self {
            FetchPlan::Empty => 0,
            FetchPlan::Single(_) => 1,
            FetchPlan::Batched(batches) => batches.iter().map(Vec::len).sum(),
        }
    }
}

/// Plan the fetch of `[from, head]`.
pub fn plan_fetch(
    from: BlockNumber,
    head: BlockNumber,
    interval: u64,
    batch_size: usize,
) -> FetchPlan {
    if from > head {
        return FetchPlan::Empty;
    }
    let range = BlockRange::new(from, head);
    let interval = interval.max(1);
    let difference = head - from;

    if difference < interval {
        return FetchPlan::Single(range);
    }

    let digests = difference.div_ceil(interval);
    let span = difference.div_ceil(digests).max(1);
    let ranges = split_range(range, span);

    FetchPlan::Batched(
        ranges
            .chunks(batch_size.max(1))
            .map(<[BlockRange]>::to_vec)
            .collect(),
    )
}

/// Cut `range` into consecutive pieces of `span` blocks (last may be shorter).
pub fn split_range(range: BlockRange, span: u64) -> Vec<BlockRange> {
    if range.is_empty() {
        return Vec::new();
    }
    let span = span.max(1);
    let mut pieces = Vec::new();
    let mut start = range.from;
    loop {
        let end = start.saturating_add(span - 1).min(range.to);
        pieces.push(BlockRange::new(start, end));
        if end >= range.to {
            break;
        }
        start = end + 1;
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_cover(plan: &FetchPlan, from: u64, head: u64) {
        let FetchPlan::Batched(batches) = plan else {
            panic!("expected batched plan");
        };
        let ranges: Vec<BlockRange> = batches.iter().flatten().copied().collect();
        assert_eq!(ranges.first().unwrap().from, from);
        assert_eq!(ranges.last().unwrap().to, head);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].to + 1, pair[1].from);
        }
    }

    #[test]
    fn test_empty_when_from_after_head() {
        assert_eq!(plan_fetch(101, 100, 10_000, 10), FetchPlan::Empty);
    }

    #[test]
    fn test_short_range_is_single_call() {
        assert_eq!(
            plan_fetch(100, 9_000, 10_000, 10),
            FetchPlan::Single(BlockRange::new(100, 9_000))
        );
    }

    #[test]
    fn test_same_block_is_single_call() {
        assert_eq!(
            plan_fetch(50, 50, 10_000, 10),
            FetchPlan::Single(BlockRange::new(50, 50))
        );
    }

    #[test]
    fn test_long_range_is_batched_and_covers_exactly() {
        let plan = plan_fetch(1_000, 26_000, 10_000, 10);
        assert_exact_cover(&plan, 1_000, 26_000);
        assert!(plan.request_count() >= 3);
    }

    #[test]
    fn test_batches_respect_batch_size() {
        let plan = plan_fetch(0, 1_000_000, 10_000, 10);
        let FetchPlan::Batched(batches) = &plan else {
            panic!("expected batched plan");
        };
        assert!(batches.iter().all(|b| b.len() <= 10));
        assert!(batches.len() >= 10);
        assert_exact_cover(&plan, 0, 1_000_000);
    }

    #[test]
    fn test_split_range_pieces() {
        let pieces = split_range(BlockRange::new(0, 9), 4);
        assert_eq!(
            pieces,
            vec![
                BlockRange::new(0, 3),
                BlockRange::new(4, 7),
                BlockRange::new(8, 9)
            ]
        );
    }

    #[test]
    fn test_zero_interval_does_not_panic() {
        let plan = plan_fetch(0, 3, 0, 2);
        assert_exact_cover(&plan, 0, 3);
    }
}
