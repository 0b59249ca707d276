//! Aggregation policies deciding which segments to merge or rewrite.
//!
//! Policies are stateless strategies: pure functions of the sealed-segment
//! population and the thresholds handed in. The decorating variant wraps a
//! delegate policy and may override either decision independently while
//! forwarding the other unchanged.

use std::fmt::Debug;

use ahash::AHashSet;

use crate::index::segment::{SegmentId, SegmentMeta};

/// Strategy selecting segments for merge or structural optimization.
///
/// Both operations are pure: no side effects, no I/O.
pub trait AggregationPolicy: Send + Sync + Debug {
    /// Select the subset of sealed segments to merge into one new segment.
    ///
    /// Smallest segments are preferred until either the set's cardinality
    /// reaches `required_count` or its summed size reaches
    /// `required_total_size`. A set of fewer than two segments is never
    /// returned; merging one segment is a no-op.
    fn select_merge_candidates(
        &self,
        segments: &[SegmentMeta],
        required_count: usize,
        required_total_size: u64,
    ) -> AHashSet<SegmentId>;

    /// Select segments whose internal structure should be rewritten for
    /// query-time efficiency, independent of the merge decision.
    fn select_optimize_candidates(&self, segments: &[SegmentMeta]) -> AHashSet<SegmentId>;
}

/// Size-driven aggregation policy.
///
/// Merge selection walks the population smallest-first (ties broken by
/// ascending generation, oldest first, for determinism) and stops at the
/// first satisfied threshold. Optimize selection picks segments whose
/// block count exceeds the rewrite threshold.
#[derive(Debug, Clone)]
pub struct SizeAggregationPolicy {
    /// Block count above which a segment is rewritten.
    pub max_blocks_per_segment: u32,
}

impl Default for SizeAggregationPolicy {
    fn default() -> Self {
        SizeAggregationPolicy {
            max_blocks_per_segment: 8,
        }
    }
}

impl SizeAggregationPolicy {
    /// Create a policy with the given rewrite threshold.
    pub fn new(max_blocks_per_segment: u32) -> Self {
        SizeAggregationPolicy {
            max_blocks_per_segment,
        }
    }
}

impl AggregationPolicy for SizeAggregationPolicy {
    fn select_merge_candidates(
        &self,
        segments: &[SegmentMeta],
        required_count: usize,
        required_total_size: u64,
    ) -> AHashSet<SegmentId> {
        let mut ordered: Vec<&SegmentMeta> = segments.iter().collect();
        ordered.sort_by_key(|meta| (meta.size_bytes, meta.generation));

        let mut selected = AHashSet::new();
        let mut total_size = 0u64;
        let mut triggered = false;

        for meta in ordered {
            selected.insert(meta.id.clone());
            total_size += meta.size_bytes;
            if selected.len() >= required_count || total_size >= required_total_size {
                triggered = true;
                break;
            }
        }

        if !triggered || selected.len() < 2 {
            return AHashSet::new();
        }
        selected
    }

    fn select_optimize_candidates(&self, segments: &[SegmentMeta]) -> AHashSet<SegmentId> {
        segments
            .iter()
            .filter(|meta| meta.block_count > self.max_blocks_per_segment)
            .map(|meta| meta.id.clone())
            .collect()
    }
}

/// Override for the merge-selection decision. Receives the wrapped
/// delegate so a specialization can filter its input or rework its answer.
pub type MergeSelect = dyn Fn(&dyn AggregationPolicy, &[SegmentMeta], usize, u64) -> AHashSet<SegmentId>
    + Send
    + Sync;

/// Override for the optimize-selection decision.
pub type OptimizeSelect =
    dyn Fn(&dyn AggregationPolicy, &[SegmentMeta]) -> AHashSet<SegmentId> + Send + Sync;

/// A policy decorating a delegate.
///
/// Each of the two decisions can be overridden independently; a decision
/// without an override is forwarded to the delegate unchanged. Used to
/// compose specialized policies, such as a generation gate, on top of a
/// generic size/count policy.
pub struct DecoratedAggregationPolicy {
    delegate: Box<dyn AggregationPolicy>,
    merge_select: Option<Box<MergeSelect>>,
    optimize_select: Option<Box<OptimizeSelect>>,
}

impl Debug for DecoratedAggregationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoratedAggregationPolicy")
            .field("delegate", &self.delegate)
            .field("merge_select", &self.merge_select.is_some())
            .field("optimize_select", &self.optimize_select.is_some())
            .finish()
    }
}

impl DecoratedAggregationPolicy {
    /// Wrap a delegate with no overrides; both decisions pass through.
    pub fn new(delegate: Box<dyn AggregationPolicy>) -> Self {
        DecoratedAggregationPolicy {
            delegate,
            merge_select: None,
            optimize_select: None,
        }
    }

    /// Override the merge-selection decision.
    pub fn with_merge_select<F>(mut self, select: F) -> Self
    where
        F: Fn(&dyn AggregationPolicy, &[SegmentMeta], usize, u64) -> AHashSet<SegmentId>
            + Send
            + Sync
            + 'static,
    {
        self.merge_select = Some(Box::new(select));
        self
    }

    /// Override the optimize-selection decision.
    pub fn with_optimize_select<F>(mut self, select: F) -> Self
    where
        F: Fn(&dyn AggregationPolicy, &[SegmentMeta]) -> AHashSet<SegmentId> + Send + Sync + 'static,
    {
        self.optimize_select = Some(Box::new(select));
        self
    }
}

impl AggregationPolicy for DecoratedAggregationPolicy {
    fn select_merge_candidates(
        &self,
        segments: &[SegmentMeta],
        required_count: usize,
        required_total_size: u64,
    ) -> AHashSet<SegmentId> {
        match &self.merge_select {
            Some(select) => select(
                self.delegate.as_ref(),
                segments,
                required_count,
                required_total_size,
            ),
            None => self.delegate.select_merge_candidates(
                segments,
                required_count,
                required_total_size,
            ),
        }
    }

    fn select_optimize_candidates(&self, segments: &[SegmentMeta]) -> AHashSet<SegmentId> {
        match &self.optimize_select {
            Some(select) => select(self.delegate.as_ref(), segments),
            None => self.delegate.select_optimize_candidates(segments),
        }
    }
}

/// A policy that never merges or rewrites; useful for tests and read-only
/// indexes.
#[derive(Debug, Clone, Default)]
pub struct NoAggregationPolicy;

impl AggregationPolicy for NoAggregationPolicy {
    fn select_merge_candidates(
        &self,
        _segments: &[SegmentMeta],
        _required_count: usize,
        _required_total_size: u64,
    ) -> AHashSet<SegmentId> {
        AHashSet::new()
    }

    fn select_optimize_candidates(&self, _segments: &[SegmentMeta]) -> AHashSet<SegmentId> {
        AHashSet::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn meta(id: &str, generation: u64, size_bytes: u64, block_count: u32) -> SegmentMeta {
        SegmentMeta {
            id: SegmentId::new(id),
            generation,
            doc_count: 10,
            size_bytes,
            block_count,
        }
    }

    fn sorted(ids: AHashSet<SegmentId>) -> Vec<String> {
        let mut ids: Vec<String> = ids.into_iter().map(|id| id.as_str().to_string()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_smallest_first_selection() {
        // Spec example: three 10-byte segments win over the 50-byte ones.
        let segments = vec![
            meta("s1", 1, 10, 1),
            meta("s2", 2, 10, 1),
            meta("s3", 3, 10, 1),
            meta("s4", 4, 50, 1),
            meta("s5", 5, 50, 1),
        ];
        let policy = SizeAggregationPolicy::default();

        let selected = policy.select_merge_candidates(&segments, 3, 25);
        assert_eq!(sorted(selected), vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn test_size_threshold_alone_triggers() {
        let segments = vec![meta("s1", 1, 20, 1), meta("s2", 2, 30, 1), meta("s3", 3, 90, 1)];
        let policy = SizeAggregationPolicy::default();

        // 20 + 30 >= 40 stops before the 90-byte segment.
        let selected = policy.select_merge_candidates(&segments, 10, 40);
        assert_eq!(sorted(selected), vec!["s1", "s2"]);
    }

    #[test]
    fn test_generation_breaks_size_ties() {
        let segments = vec![meta("young", 9, 10, 1), meta("old", 1, 10, 1), meta("mid", 5, 10, 1)];
        let policy = SizeAggregationPolicy::default();

        let selected = policy.select_merge_candidates(&segments, 2, u64::MAX);
        assert_eq!(sorted(selected), vec!["mid", "old"]);
    }

    #[test]
    fn test_never_returns_singleton() {
        let segments = vec![meta("s1", 1, 100, 1), meta("s2", 2, 100, 1)];
        let policy = SizeAggregationPolicy::default();

        // The first segment already satisfies the size threshold; a
        // one-segment merge is a no-op, so nothing is selected.
        let selected = policy.select_merge_candidates(&segments, 10, 50);
        assert!(selected.is_empty());
    }

    #[test]
    fn test_no_selection_when_thresholds_unreached() {
        let segments = vec![meta("s1", 1, 10, 1), meta("s2", 2, 10, 1)];
        let policy = SizeAggregationPolicy::default();

        let selected = policy.select_merge_candidates(&segments, 5, 1000);
        assert!(selected.is_empty());
    }

    #[test]
    fn test_optimize_selects_fragmented_segments() {
        let segments = vec![meta("s1", 1, 10, 3), meta("s2", 2, 10, 20)];
        let policy = SizeAggregationPolicy::new(8);

        let selected = policy.select_optimize_candidates(&segments);
        assert_eq!(sorted(selected), vec!["s2"]);
    }

    #[test]
    fn test_decorator_passes_both_through_by_default() {
        let segments = vec![
            meta("s1", 1, 10, 20),
            meta("s2", 2, 10, 1),
            meta("s3", 3, 10, 1),
        ];
        let inner = SizeAggregationPolicy::default();
        let decorated = DecoratedAggregationPolicy::new(Box::new(inner.clone()));

        assert_eq!(
            decorated.select_merge_candidates(&segments, 2, 1000),
            inner.select_merge_candidates(&segments, 2, 1000)
        );
        assert_eq!(
            decorated.select_optimize_candidates(&segments),
            inner.select_optimize_candidates(&segments)
        );
    }

    #[test]
    fn test_decorator_merge_override_leaves_optimize_untouched() {
        let segments = vec![
            meta("s1", 1, 10, 20),
            meta("s2", 7, 10, 1),
            meta("s3", 8, 10, 1),
        ];
        let inner = SizeAggregationPolicy::default();

        // Never merge segments younger than generation 5; forward the
        // filtered population to the delegate.
        let decorated = DecoratedAggregationPolicy::new(Box::new(inner.clone()))
            .with_merge_select(|delegate, segments, count, size| {
                let old: Vec<SegmentMeta> = segments
                    .iter()
                    .filter(|meta| meta.generation < 5)
                    .cloned()
                    .collect();
                delegate.select_merge_candidates(&old, count, size)
            });

        // Only s1 survives the gate; a singleton is never merged.
        assert!(decorated.select_merge_candidates(&segments, 2, 1000).is_empty());
        // Optimize still passes through unchanged.
        assert_eq!(
            decorated.select_optimize_candidates(&segments),
            inner.select_optimize_candidates(&segments)
        );
    }

    #[test]
    fn test_no_aggregation_policy() {
        let segments = vec![meta("s1", 1, 1, 50), meta("s2", 2, 1, 50)];
        let policy = NoAggregationPolicy;

        assert!(policy.select_merge_candidates(&segments, 1, 1).is_empty());
        assert!(policy.select_optimize_candidates(&segments).is_empty());
    }

    #[test]
    fn test_threshold_property_randomized() {
        use rand::Rng;

        let mut rng = rand::rng();
        for _ in 0..200 {
            let population: Vec<SegmentMeta> = (0..rng.random_range(0..20))
                .map(|i| {
                    meta(
                        &format!("s{i}"),
                        rng.random_range(0..100),
                        rng.random_range(0..1000),
                        1,
                    )
                })
                .collect();
            let required_count = rng.random_range(1..10usize);
            let required_size = rng.random_range(1..2000u64);

            let policy = SizeAggregationPolicy::default();
            let selected =
                policy.select_merge_candidates(&population, required_count, required_size);

            // Never a singleton.
            assert_ne!(selected.len(), 1);

            if !selected.is_empty() {
                let total: u64 = population
                    .iter()
                    .filter(|meta| selected.contains(&meta.id))
                    .map(|meta| meta.size_bytes)
                    .sum();
                // The triggering condition holds.
                assert!(selected.len() >= required_count || total >= required_size);
            }
        }
    }
}
