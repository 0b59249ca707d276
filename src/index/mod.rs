//! Segmented index: segments, snapshots, aggregation policies and the
//! segment manager.
//!
//! Entries land in the single open segment; threshold-driven sealing turns
//! it into an immutable, queryable segment. The aggregation policy keeps
//! the sealed population compact by selecting segments to merge or
//! rewrite, and the manager executes those decisions under a copy-on-write
//! snapshot discipline.

pub mod lookup;
pub mod manager;
pub mod policy;
pub mod segment;
pub mod snapshot;

pub use self::lookup::IndexLookup;
pub use self::manager::{
    AggregationReport, AggregationWorker, SegmentManager, SegmentManagerConfig,
    SegmentManagerStats,
};
pub use self::policy::{
    AggregationPolicy, DecoratedAggregationPolicy, NoAggregationPolicy, SizeAggregationPolicy,
};
pub use self::segment::{
    EntrySet, IndexedEntry, OpenSegment, SealedSegment, SegmentId, SegmentMeta,
};
pub use self::snapshot::{EntryLink, IndexSnapshot, SegmentSnapshot};
