//! Query execution over the segmented index and the content pipeline.

pub mod executor;
pub mod plan;
pub mod result;

pub use self::executor::{CancellationFlag, ExecutionState, QueryExecutor};
pub use self::plan::{QueryPlan, SelectorPlan, translate};
pub use self::result::{QueryResult, ResultRow};
