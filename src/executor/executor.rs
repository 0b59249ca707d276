//! Query execution: validation, planning, per-selector lookups, joins,
//! projection, ordering and pagination.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::debug;

use crate::content::{
    Command, ContentEntry, ContentPipeline, InvocationContext, PropertyValue,
};
use crate::error::{Result, XiphosError};
use crate::executor::plan::{QueryPlan, translate};
use crate::executor::result::{QueryResult, ResultRow};
use crate::index::{IndexSnapshot, SegmentManager};
use crate::query::{
    Join, JoinCondition, JoinType, Query, QueryValidator, SelectorName, SortOrder,
};
use crate::schema::TypeRegistry;

/// States a query execution moves through. Cancellation is checked at
/// every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// The query arrived from the parser.
    Parsed,
    /// Structural validation passed.
    Validated,
    /// Per-selector lookups are translated against a snapshot.
    Planned,
    /// Selector lookups are running.
    Executing,
    /// Join conditions are being evaluated.
    Joining,
    /// Surviving rows are being projected.
    Projecting,
    /// The result is complete.
    Done,
    /// Terminal: the validator rejected the query.
    ValidationFailed,
    /// Terminal: a lookup or pipeline call failed.
    ExecutionFailed,
}

/// Shared flag cancelling a query between execution steps.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Create a fresh, uncancelled flag.
    pub fn new() -> Self {
        CancellationFlag::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::SeqCst)
    }
}

/// One in-flight row: per selector position, the bound entry id. `None`
/// marks the unmatched side of a left join.
type Row = Vec<Option<String>>;

/// Executes queries against the index and the content pipeline.
///
/// Executions are independent units of work: each takes its own snapshot
/// at plan time and shares no mutable state with other queries.
#[derive(Debug)]
pub struct QueryExecutor {
    registry: TypeRegistry,
    manager: Arc<SegmentManager>,
    pipeline: ContentPipeline,
    // Plans keyed by the query's structural equality; two independently
    // parsed but identical queries share one entry.
    plan_cache: Mutex<AHashMap<Query, Arc<QueryPlan>>>,
}

/// Cached plans kept before the cache is dropped wholesale.
const PLAN_CACHE_CAPACITY: usize = 1024;

impl QueryExecutor {
    /// Create an executor.
    pub fn new(
        registry: TypeRegistry,
        manager: Arc<SegmentManager>,
        pipeline: ContentPipeline,
    ) -> Self {
        QueryExecutor {
            registry,
            manager,
            pipeline,
            plan_cache: Mutex::new(AHashMap::new()),
        }
    }

    /// Execute a query to completion.
    pub fn execute(&self, query: &Query, context: &InvocationContext) -> Result<QueryResult> {
        self.execute_cancellable(query, context, &CancellationFlag::new())
    }

    /// Execute a query, honouring a cancellation flag between steps.
    pub fn execute_cancellable(
        &self,
        query: &Query,
        context: &InvocationContext,
        cancel: &CancellationFlag,
    ) -> Result<QueryResult> {
        let mut state = ExecutionState::Parsed;
        let result = self.run(query, context, cancel, &mut state);
        match &result {
            Ok(result) => {
                debug!(rows = result.rows.len(), total = result.total_count, "query done");
            }
            Err(e) => {
                let terminal = match e {
                    XiphosError::InvalidQuery(_) => ExecutionState::ValidationFailed,
                    _ => ExecutionState::ExecutionFailed,
                };
                debug!(from = ?state, state = ?terminal, error = %e, "query failed");
            }
        }
        result
    }

    fn transition(
        &self,
        state: &mut ExecutionState,
        next: ExecutionState,
        cancel: &CancellationFlag,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(XiphosError::cancelled(format!(
                "query cancelled entering {next:?}"
            )));
        }
        *state = next;
        debug!(state = ?next, "execution state");
        Ok(())
    }

    fn run(
        &self,
        query: &Query,
        context: &InvocationContext,
        cancel: &CancellationFlag,
        state: &mut ExecutionState,
    ) -> Result<QueryResult> {
        self.transition(state, ExecutionState::Validated, cancel)?;
        let cached_plan = self.plan_cache.lock().get(query).cloned();
        if cached_plan.is_none() {
            QueryValidator::new(&self.registry).validate(query)?;
        }

        self.transition(state, ExecutionState::Planned, cancel)?;
        let snapshot = self.manager.snapshot();
        let plan = match cached_plan {
            Some(plan) => plan,
            None => {
                let plan = Arc::new(translate(query)?);
                let mut cache = self.plan_cache.lock();
                if cache.len() >= PLAN_CACHE_CAPACITY {
                    cache.clear();
                }
                cache.insert(query.clone(), plan.clone());
                plan
            }
        };

        self.transition(state, ExecutionState::Executing, cancel)?;
        let candidates = self.run_lookups(&plan, &snapshot);

        self.transition(state, ExecutionState::Joining, cancel)?;
        let rows = self.join_rows(query, &snapshot, &candidates)?;

        self.transition(state, ExecutionState::Projecting, cancel)?;
        let mut projected = self.project(query, context, rows)?;

        sort_rows(query, &mut projected);
        let result = paginate(query, projected);

        self.transition(state, ExecutionState::Done, cancel)?;
        Ok(result)
    }

    /// Run every selector's lookup against the snapshot, in parallel.
    fn run_lookups(&self, plan: &QueryPlan, snapshot: &IndexSnapshot) -> Vec<Vec<String>> {
        plan.selectors
            .par_iter()
            .map(|selector_plan| {
                let mut ids: Vec<String> =
                    snapshot.evaluate(&selector_plan.lookup).into_iter().collect();
                ids.sort();
                ids
            })
            .collect()
    }

    /// Evaluate the joins in declared order, left to right.
    fn join_rows(
        &self,
        query: &Query,
        snapshot: &IndexSnapshot,
        candidates: &[Vec<String>],
    ) -> Result<Vec<Row>> {
        let positions: AHashMap<SelectorName, usize> = query
            .selectors()
            .iter()
            .enumerate()
            .map(|(position, selector)| (selector.name().clone(), position))
            .collect();
        let selector_count = query.selectors().len();

        let mut rows: Vec<Row> = candidates[0]
            .iter()
            .map(|id| {
                let mut row: Row = vec![None; selector_count];
                row[0] = Some(id.clone());
                row
            })
            .collect();

        for (index, join) in query.joins().iter().enumerate() {
            let new_position = index + 1;
            rows = apply_join(
                join,
                new_position,
                &positions,
                snapshot,
                &candidates[new_position],
                rows,
            )?;
        }
        Ok(rows)
    }

    /// Resolve projected columns and ordering keys for every surviving
    /// row, one entry at a time through the pipeline.
    fn project(
        &self,
        query: &Query,
        context: &InvocationContext,
        rows: Vec<Row>,
    ) -> Result<Vec<(ResultRow, Vec<Option<PropertyValue>>)>> {
        let positions: AHashMap<SelectorName, usize> = query
            .selectors()
            .iter()
            .enumerate()
            .map(|(position, selector)| (selector.name().clone(), position))
            .collect();

        let mut projected = Vec::with_capacity(rows.len());
        for row in rows {
            let mut entries: AHashMap<usize, ContentEntry> = AHashMap::new();

            let mut result_row = ResultRow::new();
            for column in query.columns() {
                let position = positions[&column.selector];
                let value = match self.entry_for(context, &row, position, &mut entries)? {
                    Some(entry) => entry.property(&column.property)?,
                    None => None,
                };
                result_row.set(column.column_name.clone(), value);
            }

            let mut keys = Vec::with_capacity(query.orderings().len());
            for ordering in query.orderings() {
                let position = positions[&ordering.selector];
                let key = match self.entry_for(context, &row, position, &mut entries)? {
                    Some(entry) => entry.property(&ordering.property)?,
                    None => None,
                };
                keys.push(key);
            }

            projected.push((result_row, keys));
        }
        Ok(projected)
    }

    /// Fetch the entry bound at a row position, memoized per row.
    fn entry_for<'a>(
        &self,
        context: &InvocationContext,
        row: &Row,
        position: usize,
        entries: &'a mut AHashMap<usize, ContentEntry>,
    ) -> Result<Option<&'a ContentEntry>> {
        let Some(id) = &row[position] else {
            return Ok(None);
        };
        if !entries.contains_key(&position) {
            let output = self
                .pipeline
                .execute(context, &Command::get_content_entry(id))?;
            let entry = output.into_entry().ok_or_else(|| {
                XiphosError::execution("pipeline returned no entry for a projection fetch")
            })?;
            entries.insert(position, entry);
        }
        Ok(entries.get(&position))
    }
}

/// Apply one join: combine the bound rows with the newly joined
/// selector's candidates.
fn apply_join(
    join: &Join,
    new_position: usize,
    positions: &AHashMap<SelectorName, usize>,
    snapshot: &IndexSnapshot,
    new_candidates: &[String],
    rows: Vec<Row>,
) -> Result<Vec<Row>> {
    let position_of = |name: &SelectorName| -> Result<usize> {
        positions.get(name).copied().ok_or_else(|| {
            XiphosError::execution(format!("join references unknown selector '{name}'"))
        })
    };
    let bound_position_of = |name: &SelectorName| -> Result<usize> {
        let position = position_of(name)?;
        if position >= new_position {
            return Err(XiphosError::invalid_query(format!(
                "join condition references selector '{name}' before it is joined"
            )));
        }
        Ok(position)
    };

    // For each row, the candidate ids of the new selector it joins with.
    let matcher: Box<dyn Fn(&Row) -> Vec<String> + '_> = match &join.condition {
        JoinCondition::SameNode(condition) => {
            let first = position_of(&condition.selector1)?;
            let bound = if first == new_position {
                bound_position_of(&condition.selector2)?
            } else {
                if position_of(&condition.selector2)? != new_position {
                    return Err(join_shape_error(new_position));
                }
                bound_position_of(&condition.selector1)?
            };

            match &condition.selector2_path {
                None => {
                    // Same node: candidate id equals the bound id.
                    let candidate_set: AHashSet<&String> = new_candidates.iter().collect();
                    Box::new(move |row: &Row| {
                        row[bound]
                            .as_ref()
                            .filter(|id| candidate_set.contains(id))
                            .map(|id| vec![id.clone()])
                            .unwrap_or_default()
                    })
                }
                Some(path) => {
                    if first == new_position {
                        // New selector is selector1: its node must sit at
                        // `path` below the bound selector2 node.
                        let mut by_anchor: AHashMap<String, Vec<String>> = AHashMap::new();
                        for candidate in new_candidates {
                            if let Some(anchor) = resolve_upward(snapshot, candidate, path) {
                                by_anchor.entry(anchor).or_default().push(candidate.clone());
                            }
                        }
                        Box::new(move |row: &Row| {
                            row[bound]
                                .as_ref()
                                .and_then(|id| by_anchor.get(id))
                                .cloned()
                                .unwrap_or_default()
                        })
                    } else {
                        // New selector is selector2: the bound selector1
                        // node walked up the path must land on a candidate.
                        let candidate_set: AHashSet<String> =
                            new_candidates.iter().cloned().collect();
                        let snapshot = snapshot.clone();
                        let path = path.clone();
                        Box::new(move |row: &Row| {
                            row[bound]
                                .as_ref()
                                .and_then(|id| resolve_upward(&snapshot, id, &path))
                                .filter(|anchor| candidate_set.contains(anchor))
                                .map(|anchor| vec![anchor])
                                .unwrap_or_default()
                        })
                    }
                }
            }
        }
        JoinCondition::ChildNode(condition) => {
            let child_position = position_of(&condition.child_selector)?;
            if child_position == new_position {
                let parent = bound_position_of(&condition.parent_selector)?;
                // Index the new child candidates by their parent pointer.
                let mut by_parent: AHashMap<String, Vec<String>> = AHashMap::new();
                for candidate in new_candidates {
                    if let Some(link) = snapshot.link_of(candidate)
                        && let Some(parent_id) = link.parent_id
                    {
                        by_parent.entry(parent_id).or_default().push(candidate.clone());
                    }
                }
                Box::new(move |row: &Row| {
                    row[parent]
                        .as_ref()
                        .and_then(|id| by_parent.get(id))
                        .cloned()
                        .unwrap_or_default()
                })
            } else {
                let child = bound_position_of(&condition.child_selector)?;
                if position_of(&condition.parent_selector)? != new_position {
                    return Err(join_shape_error(new_position));
                }
                let candidate_set: AHashSet<String> = new_candidates.iter().cloned().collect();
                let snapshot = snapshot.clone();
                Box::new(move |row: &Row| {
                    row[child]
                        .as_ref()
                        .and_then(|id| snapshot.link_of(id))
                        .and_then(|link| link.parent_id)
                        .filter(|parent_id| candidate_set.contains(parent_id))
                        .map(|parent_id| vec![parent_id])
                        .unwrap_or_default()
                })
            }
        }
        JoinCondition::DescendantNode(condition) => {
            let descendant_position = position_of(&condition.descendant_selector)?;
            if descendant_position == new_position {
                let ancestor = bound_position_of(&condition.ancestor_selector)?;
                // Index the new descendant candidates by every ancestor on
                // their parent chain.
                let mut by_ancestor: AHashMap<String, Vec<String>> = AHashMap::new();
                for candidate in new_candidates {
                    for ancestor_id in ancestor_chain(snapshot, candidate) {
                        by_ancestor
                            .entry(ancestor_id)
                            .or_default()
                            .push(candidate.clone());
                    }
                }
                Box::new(move |row: &Row| {
                    row[ancestor]
                        .as_ref()
                        .and_then(|id| by_ancestor.get(id))
                        .cloned()
                        .unwrap_or_default()
                })
            } else {
                let descendant = bound_position_of(&condition.descendant_selector)?;
                if position_of(&condition.ancestor_selector)? != new_position {
                    return Err(join_shape_error(new_position));
                }
                let candidate_set: AHashSet<String> = new_candidates.iter().cloned().collect();
                let snapshot = snapshot.clone();
                Box::new(move |row: &Row| {
                    row[descendant]
                        .as_ref()
                        .map(|id| {
                            ancestor_chain(&snapshot, id)
                                .into_iter()
                                .filter(|ancestor_id| candidate_set.contains(ancestor_id))
                                .collect()
                        })
                        .unwrap_or_default()
                })
            }
        }
        JoinCondition::EquiJoin(condition) => {
            let first_position = position_of(&condition.selector1)?;
            let (bound, bound_property, new_property) = if first_position == new_position {
                (
                    bound_position_of(&condition.selector2)?,
                    condition.property2.clone(),
                    condition.property1.clone(),
                )
            } else {
                let bound = bound_position_of(&condition.selector1)?;
                if position_of(&condition.selector2)? != new_position {
                    return Err(join_shape_error(new_position));
                }
                (bound, condition.property1.clone(), condition.property2.clone())
            };

            // Hash join keyed by the property value.
            let mut by_value: AHashMap<String, Vec<String>> = AHashMap::new();
            for candidate in new_candidates {
                if let Some(value) = snapshot.property_of(candidate, &new_property) {
                    by_value
                        .entry(join_key(&value))
                        .or_default()
                        .push(candidate.clone());
                }
            }
            let snapshot = snapshot.clone();
            Box::new(move |row: &Row| {
                row[bound]
                    .as_ref()
                    .and_then(|id| snapshot.property_of(id, &bound_property))
                    .and_then(|value| by_value.get(&join_key(&value)))
                    .cloned()
                    .unwrap_or_default()
            })
        }
    };

    let mut joined = Vec::new();
    for row in rows {
        let matches = matcher(&row);
        if matches.is_empty() {
            // Unmatched left rows survive a left-outer join with a null
            // right side.
            if join.join_type == JoinType::LeftOuter {
                joined.push(row);
            }
        } else {
            for matched in matches {
                let mut new_row = row.clone();
                new_row[new_position] = Some(matched);
                joined.push(new_row);
            }
        }
    }
    Ok(joined)
}

fn join_shape_error(new_position: usize) -> XiphosError {
    XiphosError::invalid_query(format!(
        "join condition does not reference the selector joined at position {new_position}"
    ))
}

/// Walk an entry's ancestors upward, consuming the path names in reverse;
/// returns the node the path is relative to.
fn resolve_upward(snapshot: &IndexSnapshot, start: &str, path: &[String]) -> Option<String> {
    let mut current = start.to_string();
    for name in path.iter().rev() {
        let link = snapshot.link_of(&current)?;
        if link.name != *name {
            return None;
        }
        current = link.parent_id?;
    }
    Some(current)
}

/// Every ancestor of an entry, nearest first.
fn ancestor_chain(snapshot: &IndexSnapshot, id: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut seen = AHashSet::new();
    let mut current = id.to_string();
    while let Some(link) = snapshot.link_of(&current) {
        let Some(parent_id) = link.parent_id else {
            break;
        };
        if !seen.insert(parent_id.clone()) {
            break;
        }
        chain.push(parent_id.clone());
        current = parent_id;
    }
    chain
}

/// Canonical hash-join key for a property value; the kind tag keeps
/// different kinds from comparing equal.
fn join_key(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Text(v) => format!("t:{v}"),
        PropertyValue::Integer(v) => format!("i:{v}"),
        PropertyValue::Decimal(v) => format!("d:{}", v.to_bits()),
        PropertyValue::Boolean(v) => format!("b:{v}"),
        PropertyValue::DateTime(v) => format!("dt:{}", v.to_rfc3339()),
        PropertyValue::Id(v) => format!("r:{v}"),
    }
}

/// Sort the projected rows by the query's ordering terms; nulls sort
/// last under ascending order.
fn sort_rows(query: &Query, rows: &mut [(ResultRow, Vec<Option<PropertyValue>>)]) {
    if query.orderings().is_empty() {
        return;
    }
    rows.sort_by(|(_, a), (_, b)| {
        for (index, ordering) in query.orderings().iter().enumerate() {
            let mut compared = compare_keys(&a[index], &b[index]);
            if ordering.order == SortOrder::Descending {
                compared = compared.reverse();
            }
            if compared != std::cmp::Ordering::Equal {
                return compared;
            }
        }
        std::cmp::Ordering::Equal
    });
}

fn compare_keys(a: &Option<PropertyValue>, b: &Option<PropertyValue>) -> std::cmp::Ordering {
    match (a, b) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (Some(_), None) => std::cmp::Ordering::Less,
        (Some(a), Some(b)) => compare_values(a, b),
    }
}

fn compare_values(a: &PropertyValue, b: &PropertyValue) -> std::cmp::Ordering {
    use PropertyValue::*;
    match (a, b) {
        (Text(a), Text(b)) => a.cmp(b),
        (Integer(a), Integer(b)) => a.cmp(b),
        (Decimal(a), Decimal(b)) => a.total_cmp(b),
        (Boolean(a), Boolean(b)) => a.cmp(b),
        (DateTime(a), DateTime(b)) => a.cmp(b),
        (Id(a), Id(b)) => a.cmp(b),
        // Mixed kinds: rank by kind so the order is at least total.
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn kind_rank(value: &PropertyValue) -> u8 {
    match value {
        PropertyValue::Text(_) => 0,
        PropertyValue::Integer(_) => 1,
        PropertyValue::Decimal(_) => 2,
        PropertyValue::Boolean(_) => 3,
        PropertyValue::DateTime(_) => 4,
        PropertyValue::Id(_) => 5,
    }
}

/// Apply offset and limit, last, and compute the pagination hints.
fn paginate(
    query: &Query,
    rows: Vec<(ResultRow, Vec<Option<PropertyValue>>)>,
) -> QueryResult {
    let total_count = rows.len() as u64;
    let offset = query.offset() as usize;
    let limit = query.limit().map(|l| l as usize).unwrap_or(usize::MAX);

    let page: Vec<ResultRow> = rows
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|(row, _)| row)
        .collect();
    let has_more = (offset as u64 + page.len() as u64) < total_count;

    QueryResult {
        rows: page,
        total_count,
        has_more,
    }
}
