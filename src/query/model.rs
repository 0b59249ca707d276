//! The query aggregate: selectors, joins, constraint, ordering, columns
//! and pagination, assembled once and read many times.

use serde::{Deserialize, Serialize};

use crate::query::column::Column;
use crate::query::constraint::Constraint;
use crate::query::join::Join;
use crate::query::ordering::Ordering;
use crate::query::selector::Selector;

/// A compiled query, as produced by an external parser.
///
/// Immutable once built. Equality and hashing are purely structural over
/// every node so that two independently parsed but semantically identical
/// queries can key the same cached plan. Concurrent readers share a query
/// freely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    selectors: Vec<Selector>,
    joins: Vec<Join>,
    constraint: Option<Constraint>,
    orderings: Vec<Ordering>,
    columns: Vec<Column>,
    offset: u64,
    limit: Option<u64>,
}

impl Query {
    /// Start building a query from its first selector.
    pub fn builder(source: Selector) -> QueryBuilder {
        QueryBuilder::new(source)
    }

    /// The ordered selector list.
    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// The joins, in declared order.
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// The root of the constraint tree, if any.
    pub fn constraint(&self) -> Option<&Constraint> {
        self.constraint.as_ref()
    }

    /// The ordering list.
    pub fn orderings(&self) -> &[Ordering] {
        &self.orderings
    }

    /// The projected columns.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Number of leading rows to skip.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Maximum number of rows to return, if bounded.
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }
}

/// Builder assembling an immutable [`Query`].
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    selectors: Vec<Selector>,
    joins: Vec<Join>,
    constraint: Option<Constraint>,
    orderings: Vec<Ordering>,
    columns: Vec<Column>,
    offset: u64,
    limit: Option<u64>,
}

impl QueryBuilder {
    /// Create a builder with the first selector.
    pub fn new(source: Selector) -> Self {
        QueryBuilder {
            selectors: vec![source],
            joins: Vec::new(),
            constraint: None,
            orderings: Vec::new(),
            columns: Vec::new(),
            offset: 0,
            limit: None,
        }
    }

    /// Join a further selector in.
    pub fn join(mut self, selector: Selector, join: Join) -> Self {
        self.selectors.push(selector);
        self.joins.push(join);
        self
    }

    /// Set the constraint tree; an existing constraint is AND-combined.
    pub fn constrain(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(match self.constraint.take() {
            Some(existing) => existing.and(constraint),
            None => constraint,
        });
        self
    }

    /// Append an ordering term.
    pub fn order_by(mut self, ordering: Ordering) -> Self {
        self.orderings.push(ordering);
        self
    }

    /// Append a projected column.
    pub fn select(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Skip the first `offset` rows.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Bound the number of returned rows.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Finish building.
    pub fn build(self) -> Query {
        Query {
            selectors: self.selectors,
            joins: self.joins,
            constraint: self.constraint,
            orderings: self.orderings,
            columns: self.columns,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::constraint::{Constraint, Literal, Operator};
    use crate::query::join::JoinCondition;

    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(query: &Query) -> u64 {
        let mut hasher = DefaultHasher::new();
        query.hash(&mut hasher);
        hasher.finish()
    }

    fn sample_query() -> Query {
        Query::builder(Selector::aliased("document", "d"))
            .join(
                Selector::aliased("folder", "f"),
                Join::inner(JoinCondition::child_node("d".into(), "f".into())),
            )
            .constrain(Constraint::comparison(
                "d".into(),
                "pages",
                Operator::Ge,
                Literal::Integer(10),
            ))
            .select(Column::new("d".into(), "title"))
            .order_by(Ordering::ascending("d".into(), "title"))
            .limit(25)
            .build()
    }

    #[test]
    fn test_independently_built_queries_compare_equal() {
        let a = sample_query();
        let b = sample_query();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_structurally_different_queries_differ() {
        let a = sample_query();
        let mut builder = Query::builder(Selector::aliased("document", "d"));
        builder = builder.limit(25);
        let b = builder.build();
        assert_ne!(a, b);
    }

    #[test]
    fn test_constrain_ands_existing_constraint() {
        let first = Constraint::comparison("d".into(), "pages", Operator::Ge, Literal::Integer(1));
        let second = Constraint::full_text("d".into(), None, "report");

        let query = Query::builder(Selector::aliased("document", "d"))
            .constrain(first.clone())
            .constrain(second.clone())
            .build();

        assert_eq!(query.constraint(), Some(&first.and(second)));
    }
}
