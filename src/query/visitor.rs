//! Visitor traversal over the query object model.
//!
//! Every node type accepts a visitor through a single `accept` method that
//! dispatches to the visitor's type-specific handler. Joins are visited in
//! declared order; constraints are visited pre-order, parents before
//! children, so a handler can prune a whole subtree by returning
//! [`VisitFlow::Skip`].

use crate::error::Result;
use crate::query::column::Column;
use crate::query::constraint::{Comparison, Constraint, FullTextSearch};
use crate::query::join::{
    ChildNodeJoin, DescendantNodeJoin, EquiJoin, Join, JoinCondition, SameNodeJoin,
};
use crate::query::model::Query;
use crate::query::ordering::Ordering;
use crate::query::selector::Selector;

/// Whether a combinator's children are traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitFlow {
    /// Descend into the children.
    Continue,
    /// Prune the subtree below this node.
    Skip,
}

/// Type-specific handlers for every node of the query model.
///
/// All handlers default to no-ops so a visitor implements only the nodes it
/// cares about.
pub trait QueryModelVisitor {
    /// Called for each selector, in declared order.
    fn visit_selector(&mut self, _selector: &Selector) -> Result<()> {
        Ok(())
    }

    /// Called for each join before its condition handler.
    fn visit_join(&mut self, _join: &Join) -> Result<()> {
        Ok(())
    }

    /// Called for a same-node join condition.
    fn visit_same_node(&mut self, _condition: &SameNodeJoin) -> Result<()> {
        Ok(())
    }

    /// Called for a child-node join condition.
    fn visit_child_node(&mut self, _condition: &ChildNodeJoin) -> Result<()> {
        Ok(())
    }

    /// Called for a descendant-node join condition.
    fn visit_descendant_node(&mut self, _condition: &DescendantNodeJoin) -> Result<()> {
        Ok(())
    }

    /// Called for a property-equality join condition.
    fn visit_equi_join(&mut self, _condition: &EquiJoin) -> Result<()> {
        Ok(())
    }

    /// Called for an AND combinator before its children.
    fn visit_and(&mut self, _left: &Constraint, _right: &Constraint) -> Result<VisitFlow> {
        Ok(VisitFlow::Continue)
    }

    /// Called for an OR combinator before its children.
    fn visit_or(&mut self, _left: &Constraint, _right: &Constraint) -> Result<VisitFlow> {
        Ok(VisitFlow::Continue)
    }

    /// Called for a NOT combinator before its child.
    fn visit_not(&mut self, _inner: &Constraint) -> Result<VisitFlow> {
        Ok(VisitFlow::Continue)
    }

    /// Called for a comparison leaf.
    fn visit_comparison(&mut self, _comparison: &Comparison) -> Result<()> {
        Ok(())
    }

    /// Called for a full-text leaf.
    fn visit_full_text(&mut self, _search: &FullTextSearch) -> Result<()> {
        Ok(())
    }

    /// Called for each ordering term.
    fn visit_ordering(&mut self, _ordering: &Ordering) -> Result<()> {
        Ok(())
    }

    /// Called for each projected column.
    fn visit_column(&mut self, _column: &Column) -> Result<()> {
        Ok(())
    }
}

impl Selector {
    /// Accept a visitor.
    pub fn accept<V: QueryModelVisitor + ?Sized>(&self, visitor: &mut V) -> Result<()> {
        visitor.visit_selector(self)
    }
}

impl JoinCondition {
    /// Accept a visitor, dispatching on the condition variant.
    pub fn accept<V: QueryModelVisitor + ?Sized>(&self, visitor: &mut V) -> Result<()> {
        match self {
            JoinCondition::SameNode(condition) => visitor.visit_same_node(condition),
            JoinCondition::ChildNode(condition) => visitor.visit_child_node(condition),
            JoinCondition::DescendantNode(condition) => visitor.visit_descendant_node(condition),
            JoinCondition::EquiJoin(condition) => visitor.visit_equi_join(condition),
        }
    }
}

impl Join {
    /// Accept a visitor: the join itself, then its condition.
    pub fn accept<V: QueryModelVisitor + ?Sized>(&self, visitor: &mut V) -> Result<()> {
        visitor.visit_join(self)?;
        self.condition.accept(visitor)
    }
}

impl Constraint {
    /// Accept a visitor pre-order; combinator handlers may prune subtrees.
    pub fn accept<V: QueryModelVisitor + ?Sized>(&self, visitor: &mut V) -> Result<()> {
        match self {
            Constraint::And(left, right) => {
                if visitor.visit_and(left, right)? == VisitFlow::Continue {
                    left.accept(visitor)?;
                    right.accept(visitor)?;
                }
                Ok(())
            }
            Constraint::Or(left, right) => {
                if visitor.visit_or(left, right)? == VisitFlow::Continue {
                    left.accept(visitor)?;
                    right.accept(visitor)?;
                }
                Ok(())
            }
            Constraint::Not(inner) => {
                if visitor.visit_not(inner)? == VisitFlow::Continue {
                    inner.accept(visitor)?;
                }
                Ok(())
            }
            Constraint::Comparison(comparison) => visitor.visit_comparison(comparison),
            Constraint::FullText(search) => visitor.visit_full_text(search),
        }
    }
}

impl Ordering {
    /// Accept a visitor.
    pub fn accept<V: QueryModelVisitor + ?Sized>(&self, visitor: &mut V) -> Result<()> {
        visitor.visit_ordering(self)
    }
}

impl Column {
    /// Accept a visitor.
    pub fn accept<V: QueryModelVisitor + ?Sized>(&self, visitor: &mut V) -> Result<()> {
        visitor.visit_column(self)
    }
}

/// Walk a whole query: selectors, joins (declared order), constraint tree
/// (pre-order), orderings, columns.
pub fn walk_query<V: QueryModelVisitor + ?Sized>(query: &Query, visitor: &mut V) -> Result<()> {
    for selector in query.selectors() {
        selector.accept(visitor)?;
    }
    for join in query.joins() {
        join.accept(visitor)?;
    }
    if let Some(constraint) = query.constraint() {
        constraint.accept(visitor)?;
    }
    for ordering in query.orderings() {
        ordering.accept(visitor)?;
    }
    for column in query.columns() {
        column.accept(visitor)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::constraint::{Literal, Operator};

    #[derive(Default)]
    struct CountingVisitor {
        comparisons: usize,
        combinators: usize,
        skip_or: bool,
    }

    impl QueryModelVisitor for CountingVisitor {
        fn visit_and(&mut self, _: &Constraint, _: &Constraint) -> Result<VisitFlow> {
            self.combinators += 1;
            Ok(VisitFlow::Continue)
        }

        fn visit_or(&mut self, _: &Constraint, _: &Constraint) -> Result<VisitFlow> {
            self.combinators += 1;
            if self.skip_or {
                Ok(VisitFlow::Skip)
            } else {
                Ok(VisitFlow::Continue)
            }
        }

        fn visit_comparison(&mut self, _: &Comparison) -> Result<()> {
            self.comparisons += 1;
            Ok(())
        }
    }

    fn comparison(property: &str) -> Constraint {
        Constraint::comparison("d".into(), property, Operator::Eq, Literal::Integer(1))
    }

    #[test]
    fn test_pre_order_traversal_counts_all_leaves() {
        let tree = comparison("a").and(comparison("b").or(comparison("c")));

        let mut visitor = CountingVisitor::default();
        tree.accept(&mut visitor).unwrap();

        assert_eq!(visitor.combinators, 2);
        assert_eq!(visitor.comparisons, 3);
    }

    #[test]
    fn test_skip_prunes_subtree() {
        let tree = comparison("a").and(comparison("b").or(comparison("c")));

        let mut visitor = CountingVisitor {
            skip_or: true,
            ..Default::default()
        };
        tree.accept(&mut visitor).unwrap();

        // The OR subtree's two leaves are pruned.
        assert_eq!(visitor.comparisons, 1);
    }
}
