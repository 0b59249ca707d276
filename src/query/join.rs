//! Join declarations correlating two selectors of a query.

use serde::{Deserialize, Serialize};

use crate::query::selector::SelectorName;

/// How unmatched rows of the left side are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    /// Keep only rows matched on both sides.
    Inner,
    /// Keep every left row; unmatched right sides project as null.
    LeftOuter,
}

/// Node from the first selector equals the node at `selector2_path`
/// (default: itself) relative to the second selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SameNodeJoin {
    /// Name of the first selector.
    pub selector1: SelectorName,
    /// Name of the second selector.
    pub selector2: SelectorName,
    /// Relative path from the second selector locating the compared node;
    /// `None` when the second selector's node itself is compared.
    pub selector2_path: Option<Vec<String>>,
}

/// Child/parent structural relation between two selectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChildNodeJoin {
    /// Selector whose nodes are the children.
    pub child_selector: SelectorName,
    /// Selector whose nodes are the parents.
    pub parent_selector: SelectorName,
}

/// Transitive containment relation between two selectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DescendantNodeJoin {
    /// Selector whose nodes are the descendants.
    pub descendant_selector: SelectorName,
    /// Selector whose nodes are the ancestors.
    pub ancestor_selector: SelectorName,
}

/// Property-value equality between two selectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EquiJoin {
    /// Name of the first selector.
    pub selector1: SelectorName,
    /// Property of the first selector.
    pub property1: String,
    /// Name of the second selector.
    pub selector2: SelectorName,
    /// Property of the second selector.
    pub property2: String,
}

/// The closed set of join conditions.
///
/// Every variant is immutable and value-equal; referential integrity of the
/// selector names is validated once at compile time, never re-checked
/// during execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinCondition {
    /// Same-node condition.
    SameNode(SameNodeJoin),
    /// Child/parent condition.
    ChildNode(ChildNodeJoin),
    /// Descendant/ancestor condition.
    DescendantNode(DescendantNodeJoin),
    /// Property equality condition.
    EquiJoin(EquiJoin),
}

impl JoinCondition {
    /// Create a same-node condition comparing the two selectors' nodes.
    pub fn same_node(selector1: SelectorName, selector2: SelectorName) -> Self {
        JoinCondition::SameNode(SameNodeJoin {
            selector1,
            selector2,
            selector2_path: None,
        })
    }

    /// Create a same-node condition against a path relative to the second
    /// selector.
    pub fn same_node_at_path(
        selector1: SelectorName,
        selector2: SelectorName,
        selector2_path: Vec<String>,
    ) -> Self {
        JoinCondition::SameNode(SameNodeJoin {
            selector1,
            selector2,
            selector2_path: Some(selector2_path),
        })
    }

    /// Create a child-node condition.
    pub fn child_node(child_selector: SelectorName, parent_selector: SelectorName) -> Self {
        JoinCondition::ChildNode(ChildNodeJoin {
            child_selector,
            parent_selector,
        })
    }

    /// Create a descendant-node condition.
    pub fn descendant_node(
        descendant_selector: SelectorName,
        ancestor_selector: SelectorName,
    ) -> Self {
        JoinCondition::DescendantNode(DescendantNodeJoin {
            descendant_selector,
            ancestor_selector,
        })
    }

    /// Create a property-equality condition.
    pub fn equi_join(
        selector1: SelectorName,
        property1: String,
        selector2: SelectorName,
        property2: String,
    ) -> Self {
        JoinCondition::EquiJoin(EquiJoin {
            selector1,
            property1,
            selector2,
            property2,
        })
    }

    /// The selector names this condition references.
    pub fn referenced_selectors(&self) -> [&SelectorName; 2] {
        match self {
            JoinCondition::SameNode(c) => [&c.selector1, &c.selector2],
            JoinCondition::ChildNode(c) => [&c.child_selector, &c.parent_selector],
            JoinCondition::DescendantNode(c) => [&c.descendant_selector, &c.ancestor_selector],
            JoinCondition::EquiJoin(c) => [&c.selector1, &c.selector2],
        }
    }
}

/// One join of a query: a condition plus the join type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Join {
    /// Inner or left-outer.
    pub join_type: JoinType,
    /// The correlating condition.
    pub condition: JoinCondition,
}

impl Join {
    /// Create an inner join.
    pub fn inner(condition: JoinCondition) -> Self {
        Join {
            join_type: JoinType::Inner,
            condition,
        }
    }

    /// Create a left-outer join.
    pub fn left_outer(condition: JoinCondition) -> Self {
        Join {
            join_type: JoinType::LeftOuter,
            condition,
        }
    }
}
