//! Query object model: the typed, immutable AST a parsed query compiles to.
//!
//! An external parser produces a [`Query`]; this module defines its node
//! types, the visitor traversal contract, and the validator that checks
//! selector and property references before execution.

pub mod column;
pub mod constraint;
pub mod join;
pub mod model;
pub mod ordering;
pub mod selector;
pub mod validator;
pub mod visitor;

pub use self::column::Column;
pub use self::constraint::{
    Comparison, Constraint, FullTextExpression, FullTextSearch, Literal, Operator,
};
pub use self::join::{
    ChildNodeJoin, DescendantNodeJoin, EquiJoin, Join, JoinCondition, JoinType, SameNodeJoin,
};
pub use self::model::{Query, QueryBuilder};
pub use self::ordering::{Ordering, SortOrder};
pub use self::selector::{Selector, SelectorName};
pub use self::validator::QueryValidator;
pub use self::visitor::{QueryModelVisitor, VisitFlow, walk_query};
