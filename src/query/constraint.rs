//! Constraint tree of a query: boolean combinators, comparisons and
//! full-text predicates.

use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::tokenize;
use crate::query::selector::SelectorName;

/// Comparison operators usable in a [`Comparison`] constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// SQL LIKE pattern match (`%` and `_` wildcards).
    Like,
}

/// A literal operand of a comparison.
///
/// Equality and hashing are structural on every variant; decimal literals
/// compare by bit pattern so the type can key plan caches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Literal {
    /// String data.
    Text(String),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit floating-point number.
    Decimal(f64),
    /// true/false.
    Boolean(bool),
    /// UTC timestamp.
    DateTime(DateTime<Utc>),
    /// Object-id reference.
    Id(String),
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Literal::Text(a), Literal::Text(b)) => a == b,
            (Literal::Integer(a), Literal::Integer(b)) => a == b,
            (Literal::Decimal(a), Literal::Decimal(b)) => a.to_bits() == b.to_bits(),
            (Literal::Boolean(a), Literal::Boolean(b)) => a == b,
            (Literal::DateTime(a), Literal::DateTime(b)) => a == b,
            (Literal::Id(a), Literal::Id(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Literal::Text(v) => {
                0u8.hash(state);
                v.hash(state);
            }
            Literal::Integer(v) => {
                1u8.hash(state);
                v.hash(state);
            }
            Literal::Decimal(v) => {
                2u8.hash(state);
                v.to_bits().hash(state);
            }
            Literal::Boolean(v) => {
                3u8.hash(state);
                v.hash(state);
            }
            Literal::DateTime(v) => {
                4u8.hash(state);
                v.hash(state);
            }
            Literal::Id(v) => {
                5u8.hash(state);
                v.hash(state);
            }
        }
    }
}

/// A property comparison against a literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Comparison {
    /// Selector the property belongs to.
    pub selector: SelectorName,
    /// Property name.
    pub property: String,
    /// Comparison operator.
    pub operator: Operator,
    /// Literal operand.
    pub value: Literal,
}

/// A parsed full-text search expression.
///
/// The raw text is tokenized and lowercased at construction, so two
/// expressions written with differing whitespace or case compare equal and
/// hash equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FullTextExpression {
    terms: Vec<String>,
}

impl FullTextExpression {
    /// Parse a raw search string into normalized terms.
    pub fn parse(text: &str) -> Self {
        FullTextExpression {
            terms: tokenize(text),
        }
    }

    /// The normalized search terms, in order of appearance.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Whether the expression carries no terms at all.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// A full-text predicate over a selector, optionally scoped to one property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FullTextSearch {
    /// Selector whose entries are searched.
    pub selector: SelectorName,
    /// Property to search in; `None` searches all text properties.
    pub property: Option<String>,
    /// The normalized search expression.
    pub expression: FullTextExpression,
}

/// The constraint tree of a query.
///
/// Combinators are visited pre-order, parents before children, so
/// traversals can prune whole subtrees.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constraint {
    /// Both children must hold.
    And(Box<Constraint>, Box<Constraint>),
    /// At least one child must hold.
    Or(Box<Constraint>, Box<Constraint>),
    /// The child must not hold.
    Not(Box<Constraint>),
    /// Property comparison.
    Comparison(Comparison),
    /// Full-text predicate.
    FullText(FullTextSearch),
}

impl Constraint {
    /// Combine two constraints with AND.
    pub fn and(self, other: Constraint) -> Self {
        Constraint::And(Box::new(self), Box::new(other))
    }

    /// Combine two constraints with OR.
    pub fn or(self, other: Constraint) -> Self {
        Constraint::Or(Box::new(self), Box::new(other))
    }

    /// Negate a constraint.
    pub fn negate(self) -> Self {
        Constraint::Not(Box::new(self))
    }

    /// Create a comparison constraint.
    pub fn comparison(
        selector: SelectorName,
        property: impl Into<String>,
        operator: Operator,
        value: Literal,
    ) -> Self {
        Constraint::Comparison(Comparison {
            selector,
            property: property.into(),
            operator,
            value,
        })
    }

    /// Create a full-text constraint from raw search text.
    pub fn full_text(selector: SelectorName, property: Option<String>, text: &str) -> Self {
        Constraint::FullText(FullTextSearch {
            selector,
            property,
            expression: FullTextExpression::parse(text),
        })
    }
}
