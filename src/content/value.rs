//! Property values carried by content entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::query::Literal;

/// A value of one property on a stored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
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

impl PropertyValue {
    /// Get the value as text, if it is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a decimal, if it is one.
    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            PropertyValue::Decimal(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a boolean, if it is one.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as an id reference, if it is one.
    pub fn as_id(&self) -> Option<&str> {
        match self {
            PropertyValue::Id(v) => Some(v),
            _ => None,
        }
    }

    /// Compare against a query literal of the matching kind.
    ///
    /// Returns `None` when the kinds differ; mismatched kinds never satisfy
    /// an ordered comparison.
    pub fn compare_to_literal(&self, literal: &Literal) -> Option<std::cmp::Ordering> {
        match (self, literal) {
            (PropertyValue::Text(v), Literal::Text(l)) => Some(v.as_str().cmp(l.as_str())),
            (PropertyValue::Integer(v), Literal::Integer(l)) => Some(v.cmp(l)),
            (PropertyValue::Decimal(v), Literal::Decimal(l)) => v.partial_cmp(l),
            (PropertyValue::Boolean(v), Literal::Boolean(l)) => Some(v.cmp(l)),
            (PropertyValue::DateTime(v), Literal::DateTime(l)) => Some(v.cmp(l)),
            (PropertyValue::Id(v), Literal::Id(l)) => Some(v.as_str().cmp(l.as_str())),
            _ => None,
        }
    }
}
