//! Selectors name the queryable sources of a query.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier naming one queryable source within a query.
///
/// Value-equal, hashable and immutable; two selector names are the same
/// source if and only if their strings are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SelectorName(String);

impl SelectorName {
    /// Create a new selector name.
    pub fn new<S: Into<String>>(name: S) -> Self {
        SelectorName(name.into())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SelectorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SelectorName {
    fn from(name: &str) -> Self {
        SelectorName::new(name)
    }
}

/// One queryable source: a content type under an alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selector {
    /// The content-type name this selector draws entries from.
    type_name: String,
    /// The alias the rest of the query refers to this selector by.
    name: SelectorName,
}

impl Selector {
    /// Create a selector whose alias equals the type name.
    pub fn new<S: Into<String>>(type_name: S) -> Self {
        let type_name = type_name.into();
        let name = SelectorName::new(type_name.clone());
        Selector { type_name, name }
    }

    /// Create a selector with an explicit alias.
    pub fn aliased<S: Into<String>, A: Into<String>>(type_name: S, alias: A) -> Self {
        Selector {
            type_name: type_name.into(),
            name: SelectorName::new(alias),
        }
    }

    /// The content-type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The alias naming this selector.
    pub fn name(&self) -> &SelectorName {
        &self.name
    }
}
