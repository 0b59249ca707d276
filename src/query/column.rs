//! Projected columns of a query.

use serde::{Deserialize, Serialize};

use crate::query::selector::SelectorName;

/// One projected column: a property of a selector, exposed under a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Selector the property belongs to.
    pub selector: SelectorName,
    /// Property to project.
    pub property: String,
    /// Name the value appears under in result rows.
    pub column_name: String,
}

impl Column {
    /// Create a column named after its property.
    pub fn new(selector: SelectorName, property: impl Into<String>) -> Self {
        let property = property.into();
        let column_name = property.clone();
        Column {
            selector,
            property,
            column_name,
        }
    }

    /// Create a column with an explicit result name.
    pub fn named(
        selector: SelectorName,
        property: impl Into<String>,
        column_name: impl Into<String>,
    ) -> Self {
        Column {
            selector,
            property: property.into(),
            column_name: column_name.into(),
        }
    }
}
