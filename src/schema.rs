//! Content-type definitions consulted during query validation.
//!
//! A [`TypeRegistry`] holds every queryable content type together with its
//! property set. The validator resolves selector and property references
//! against it; nothing here is touched during execution.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, XiphosError};

/// Base kind of a content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseType {
    /// A regular document object.
    Document,
    /// A folder object; only folders have child entries.
    Folder,
}

/// Kind of values a property holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    /// String data, full-text indexed.
    Text,
    /// 64-bit signed integers.
    Integer,
    /// 64-bit floating-point numbers.
    Decimal,
    /// true/false values.
    Boolean,
    /// UTC timestamps.
    DateTime,
    /// Object-id references.
    Id,
}

/// Definition of one queryable content type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDefinition {
    /// Type name, as referenced by query selectors.
    name: String,
    /// Base kind of the type.
    base: BaseType,
    /// Whether the type may appear in queries at all.
    queryable: bool,
    /// Property names and their kinds.
    properties: HashMap<String, PropertyKind>,
}

impl TypeDefinition {
    /// Create a new queryable type definition.
    pub fn new<S: Into<String>>(name: S, base: BaseType) -> Self {
        TypeDefinition {
            name: name.into(),
            base,
            queryable: true,
            properties: HashMap::new(),
        }
    }

    /// Mark the type as excluded from queries.
    pub fn not_queryable(mut self) -> Self {
        self.queryable = false;
        self
    }

    /// Add a property to the type.
    pub fn with_property<S: Into<String>>(mut self, name: S, kind: PropertyKind) -> Self {
        self.properties.insert(name.into(), kind);
        self
    }

    /// Get the type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the base kind.
    pub fn base(&self) -> BaseType {
        self.base
    }

    /// Whether the type may appear in queries.
    pub fn is_queryable(&self) -> bool {
        self.queryable
    }

    /// Look up a property kind by name.
    pub fn property(&self, name: &str) -> Option<PropertyKind> {
        self.properties.get(name).copied()
    }

    /// Whether the property exists on this type.
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }
}

/// Registry of all content types known to the repository.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDefinition>,
}

impl TypeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        TypeRegistry {
            types: HashMap::new(),
        }
    }

    /// Register a type definition.
    pub fn add_type(&mut self, definition: TypeDefinition) -> Result<()> {
        if definition.name().is_empty() {
            return Err(XiphosError::invalid_query("Type name cannot be empty"));
        }
        if self.types.contains_key(definition.name()) {
            return Err(XiphosError::invalid_query(format!(
                "Type '{}' already registered",
                definition.name()
            )));
        }
        self.types.insert(definition.name().to_string(), definition);
        Ok(())
    }

    /// Get a type definition by name.
    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    /// Check if a type exists.
    pub fn has_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
