//! Read contract against the backing content storage.

use std::fmt::Debug;

use ahash::AHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::content::value::PropertyValue;
use crate::error::Result;
use crate::schema::BaseType;

/// Identity and structural metadata of one stored object, without its
/// property values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    /// Object identifier.
    pub id: String,
    /// Parent object identifier, `None` for the root.
    pub parent_id: Option<String>,
    /// Object name within its parent.
    pub name: String,
    /// Content-type name.
    pub type_name: String,
    /// Base kind.
    pub base: BaseType,
}

/// One stored object with its property bag, as kept by a backing store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Identity and structural metadata.
    pub summary: ObjectSummary,
    /// Property values.
    pub properties: Vec<(String, PropertyValue)>,
}

impl StoredObject {
    /// Create a stored object.
    pub fn new(summary: ObjectSummary, properties: Vec<(String, PropertyValue)>) -> Self {
        StoredObject {
            summary,
            properties,
        }
    }
}

/// Read access to the backing content storage.
///
/// The engine only ever reads through this contract; ownership of the
/// objects stays with the backend.
pub trait ContentStore: Send + Sync + Debug {
    /// Fetch the summary of one object, `None` when the id is absent.
    fn summary(&self, id: &str) -> Result<Option<ObjectSummary>>;

    /// List the summaries of the children of an object.
    fn children(&self, parent_id: &str) -> Result<Vec<ObjectSummary>>;

    /// Read one property value of an object.
    fn property(&self, id: &str, property: &str) -> Result<Option<PropertyValue>>;

    /// Read every property of an object.
    fn properties(&self, id: &str) -> Result<Vec<(String, PropertyValue)>>;
}

/// An in-memory content store.
///
/// Useful for tests and for repositories small enough to live in memory.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    objects: RwLock<AHashMap<String, StoredObject>>,
}

impl InMemoryContentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        InMemoryContentStore::default()
    }

    /// Insert or replace an object.
    pub fn put(&self, object: StoredObject) {
        self.objects
            .write()
            .insert(object.summary.id.clone(), object);
    }

    /// Remove an object by id.
    pub fn remove(&self, id: &str) -> Option<StoredObject> {
        self.objects.write().remove(id)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ContentStore for InMemoryContentStore {
    fn summary(&self, id: &str) -> Result<Option<ObjectSummary>> {
        Ok(self
            .objects
            .read()
            .get(id)
            .map(|object| object.summary.clone()))
    }

    fn children(&self, parent_id: &str) -> Result<Vec<ObjectSummary>> {
        let objects = self.objects.read();
        let mut children: Vec<ObjectSummary> = objects
            .values()
            .filter(|object| object.summary.parent_id.as_deref() == Some(parent_id))
            .map(|object| object.summary.clone())
            .collect();
        // Deterministic listing order.
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    fn property(&self, id: &str, property: &str) -> Result<Option<PropertyValue>> {
        Ok(self.objects.read().get(id).and_then(|object| {
            object
                .properties
                .iter()
                .find(|(name, _)| name == property)
                .map(|(_, value)| value.clone())
        }))
    }

    fn properties(&self, id: &str) -> Result<Vec<(String, PropertyValue)>> {
        Ok(self
            .objects
            .read()
            .get(id)
            .map(|object| object.properties.clone())
            .unwrap_or_default())
    }
}
