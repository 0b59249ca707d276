//! Read-only content entries with lazily materialized properties.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::content::value::PropertyValue;
use crate::error::Result;
use crate::schema::BaseType;

/// Loads property values of one stored object on demand.
pub trait PropertyLoader: Send + Sync {
    /// Load a single property value, `None` when the property is unset.
    fn load(&self, entry_id: &str, property: &str) -> Result<Option<PropertyValue>>;

    /// Load every property of the object.
    fn load_all(&self, entry_id: &str) -> Result<Vec<(String, PropertyValue)>>;
}

/// Read-only projection of one stored object.
///
/// Identity, parentage, name and base type are resident; property values
/// are materialized on first read and memoized for this entry's lifetime
/// only. Entries are produced on demand by the content pipeline and never
/// outlive one request.
#[derive(Clone)]
pub struct ContentEntry {
    id: String,
    parent_id: Option<String>,
    name: String,
    type_name: String,
    base: BaseType,
    loader: Arc<dyn PropertyLoader>,
    cache: Arc<Mutex<AHashMap<String, Option<PropertyValue>>>>,
}

impl fmt::Debug for ContentEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentEntry")
            .field("id", &self.id)
            .field("parent_id", &self.parent_id)
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("base", &self.base)
            .finish()
    }
}

impl ContentEntry {
    /// Create an entry over a property loader.
    pub fn new(
        id: impl Into<String>,
        parent_id: Option<String>,
        name: impl Into<String>,
        type_name: impl Into<String>,
        base: BaseType,
        loader: Arc<dyn PropertyLoader>,
    ) -> Self {
        ContentEntry {
            id: id.into(),
            parent_id,
            name: name.into(),
            type_name: type_name.into(),
            base,
            loader,
            cache: Arc::new(Mutex::new(AHashMap::new())),
        }
    }

    /// The object identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The parent object identifier, `None` for the root.
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// The object name within its parent.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The content-type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The base kind of the object.
    pub fn base(&self) -> BaseType {
        self.base
    }

    /// Read one property, loading it on first access.
    pub fn property(&self, name: &str) -> Result<Option<PropertyValue>> {
        if let Some(value) = self.cache.lock().get(name) {
            return Ok(value.clone());
        }
        let value = self.loader.load(&self.id, name)?;
        self.cache
            .lock()
            .insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Materialize every property of the entry.
    pub fn properties(&self) -> Result<Vec<(String, PropertyValue)>> {
        let properties = self.loader.load_all(&self.id)?;
        let mut cache = self.cache.lock();
        for (name, value) in &properties {
            cache.insert(name.clone(), Some(value.clone()));
        }
        Ok(properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct CountingLoader {
        loads: AtomicUsize,
    }

    impl PropertyLoader for CountingLoader {
        fn load(&self, _entry_id: &str, property: &str) -> Result<Option<PropertyValue>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if property == "title" {
                Ok(Some(PropertyValue::Text("report".to_string())))
            } else {
                Ok(None)
            }
        }

        fn load_all(&self, _entry_id: &str) -> Result<Vec<(String, PropertyValue)>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(vec![(
                "title".to_string(),
                PropertyValue::Text("report".to_string()),
            )])
        }
    }

    #[test]
    fn test_property_loaded_once() {
        let loader = Arc::new(CountingLoader {
            loads: AtomicUsize::new(0),
        });
        let entry = ContentEntry::new(
            "obj1",
            None,
            "report.txt",
            "document",
            BaseType::Document,
            loader.clone(),
        );

        assert_eq!(
            entry.property("title").unwrap(),
            Some(PropertyValue::Text("report".to_string()))
        );
        assert_eq!(
            entry.property("title").unwrap(),
            Some(PropertyValue::Text("report".to_string()))
        );
        // Memoized after the first load.
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unset_property_memoized() {
        let loader = Arc::new(CountingLoader {
            loads: AtomicUsize::new(0),
        });
        let entry = ContentEntry::new(
            "obj1",
            None,
            "report.txt",
            "document",
            BaseType::Document,
            loader.clone(),
        );

        assert_eq!(entry.property("missing").unwrap(), None);
        assert_eq!(entry.property("missing").unwrap(), None);
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }
}
