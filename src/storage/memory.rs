//! In-memory storage implementation for testing and transient indexes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, XiphosError};
use crate::storage::Storage;

/// An in-memory storage backend.
///
/// Useful for tests and for indexes that need no durability.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    files: Arc<Mutex<HashMap<String, Box<[u8]>>>>,
}

impl MemoryStorage {
    /// Create an empty memory storage.
    pub fn new() -> Self {
        MemoryStorage::default()
    }

    /// Number of files stored.
    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .get(name)
            .map(|data| data.to_vec())
            .ok_or_else(|| XiphosError::storage(format!("file '{name}' does not exist")))
    }

    fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        self.files
            .lock()
            .insert(name.to_string(), data.to_vec().into_boxed_slice());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.files.lock().remove(name);
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.files.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
