//! Storage abstraction for persisted index files.
//!
//! The index keeps whole files: sealed segment payloads and the manifest.
//! Backends implement a small read/write-whole-file contract; writes are
//! atomic so a crash never leaves a half-written file behind.

pub mod codec;
pub mod file;
pub mod memory;

use std::fmt::Debug;

use crate::error::Result;

/// A storage backend for index files.
pub trait Storage: Send + Sync + Debug {
    /// Read a whole file.
    fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Write a whole file, atomically replacing any previous content, and
    /// make it durable before returning.
    fn write(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Delete a file; deleting a missing file is not an error.
    fn delete(&self, name: &str) -> Result<()>;

    /// Check whether a file exists.
    fn exists(&self, name: &str) -> bool;

    /// List all file names in the storage.
    fn list(&self) -> Result<Vec<String>>;
}

pub use self::codec::{decode_segment, encode_segment};
pub use self::file::FileStorage;
pub use self::memory::MemoryStorage;
