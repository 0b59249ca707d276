//! File-system storage implementation.

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use crate::error::{Result, XiphosError};
use crate::storage::Storage;

/// A directory-backed storage backend.
///
/// Files are written to a temporary name first and renamed into place, so a
/// reader never observes a partially written file.
#[derive(Debug)]
pub struct FileStorage {
    directory: PathBuf,
}

impl FileStorage {
    /// Create a storage rooted at a directory, creating it if needed.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(FileStorage { directory })
    }

    fn path_of(&self, name: &str) -> Result<PathBuf> {
        // Storage names are flat; reject anything that escapes the directory.
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return Err(XiphosError::storage(format!("invalid file name '{name}'")));
        }
        Ok(self.directory.join(name))
    }
}

impl Storage for FileStorage {
    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_of(name)?;
        fs::read(&path).map_err(|e| {
            XiphosError::storage(format!("cannot read '{}': {e}", path.display()))
        })
    }

    fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.path_of(name)?;
        let tmp_path = self.directory.join(format!("{name}.tmp"));

        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_of(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.path_of(name)
            .map(|path| path.exists())
            .unwrap_or(false)
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for dir_entry in fs::read_dir(&self.directory)? {
            let dir_entry = dir_entry?;
            if dir_entry.file_type()?.is_file()
                && let Some(name) = dir_entry.file_name().to_str()
                && !name.ends_with(".tmp")
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
