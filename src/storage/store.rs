//! File layout and I/O for save files.
//!
//! ```text
//! <root>/
//! └── Saves/
//!     ├── game_PlayerProfile.txt
//!     └── game_Settings.txt
//! ```
//!
//! Every read, write, delete and directory creation goes through an
//! [`IoGuard`], which can only be obtained by taking the store's lock.

use crate::config::PersistenceConfig;
use crate::core::{Result, SaveError};
use log::debug;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;

/// Maps a persisted key to a file stem.
///
/// Anything outside `[A-Za-z0-9._-]` becomes `_`, so nested-type separators
/// such as `::` or `+` never reach the file system.
pub fn normalize_file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub struct SaveStore {
    directory: PathBuf,
    extension: String,
    io_lock: Mutex<()>,
}

impl SaveStore {
    pub fn new(config: &PersistenceConfig) -> Self {
        Self {
            directory: config.directory_path(),
            extension: config.extension.clone(),
            io_lock: Mutex::new(()),
        }
    }

    pub fn directory_path(&self) -> &Path {
        &self.directory
    }

    pub fn directory_exists(&self) -> bool {
        self.directory.is_dir()
    }

    pub fn file_path(&self, key: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{}", normalize_file_stem(key), self.extension))
    }

    pub fn file_exists(&self, key: &str) -> bool {
        self.file_path(key).is_file()
    }

    /// File stems of every save file currently on disk, sorted.
    pub fn saved_keys(&self) -> Result<Vec<String>> {
        let io = self.lock()?;
        io.saved_keys()
    }

    /// Takes the store-wide I/O lock.
    pub fn lock(&self) -> Result<IoGuard<'_>> {
        let guard = self.io_lock.lock()?;
        Ok(IoGuard {
            store: self,
            _guard: guard,
        })
    }
}

/// Proof that the store lock is held.
pub struct IoGuard<'a> {
    store: &'a SaveStore,
    _guard: MutexGuard<'a, ()>,
}

impl IoGuard<'_> {
    pub fn create_directory(&self) -> Result<()> {
        let directory = &self.store.directory;
        if directory.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(directory)
            .map_err(|err| SaveError::io("create save directory", directory, err))?;
        if !directory.is_dir() {
            return Err(SaveError::IoError(format!(
                "Save directory '{}' missing after creation",
                directory.display()
            )));
        }
        Ok(())
    }

    /// Atomically replaces the save file for `key` with `text`.
    pub fn write(&self, key: &str, text: &str) -> Result<()> {
        let path = self.store.file_path(key);
        let directory = &self.store.directory;

        let mut tmp = NamedTempFile::new_in(directory)
            .map_err(|err| SaveError::io("create temp file in", directory, err))?;
        tmp.write_all(text.as_bytes())
            .map_err(|err| SaveError::io("write temp file for", &path, err))?;
        tmp.flush()
            .map_err(|err| SaveError::io("flush temp file for", &path, err))?;
        tmp.as_file()
            .sync_all()
            .map_err(|err| SaveError::io("sync temp file for", &path, err))?;
        tmp.persist(&path)
            .map_err(|err| SaveError::io("replace save file", &path, err.error))?;
        Ok(())
    }

    /// Reads the save file for `key`, `None` when it does not exist.
    pub fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.store.file_path(key);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(SaveError::io("read save file", &path, err)),
        }
    }

    /// Deletes every file in the saves directory and returns how many were removed.
    /// A missing directory has nothing to delete.
    pub fn clear_directory(&self) -> Result<usize> {
        let directory = &self.store.directory;
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(SaveError::io("list save directory", directory, err)),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|err| SaveError::io("list save directory", directory, err))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            fs::remove_file(&path).map_err(|err| SaveError::io("delete save file", &path, err))?;
            debug!("Deleted {}", path.display());
            removed += 1;
        }
        Ok(removed)
    }

    pub fn saved_keys(&self) -> Result<Vec<String>> {
        let directory = &self.store.directory;
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(SaveError::io("list save directory", directory, err)),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|err| SaveError::io("list save directory", directory, err))?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(self.store.extension.as_str()) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
