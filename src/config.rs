use crate::core::{Result, SaveError};
use std::path::{Path, PathBuf};

/// Environment variable read by [`PersistenceConfig::from_env`].
pub const ROOT_ENV_VAR: &str = "SAVEDATA_ROOT";

pub const DEFAULT_SAVES_DIR: &str = "Saves";

pub const DEFAULT_EXTENSION: &str = "txt";

/// Where and how save files are stored.
///
/// The saves directory is `root/saves_dir`; each persisted type gets one
/// `<key>.<extension>` file inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceConfig {
    /// Host-provided persistent storage root
    pub root: PathBuf,

    /// Subdirectory of `root` holding the save files
    pub saves_dir: String,

    /// File extension without the leading dot
    pub extension: String,
}

impl PersistenceConfig {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            saves_dir: DEFAULT_SAVES_DIR.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Reads the storage root from `SAVEDATA_ROOT`.
    pub fn from_env() -> Result<Self> {
        match std::env::var(ROOT_ENV_VAR) {
            Ok(root) if !root.trim().is_empty() => Ok(Self::new(root)),
            Ok(_) => Err(SaveError::ConfigError(format!("{} is empty", ROOT_ENV_VAR))),
            Err(err) => Err(SaveError::ConfigError(format!(
                "{} is not available: {}",
                ROOT_ENV_VAR, err
            ))),
        }
    }

    /// Set the saves subdirectory name
    pub fn saves_dir(mut self, saves_dir: &str) -> Self {
        self.saves_dir = saves_dir.to_string();
        self
    }

    /// Set the save file extension
    pub fn extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn directory_path(&self) -> PathBuf {
        self.root.join(&self.saves_dir)
    }
}
