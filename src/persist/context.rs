use super::registry::PersistenceRegistry;
use super::singleton::{Persistent, PersistentSingleton};
use super::task::SaveTask;
use crate::config::PersistenceConfig;
use crate::core::{Result, SaveError};
use crate::storage::{SaveStore, normalize_file_stem};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

#[derive(Default)]
struct SingletonCache {
    by_type: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    stems: HashMap<String, (TypeId, &'static str)>,
}

/// Owner of one save directory: its store, its registry and the keyed cache
/// of per-type singletons.
///
/// Build one per application (or per test) and pass it to whatever needs
/// persisted state.
///
/// # Examples
///
/// ```no_run
/// use savedata::{DirtyData, DirtyTracker, Persistent, PersistenceConfig, PersistenceContext};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Default, Serialize, Deserialize)]
/// struct Settings {
///     #[serde(skip)]
///     tracker: DirtyTracker,
///     volume: u8,
/// }
///
/// impl DirtyData for Settings {
///     fn tracker(&self) -> &DirtyTracker {
///         &self.tracker
///     }
/// }
///
/// impl Persistent for Settings {
///     const KEY: &'static str = "app::Settings";
/// }
///
/// # #[tokio::main]
/// # async fn main() -> savedata::Result<()> {
/// let context = PersistenceContext::new(PersistenceConfig::new("/var/lib/app"));
/// let settings = context.singleton::<Settings>()?;
/// {
///     let mut guard = settings.write();
///     let Settings { tracker, volume } = &mut *guard;
///     tracker.set(volume, 80);
/// }
/// assert!(settings.save().await);
/// # Ok(())
/// # }
/// ```
pub struct PersistenceContext {
    config: PersistenceConfig,
    registry: Arc<PersistenceRegistry>,
    cache: Mutex<SingletonCache>,
}

impl PersistenceContext {
    pub fn new(config: PersistenceConfig) -> Self {
        let store = Arc::new(SaveStore::new(&config));
        Self {
            config,
            registry: Arc::new(PersistenceRegistry::new(store)),
            cache: Mutex::new(SingletonCache::default()),
        }
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PersistenceRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<SaveStore> {
        self.registry.store()
    }

    /// Returns the singleton for `T`, creating it (unloaded) on first use.
    ///
    /// Fails when another type already claimed the same file name.
    pub fn singleton<T: Persistent>(&self) -> Result<Arc<PersistentSingleton<T>>> {
        let mut cache = self.cache.lock()?;
        let type_id = TypeId::of::<T>();

        if let Some(existing) = cache.by_type.get(&type_id) {
            return existing.clone().downcast::<PersistentSingleton<T>>().map_err(|_| {
                SaveError::ConfigError(format!("Singleton cache entry for '{}' has the wrong type", T::KEY))
            });
        }

        let stem = normalize_file_stem(T::KEY);
        if let Some((_, other_key)) = cache.stems.get(&stem) {
            return Err(SaveError::ConfigError(format!(
                "Keys '{}' and '{}' both map to save file '{}'",
                other_key,
                T::KEY,
                stem
            )));
        }

        let singleton = PersistentSingleton::<T>::new(self.registry.clone());
        cache.stems.insert(stem, (type_id, T::KEY));
        cache.by_type.insert(type_id, singleton.clone());
        Ok(singleton)
    }

    /// Shortcut for `singleton::<T>()?.instance()`.
    pub fn instance<T: Persistent>(&self) -> Result<Arc<RwLock<T>>> {
        Ok(self.singleton::<T>()?.instance())
    }

    pub fn save_all(&self) -> SaveTask {
        self.registry.save_all()
    }

    pub fn reload_all(&self) {
        self.registry.reload_all();
    }

    pub fn clear_all_saved_data(&self) -> Result<usize> {
        self.registry.clear_all_saved_data()
    }

    pub fn directory_path(&self) -> &Path {
        self.store().directory_path()
    }

    pub fn directory_exists(&self) -> bool {
        self.store().directory_exists()
    }
}
