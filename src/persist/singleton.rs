use super::registry::{PersistenceRegistry, Saveable};
use super::task::SaveTask;
use crate::core::Result;
use crate::dirty::{DirtyData, EventListeners, SubscriptionId};
use crate::storage::{SaveStore, codec};
use log::{debug, error, warn};
use serde::{Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// A type persisted as one save file.
///
/// `KEY` names the file and must be unique among the types sharing a store;
/// it is normalized with [`normalize_file_stem`](crate::storage::normalize_file_stem).
pub trait Persistent:
    DirtyData + Serialize + DeserializeOwned + Default + Send + Sync + 'static
{
    const KEY: &'static str;

    /// Runs on the worker before the clean-skip check. Marking the value dirty
    /// here forces the write.
    fn before_save(&self) {}

    /// Runs after a successful write.
    fn after_save(&self) {}
}

#[derive(Default)]
struct SingletonEvents {
    save_started: EventListeners,
    save_finished: EventListeners,
    loaded: EventListeners,
}

/// Lazily loaded, process-lifetime holder of the single `T` value.
///
/// The instance handle returned by [`instance`](Self::instance) keeps its
/// identity across reloads: a reload replaces the value inside the lock and
/// moves listeners registered on the old value's tracker to the new one.
pub struct PersistentSingleton<T: Persistent> {
    registry: Arc<PersistenceRegistry>,
    slot: OnceLock<Arc<RwLock<T>>>,
    events: SingletonEvents,
    this: Weak<Self>,
}

impl<T: Persistent> PersistentSingleton<T> {
    pub fn new(registry: Arc<PersistenceRegistry>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            registry,
            slot: OnceLock::new(),
            events: SingletonEvents::default(),
            this: this.clone(),
        })
    }

    pub fn key(&self) -> &'static str {
        T::KEY
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Returns the shared instance, loading it first if needed.
    pub fn instance(&self) -> Arc<RwLock<T>> {
        self.ensure_loaded().clone()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.ensure_loaded()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.ensure_loaded()
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_dirty(&self) -> bool {
        self.slot.get().is_some_and(|slot| read_lock(slot).is_dirty())
    }

    /// Loads the persisted state, falling back to `T::default()` when there is
    /// no file or it cannot be read or decoded.
    ///
    /// A reload replaces the value inside the existing instance and calls
    /// [`DirtyData::adopt_from`] on it, which moves only the root tracker's
    /// listeners unless `T` overrides it to carry over nested ones.
    pub fn load(&self) {
        let value = self.read_persisted();
        let mut pending = Some(value);
        let slot = self
            .slot
            .get_or_init(|| Arc::new(RwLock::new(pending.take().unwrap_or_default())));
        if let Some(value) = pending {
            overwrite(slot, value);
        }
        self.after_load();
    }

    /// Encodes the current state now and writes it on the worker pool.
    ///
    /// The value is marked clean once the write succeeds. A change made after
    /// this call but before the write finishes is therefore not in the file
    /// and no longer marks the value dirty; save again to persist it.
    pub fn save(&self) -> SaveTask {
        match self.encode_snapshot() {
            Ok(text) => self.save_encoded(text),
            Err(err) => {
                error!("{}", err);
                SaveTask::ready(false)
            }
        }
    }

    pub fn save_with<F>(&self, callback: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.save().on_complete(callback);
    }

    pub fn save_encoded(&self, text: String) -> SaveTask {
        let Some(this) = self.this.upgrade() else {
            return SaveTask::ready(false);
        };
        SaveTask::spawn_blocking(move || this.try_save(&text))
    }

    pub fn on_save_started<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.events.save_started.add(Arc::new(handler))
    }

    pub fn on_save_finished<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.events.save_finished.add(Arc::new(handler))
    }

    pub fn on_loaded<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.events.loaded.add(Arc::new(handler))
    }

    pub fn remove_listener(&self, id: SubscriptionId) -> bool {
        self.events.save_started.remove(id)
            || self.events.save_finished.remove(id)
            || self.events.loaded.remove(id)
    }

    pub fn directory_path(&self) -> &Path {
        self.store().directory_path()
    }

    pub fn directory_exists(&self) -> bool {
        self.store().directory_exists()
    }

    pub fn file_path(&self) -> PathBuf {
        self.store().file_path(T::KEY)
    }

    pub fn file_exists(&self) -> bool {
        self.store().file_exists(T::KEY)
    }

    fn store(&self) -> &SaveStore {
        self.registry.store()
    }

    fn ensure_loaded(&self) -> &Arc<RwLock<T>> {
        if let Some(slot) = self.slot.get() {
            return slot;
        }
        self.load();
        self.slot
            .get_or_init(|| Arc::new(RwLock::new(T::default())))
    }

    fn read_persisted(&self) -> T {
        if !self.file_exists() {
            return T::default();
        }

        let text = match self.store().lock().and_then(|io| io.read(T::KEY)) {
            Ok(Some(text)) => text,
            Ok(None) => return T::default(),
            Err(err) => {
                warn!("{}", err);
                return T::default();
            }
        };

        codec::try_parse(&text).unwrap_or_default()
    }

    fn after_load(&self) {
        if let Some(this) = self.this.upgrade() {
            let member: Arc<dyn Saveable> = this;
            self.registry.subscribe(&member);
        }
        self.events.loaded.notify();
    }

    fn try_save(&self, text: &str) -> bool {
        let instance = self.instance();

        read_lock(&instance).before_save();
        self.events.save_started.notify();

        if !read_lock(&instance).is_dirty() {
            return true;
        }

        {
            let io = match self.store().lock() {
                Ok(io) => io,
                Err(err) => {
                    error!("{}", err);
                    return false;
                }
            };
            if let Err(err) = io.create_directory() {
                error!("{}", err);
                return false;
            }
            if let Err(err) = io.write(T::KEY, text) {
                error!("{}", err);
                return false;
            }
            read_lock(&instance).clean();
        }
        debug!("Saved {}", T::KEY);

        read_lock(&instance).after_save();
        self.events.save_finished.notify();
        true
    }
}

impl<T: Persistent> Saveable for PersistentSingleton<T> {
    fn key(&self) -> &str {
        T::KEY
    }

    fn encode_snapshot(&self) -> Result<String> {
        codec::encode(&*self.read())
    }

    fn save_encoded(&self, text: String) -> SaveTask {
        PersistentSingleton::save_encoded(self, text)
    }

    fn load(&self) {
        PersistentSingleton::load(self);
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

/// Replaces the value in place, moving listeners off the old value.
fn overwrite<T: Persistent>(slot: &RwLock<T>, value: T) {
    let mut guard = slot.write().unwrap_or_else(PoisonError::into_inner);
    let previous = std::mem::replace(&mut *guard, value);
    guard.adopt_from(&previous);
    guard.clean();
}
