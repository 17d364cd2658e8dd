use super::task::SaveTask;
use crate::core::Result;
use crate::storage::SaveStore;
use log::{error, info};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::{Level, event, info_span};

/// Type-erased view of a persisted singleton used for bulk operations.
pub trait Saveable: Send + Sync {
    /// Stable identifier the save file is named after.
    fn key(&self) -> &str;

    /// Encodes the current state on the calling thread.
    fn encode_snapshot(&self) -> Result<String>;

    /// Writes previously encoded text on the worker pool.
    fn save_encoded(&self, text: String) -> SaveTask;

    fn load(&self);
}

struct RegistryEntry {
    key: String,
    member: Weak<dyn Saveable>,
}

/// Membership set of live persisted singletons sharing one [`SaveStore`].
///
/// The registry never owns its members: entries are weak and stay listed until
/// explicitly unsubscribed, but dropped members are skipped by bulk operations.
pub struct PersistenceRegistry {
    store: Arc<SaveStore>,
    members: Mutex<Vec<RegistryEntry>>,
}

impl PersistenceRegistry {
    pub fn new(store: Arc<SaveStore>) -> Self {
        Self {
            store,
            members: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<SaveStore> {
        &self.store
    }

    /// Adds `member` unless a live member with the same key is already
    /// registered. An entry whose member was dropped is taken over in place,
    /// keeping its position in the registration order.
    pub fn subscribe(&self, member: &Arc<dyn Saveable>) -> bool {
        let mut members = self.lock_members();
        if let Some(entry) = members.iter_mut().find(|entry| entry.key == member.key()) {
            if entry.member.strong_count() > 0 {
                return false;
            }
            entry.member = Arc::downgrade(member);
            return true;
        }
        members.push(RegistryEntry {
            key: member.key().to_string(),
            member: Arc::downgrade(member),
        });
        true
    }

    pub fn unsubscribe(&self, member: &dyn Saveable) -> bool {
        let mut members = self.lock_members();
        let before = members.len();
        members.retain(|entry| entry.key != member.key());
        members.len() != before
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock_members().iter().any(|entry| entry.key == key)
    }

    pub fn len(&self) -> usize {
        self.lock_members().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_members().is_empty()
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> Vec<String> {
        self.lock_members()
            .iter()
            .map(|entry| entry.key.clone())
            .collect()
    }

    /// Live members in registration order.
    pub fn members(&self) -> Vec<Arc<dyn Saveable>> {
        self.lock_members()
            .iter()
            .filter_map(|entry| entry.member.upgrade())
            .collect()
    }

    /// Saves every member in registration order.
    ///
    /// Membership and each member's encoded state are captured now; the
    /// writes then run one after another and the batch stops at the first
    /// failure, leaving later members unsaved.
    pub fn save_all(&self) -> SaveTask {
        let span = info_span!("save_all");
        let _enter = span.enter();

        let batch: Vec<(Arc<dyn Saveable>, Result<String>)> = self
            .members()
            .into_iter()
            .map(|member| {
                let text = member.encode_snapshot();
                (member, text)
            })
            .collect();
        event!(Level::DEBUG, members = batch.len(), "save batch captured");

        SaveTask::spawn(async move {
            let mut success = true;
            for (member, text) in batch {
                success &= match text {
                    Ok(text) => member.save_encoded(text).await,
                    Err(err) => {
                        error!("{}", err);
                        false
                    }
                };
                if !success {
                    event!(Level::ERROR, key = member.key(), "save batch stopped");
                    error!("Error saving {}", member.key());
                    break;
                }
            }
            success
        })
    }

    pub fn save_all_with<F>(&self, callback: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.save_all().on_complete(callback);
    }

    /// Reloads every member from disk in registration order.
    pub fn reload_all(&self) {
        let span = info_span!("reload_all");
        let _enter = span.enter();

        for member in self.members() {
            member.load();
        }
    }

    /// Deletes every save file, then reloads all members so they fall back
    /// to defaults. Deletion errors are logged and returned after the reload.
    pub fn clear_all_saved_data(&self) -> Result<usize> {
        let span = info_span!("clear_all_saved_data");
        let _enter = span.enter();

        let removed = self
            .store
            .lock()
            .and_then(|io| io.clear_directory());
        match &removed {
            Ok(count) => info!(
                "Cleared {} save file(s) from {}",
                count,
                self.store.directory_path().display()
            ),
            Err(err) => error!("{}", err),
        }

        self.reload_all();
        removed
    }

    fn lock_members(&self) -> std::sync::MutexGuard<'_, Vec<RegistryEntry>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
