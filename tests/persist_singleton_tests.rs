//! Load/save lifecycle of persisted singletons

use savedata::{
    DataListener, DirtyData, DirtyDataList, DirtyTracker, PersistenceConfig, PersistenceContext,
    Persistent, SaveError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Achievement {
    #[serde(skip)]
    tracker: DirtyTracker,
    id: String,
    unlocked: bool,
}

impl Achievement {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    fn unlock(&mut self) {
        self.tracker.set(&mut self.unlocked, true);
    }
}

impl DirtyData for Achievement {
    fn tracker(&self) -> &DirtyTracker {
        &self.tracker
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PlayerProfile {
    #[serde(skip)]
    tracker: DirtyTracker,
    name: String,
    level: u32,
    achievements: DirtyDataList<Achievement>,
}

impl PlayerProfile {
    fn set_level(&mut self, level: u32) {
        self.tracker.set(&mut self.level, level);
    }

    fn set_name(&mut self, name: &str) {
        self.tracker.set(&mut self.name, name.to_string());
    }
}

impl DirtyData for PlayerProfile {
    fn tracker(&self) -> &DirtyTracker {
        &self.tracker
    }

    fn is_dirty(&self) -> bool {
        self.tracker.is_dirty() || self.achievements.is_dirty()
    }

    fn on_clean(&self) {
        self.achievements.clean();
    }

    fn adopt_from(&self, previous: &Self) {
        self.tracker.adopt_listeners(&previous.tracker);
        self.achievements.adopt_from(&previous.achievements);
    }
}

impl Persistent for PlayerProfile {
    const KEY: &'static str = "game::PlayerProfile";
}

/// Its pre-save hook always dirties it.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionLog {
    #[serde(skip)]
    tracker: DirtyTracker,
    saves: u32,
}

impl DirtyData for SessionLog {
    fn tracker(&self) -> &DirtyTracker {
        &self.tracker
    }
}

impl Persistent for SessionLog {
    const KEY: &'static str = "game::SessionLog";

    fn before_save(&self) {
        self.tracker.value_changed();
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ShadowProfile {
    #[serde(skip)]
    tracker: DirtyTracker,
}

impl DirtyData for ShadowProfile {
    fn tracker(&self) -> &DirtyTracker {
        &self.tracker
    }
}

impl Persistent for ShadowProfile {
    const KEY: &'static str = "game__PlayerProfile";
}

fn new_context(temp_dir: &TempDir) -> PersistenceContext {
    PersistenceContext::new(PersistenceConfig::new(temp_dir.path()))
}

#[tokio::test]
async fn test_clean_save_performs_no_io() {
    let temp_dir = TempDir::new().unwrap();
    let context = new_context(&temp_dir);
    let profile = context.singleton::<PlayerProfile>().unwrap();
    profile.load();

    assert!(profile.save().await);
    assert!(!context.directory_exists());
    assert!(!profile.file_exists());
}

#[tokio::test]
async fn test_dirty_save_writes_one_file_then_skips() {
    let temp_dir = TempDir::new().unwrap();
    let context = new_context(&temp_dir);
    let profile = context.singleton::<PlayerProfile>().unwrap();
    let saves = Arc::new(AtomicUsize::new(0));
    let finished = saves.clone();
    profile.on_save_finished(move || {
        finished.fetch_add(1, Ordering::SeqCst);
    });

    profile.write().set_level(12);
    assert!(profile.is_dirty());

    assert!(profile.save().await);
    assert!(!profile.is_dirty());
    assert_eq!(context.store().saved_keys().unwrap(), vec!["game__PlayerProfile".to_string()]);
    assert_eq!(saves.load(Ordering::SeqCst), 1);

    assert!(profile.save().await);
    assert_eq!(saves.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_changes_during_save_are_cleaned_but_not_written() {
    let temp_dir = TempDir::new().unwrap();
    let context = new_context(&temp_dir);
    let profile = context.singleton::<PlayerProfile>().unwrap();
    profile.write().set_name("before");

    let weak = Arc::downgrade(&profile);
    profile.on_save_started(move || {
        if let Some(profile) = weak.upgrade() {
            profile.write().set_name("after");
        }
    });
    assert!(profile.save().await);

    let text = std::fs::read_to_string(profile.file_path()).unwrap();
    assert!(text.contains("before"));
    assert!(!text.contains("after"));
    assert_eq!(profile.read().name, "after");
    assert!(!profile.is_dirty());
}

#[tokio::test]
async fn test_saved_state_survives_new_context() {
    let temp_dir = TempDir::new().unwrap();
    {
        let context = new_context(&temp_dir);
        let profile = context.singleton::<PlayerProfile>().unwrap();
        {
            let mut guard = profile.write();
            guard.set_name("ada");
            guard.set_level(3);
            guard.achievements.push(Achievement::new("first-steps"));
            guard.achievements.push(Achievement::new("speedrun"));
        }
        assert!(profile.save().await);
    }

    let context = new_context(&temp_dir);
    let profile = context.singleton::<PlayerProfile>().unwrap();
    assert!(!profile.is_loaded());

    let guard = profile.read();
    assert_eq!(guard.name, "ada");
    assert_eq!(guard.level, 3);
    assert_eq!(guard.achievements.len(), 2);
    assert_eq!(guard.achievements.subscription_count(), 2);
    assert!(!guard.is_dirty());
}

#[tokio::test]
async fn test_nested_change_is_saved() {
    let temp_dir = TempDir::new().unwrap();
    let context = new_context(&temp_dir);
    let profile = context.singleton::<PlayerProfile>().unwrap();
    profile.write().achievements.push(Achievement::new("first-steps"));
    assert!(profile.save().await);

    profile.write().achievements.get_mut(0).unwrap().unlock();
    assert!(profile.is_dirty());
    assert!(profile.save().await);
    assert!(!profile.is_dirty());

    let text = std::fs::read_to_string(profile.file_path()).unwrap();
    assert!(text.contains("\"unlocked\": true"));
}

#[tokio::test]
async fn test_before_save_hook_runs_before_clean_check() {
    let temp_dir = TempDir::new().unwrap();
    let context = new_context(&temp_dir);
    let log = context.singleton::<SessionLog>().unwrap();
    log.load();
    assert!(!log.is_dirty());

    // The hook dirties the clean instance, so this is a real write.
    assert!(log.save().await);
    assert!(log.file_exists());
    assert!(!log.is_dirty());
}

#[tokio::test]
async fn test_save_with_callback_reports_result() {
    let temp_dir = TempDir::new().unwrap();
    let context = new_context(&temp_dir);
    let profile = context.singleton::<PlayerProfile>().unwrap();
    profile.write().set_level(2);

    let (tx, rx) = oneshot::channel();
    profile.save_with(move |success| {
        let _ = tx.send(success);
    });
    assert!(rx.await.unwrap());
    assert!(profile.file_exists());
}

#[tokio::test]
async fn test_failed_write_keeps_instance_dirty() {
    let temp_dir = TempDir::new().unwrap();
    let context = new_context(&temp_dir);
    let profile = context.singleton::<PlayerProfile>().unwrap();
    std::fs::create_dir_all(profile.file_path()).unwrap();

    profile.write().set_level(5);
    assert!(!profile.save().await);
    assert!(profile.is_dirty());
}

#[test]
fn test_reload_keeps_instance_identity_and_listeners() {
    let temp_dir = TempDir::new().unwrap();
    let context = new_context(&temp_dir);
    let profile = context.singleton::<PlayerProfile>().unwrap();
    let instance = profile.instance();

    let changes = Arc::new(AtomicUsize::new(0));
    let seen = changes.clone();
    instance.read().unwrap().tracker().on_value_change(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    std::fs::create_dir_all(profile.directory_path()).unwrap();
    std::fs::write(
        profile.file_path(),
        "{\"name\": \"grace\", \"level\": 40, \"achievements\": []}",
    )
    .unwrap();
    context.reload_all();

    assert!(Arc::ptr_eq(&instance, &profile.instance()));
    assert_eq!(instance.read().unwrap().name, "grace");

    instance.write().unwrap().set_level(41);
    assert_eq!(changes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_reload_carries_nested_listeners_over() {
    let temp_dir = TempDir::new().unwrap();
    let context = new_context(&temp_dir);
    let profile = context.singleton::<PlayerProfile>().unwrap();

    let changes = Arc::new(AtomicUsize::new(0));
    let seen = changes.clone();
    profile.read().achievements.tracker().on_value_change(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    std::fs::create_dir_all(profile.directory_path()).unwrap();
    std::fs::write(
        profile.file_path(),
        "{\"name\": \"grace\", \"level\": 1, \"achievements\": [{\"id\": \"a\", \"unlocked\": false}]}",
    )
    .unwrap();
    context.reload_all();

    profile.write().achievements.get_mut(0).unwrap().unlock();
    assert_eq!(changes.load(Ordering::SeqCst), 1);
    assert!(profile.is_dirty());
}

#[test]
fn test_load_fires_loaded_event_and_registers() {
    let temp_dir = TempDir::new().unwrap();
    let context = new_context(&temp_dir);
    let profile = context.singleton::<PlayerProfile>().unwrap();
    let loads = Arc::new(AtomicUsize::new(0));
    let seen = loads.clone();
    profile.on_loaded(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    assert!(!context.registry().contains("game::PlayerProfile"));
    let _ = profile.instance();
    profile.load();

    assert_eq!(loads.load(Ordering::SeqCst), 2);
    assert_eq!(context.registry().len(), 1);
}

#[test]
fn test_singleton_is_cached_per_type() {
    let temp_dir = TempDir::new().unwrap();
    let context = new_context(&temp_dir);
    let first = context.singleton::<PlayerProfile>().unwrap();
    let second = context.singleton::<PlayerProfile>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_colliding_keys_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let context = new_context(&temp_dir);
    context.singleton::<PlayerProfile>().unwrap();

    let err = context.singleton::<ShadowProfile>().err().unwrap();
    assert!(matches!(err, SaveError::ConfigError(_)));
}

#[tokio::test]
async fn test_listener_follows_changes_until_disabled() {
    let temp_dir = TempDir::new().unwrap();
    let context = new_context(&temp_dir);
    let profile = context.singleton::<PlayerProfile>().unwrap();
    let mut listener = DataListener::new(profile.clone());

    let instance = listener.enable();
    assert!(listener.is_enabled());
    assert_eq!(instance.read().unwrap().level, 0);

    profile.write().set_level(8);
    tokio::time::timeout(Duration::from_secs(1), listener.changed())
        .await
        .unwrap();

    context.reload_all();
    profile.write().set_level(9);
    tokio::time::timeout(Duration::from_secs(1), listener.changed())
        .await
        .unwrap();

    listener.disable();
    assert!(!listener.is_enabled());
    assert!(!profile.read().tracker().has_value_change_listeners());
}
