// ============================================================================
// savedata: dirty-tracked, file-backed singleton persistence
// ============================================================================

pub mod config;
pub mod core;
pub mod dirty;
pub mod listener;
pub mod persist;
pub mod storage;

// Re-export main types for convenience
pub use config::PersistenceConfig;
pub use crate::core::{Result, SaveError};
pub use dirty::{DirtyData, DirtyDataList, DirtyList, DirtyTracker, SubscriptionId};
pub use listener::DataListener;
pub use persist::{
    PersistenceContext, PersistenceRegistry, Persistent, PersistentSingleton, SaveTask, Saveable,
};
pub use storage::SaveStore;
