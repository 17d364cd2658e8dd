//! Persistence lifecycle: per-type singletons, the registry used for bulk
//! operations, and the context that owns both.

mod context;
mod registry;
mod singleton;
mod task;

pub use context::PersistenceContext;
pub use registry::{PersistenceRegistry, Saveable};
pub use singleton::{Persistent, PersistentSingleton};
pub use task::SaveTask;
