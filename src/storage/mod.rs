pub mod codec;
pub mod store;

pub use store::{IoGuard, SaveStore, normalize_file_stem};
