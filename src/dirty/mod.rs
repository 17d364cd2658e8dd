//! In-memory change tracking.
//!
//! [`DirtyTracker`] is the leaf primitive, [`DirtyList`] tracks structural
//! changes of a sequence and [`DirtyDataList`] additionally aggregates the
//! dirty state of its dirty-aware elements.

mod data_list;
mod list;
mod tracker;

pub use data_list::{DirtyDataList, ElementMut};
pub use list::DirtyList;
pub use tracker::{
    DirtyData, DirtyTracker, EventListeners, Handler, SubscriptionId, TrackerId, WeakDirtyTracker,
};
