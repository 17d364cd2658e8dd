//! Adapter exposing a persisted singleton to a component lifecycle.

use crate::dirty::{DirtyData, SubscriptionId};
use crate::persist::{Persistent, PersistentSingleton};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Notify;

/// Follows value changes of one persisted singleton while enabled.
///
/// Change notifications fire while the writer still holds the instance lock,
/// so they are delivered through [`changed`](Self::changed) rather than as a
/// callback that could try to read the instance.
pub struct DataListener<T: Persistent> {
    singleton: Arc<PersistentSingleton<T>>,
    notify: Arc<Notify>,
    subscription: Option<(Arc<RwLock<T>>, SubscriptionId)>,
}

impl<T: Persistent> DataListener<T> {
    pub fn new(singleton: Arc<PersistentSingleton<T>>) -> Self {
        Self {
            singleton,
            notify: Arc::new(Notify::new()),
            subscription: None,
        }
    }

    /// Attaches to the instance, loading it if necessary, and returns it.
    pub fn enable(&mut self) -> Arc<RwLock<T>> {
        let instance = self.singleton.instance();
        if self.subscription.is_none() {
            let notify = self.notify.clone();
            let id = instance
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .tracker()
                .on_value_change(move || notify.notify_one());
            self.subscription = Some((instance.clone(), id));
        }
        instance
    }

    pub fn disable(&mut self) {
        if let Some((instance, id)) = self.subscription.take() {
            instance
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .tracker()
                .remove_value_change(id);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.subscription.is_some()
    }

    /// Resolves once a value change happened since the previous call.
    pub async fn changed(&self) {
        self.notify.notified().await;
    }
}

impl<T: Persistent> Drop for DataListener<T> {
    fn drop(&mut self) {
        self.disable();
    }
}
