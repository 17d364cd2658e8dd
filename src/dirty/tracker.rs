//! Dirty-flag bookkeeping shared by every persisted value.
//!
//! A [`DirtyTracker`] owns the transient "changed since last save" flag of one
//! entity together with two listener lists: value-change listeners fire on
//! every logical mutation, became-dirty listeners fire only on the
//! clean → dirty transition.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Callback registered on a tracker or a singleton event.
pub type Handler = Arc<dyn Fn() + Send + Sync>;

/// Handle returned when registering a listener; pass it back to remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Identity of a tracker, stable for the tracker's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackerId(u64);

/// Ordered list of payload-less listeners.
#[derive(Default)]
pub struct EventListeners {
    entries: Mutex<Vec<(SubscriptionId, Handler)>>,
}

impl EventListeners {
    pub fn add(&self, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(next_id());
        self.lock().push((id, handler));
        id
    }

    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Invokes every listener. The list is copied first so a listener may
    /// subscribe or unsubscribe while being notified.
    pub fn notify(&self) {
        let handlers: Vec<Handler> = self.lock().iter().map(|(_, h)| h.clone()).collect();
        for handler in handlers {
            handler();
        }
    }

    fn take_all(&self) -> Vec<(SubscriptionId, Handler)> {
        std::mem::take(&mut *self.lock())
    }

    fn append(&self, mut entries: Vec<(SubscriptionId, Handler)>) {
        self.lock().append(&mut entries);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Handler)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.len())
            .finish()
    }
}

struct TrackerInner {
    id: u64,
    dirty: AtomicBool,
    value_change: EventListeners,
    became_dirty: EventListeners,
}

impl TrackerInner {
    fn new(dirty: bool) -> Self {
        Self {
            id: next_id(),
            dirty: AtomicBool::new(dirty),
            value_change: EventListeners::default(),
            became_dirty: EventListeners::default(),
        }
    }

    fn value_changed(&self) {
        self.value_change.notify();
        if !self.dirty.swap(true, Ordering::AcqRel) {
            self.became_dirty.notify();
        }
    }
}

/// Transient dirty flag plus change notifications for one entity.
///
/// Embed it in a persisted struct with `#[serde(skip)]`: it is never part of
/// the encoded payload. Cloning produces an independent tracker carrying the
/// same flag but no listeners, and all trackers compare equal so that
/// `#[derive(PartialEq)]` on the owner compares only the real fields.
pub struct DirtyTracker {
    inner: Arc<TrackerInner>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TrackerInner::new(false)),
        }
    }

    pub fn id(&self) -> TrackerId {
        TrackerId(self.inner.id)
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::Acquire)
    }

    /// Records a logical mutation: notifies value-change listeners, then marks
    /// the tracker dirty, notifying became-dirty listeners only if it was clean.
    pub fn value_changed(&self) {
        self.inner.value_changed();
    }

    /// Resets the flag without running any owner cleanup hook.
    /// Owners should call [`DirtyData::clean`] instead.
    pub fn mark_clean(&self) {
        self.inner.dirty.store(false, Ordering::Release);
    }

    /// Equality-checked assignment.
    ///
    /// When the tracker is already dirty and nobody listens for value changes
    /// the value is assigned without comparing it.
    pub fn set<V: PartialEq>(&self, slot: &mut V, value: V) {
        if self.is_dirty() && !self.has_value_change_listeners() {
            *slot = value;
            return;
        }
        if *slot == value {
            return;
        }
        *slot = value;
        self.value_changed();
    }

    /// Like [`set`](Self::set) with a per-field callback invoked with the new
    /// value after assignment and before listeners are notified.
    pub fn set_with<V, F>(&self, slot: &mut V, value: V, on_changed: F)
    where
        V: PartialEq,
        F: FnOnce(&V),
    {
        if *slot == value {
            return;
        }
        *slot = value;
        on_changed(slot);
        self.value_changed();
    }

    pub fn on_value_change<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.value_change.add(Arc::new(handler))
    }

    pub fn remove_value_change(&self, id: SubscriptionId) -> bool {
        self.inner.value_change.remove(id)
    }

    pub fn on_dirty<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.became_dirty.add(Arc::new(handler))
    }

    pub fn remove_dirty(&self, id: SubscriptionId) -> bool {
        self.inner.became_dirty.remove(id)
    }

    pub fn has_value_change_listeners(&self) -> bool {
        !self.inner.value_change.is_empty()
    }

    pub fn value_change_listener_count(&self) -> usize {
        self.inner.value_change.len()
    }

    /// Returns a handle that can mark this tracker changed without keeping it
    /// alive.
    pub fn downgrade(&self) -> WeakDirtyTracker {
        WeakDirtyTracker {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Moves every listener registered on `previous` onto this tracker.
    ///
    /// Used when a value is replaced wholesale (reload) so existing
    /// subscriptions follow the new value.
    pub fn adopt_listeners(&self, previous: &DirtyTracker) {
        if Arc::ptr_eq(&self.inner, &previous.inner) {
            return;
        }
        self.inner
            .value_change
            .append(previous.inner.value_change.take_all());
        self.inner
            .became_dirty
            .append(previous.inner.became_dirty.take_all());
    }
}

impl Default for DirtyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for DirtyTracker {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::new(TrackerInner::new(self.is_dirty())),
        }
    }
}

impl PartialEq for DirtyTracker {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for DirtyTracker {}

impl fmt::Debug for DirtyTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirtyTracker")
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

/// Non-owning handle to a [`DirtyTracker`].
#[derive(Clone)]
pub struct WeakDirtyTracker {
    inner: Weak<TrackerInner>,
}

impl WeakDirtyTracker {
    /// Forwards a value change if the tracker is still alive.
    pub fn value_changed(&self) -> bool {
        match self.inner.upgrade() {
            Some(inner) => {
                inner.value_changed();
                true
            }
            None => false,
        }
    }

    /// Drops a value-change subscription if the tracker is still alive.
    pub fn remove_value_change(&self, id: SubscriptionId) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.value_change.remove(id))
    }
}

/// Capability shared by everything that carries a dirty flag.
///
/// Implementors only provide [`tracker`](Self::tracker); containers override
/// [`is_dirty`](Self::is_dirty) and [`on_clean`](Self::on_clean) to aggregate
/// over nested state.
pub trait DirtyData {
    fn tracker(&self) -> &DirtyTracker;

    fn is_dirty(&self) -> bool {
        self.tracker().is_dirty()
    }

    fn value_changed(&self) {
        self.tracker().value_changed();
    }

    /// Resets the dirty flag, then runs [`on_clean`](Self::on_clean).
    fn clean(&self) {
        self.tracker().mark_clean();
        self.on_clean();
    }

    fn on_clean(&self) {}

    /// Moves listeners from `previous`, the value this one replaces, onto
    /// this value. Composite types override it to also adopt the listeners of
    /// their nested trackers.
    fn adopt_from(&self, previous: &Self)
    where
        Self: Sized,
    {
        self.tracker().adopt_listeners(previous.tracker());
    }
}

impl DirtyData for DirtyTracker {
    fn tracker(&self) -> &DirtyTracker {
        self
    }
}
