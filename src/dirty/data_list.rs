use super::list::DirtyList;
use super::tracker::{DirtyData, DirtyTracker, SubscriptionId, TrackerId, WeakDirtyTracker};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// A [`DirtyList`] of dirty-aware elements.
///
/// Every element currently in the list has exactly one value-change
/// subscription forwarding to the list's own tracker, keyed by the element's
/// tracker identity. Elements leaving the list are unsubscribed before they
/// go, so mutating a removed element never dirties the list again.
///
/// The list reports dirty when its own structural flag is set or when any
/// element is dirty, and cleaning it cleans every element.
pub struct DirtyDataList<T: DirtyData> {
    list: DirtyList<T>,
    subscriptions: HashMap<TrackerId, SubscriptionId>,
}

impl<T: DirtyData> DirtyDataList<T> {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Wraps existing elements and subscribes to each of them. The list's own
    /// flag starts clean; elements keep whatever state they carry.
    pub fn from_vec(items: Vec<T>) -> Self {
        let mut list = Self {
            list: DirtyList::from_vec(items),
            subscriptions: HashMap::new(),
        };
        list.subscribe_all();
        list
    }

    /// Releases the elements, dropping every subscription first.
    pub fn into_vec(mut self) -> Vec<T> {
        self.unsubscribe_all();
        std::mem::take(self.list.items_mut())
    }

    pub fn push(&mut self, item: T) {
        self.list.push(item);
        let index = self.list.len() - 1;
        link(&mut self.subscriptions, self.list.tracker(), &self.list[index]);
    }

    /// # Panics
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, item: T) {
        self.list.insert(index, item);
        link(&mut self.subscriptions, self.list.tracker(), &self.list[index]);
    }

    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn remove_at(&mut self, index: usize) -> T {
        unlink(&mut self.subscriptions, &self.list[index]);
        self.list.remove_at(index)
    }

    pub fn clear(&mut self) {
        self.unsubscribe_all();
        self.list.clear();
    }

    pub fn extend_from<I: IntoIterator<Item = T>>(&mut self, items: I) {
        let start = self.list.len();
        self.list.extend_from(items);
        for item in &self.list[start..] {
            link(&mut self.subscriptions, self.list.tracker(), item);
        }
    }

    /// Mutable access to one element.
    ///
    /// If the element is replaced or swapped out through the guard, the
    /// outgoing element is unsubscribed and the incoming one subscribed when
    /// the guard drops, and the list is marked changed.
    pub fn get_mut(&mut self, index: usize) -> Option<ElementMut<'_, T>> {
        let tracker = self.list.get(index)?.tracker();
        let previous = (tracker.id(), tracker.downgrade());
        Some(ElementMut {
            owner: self,
            index,
            previous,
        })
    }

    /// Runs `f` on every element in order, with the same bookkeeping as
    /// [`get_mut`](Self::get_mut).
    pub fn for_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut T),
    {
        for index in 0..self.list.len() {
            if let Some(mut item) = self.get_mut(index) {
                f(&mut item);
            }
        }
    }

    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.list.sort_by(compare);
    }

    pub fn sort_by_key<K, F>(&mut self, key: F)
    where
        F: FnMut(&T) -> K,
        K: Ord,
    {
        self.list.sort_by_key(key);
    }

    /// # Panics
    /// Panics if the range is out of bounds.
    pub fn sort_range_by<F>(&mut self, start: usize, count: usize, compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.list.sort_range_by(start, count, compare);
    }

    /// Number of live element subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn subscribe_all(&mut self) {
        for item in self.list.iter() {
            link(&mut self.subscriptions, self.list.tracker(), item);
        }
    }

    fn unsubscribe_all(&mut self) {
        for item in self.list.iter() {
            unlink(&mut self.subscriptions, item);
        }
        self.subscriptions.clear();
    }
}

/// Exclusive access to one element of a [`DirtyDataList`].
pub struct ElementMut<'a, T: DirtyData> {
    owner: &'a mut DirtyDataList<T>,
    index: usize,
    previous: (TrackerId, WeakDirtyTracker),
}

impl<T: DirtyData> Deref for ElementMut<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.owner.list[self.index]
    }
}

impl<T: DirtyData> DerefMut for ElementMut<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.owner.list.items_mut()[self.index]
    }
}

impl<T: DirtyData> Drop for ElementMut<'_, T> {
    fn drop(&mut self) {
        let (previous_id, previous_tracker) = &self.previous;
        let owner = &mut *self.owner;
        let current = &owner.list[self.index];
        if current.tracker().id() == *previous_id {
            return;
        }
        if let Some(id) = owner.subscriptions.remove(previous_id) {
            previous_tracker.remove_value_change(id);
        }
        link(&mut owner.subscriptions, owner.list.tracker(), current);
        owner.list.tracker().value_changed();
    }
}

fn link<T: DirtyData>(
    subscriptions: &mut HashMap<TrackerId, SubscriptionId>,
    owner: &DirtyTracker,
    item: &T,
) {
    let key = item.tracker().id();
    if subscriptions.contains_key(&key) {
        return;
    }
    let owner = owner.downgrade();
    let id = item.tracker().on_value_change(move || {
        owner.value_changed();
    });
    subscriptions.insert(key, id);
}

fn unlink<T: DirtyData>(subscriptions: &mut HashMap<TrackerId, SubscriptionId>, item: &T) {
    if let Some(id) = subscriptions.remove(&item.tracker().id()) {
        item.tracker().remove_value_change(id);
    }
}

impl<T: DirtyData + PartialEq> DirtyDataList<T> {
    /// Replaces the element at `index`; a value-equal overwrite is a no-op.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn set(&mut self, index: usize, value: T) -> bool {
        if self.list[index] == value {
            return false;
        }
        unlink(&mut self.subscriptions, &self.list[index]);
        self.list.set(index, value);
        link(&mut self.subscriptions, self.list.tracker(), &self.list[index]);
        true
    }

    pub fn remove(&mut self, item: &T) -> bool {
        match self.list.index_of(item) {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }
}

impl<T: DirtyData + Ord> DirtyDataList<T> {
    pub fn sort(&mut self) {
        self.list.sort();
    }
}

impl<T: DirtyData> DirtyData for DirtyDataList<T> {
    fn tracker(&self) -> &DirtyTracker {
        self.list.tracker()
    }

    fn is_dirty(&self) -> bool {
        self.list.tracker().is_dirty() || self.list.iter().any(|item| item.is_dirty())
    }

    fn on_clean(&self) {
        for item in self.list.iter() {
            item.clean();
        }
    }
}

impl<T: DirtyData> Deref for DirtyDataList<T> {
    type Target = DirtyList<T>;

    fn deref(&self) -> &DirtyList<T> {
        &self.list
    }
}

impl<T: DirtyData> Default for DirtyDataList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DirtyData + Clone> Clone for DirtyDataList<T> {
    fn clone(&self) -> Self {
        let copy = Self::from_vec(self.list.as_slice().to_vec());
        if self.list.tracker().is_dirty() {
            copy.list.tracker().value_changed();
        }
        copy
    }
}

impl<T: DirtyData + PartialEq> PartialEq for DirtyDataList<T> {
    fn eq(&self, other: &Self) -> bool {
        self.list == other.list
    }
}

impl<T: DirtyData + fmt::Debug> fmt::Debug for DirtyDataList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirtyDataList")
            .field("items", &self.list.as_slice())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

impl<T: DirtyData> FromIterator<T> for DirtyDataList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T: DirtyData + Serialize> Serialize for DirtyDataList<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.list.serialize(serializer)
    }
}

impl<'de, T: DirtyData + Deserialize<'de>> Deserialize<'de> for DirtyDataList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(Self::from_vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Slot {
        tracker: DirtyTracker,
        count: u32,
    }

    impl Slot {
        fn new(count: u32) -> Self {
            Self {
                tracker: DirtyTracker::new(),
                count,
            }
        }

        fn set_count(&mut self, count: u32) {
            self.tracker.set(&mut self.count, count);
        }
    }

    impl DirtyData for Slot {
        fn tracker(&self) -> &DirtyTracker {
            &self.tracker
        }
    }

    #[test]
    fn test_construction_subscribes_every_element() {
        let slots = DirtyDataList::from_vec(vec![Slot::new(1), Slot::new(2)]);
        assert_eq!(slots.subscription_count(), 2);
        for slot in slots.iter() {
            assert_eq!(slot.tracker().value_change_listener_count(), 1);
        }
    }

    #[test]
    fn test_element_mutation_dirties_list() {
        let mut slots = DirtyDataList::from_vec(vec![Slot::new(1), Slot::new(2)]);
        slots.get_mut(1).unwrap().set_count(5);
        assert!(slots.is_dirty());
        assert!(slots.tracker().is_dirty());
    }

    #[test]
    fn test_removed_element_no_longer_dirties_list() {
        let mut slots = DirtyDataList::from_vec(vec![Slot::new(1), Slot::new(2)]);
        let mut removed = slots.remove_at(0);
        slots.clean();
        assert_eq!(slots.subscription_count(), 1);
        assert!(!removed.tracker().has_value_change_listeners());

        removed.set_count(10);
        assert!(removed.is_dirty());
        assert!(!slots.is_dirty());
    }

    #[test]
    fn test_set_swaps_subscription() {
        let mut slots = DirtyDataList::from_vec(vec![Slot::new(1)]);
        assert!(!slots.set(0, Slot::new(1)));
        assert!(!slots.is_dirty());

        assert!(slots.set(0, Slot::new(2)));
        assert_eq!(slots.subscription_count(), 1);
        slots.clean();
        slots.get_mut(0).unwrap().set_count(3);
        assert!(slots.is_dirty());
    }

    #[test]
    fn test_clear_drops_every_subscription() {
        let mut slots = DirtyDataList::from_vec(vec![Slot::new(1), Slot::new(2)]);
        slots.clear();
        assert_eq!(slots.subscription_count(), 0);
        assert!(slots.is_dirty());

        let mut empty: DirtyDataList<Slot> = DirtyDataList::new();
        empty.clear();
        assert!(!empty.is_dirty());
    }

    #[test]
    fn test_sort_keeps_subscriptions() {
        let mut slots = DirtyDataList::from_vec(vec![Slot::new(3), Slot::new(1), Slot::new(2)]);
        slots.sort_by_key(|slot| slot.count);
        slots.clean();
        assert_eq!(slots.subscription_count(), 3);
        slots.get_mut(0).unwrap().set_count(7);
        assert!(slots.is_dirty());
    }

    #[test]
    fn test_replacing_element_through_guard_relinks() {
        let mut slots = DirtyDataList::from_vec(vec![Slot::new(1)]);
        let mut old = std::mem::replace(&mut *slots.get_mut(0).unwrap(), Slot::new(5));

        assert!(slots.tracker().is_dirty());
        assert_eq!(slots.subscription_count(), 1);
        assert_eq!(slots[0].tracker().value_change_listener_count(), 1);
        assert!(!old.tracker().has_value_change_listeners());

        slots.clean();
        old.set_count(8);
        assert!(!slots.is_dirty());

        slots.remove_at(0);
        assert_eq!(slots.subscription_count(), 0);
    }

    #[test]
    fn test_swapped_elements_follow_their_new_list() {
        let mut first = DirtyDataList::from_vec(vec![Slot::new(1)]);
        let mut second = DirtyDataList::from_vec(vec![Slot::new(2)]);
        std::mem::swap(&mut *first.get_mut(0).unwrap(), &mut *second.get_mut(0).unwrap());
        first.clean();
        second.clean();

        second.get_mut(0).unwrap().set_count(99);
        assert!(second.tracker().is_dirty());
        assert!(!first.tracker().is_dirty());
        assert_eq!(first[0].tracker().value_change_listener_count(), 1);
        assert_eq!(second[0].tracker().value_change_listener_count(), 1);
    }

    #[test]
    fn test_in_place_mutation_keeps_subscription() {
        let mut slots = DirtyDataList::from_vec(vec![Slot::new(1), Slot::new(2)]);
        slots.for_each_mut(|slot| slot.set_count(slot.count + 1));
        assert_eq!(slots.subscription_count(), 2);
        assert_eq!(slots[1].count, 3);
        assert!(slots.is_dirty());
    }

    #[test]
    fn test_into_vec_releases_elements() {
        let slots = DirtyDataList::from_vec(vec![Slot::new(1)]);
        let items = slots.into_vec();
        assert!(!items[0].tracker().has_value_change_listeners());
    }
}
