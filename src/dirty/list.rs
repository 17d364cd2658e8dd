use super::tracker::{DirtyData, DirtyTracker};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Deref, Range};

/// Ordered sequence whose structural mutations mark it dirty.
///
/// Reads go through `Deref<Target = [T]>`; every method that takes `&mut self`
/// calls `value_changed()` exactly once when it changes observable state, and
/// not at all when it turns out to be a no-op.
pub struct DirtyList<T> {
    items: Vec<T>,
    tracker: DirtyTracker,
}

impl<T> DirtyList<T> {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Wraps existing items. The list starts clean.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            items,
            tracker: DirtyTracker::new(),
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
        self.tracker.value_changed();
    }

    /// # Panics
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, item: T) {
        self.items.insert(index, item);
        self.tracker.value_changed();
    }

    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn remove_at(&mut self, index: usize) -> T {
        let item = self.items.remove(index);
        self.tracker.value_changed();
        item
    }

    /// Removes every element. Clearing an empty list is a no-op.
    pub fn clear(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.items.clear();
        self.tracker.value_changed();
    }

    /// Appends all items, marking the list dirty once if anything was added.
    pub fn extend_from<I: IntoIterator<Item = T>>(&mut self, items: I) {
        let before = self.items.len();
        self.items.extend(items);
        if self.items.len() != before {
            self.tracker.value_changed();
        }
    }

    pub fn find<P: FnMut(&T) -> bool>(&self, mut predicate: P) -> Option<&T> {
        self.items.iter().find(|item| predicate(item))
    }

    pub fn find_last<P: FnMut(&T) -> bool>(&self, mut predicate: P) -> Option<&T> {
        self.items.iter().rev().find(|item| predicate(item))
    }

    pub fn find_index<P: FnMut(&T) -> bool>(&self, predicate: P) -> Option<usize> {
        self.find_index_in_range(0..self.items.len(), predicate)
    }

    /// Searches from `start` to the end.
    pub fn find_index_from<P: FnMut(&T) -> bool>(&self, start: usize, predicate: P) -> Option<usize> {
        self.find_index_in_range(start..self.items.len(), predicate)
    }

    /// Searches the `count` elements starting at `start`.
    pub fn find_index_in<P: FnMut(&T) -> bool>(
        &self,
        start: usize,
        count: usize,
        predicate: P,
    ) -> Option<usize> {
        self.find_index_in_range(start..start.saturating_add(count), predicate)
    }

    pub fn find_last_index<P: FnMut(&T) -> bool>(&self, predicate: P) -> Option<usize> {
        self.find_last_index_in_range(0..self.items.len(), predicate)
    }

    /// Searches backwards from `start` down to the first element.
    pub fn find_last_index_from<P: FnMut(&T) -> bool>(
        &self,
        start: usize,
        predicate: P,
    ) -> Option<usize> {
        self.find_last_index_in_range(0..start.saturating_add(1), predicate)
    }

    /// Searches backwards over the `count` elements ending at `start`.
    pub fn find_last_index_in<P: FnMut(&T) -> bool>(
        &self,
        start: usize,
        count: usize,
        predicate: P,
    ) -> Option<usize> {
        let end = start.saturating_add(1);
        self.find_last_index_in_range(end.saturating_sub(count)..end, predicate)
    }

    fn find_index_in_range<P: FnMut(&T) -> bool>(
        &self,
        range: Range<usize>,
        mut predicate: P,
    ) -> Option<usize> {
        let offset = range.start;
        self.items
            .get(range)?
            .iter()
            .position(|item| predicate(item))
            .map(|index| index + offset)
    }

    fn find_last_index_in_range<P: FnMut(&T) -> bool>(
        &self,
        range: Range<usize>,
        mut predicate: P,
    ) -> Option<usize> {
        let offset = range.start;
        self.items
            .get(range)?
            .iter()
            .rposition(|item| predicate(item))
            .map(|index| index + offset)
    }

    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.items.sort_by(compare);
        self.tracker.value_changed();
    }

    pub fn sort_by_key<K, F>(&mut self, key: F)
    where
        F: FnMut(&T) -> K,
        K: Ord,
    {
        self.items.sort_by_key(key);
        self.tracker.value_changed();
    }

    /// Sorts the `count` elements starting at `start`.
    ///
    /// # Panics
    /// Panics if the range is out of bounds.
    pub fn sort_range_by<F>(&mut self, start: usize, count: usize, compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.items[start..start + count].sort_by(compare);
        self.tracker.value_changed();
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }
}

impl<T: PartialEq> DirtyList<T> {
    /// Overwrites the element at `index`. Returns `false` (and stays clean)
    /// when the new value equals the current one.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn set(&mut self, index: usize, value: T) -> bool {
        if self.items[index] == value {
            return false;
        }
        self.items[index] = value;
        self.tracker.value_changed();
        true
    }

    /// Removes the first element equal to `item`. Removing an absent value is a no-op.
    pub fn remove(&mut self, item: &T) -> bool {
        match self.index_of(item) {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }

    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.items.iter().position(|candidate| candidate == item)
    }
}

impl<T: Ord> DirtyList<T> {
    pub fn sort(&mut self) {
        self.items.sort();
        self.tracker.value_changed();
    }
}

impl<T> DirtyData for DirtyList<T> {
    fn tracker(&self) -> &DirtyTracker {
        &self.tracker
    }
}

impl<T> Deref for DirtyList<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> Default for DirtyList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for DirtyList<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            tracker: self.tracker.clone(),
        }
    }
}

impl<T: PartialEq> PartialEq for DirtyList<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: fmt::Debug> fmt::Debug for DirtyList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirtyList")
            .field("items", &self.items)
            .field("dirty", &self.tracker.is_dirty())
            .finish()
    }
}

impl<T> FromIterator<T> for DirtyList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a DirtyList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Serialize> Serialize for DirtyList<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for DirtyList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(Self::from_vec)
    }
}
