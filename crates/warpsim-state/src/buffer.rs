//! Bounded FIFO buffer that silently drops its oldest entry when full.

use std::collections::VecDeque;

/// A fixed-capacity rolling buffer.
///
/// Used for the pressure history and the event log. A capacity of zero
/// keeps nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `item`, evicting the oldest entry if the buffer is full.
    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> RollingBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}
