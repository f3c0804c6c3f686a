//! Cursors over the ordering list.

use crate::entry::{Entry, EntryId};
use crate::order_list::{step, Direction};
use core::iter::FusedIterator;
use slotmap::SlotMap;

/// Walks entries front (newest) to back (oldest); `.rev()` walks back to
/// front. The table is borrowed for the cursor's lifetime, so it cannot
/// be restructured underneath it.
pub struct Iter<'a, K, V> {
    slots: &'a SlotMap<EntryId, Entry<K, V>>,
    front: Option<EntryId>,
    back: Option<EntryId>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(
        slots: &'a SlotMap<EntryId, Entry<K, V>>,
        front: Option<EntryId>,
        back: Option<EntryId>,
    ) -> Self {
        Self {
            slots,
            front,
            back,
            remaining: slots.len(),
        }
    }

    fn yield_at(&mut self, dir: Direction) -> Option<(&'a K, &'a V)> {
        if self.remaining == 0 {
            return None;
        }
        let cur = match dir {
            Direction::Forward => self.front?,
            Direction::Reverse => self.back?,
        };
        let next = step(self.slots, cur, dir);
        match dir {
            Direction::Forward => self.front = next,
            Direction::Reverse => self.back = next,
        }
        self.remaining -= 1;
        let e = &self.slots[cur];
        Some((&e.key, &e.value))
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.yield_at(Direction::Forward)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> DoubleEndedIterator for Iter<'a, K, V> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.yield_at(Direction::Reverse)
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self { ..*self }
    }
}

/// Keys in ordering-list order.
pub struct Keys<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;
    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V> DoubleEndedIterator for Keys<'a, K, V> {
    fn next_back(&mut self) -> Option<&'a K> {
        self.inner.next_back().map(|(k, _)| k)
    }
}

/// Values in ordering-list order.
pub struct Values<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;
    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V> DoubleEndedIterator for Values<'a, K, V> {
    fn next_back(&mut self) -> Option<&'a V> {
        self.inner.next_back().map(|(_, v)| v)
    }
}
