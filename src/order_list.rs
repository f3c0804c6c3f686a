//! OrderList: doubly linked list threaded through arena entries.
//!
//! The list does not own its nodes. Nodes live in a `SlotMap` owned by the
//! table and carry their own `Link`; the list only records the two ends.
//! `None` plays the role of the sentinel: a walk ends when the next handle
//! is `None`, and an empty list has neither head nor tail.
//!
//! Front is the most recently inserted (or touched) node, back the oldest.

use crate::entry::EntryId;
use slotmap::SlotMap;

/// Previous/next handles of a node within the ordering list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub(crate) prev: Option<EntryId>,
    pub(crate) next: Option<EntryId>,
}

/// Access to the intrusive `Link` embedded in a node.
pub(crate) trait Linked {
    fn link(&self) -> &Link;
    fn link_mut(&mut self) -> &mut Link;
}

/// Walk direction for cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Front to back: newest first.
    Forward,
    /// Back to front: oldest first.
    Reverse,
}

#[derive(Debug, Default)]
pub(crate) struct OrderList {
    head: Option<EntryId>,
    tail: Option<EntryId>,
}

impl OrderList {
    pub(crate) const fn new() -> Self {
        Self {
            head: None,
            tail: None,
        }
    }

    #[inline]
    pub(crate) fn front(&self) -> Option<EntryId> {
        self.head
    }

    #[inline]
    pub(crate) fn back(&self) -> Option<EntryId> {
        self.tail
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Link a detached node in front of the current head.
    pub(crate) fn push_front<N: Linked>(&mut self, nodes: &mut SlotMap<EntryId, N>, id: EntryId) {
        let old_head = self.head;
        *nodes[id].link_mut() = Link {
            prev: None,
            next: old_head,
        };
        match old_head {
            Some(h) => nodes[h].link_mut().prev = Some(id),
            None => self.tail = Some(id),
        }
        self.head = Some(id);
    }

    /// Detach a node, splicing its neighbours together. The node's own
    /// link is reset so a stale walk cannot continue from it.
    pub(crate) fn unlink<N: Linked>(&mut self, nodes: &mut SlotMap<EntryId, N>, id: EntryId) {
        let Link { prev, next } = *nodes[id].link();
        match prev {
            Some(p) => nodes[p].link_mut().next = next,
            None => {
                debug_assert_eq!(self.head, Some(id));
                self.head = next;
            }
        }
        match next {
            Some(n) => nodes[n].link_mut().prev = prev,
            None => {
                debug_assert_eq!(self.tail, Some(id));
                self.tail = prev;
            }
        }
        *nodes[id].link_mut() = Link::default();
    }

    pub(crate) fn move_to_front<N: Linked>(&mut self, nodes: &mut SlotMap<EntryId, N>, id: EntryId) {
        if self.head == Some(id) {
            return;
        }
        self.unlink(nodes, id);
        self.push_front(nodes, id);
    }

    /// Forget both ends. Callers discard the nodes themselves.
    pub(crate) fn reset(&mut self) {
        self.head = None;
        self.tail = None;
    }

    /// First handle a walk in `dir` yields.
    #[cfg(test)]
    pub(crate) fn start(&self, dir: Direction) -> Option<EntryId> {
        match dir {
            Direction::Forward => self.head,
            Direction::Reverse => self.tail,
        }
    }
}

/// Neighbour of `id` in direction `dir`, or `None` at the sentinel.
#[inline]
pub(crate) fn step<N: Linked>(nodes: &SlotMap<EntryId, N>, id: EntryId, dir: Direction) -> Option<EntryId> {
    let link = nodes[id].link();
    match dir {
        Direction::Forward => link.next,
        Direction::Reverse => link.prev,
    }
}
