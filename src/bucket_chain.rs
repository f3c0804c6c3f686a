//! BucketChain: the primary index.
//!
//! A power-of-two array of chain heads. A hash selects its bucket by
//! masking with `capacity - 1`; entries sharing a bucket form a singly
//! linked chain through their `chain_next` handle, newest first.

use crate::entry::EntryId;
use slotmap::SlotMap;
use std::collections::TryReserveError;

/// Access to the chain link and cached hash embedded in a node.
pub(crate) trait Chained {
    fn cached_hash(&self) -> u32;
    fn chain_next(&self) -> Option<EntryId>;
    fn set_chain_next(&mut self, next: Option<EntryId>);
}

/// Bucket index of `hash` in a table of `capacity` buckets.
#[inline]
pub(crate) fn slot_index(hash: u32, capacity: usize) -> usize {
    debug_assert!(capacity.is_power_of_two());
    (hash as usize) & (capacity - 1)
}

#[derive(Debug)]
pub(crate) struct BucketChain {
    heads: Vec<Option<EntryId>>,
}

impl BucketChain {
    /// Allocate `capacity` empty buckets without aborting on OOM.
    pub(crate) fn try_with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
        debug_assert!(capacity.is_power_of_two());
        let mut heads = Vec::new();
        heads.try_reserve_exact(capacity)?;
        heads.resize(capacity, None);
        Ok(Self { heads })
    }

    /// Infallible form for default construction; aborts on OOM like `Vec`.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        Self {
            heads: vec![None; capacity],
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.heads.len()
    }

    #[inline]
    fn slot(&self, hash: u32) -> usize {
        slot_index(hash, self.heads.len())
    }

    /// Scan the bucket of `hash` for a node whose cached hash matches and
    /// which `eq` accepts. Hash ties that `eq` rejects keep scanning.
    pub(crate) fn find<N, F>(&self, nodes: &SlotMap<EntryId, N>, hash: u32, mut eq: F) -> Option<EntryId>
    where
        N: Chained,
        F: FnMut(&N) -> bool,
    {
        let mut cur = self.heads[self.slot(hash)];
        while let Some(id) = cur {
            let node = &nodes[id];
            if node.cached_hash() == hash && eq(node) {
                return Some(id);
            }
            cur = node.chain_next();
        }
        None
    }

    /// Link `id` at the head of its bucket.
    pub(crate) fn link_front<N: Chained>(&mut self, nodes: &mut SlotMap<EntryId, N>, id: EntryId) {
        let slot = self.slot(nodes[id].cached_hash());
        nodes[id].set_chain_next(self.heads[slot]);
        self.heads[slot] = Some(id);
    }

    /// Unlink `id` from its bucket by rewriting the predecessor's link (or
    /// the bucket head). Returns false if `id` was not on the chain.
    pub(crate) fn unlink<N: Chained>(&mut self, nodes: &mut SlotMap<EntryId, N>, id: EntryId) -> bool {
        let slot = self.slot(nodes[id].cached_hash());
        let next = nodes[id].chain_next();
        let mut prev: Option<EntryId> = None;
        let mut cur = self.heads[slot];
        while let Some(c) = cur {
            if c == id {
                match prev {
                    None => self.heads[slot] = next,
                    Some(p) => nodes[p].set_chain_next(next),
                }
                nodes[id].set_chain_next(None);
                return true;
            }
            prev = Some(c);
            cur = nodes[c].chain_next();
        }
        false
    }

    /// Empty every bucket. Nodes are discarded by the caller.
    pub(crate) fn reset(&mut self) {
        self.heads.fill(None);
    }

    /// Thread every node of `nodes` into this (empty) array using the
    /// cached hashes. The hash function is never called again.
    pub(crate) fn rehash_from<N: Chained>(&mut self, nodes: &mut SlotMap<EntryId, N>) {
        debug_assert!(self.heads.iter().all(Option::is_none));
        let mask = self.heads.len() - 1;
        for (id, node) in nodes.iter_mut() {
            let slot = (node.cached_hash() as usize) & mask;
            node.set_chain_next(self.heads[slot]);
            self.heads[slot] = Some(id);
        }
    }

    /// Number of nodes reachable by walking every chain.
    #[cfg(test)]
    pub(crate) fn reachable<N: Chained>(&self, nodes: &SlotMap<EntryId, N>) -> usize {
        let mut n = 0;
        for head in &self.heads {
            let mut cur = *head;
            while let Some(id) = cur {
                n += 1;
                cur = nodes[id].chain_next();
            }
        }
        n
    }
}
