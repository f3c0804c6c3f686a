//! HashTbl: chained hash table with an ordering list and eviction hook.
//!
//! Every entry lives in the `slots` arena and is threaded through two
//! structures at once: its bucket chain (the index) and the ordering
//! list (traversal and eviction order). Both are expressed with
//! `EntryId` handles, so unlinking is O(1) on the list and O(chain) on
//! the index without any aliasing.

use crate::bucket_chain::BucketChain;
use crate::config::{
    grown_capacity, resize_threshold, round_capacity, Config, IterationOrder, DEFAULT_CAPACITY,
};
use crate::entry::{Entry, EntryId};
use crate::error::TableError;
use crate::hooks::{Allocator, Disposer, DropDisposer, EvictionPolicy, Global, NeverEvict};
use crate::iter::{Iter, Keys, Values};
use crate::order_list::OrderList;
use crate::reentrancy::DebugReentrancy;
use crate::strategy::{KeyStrategy, StdHash};
use core::alloc::Layout;
use core::fmt;
use core::ops::ControlFlow;
use log::{debug, trace, warn};
use slotmap::SlotMap;

pub struct HashTbl<K, V, S = StdHash> {
    strategy: S,
    buckets: BucketChain,
    order: OrderList,
    slots: SlotMap<EntryId, Entry<K, V>>,
    max_load_factor: f64,
    max_capacity: usize,
    resize_threshold: usize,
    auto_resize: bool,
    order_mode: IterationOrder,
    key_disposer: Box<dyn Disposer<K>>,
    value_disposer: Box<dyn Disposer<V>>,
    allocator: Box<dyn Allocator>,
    eviction: Box<dyn EvictionPolicy<K, V, S>>,
    reentrancy: DebugReentrancy,
}

fn bucket_layout(capacity: usize) -> Result<Layout, TableError> {
    Layout::array::<Option<EntryId>>(capacity).map_err(|_| TableError::Alloc {
        bytes: capacity.saturating_mul(core::mem::size_of::<Option<EntryId>>()),
    })
}

/// Reserve with the allocator hook, then take the memory from the heap.
/// A heap failure hands the reservation back.
fn grant_buckets(allocator: &mut dyn Allocator, capacity: usize) -> Result<BucketChain, TableError> {
    let layout = bucket_layout(capacity)?;
    allocator.reserve(layout)?;
    BucketChain::try_with_capacity(capacity).map_err(|_| {
        allocator.release(layout);
        TableError::Alloc {
            bytes: layout.size(),
        }
    })
}

/// Reserve room for `additional` entries with the allocator hook, then in
/// the arena. A heap failure hands the reservation back.
fn grant_entries<K, V>(
    allocator: &mut dyn Allocator,
    slots: &mut SlotMap<EntryId, Entry<K, V>>,
    additional: usize,
) -> Result<(), TableError> {
    let layout = Layout::array::<Entry<K, V>>(additional).map_err(|_| TableError::Alloc {
        bytes: additional.saturating_mul(core::mem::size_of::<Entry<K, V>>()),
    })?;
    allocator.reserve(layout)?;
    slots.try_reserve(additional).map_err(|_| {
        allocator.release(layout);
        TableError::Alloc {
            bytes: layout.size(),
        }
    })
}

impl<K, V> HashTbl<K, V> {
    /// Empty table with default settings and the `StdHash` strategy.
    pub fn new() -> Self {
        Self::with_strategy(StdHash::default())
    }
}

impl<K, V> Default for HashTbl<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashTbl<K, V, S> {
    /// Empty table with default settings and the given key strategy.
    pub fn with_strategy(strategy: S) -> Self {
        Self::assemble(
            Config::default(),
            BucketChain::with_capacity(DEFAULT_CAPACITY),
            strategy,
            Box::new(DropDisposer),
            Box::new(DropDisposer),
            Box::new(Global),
            Box::new(NeverEvict),
        )
    }

    pub(crate) fn from_parts(
        config: Config,
        strategy: S,
        key_disposer: Box<dyn Disposer<K>>,
        value_disposer: Box<dyn Disposer<V>>,
        mut allocator: Box<dyn Allocator>,
        eviction: Box<dyn EvictionPolicy<K, V, S>>,
    ) -> Result<Self, TableError> {
        let buckets = grant_buckets(&mut *allocator, config.initial_capacity)?;
        Ok(Self::assemble(
            config,
            buckets,
            strategy,
            key_disposer,
            value_disposer,
            allocator,
            eviction,
        ))
    }

    fn assemble(
        config: Config,
        buckets: BucketChain,
        strategy: S,
        key_disposer: Box<dyn Disposer<K>>,
        value_disposer: Box<dyn Disposer<V>>,
        allocator: Box<dyn Allocator>,
        eviction: Box<dyn EvictionPolicy<K, V, S>>,
    ) -> Self {
        let capacity = buckets.capacity();
        Self {
            strategy,
            buckets,
            order: OrderList::new(),
            slots: SlotMap::with_key(),
            max_load_factor: config.max_load_factor,
            max_capacity: config.max_capacity,
            resize_threshold: resize_threshold(capacity, config.max_load_factor),
            auto_resize: config.auto_resize,
            order_mode: config.order,
            key_disposer,
            value_disposer,
            allocator,
            eviction,
            reentrancy: DebugReentrancy::new(),
        }
    }

    /// Number of live entries.
    #[inline]
    pub fn count(&self) -> usize {
        self.slots.len()
    }

    /// Same as `count`.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when the table holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of buckets; always a power of two.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buckets.capacity()
    }

    /// Upper bound on `capacity`, after normalisation.
    #[inline]
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Load factor auto-resize keeps the table under, in `(0, 1]`.
    #[inline]
    pub fn max_load_factor(&self) -> f64 {
        self.max_load_factor
    }

    /// `count / capacity`.
    #[inline]
    pub fn load_factor(&self) -> f64 {
        self.count() as f64 / self.capacity() as f64
    }

    /// Which events move an entry to the front.
    #[inline]
    pub fn iteration_order(&self) -> IterationOrder {
        self.order_mode
    }

    /// Whether inserts grow the bucket array automatically.
    #[inline]
    pub fn auto_resize(&self) -> bool {
        self.auto_resize
    }

    /// Entries from the front (newest or most recently used) to the back.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.slots, self.order.front(), self.order.back())
    }

    /// Entries from the back (oldest or least recently used) to the front.
    pub fn iter_rev(&self) -> core::iter::Rev<Iter<'_, K, V>> {
        self.iter().rev()
    }

    /// Keys, front to back.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Values, front to back.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Entry at the front of the ordering list.
    pub fn front(&self) -> Option<(&K, &V)> {
        self.order.front().map(|id| {
            let e = &self.slots[id];
            (&e.key, &e.value)
        })
    }

    /// Entry at the back of the ordering list: the next eviction victim.
    pub fn back(&self) -> Option<(&K, &V)> {
        self.order.back().map(|id| {
            let e = &self.slots[id];
            (&e.key, &e.value)
        })
    }

    /// Call `visit` on each entry front to back until it breaks. Returns
    /// the number of entries visited, including the one that broke.
    pub fn apply<F>(&self, mut visit: F) -> usize
    where
        F: FnMut(&K, &V) -> ControlFlow<()>,
    {
        let mut visited = 0;
        for (k, v) in self.iter() {
            visited += 1;
            if visit(k, v).is_break() {
                break;
            }
        }
        visited
    }

    /// Remove every entry, disposing keys and values front to back. The
    /// bucket array keeps its capacity.
    pub fn clear(&mut self) {
        let mut slots = core::mem::take(&mut self.slots);
        let mut cur = self.order.front();
        self.order.reset();
        self.buckets.reset();
        // The table is now empty and consistent; disposers may run.
        let n = slots.len();
        let layout = Layout::new::<Entry<K, V>>();
        while let Some(id) = cur {
            let Some(entry) = slots.remove(id) else {
                break;
            };
            cur = entry.order.next;
            self.allocator.release(layout);
            self.key_disposer.dispose(entry.key);
            self.value_disposer.dispose(entry.value);
        }
        debug_assert!(slots.is_empty(), "ordering list missed live entries");
        if n > 0 {
            trace!("cleared {} entries", n);
        }
    }

    /// Grow to the power-of-two ceiling of `new_capacity`, capped at the
    /// maximum, and rehash every entry from its cached hash. Requests
    /// that would not grow the table succeed without doing anything. On
    /// failure the table keeps its old bucket array.
    pub fn resize(&mut self, new_capacity: usize) -> Result<(), TableError> {
        let current = self.capacity();
        if current >= self.max_capacity {
            return Ok(());
        }
        let target = round_capacity(new_capacity, self.max_capacity);
        if target <= current {
            return Ok(());
        }
        let mut buckets = grant_buckets(&mut *self.allocator, target)?;
        {
            let _g = self.reentrancy.enter();
            buckets.rehash_from(&mut self.slots);
        }
        let old = core::mem::replace(&mut self.buckets, buckets);
        if let Ok(layout) = bucket_layout(old.capacity()) {
            self.allocator.release(layout);
        }
        self.resize_threshold = resize_threshold(target, self.max_load_factor);
        debug!(
            "bucket array grown {} -> {} ({} entries)",
            current,
            target,
            self.count()
        );
        Ok(())
    }

    fn touch(&mut self, id: EntryId) {
        if self.order_mode == IterationOrder::Access {
            self.order.move_to_front(&mut self.slots, id);
        }
    }

    /// Unlink `id` from its chain and the ordering list and free its slot.
    fn detach(&mut self, id: EntryId) -> Option<(K, V)> {
        let entry = {
            let _g = self.reentrancy.enter();
            let on_chain = self.buckets.unlink(&mut self.slots, id);
            debug_assert!(on_chain, "live entry missing from its bucket chain");
            self.order.unlink(&mut self.slots, id);
            self.slots.remove(id)?
        };
        self.allocator.release(Layout::new::<Entry<K, V>>());
        Some((entry.key, entry.value))
    }

    fn dispose(&mut self, key: K, value: V) {
        self.key_disposer.dispose(key);
        self.value_disposer.dispose(value);
    }

    /// Every structural invariant, checked the slow way.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        use crate::order_list::Linked;

        assert!(self.capacity().is_power_of_two());
        assert!(self.capacity() <= self.max_capacity);
        assert_eq!(self.buckets.reachable(&self.slots), self.count());

        let mut walked = 0;
        let mut prev = None;
        let mut cur = self.order.front();
        while let Some(id) = cur {
            let link = self.slots[id].link();
            assert_eq!(link.prev, prev, "prev link mismatch");
            walked += 1;
            prev = Some(id);
            cur = link.next;
        }
        assert_eq!(prev, self.order.back());
        assert_eq!(walked, self.count());
        assert_eq!(self.iter().count(), self.count());
        assert_eq!(self.iter_rev().count(), self.count());
    }
}

impl<K, V, S> HashTbl<K, V, S>
where
    S: KeyStrategy<K>,
{
    /// Admit, hash and locate `key`. The strategy is the only user code
    /// that runs here.
    fn probe(&self, key: &K) -> Result<(u32, Option<EntryId>), TableError> {
        let _g = self.reentrancy.enter();
        if !self.strategy.admits(key) {
            return Err(TableError::InvalidKey);
        }
        let hash = self.strategy.hash(key);
        let found = self
            .buckets
            .find(&self.slots, hash, |e| self.strategy.equals(&e.key, key));
        Ok((hash, found))
    }

    /// Insert `key`, or replace the value of an equal key already present.
    ///
    /// Replacing hands the displaced value to the value disposer and the
    /// redundant incoming key to the key disposer; the stored key is kept.
    /// It does not consult the eviction policy or auto-resize.
    ///
    /// A new key is linked at the front of its chain and of the ordering
    /// list. Then the eviction policy sees the new count and may evict the
    /// back entry, and finally the table grows if the count exceeds the
    /// resize threshold: to the smallest power of two whose threshold
    /// covers the count, capped at the maximum. A failed grow is logged
    /// and ignored.
    pub fn insert(&mut self, key: K, value: V) -> Result<(), TableError> {
        let (hash, found) = self.probe(&key)?;
        if let Some(id) = found {
            let old = core::mem::replace(&mut self.slots[id].value, value);
            self.touch(id);
            self.dispose(key, old);
            return Ok(());
        }

        grant_entries(&mut *self.allocator, &mut self.slots, 1)?;
        {
            let _g = self.reentrancy.enter();
            let id = self.slots.insert(Entry::new(key, value, hash));
            self.buckets.link_front(&mut self.slots, id);
            self.order.push_front(&mut self.slots, id);
        }

        if self.eviction.should_evict(self, self.count()) {
            if let Some((k, v)) = self.order.back().and_then(|id| self.detach(id)) {
                trace!("evicted back entry, {} remain", self.count());
                self.dispose(k, v);
            }
        }

        if self.auto_resize && self.count() > self.resize_threshold {
            let target = grown_capacity(
                self.capacity(),
                self.count(),
                self.max_load_factor,
                self.max_capacity,
            );
            if let Err(e) = self.resize(target) {
                warn!("automatic grow from {} buckets failed: {}", self.capacity(), e);
            }
        }
        Ok(())
    }

    /// Value for `key`. In access order a hit moves the entry to the front.
    pub fn lookup(&mut self, key: &K) -> Result<Option<&V>, TableError> {
        match self.probe(key)?.1 {
            Some(id) => {
                self.touch(id);
                Ok(Some(&self.slots[id].value))
            }
            None => Ok(None),
        }
    }

    /// Mutable value for `key`; touches like `lookup`.
    pub fn get_mut(&mut self, key: &K) -> Result<Option<&mut V>, TableError> {
        match self.probe(key)?.1 {
            Some(id) => {
                self.touch(id);
                Ok(Some(&mut self.slots[id].value))
            }
            None => Ok(None),
        }
    }

    /// Value for `key` without touching the ordering list. Keys the
    /// strategy rejects are simply absent.
    pub fn peek(&self, key: &K) -> Option<&V> {
        match self.probe(key) {
            Ok((_, Some(id))) => Some(&self.slots[id].value),
            _ => None,
        }
    }

    /// Non-touching membership test.
    pub fn contains_key(&self, key: &K) -> bool {
        matches!(self.probe(key), Ok((_, Some(_))))
    }

    /// Remove `key`, disposing its stored key and value. `Ok(false)` if
    /// it was absent.
    pub fn remove(&mut self, key: &K) -> Result<bool, TableError> {
        match self.take(key)? {
            Some((k, v)) => {
                self.dispose(k, v);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove `key` and hand its key and value back to the caller instead
    /// of the disposers.
    pub fn take(&mut self, key: &K) -> Result<Option<(K, V)>, TableError> {
        Ok(self.probe(key)?.1.and_then(|id| self.detach(id)))
    }
}

impl<K, V, S> Drop for HashTbl<K, V, S> {
    fn drop(&mut self) {
        self.clear();
        if let Ok(layout) = bucket_layout(self.capacity()) {
            self.allocator.release(layout);
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a HashTbl<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for HashTbl<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Builder;
    use crate::hooks::{Budget, MaxEntries};
    use crate::strategy::{IntHash, StringHash};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn keys<S>(t: &HashTbl<u32, u32, S>) -> Vec<u32> {
        t.keys().copied().collect()
    }

    /// Invariant: re-inserting a key replaces the value without adding an entry.
    #[test]
    fn insert_same_key_replaces_value() {
        let mut t = HashTbl::with_strategy(IntHash);
        t.insert(7u32, 1u32).unwrap();
        t.insert(7, 2).unwrap();
        assert_eq!(t.count(), 1);
        assert_eq!(t.lookup(&7).unwrap(), Some(&2));
        t.check_invariants();
    }

    /// Invariant: insertion order lists newest first and ignores lookups.
    #[test]
    fn insertion_order_ignores_lookups() {
        let mut t = HashTbl::with_strategy(IntHash);
        for k in [1u32, 2, 3] {
            t.insert(k, k).unwrap();
        }
        assert_eq!(keys(&t), vec![3, 2, 1]);
        t.lookup(&1).unwrap();
        t.insert(2, 20).unwrap();
        assert_eq!(keys(&t), vec![3, 2, 1]);
    }

    /// Invariant: access order moves hits and replacements to the front.
    #[test]
    fn access_order_moves_touched_entries() {
        let mut t = Builder::with_strategy(IntHash)
            .order(IterationOrder::Access)
            .build()
            .unwrap();
        for k in [1u32, 2, 3] {
            t.insert(k, k).unwrap();
        }
        t.lookup(&1).unwrap();
        assert_eq!(keys(&t), vec![1, 3, 2]);
        t.insert(2, 22).unwrap();
        assert_eq!(keys(&t), vec![2, 1, 3]);
        *t.get_mut(&3).unwrap().unwrap() += 1;
        assert_eq!(keys(&t), vec![3, 2, 1]);
        // peek is non-touching
        assert_eq!(t.peek(&1), Some(&1));
        assert_eq!(keys(&t), vec![3, 2, 1]);
        t.check_invariants();
    }

    /// Invariant: eviction removes the back entry through the disposers.
    #[test]
    fn eviction_removes_back_entry() {
        let disposed = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&disposed);
        let mut t = Builder::with_strategy(IntHash)
            .eviction(MaxEntries(2))
            .key_disposer(move |k: u32| sink.borrow_mut().push(k))
            .build()
            .unwrap();
        for k in 1u32..=4 {
            t.insert(k, k * 10).unwrap();
        }
        assert_eq!(t.count(), 2);
        assert_eq!(keys(&t), vec![4, 3]);
        assert_eq!(*disposed.borrow(), vec![1, 2]);
        t.check_invariants();
    }

    /// Invariant: replacing a value never consults the eviction policy.
    #[test]
    fn replace_does_not_evict() {
        let calls = Rc::new(RefCell::new(0));
        let c = Rc::clone(&calls);
        let mut t = Builder::with_strategy(IntHash)
            .evict_when(move |_t: &HashTbl<u32, u32, IntHash>, _n| {
                *c.borrow_mut() += 1;
                false
            })
            .build()
            .unwrap();
        t.insert(1, 1).unwrap();
        t.insert(1, 2).unwrap();
        t.insert(1, 3).unwrap();
        assert_eq!(*calls.borrow(), 1);
    }

    /// Invariant: the policy sees the table with the new entry already linked.
    #[test]
    fn eviction_policy_sees_consistent_table() {
        let mut t = Builder::with_strategy(IntHash)
            .evict_when(|t: &HashTbl<u32, u32, IntHash>, n| {
                assert_eq!(t.count(), n);
                assert!(t.peek(&0).is_some() || n == 0);
                t.front().map(|(k, _)| *k) == Some(99)
            })
            .build()
            .unwrap();
        t.insert(0, 0).unwrap();
        t.insert(1, 1).unwrap();
        t.insert(99, 99).unwrap();
        assert_eq!(keys(&t), vec![99, 1]);
    }

    /// Invariant: auto-resize keeps count/capacity within the load factor.
    #[test]
    fn auto_resize_respects_load_factor() {
        let mut t = Builder::with_strategy(IntHash).capacity(1).build().unwrap();
        for k in 0u32..1000 {
            t.insert(k, k).unwrap();
            assert!(t.load_factor() <= t.max_load_factor());
        }
        assert!(t.capacity().is_power_of_two());
        t.check_invariants();
    }

    /// Invariant: one insert's grow restores the bound even for small load
    /// factors, where a single doubling is not enough.
    #[test]
    fn auto_resize_restores_small_load_factor() {
        let mut t = Builder::with_strategy(IntHash)
            .capacity(1)
            .max_load_factor(0.1)
            .build()
            .unwrap();
        for k in 0u32..200 {
            t.insert(k, k).unwrap();
            assert!(
                t.load_factor() <= 0.1,
                "count={} cap={}",
                t.count(),
                t.capacity()
            );
        }
        assert_eq!(t.capacity(), 2048);
        t.check_invariants();
    }

    /// Invariant: a grow stops at the maximum capacity.
    #[test]
    fn auto_resize_stops_at_max_capacity() {
        let mut t = Builder::with_strategy(IntHash)
            .capacity(1)
            .max_capacity(8)
            .max_load_factor(0.1)
            .build()
            .unwrap();
        for k in 0u32..20 {
            t.insert(k, k).unwrap();
        }
        assert_eq!(t.capacity(), 8);
        assert_eq!(t.count(), 20);
        t.check_invariants();
    }

    /// Invariant: without auto-resize the capacity never changes.
    #[test]
    fn fixed_capacity_chains_grow_instead() {
        let mut t = Builder::with_strategy(IntHash)
            .capacity(4)
            .auto_resize(false)
            .build()
            .unwrap();
        for k in 0u32..64 {
            t.insert(k, k).unwrap();
        }
        assert_eq!(t.capacity(), 4);
        assert_eq!(t.load_factor(), 16.0);
        for k in 0u32..64 {
            assert_eq!(t.peek(&k), Some(&k));
        }
        t.check_invariants();
    }

    /// Invariant: resize never shrinks and never exceeds the maximum.
    #[test]
    fn resize_is_grow_only_and_capped() {
        let mut t = Builder::with_strategy(IntHash)
            .capacity(8)
            .max_capacity(64)
            .auto_resize(false)
            .build()
            .unwrap();
        t.insert(1u32, 1u32).unwrap();
        t.resize(2).unwrap();
        assert_eq!(t.capacity(), 8);
        t.resize(17).unwrap();
        assert_eq!(t.capacity(), 32);
        t.resize(1 << 20).unwrap();
        assert_eq!(t.capacity(), 64);
        t.resize(1 << 21).unwrap();
        assert_eq!(t.capacity(), 64);
        assert_eq!(t.peek(&1), Some(&1));
        t.check_invariants();
    }

    /// Invariant: resize leaves the ordering list untouched.
    #[test]
    fn resize_preserves_order() {
        let mut t = Builder::with_strategy(IntHash)
            .capacity(2)
            .auto_resize(false)
            .build()
            .unwrap();
        for k in [5u32, 3, 9, 1] {
            t.insert(k, k).unwrap();
        }
        let before = keys(&t);
        t.resize(128).unwrap();
        assert_eq!(keys(&t), before);
    }

    /// Invariant: a refused bucket allocation leaves the table usable.
    #[test]
    fn failed_resize_keeps_old_buckets() {
        let budget = Budget::new(usize::MAX);
        let mut t = Builder::with_strategy(IntHash)
            .capacity(4)
            .auto_resize(false)
            .allocator(budget.clone())
            .build()
            .unwrap();
        for k in 0u32..8 {
            t.insert(k, k).unwrap();
        }
        budget.set_limit(budget.used());
        assert!(matches!(t.resize(1024), Err(TableError::Alloc { .. })));
        assert_eq!(t.capacity(), 4);
        for k in 0u32..8 {
            assert_eq!(t.peek(&k), Some(&k));
        }
        t.check_invariants();
    }

    /// Invariant: a refused entry allocation leaves the table unchanged.
    #[test]
    fn failed_insert_changes_nothing() {
        let budget = Budget::new(usize::MAX);
        let mut t = Builder::with_strategy(IntHash)
            .allocator(budget.clone())
            .build()
            .unwrap();
        t.insert(1u32, 1u32).unwrap();
        budget.set_limit(budget.used());
        assert!(matches!(t.insert(2, 2), Err(TableError::Alloc { .. })));
        assert_eq!(t.count(), 1);
        assert!(!t.contains_key(&2));
        // Replacing needs no allocation.
        t.insert(1, 10).unwrap();
        assert_eq!(t.peek(&1), Some(&10));
        t.check_invariants();
    }

    /// Invariant: when the arena cannot grow, the allocator reservation is
    /// handed back and the failure surfaces as `Alloc`.
    #[test]
    fn refused_entry_arena_releases_reservation() {
        let mut budget = Budget::new(usize::MAX);
        let mut slots: SlotMap<EntryId, Entry<u32, u32>> = SlotMap::with_key();
        let huge = isize::MAX as usize / core::mem::size_of::<Entry<u32, u32>>();
        let res = grant_entries(&mut budget, &mut slots, huge);
        assert!(matches!(res, Err(TableError::Alloc { .. })));
        assert_eq!(budget.used(), 0);
        assert!(slots.is_empty());

        grant_entries(&mut budget, &mut slots, 1).unwrap();
        assert_eq!(budget.used(), Layout::new::<Entry<u32, u32>>().size());
    }

    /// Invariant: an auto-resize failure is not an insert failure.
    #[test]
    fn failed_auto_resize_is_benign() {
        let entry = Layout::new::<Entry<u32, u32>>().size();
        let buckets = bucket_layout(16).unwrap().size();
        // Room for the initial array and exactly 13 entries, none for growth.
        let budget = Budget::new(buckets + 13 * entry);
        let mut t = Builder::with_strategy(IntHash)
            .capacity(16)
            .allocator(budget.clone())
            .build()
            .unwrap();
        for k in 0u32..13 {
            t.insert(k, k).unwrap();
        }
        assert_eq!(t.count(), 13);
        assert_eq!(t.capacity(), 16);
        assert!(t.load_factor() > t.max_load_factor());
        t.check_invariants();
    }

    /// Invariant: allocator reservations balance out once the table drops.
    #[test]
    fn allocator_balanced_after_drop() {
        let budget = Budget::new(usize::MAX);
        {
            let mut t = Builder::with_strategy(IntHash)
                .capacity(1)
                .allocator(budget.clone())
                .build()
                .unwrap();
            for k in 0u32..100 {
                t.insert(k, k).unwrap();
            }
            for k in 0u32..50 {
                assert!(t.remove(&k).unwrap());
            }
            assert!(budget.used() > 0);
        }
        assert_eq!(budget.used(), 0);
    }

    /// Invariant: an initial bucket array the allocator refuses fails `build`.
    #[test]
    fn build_fails_when_buckets_refused() {
        let res = Builder::<u32, u32, _>::with_strategy(IntHash)
            .allocator(Budget::new(0))
            .build();
        assert!(matches!(res, Err(TableError::Alloc { .. })));
    }

    /// Invariant: clear and drop dispose every key and value exactly once.
    #[test]
    fn clear_and_drop_dispose_everything() {
        let keys_seen = Rc::new(RefCell::new(Vec::new()));
        let vals_seen = Rc::new(RefCell::new(Vec::new()));
        let (ks, vs) = (Rc::clone(&keys_seen), Rc::clone(&vals_seen));
        let mut t = Builder::with_strategy(StringHash)
            .key_disposer(move |k: String| ks.borrow_mut().push(k))
            .value_disposer(move |v: u32| vs.borrow_mut().push(v))
            .build()
            .unwrap();
        t.insert("a".to_string(), 1).unwrap();
        t.insert("b".to_string(), 2).unwrap();
        let cap = t.capacity();
        t.clear();
        assert_eq!(*keys_seen.borrow(), vec!["b", "a"]);
        assert_eq!(*vals_seen.borrow(), vec![2, 1]);
        assert_eq!(t.count(), 0);
        assert_eq!(t.capacity(), cap);
        t.check_invariants();

        t.insert("c".to_string(), 3).unwrap();
        drop(t);
        assert_eq!(*keys_seen.borrow(), vec!["b", "a", "c"]);
        assert_eq!(*vals_seen.borrow(), vec![2, 1, 3]);
    }

    /// Invariant: replacement disposes the old value and the redundant key.
    #[test]
    fn replace_disposes_old_value_and_incoming_key() {
        let vals = Rc::new(RefCell::new(Vec::new()));
        let keys_seen = Rc::new(RefCell::new(0));
        let (vs, ks) = (Rc::clone(&vals), Rc::clone(&keys_seen));
        let mut t = Builder::with_strategy(IntHash)
            .value_disposer(move |v: &'static str| vs.borrow_mut().push(v))
            .key_disposer(move |_k: u8| *ks.borrow_mut() += 1)
            .build()
            .unwrap();
        t.insert(1u8, "old").unwrap();
        t.insert(1, "new").unwrap();
        assert_eq!(*vals.borrow(), vec!["old"]);
        assert_eq!(*keys_seen.borrow(), 1);
        assert_eq!(t.peek(&1), Some(&"new"));
    }

    /// Invariant: take returns ownership and bypasses the disposers.
    #[test]
    fn take_bypasses_disposers() {
        let hits = Rc::new(RefCell::new(0));
        let h = Rc::clone(&hits);
        let mut t = Builder::with_strategy(StringHash)
            .value_disposer(move |_v: Vec<u8>| *h.borrow_mut() += 1)
            .build()
            .unwrap();
        t.insert("k", vec![1, 2]).unwrap();
        assert_eq!(t.take(&"k").unwrap(), Some(("k", vec![1, 2])));
        assert_eq!(t.take(&"k").unwrap(), None);
        assert_eq!(*hits.borrow(), 0);
    }

    /// Invariant: apply stops at the first break and counts it.
    #[test]
    fn apply_counts_including_stop() {
        let mut t = HashTbl::with_strategy(IntHash);
        for k in 1u32..=5 {
            t.insert(k, k).unwrap();
        }
        let mut sum = 0;
        assert_eq!(
            t.apply(|_, v| {
                sum += v;
                ControlFlow::Continue(())
            }),
            5
        );
        assert_eq!(sum, 15);
        let visited = t.apply(|k, _| {
            if *k == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        // Front to back: 5, 4, 3.
        assert_eq!(visited, 3);
        let empty: HashTbl<u32, u32, IntHash> = HashTbl::with_strategy(IntHash);
        assert_eq!(empty.apply(|_, _| ControlFlow::Break(())), 0);
    }

    /// Invariant: forward and reverse cursors meet without overlap.
    #[test]
    fn double_ended_iteration_meets_in_middle() {
        let mut t = HashTbl::with_strategy(IntHash);
        for k in 1u32..=4 {
            t.insert(k, k).unwrap();
        }
        let mut it = t.iter();
        assert_eq!(it.len(), 4);
        assert_eq!(it.next().map(|(k, _)| *k), Some(4));
        assert_eq!(it.next_back().map(|(k, _)| *k), Some(1));
        assert_eq!(it.next().map(|(k, _)| *k), Some(3));
        assert_eq!(it.next_back().map(|(k, _)| *k), Some(2));
        assert!(it.next().is_none());
        assert!(it.next_back().is_none());
        let rev: Vec<u32> = t.iter_rev().map(|(k, _)| *k).collect();
        assert_eq!(rev, vec![1, 2, 3, 4]);
        assert_eq!(t.back(), Some((&1, &1)));
        assert_eq!(t.front(), Some((&4, &4)));
    }

    /// Invariant: Debug renders entries in ordering-list order.
    #[test]
    fn debug_lists_entries_in_order() {
        let mut t = HashTbl::with_strategy(IntHash);
        t.insert(1u32, "a").unwrap();
        t.insert(2u32, "b").unwrap();
        assert_eq!(format!("{:?}", t), r#"{2: "b", 1: "a"}"#);
    }

    /// Invariant (debug-only): a key strategy that re-enters the table
    /// while probing panics instead of observing a half-updated index.
    #[cfg(debug_assertions)]
    #[test]
    fn reentrancy_from_strategy_panics() {
        use std::cell::Cell;

        struct Reentrant {
            table: Cell<*const HashTbl<u32, u32, Reentrant>>,
        }
        impl KeyStrategy<u32> for Reentrant {
            fn hash(&self, _k: &u32) -> u32 {
                0
            }
            fn equals(&self, a: &u32, b: &u32) -> bool {
                let t = self.table.get();
                if !t.is_null() {
                    unsafe {
                        let _ = (*t).contains_key(a);
                    }
                }
                a == b
            }
        }

        let mut t = Box::new(HashTbl::with_strategy(Reentrant {
            table: Cell::new(core::ptr::null()),
        }));
        t.insert(1, 1).unwrap();
        let raw: *const HashTbl<u32, u32, Reentrant> = &*t;
        t.strategy.table.set(raw);
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = t.peek(&1);
        }));
        assert!(res.is_err(), "expected reentrancy to panic in debug builds");
        t.strategy.table.set(core::ptr::null());
    }
}
