//! Capability hooks injected at construction: memory accounting,
//! disposal of keys/values, and the eviction policy.

use crate::hash_tbl::HashTbl;
use core::alloc::Layout;
use core::cell::Cell;
use std::rc::Rc;
use thiserror::Error;

/// The allocator refused a request of `bytes` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("allocator refused {bytes} bytes")]
pub struct AllocError {
    pub bytes: usize,
}

/// Accounting pair consulted around every entry and bucket-array
/// allocation. `reserve` runs before the memory is taken and may refuse;
/// `release` runs once the memory is gone. The two calls are always
/// balanced with identical layouts.
pub trait Allocator {
    fn reserve(&mut self, layout: Layout) -> Result<(), AllocError>;
    fn release(&mut self, layout: Layout);
}

/// Grants everything; real OOM is still reported by the heap.
#[derive(Debug, Default, Clone, Copy)]
pub struct Global;

impl Allocator for Global {
    #[inline]
    fn reserve(&mut self, _layout: Layout) -> Result<(), AllocError> {
        Ok(())
    }
    #[inline]
    fn release(&mut self, _layout: Layout) {}
}

#[derive(Debug)]
struct BudgetState {
    limit: Cell<usize>,
    used: Cell<usize>,
}

/// A byte budget. Clones share the same counters, so a caller can keep
/// one clone to observe (or adjust) what the table consumes.
#[derive(Debug, Clone)]
pub struct Budget {
    state: Rc<BudgetState>,
}

impl Budget {
    pub fn new(limit: usize) -> Self {
        Self {
            state: Rc::new(BudgetState {
                limit: Cell::new(limit),
                used: Cell::new(0),
            }),
        }
    }

    pub fn used(&self) -> usize {
        self.state.used.get()
    }

    pub fn limit(&self) -> usize {
        self.state.limit.get()
    }

    /// Change the limit. Lowering it below `used` only blocks new requests.
    pub fn set_limit(&self, limit: usize) {
        self.state.limit.set(limit);
    }
}

impl Allocator for Budget {
    fn reserve(&mut self, layout: Layout) -> Result<(), AllocError> {
        let bytes = layout.size();
        let used = self.state.used.get();
        match used.checked_add(bytes) {
            Some(total) if total <= self.state.limit.get() => {
                self.state.used.set(total);
                Ok(())
            }
            _ => Err(AllocError { bytes }),
        }
    }

    fn release(&mut self, layout: Layout) {
        let used = self.state.used.get();
        debug_assert!(used >= layout.size(), "release without matching reserve");
        self.state.used.set(used.saturating_sub(layout.size()));
    }
}

/// Receives keys or values the table is done with.
pub trait Disposer<T> {
    fn dispose(&mut self, item: T);
}

impl<T, F: FnMut(T)> Disposer<T> for F {
    #[inline]
    fn dispose(&mut self, item: T) {
        self(item)
    }
}

/// Default disposer: plain drop.
#[derive(Debug, Default, Clone, Copy)]
pub struct DropDisposer;

impl<T> Disposer<T> for DropDisposer {
    #[inline]
    fn dispose(&mut self, item: T) {
        drop(item)
    }
}

/// Consulted once after each insertion of a new key, with the live count
/// including the new entry. Returning true evicts the entry at the back
/// of the ordering list.
pub trait EvictionPolicy<K, V, S> {
    fn should_evict(&self, table: &HashTbl<K, V, S>, count: usize) -> bool;
}

impl<K, V, S, F> EvictionPolicy<K, V, S> for F
where
    F: Fn(&HashTbl<K, V, S>, usize) -> bool,
{
    #[inline]
    fn should_evict(&self, table: &HashTbl<K, V, S>, count: usize) -> bool {
        self(table, count)
    }
}

/// Default policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverEvict;

impl<K, V, S> EvictionPolicy<K, V, S> for NeverEvict {
    #[inline]
    fn should_evict(&self, _table: &HashTbl<K, V, S>, _count: usize) -> bool {
        false
    }
}

/// Bounded cache: evict whenever the count exceeds the limit.
#[derive(Debug, Clone, Copy)]
pub struct MaxEntries(pub usize);

impl<K, V, S> EvictionPolicy<K, V, S> for MaxEntries {
    #[inline]
    fn should_evict(&self, _table: &HashTbl<K, V, S>, count: usize) -> bool {
        count > self.0
    }
}
