//! Debug-only reentrancy detection.
//!
//! A table holds its index in a transiently inconsistent state while it
//! probes, links, unlinks or rehashes. The only user code that can run in
//! those windows is the key strategy (`hash`/`equals`). If that code
//! calls back into the same table, debug builds panic instead of reading
//! a half-updated structure. Release builds compile the checks away.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::marker::PhantomData;

#[derive(Debug)]
pub(crate) struct DebugReentrancy {
    #[cfg(debug_assertions)]
    busy: Cell<bool>,
    // Raw-pointer marker: the owning table is !Send + !Sync.
    _single_thread: PhantomData<*mut ()>,
}

impl DebugReentrancy {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            busy: Cell::new(false),
            _single_thread: PhantomData,
        }
    }

    /// Mark a critical section as entered until the returned value drops.
    #[inline]
    pub(crate) fn enter(&self) -> Section<'_> {
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.busy.replace(true),
                "reentrancy detected: table re-entered from a key strategy callback"
            );
            return Section {
                owner: self,
                _lt: PhantomData,
            };
        }
        #[cfg(not(debug_assertions))]
        {
            return Section { _lt: PhantomData };
        }
    }
}

impl Default for DebugReentrancy {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct Section<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReentrancy,
    _lt: PhantomData<&'a ()>,
}

impl Drop for Section<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.busy.set(false);
    }
}
