//! chain-hashtbl: a single-threaded chained hash table whose entries are
//! also threaded through an ordering list, with a pluggable eviction hook
//! that turns it into a bounded cache.
//!
//! Internal Design:
//!
//! Summary
//! - Entries live in one `slotmap` arena and are addressed by generational
//!   `EntryId` handles. Each entry carries two links at once:
//!   - a chain link into its bucket (`BucketChain`), the primary index;
//!   - prev/next links into the global `OrderList`, which drives
//!     iteration and picks eviction victims.
//! - `HashTbl` composes the two with a key strategy, capability hooks
//!   (allocator accounting, key/value disposers, eviction policy) and the
//!   grow-only resize engine.
//!
//! Ordering
//! - The front of the list holds the newest entry, the back the oldest.
//! - `IterationOrder::Insertion`: only inserting a new key moves an entry.
//! - `IterationOrder::Access`: inserts, replacements and successful
//!   `lookup`/`get_mut` move the entry to the front (LRU). `peek` and
//!   `contains_key` never reorder.
//!
//! Eviction
//! - The policy is consulted exactly once per insertion of a new key,
//!   after the entry is linked, with the new count. Replacing a value or
//!   growing the table never consults it. A positive answer removes the
//!   back entry through the same path as `remove`.
//!
//! Resizing
//! - Bucket counts are powers of two in `[1, max_capacity]`, and a bucket
//!   is chosen by `hash & (capacity - 1)`.
//! - Each entry caches its 32-bit hash; rehashing never calls back into
//!   the key strategy and never touches the ordering list.
//! - Once the count exceeds `floor(capacity * max_load_factor)`, automatic
//!   growth doubles the array until the count fits again (or the maximum
//!   is reached). A failed automatic grow is logged and otherwise ignored.
//! - The table never shrinks.
//!
//! Failure model
//! - `TableError::Alloc` for refused or failed allocations (the table is
//!   left exactly as it was), `TableError::InvalidKey` for keys the
//!   strategy rejects. Absent keys are ordinary results, not errors.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync`; callers serialize access.
//! - Reentrancy: the key strategy must not call back into the table it
//!   serves; debug builds panic if it does. Disposers and the eviction
//!   policy run only while the structure is consistent.

mod bucket_chain;
mod config;
mod entry;
mod error;
mod hash_tbl;
mod hash_tbl_proptest;
mod hooks;
mod iter;
mod order_list;
mod reentrancy;
mod strategy;

// Public surface
pub use config::{
    Builder, Config, IterationOrder, DEFAULT_CAPACITY, DEFAULT_LOAD_FACTOR, MAX_TABLE_SIZE,
};
pub use error::TableError;
pub use hash_tbl::HashTbl;
pub use hooks::{
    AllocError, Allocator, Budget, Disposer, DropDisposer, EvictionPolicy, Global, MaxEntries,
    NeverEvict,
};
pub use iter::{Iter, Keys, Values};
pub use strategy::{djb2, spread, Address, DirectHash, IntHash, IntKey, KeyStrategy, StdHash, StringHash};
