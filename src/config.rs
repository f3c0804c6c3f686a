//! Table configuration and the builder that assembles a `HashTbl`.

use crate::error::TableError;
use crate::hash_tbl::HashTbl;
use crate::hooks::{Allocator, Disposer, DropDisposer, EvictionPolicy, Global, NeverEvict};
use crate::strategy::StdHash;

/// Hard upper bound on the bucket count.
pub const MAX_TABLE_SIZE: usize = 1 << 30;
/// Load factor used when the configured one is out of range.
pub const DEFAULT_LOAD_FACTOR: f64 = 0.75;
/// Bucket count of `HashTbl::new()`.
pub const DEFAULT_CAPACITY: usize = 16;

/// Which event moves an entry to the front of the ordering list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum IterationOrder {
    /// Only insertion of a new key. The back is the oldest insertion.
    #[default]
    Insertion,
    /// Insertion, value replacement and successful lookup. The back is
    /// the least recently used entry.
    Access,
}

/// Plain configuration values. Out-of-range values are normalised by
/// `Config::normalized` rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub initial_capacity: usize,
    pub max_load_factor: f64,
    pub max_capacity: usize,
    pub auto_resize: bool,
    pub order: IterationOrder,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            max_load_factor: DEFAULT_LOAD_FACTOR,
            max_capacity: MAX_TABLE_SIZE,
            auto_resize: true,
            order: IterationOrder::Insertion,
        }
    }
}

impl Config {
    /// Clamp every field into its valid range:
    /// - `max_capacity` into `[1, MAX_TABLE_SIZE]`, rounded up to a power of two;
    /// - `initial_capacity` into `[1, max_capacity]`, rounded up to a power of two;
    /// - `max_load_factor` into `(0, 1]`; NaN or non-positive becomes the default.
    pub fn normalized(self) -> Self {
        let max_capacity = self.max_capacity.clamp(1, MAX_TABLE_SIZE).next_power_of_two();
        let max_load_factor = if self.max_load_factor.is_nan() || self.max_load_factor <= 0.0 {
            DEFAULT_LOAD_FACTOR
        } else {
            self.max_load_factor.min(1.0)
        };
        Self {
            initial_capacity: round_capacity(self.initial_capacity, max_capacity),
            max_load_factor,
            max_capacity,
            ..self
        }
    }
}

/// Power-of-two ceiling of `n`, kept within `[1, max]`. `max` must itself
/// be a power of two.
#[inline]
pub(crate) fn round_capacity(n: usize, max: usize) -> usize {
    debug_assert!(max.is_power_of_two());
    n.clamp(1, max).next_power_of_two()
}

/// Largest count that does not yet require growing.
#[inline]
pub(crate) fn resize_threshold(capacity: usize, max_load_factor: f64) -> usize {
    (capacity as f64 * max_load_factor).floor() as usize
}

/// Capacity auto-resize grows to: `current` doubled until `count` fits
/// under the threshold, or `max` is reached.
pub(crate) fn grown_capacity(current: usize, count: usize, max_load_factor: f64, max: usize) -> usize {
    let mut capacity = current;
    while capacity < max && resize_threshold(capacity, max_load_factor) < count {
        capacity *= 2;
    }
    capacity
}

/// Fluent constructor for `HashTbl`.
///
/// ```
/// use chain_hashtbl::{Builder, IntHash, IterationOrder, MaxEntries};
///
/// let mut lru = Builder::<u32, &str, _>::with_strategy(IntHash)
///     .capacity(8)
///     .order(IterationOrder::Access)
///     .eviction(MaxEntries(2))
///     .build()
///     .unwrap();
/// lru.insert(1, "one").unwrap();
/// lru.insert(2, "two").unwrap();
/// lru.lookup(&1).unwrap();
/// lru.insert(3, "three").unwrap();
/// assert!(lru.contains_key(&1));
/// assert!(!lru.contains_key(&2));
/// ```
pub struct Builder<K, V, S = StdHash> {
    config: Config,
    strategy: S,
    key_disposer: Box<dyn Disposer<K>>,
    value_disposer: Box<dyn Disposer<V>>,
    allocator: Box<dyn Allocator>,
    eviction: Box<dyn EvictionPolicy<K, V, S>>,
}

impl<K, V> Builder<K, V> {
    pub fn new() -> Self {
        Self::with_strategy(StdHash::default())
    }
}

impl<K, V> Default for Builder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> Builder<K, V, S> {
    pub fn with_strategy(strategy: S) -> Self {
        Self {
            config: Config::default(),
            strategy,
            key_disposer: Box::new(DropDisposer),
            value_disposer: Box::new(DropDisposer),
            allocator: Box::new(Global),
            eviction: Box::new(NeverEvict),
        }
    }

    /// Replace every plain setting at once.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn capacity(mut self, initial_capacity: usize) -> Self {
        self.config.initial_capacity = initial_capacity;
        self
    }

    pub fn max_capacity(mut self, max_capacity: usize) -> Self {
        self.config.max_capacity = max_capacity;
        self
    }

    pub fn max_load_factor(mut self, max_load_factor: f64) -> Self {
        self.config.max_load_factor = max_load_factor;
        self
    }

    pub fn auto_resize(mut self, auto_resize: bool) -> Self {
        self.config.auto_resize = auto_resize;
        self
    }

    pub fn order(mut self, order: IterationOrder) -> Self {
        self.config.order = order;
        self
    }

    pub fn key_disposer<D: Disposer<K> + 'static>(mut self, disposer: D) -> Self {
        self.key_disposer = Box::new(disposer);
        self
    }

    pub fn value_disposer<D: Disposer<V> + 'static>(mut self, disposer: D) -> Self {
        self.value_disposer = Box::new(disposer);
        self
    }

    pub fn allocator<A: Allocator + 'static>(mut self, allocator: A) -> Self {
        self.allocator = Box::new(allocator);
        self
    }

    pub fn eviction<E: EvictionPolicy<K, V, S> + 'static>(mut self, policy: E) -> Self {
        self.eviction = Box::new(policy);
        self
    }

    /// Closure form of `eviction`, so the argument types are inferred.
    pub fn evict_when<F>(self, f: F) -> Self
    where
        F: Fn(&HashTbl<K, V, S>, usize) -> bool + 'static,
    {
        self.eviction(f)
    }

    /// Allocate the initial bucket array. Fails only if that allocation
    /// is refused.
    pub fn build(self) -> Result<HashTbl<K, V, S>, TableError> {
        HashTbl::from_parts(
            self.config.normalized(),
            self.strategy,
            self.key_disposer,
            self.value_disposer,
            self.allocator,
            self.eviction,
        )
    }
}
