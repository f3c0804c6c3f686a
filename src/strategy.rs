//! Key strategies: how a table hashes, compares and admits keys.
//!
//! A table never compares keys by `==` on its own; every probe goes
//! through the configured `KeyStrategy`. Four strategies ship with the
//! crate:
//!
//! - `DirectHash`: identity of pointer-like keys (raw pointers,
//!   `NonNull`, references, `Rc`). Null pointers are not admitted.
//! - `IntHash`: fixed-width integer keys.
//! - `StringHash`: byte-string keys (`&str`, `String`, `Vec<u8>`, ...),
//!   hashed with djb2.
//! - `StdHash`: any `K: Hash + Eq`, through a `BuildHasher`.

use core::hash::{BuildHasher, Hash};
use core::ptr::NonNull;
use hashbrown::hash_map::DefaultHashBuilder;
use std::rc::Rc;

/// Hash, equality and admission policy for keys of type `K`.
///
/// Implementations must be consistent: `equals(a, b)` implies
/// `hash(a) == hash(b)`.
pub trait KeyStrategy<K: ?Sized> {
    fn hash(&self, key: &K) -> u32;
    fn equals(&self, a: &K, b: &K) -> bool;
    /// Whether `key` may enter the table at all. Rejected keys make
    /// `insert`, `lookup` and `remove` fail with `InvalidKey`.
    #[inline]
    fn admits(&self, _key: &K) -> bool {
        true
    }
}

/// Spread entropy from high bits into the low bits used for masking.
#[inline]
pub fn spread(k: u32) -> u32 {
    let h = k ^ (k >> 20) ^ (k >> 12);
    h ^ (h >> 7) ^ (h >> 4)
}

/// djb2, xor variant: `h = h * 33 ^ byte`.
#[inline]
pub fn djb2(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |h, &b| h.wrapping_mul(33) ^ u32::from(b))
}

#[inline]
fn fold64(h: u64) -> u32 {
    (h ^ (h >> 32)) as u32
}

/// Keys compared by address.
pub trait Address {
    fn address(&self) -> usize;
}

impl<T: ?Sized> Address for *const T {
    fn address(&self) -> usize {
        self.cast::<u8>() as usize
    }
}

impl<T: ?Sized> Address for *mut T {
    fn address(&self) -> usize {
        self.cast::<u8>() as usize
    }
}

impl<T: ?Sized> Address for NonNull<T> {
    fn address(&self) -> usize {
        self.as_ptr().cast::<u8>() as usize
    }
}

impl<T: ?Sized> Address for &T {
    fn address(&self) -> usize {
        (*self as *const T).cast::<u8>() as usize
    }
}

impl<T: ?Sized> Address for Rc<T> {
    fn address(&self) -> usize {
        Rc::as_ptr(self).cast::<u8>() as usize
    }
}

/// Identity strategy: two keys are equal iff they point at the same place.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectHash;

impl<K: Address> KeyStrategy<K> for DirectHash {
    #[inline]
    fn hash(&self, key: &K) -> u32 {
        spread(fold64(key.address() as u64))
    }
    #[inline]
    fn equals(&self, a: &K, b: &K) -> bool {
        a.address() == b.address()
    }
    #[inline]
    fn admits(&self, key: &K) -> bool {
        key.address() != 0
    }
}

/// Fixed-width integer keys.
pub trait IntKey: Copy + Eq {
    fn hash32(self) -> u32;
}

macro_rules! int_key_narrow {
    ($($t:ty),*) => {$(
        impl IntKey for $t {
            #[inline]
            fn hash32(self) -> u32 {
                self as u32
            }
        }
    )*};
}

macro_rules! int_key_wide {
    ($($t:ty),*) => {$(
        impl IntKey for $t {
            #[inline]
            fn hash32(self) -> u32 {
                fold64(self as u64)
            }
        }
    )*};
}

int_key_narrow!(i8, u8, i16, u16, i32, u32);
int_key_wide!(i64, u64, isize, usize);

/// Integer strategy: the value is its own hash (64-bit values fold
/// their high half into the low half).
#[derive(Debug, Default, Clone, Copy)]
pub struct IntHash;

impl<K: IntKey> KeyStrategy<K> for IntHash {
    #[inline]
    fn hash(&self, key: &K) -> u32 {
        key.hash32()
    }
    #[inline]
    fn equals(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

/// Byte-string strategy using djb2.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringHash;

impl<K: AsRef<[u8]> + ?Sized> KeyStrategy<K> for StringHash {
    #[inline]
    fn hash(&self, key: &K) -> u32 {
        djb2(key.as_ref())
    }
    #[inline]
    fn equals(&self, a: &K, b: &K) -> bool {
        a.as_ref() == b.as_ref()
    }
}

/// `Hash + Eq` keys hashed by a `BuildHasher`, 64-bit output folded to
/// 32 bits.
#[derive(Debug, Default, Clone)]
pub struct StdHash<S = DefaultHashBuilder> {
    build: S,
}

impl<S> StdHash<S> {
    pub fn with_hasher(build: S) -> Self {
        Self { build }
    }
}

impl<K, S> KeyStrategy<K> for StdHash<S>
where
    K: Hash + Eq + ?Sized,
    S: BuildHasher,
{
    #[inline]
    fn hash(&self, key: &K) -> u32 {
        fold64(self.build.hash_one(key))
    }
    #[inline]
    fn equals(&self, a: &K, b: &K) -> bool {
        a == b
    }
}
