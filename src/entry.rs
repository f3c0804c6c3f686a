//! The record shared by a bucket chain and the ordering list.

use crate::bucket_chain::Chained;
use crate::order_list::{Link, Linked};
use slotmap::new_key_type;

new_key_type! {
    /// Generational arena handle naming one live entry.
    pub struct EntryId;
}

/// One key/value pair. While live it sits in exactly one bucket chain
/// (`chain_next`) and at exactly one position of the ordering list
/// (`order`).
#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) hash: u32,
    pub(crate) chain_next: Option<EntryId>,
    pub(crate) order: Link,
}

impl<K, V> Entry<K, V> {
    pub(crate) fn new(key: K, value: V, hash: u32) -> Self {
        Self {
            key,
            value,
            hash,
            chain_next: None,
            order: Link::default(),
        }
    }
}

impl<K, V> Linked for Entry<K, V> {
    #[inline]
    fn link(&self) -> &Link {
        &self.order
    }
    #[inline]
    fn link_mut(&mut self) -> &mut Link {
        &mut self.order
    }
}

impl<K, V> Chained for Entry<K, V> {
    #[inline]
    fn cached_hash(&self) -> u32 {
        self.hash
    }
    #[inline]
    fn chain_next(&self) -> Option<EntryId> {
        self.chain_next
    }
    #[inline]
    fn set_chain_next(&mut self, next: Option<EntryId>) {
        self.chain_next = next;
    }
}
