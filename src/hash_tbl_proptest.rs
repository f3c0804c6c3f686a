#![cfg(test)]

// Property tests for HashTbl kept inside the crate so they can check the
// internal structural invariants after every operation.

use crate::config::{Builder, IterationOrder};
use crate::hash_tbl::HashTbl;
use crate::hooks::MaxEntries;
use crate::strategy::{IntHash, KeyStrategy};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Insert(u16, i32),
    Lookup(u16),
    Peek(u16),
    Remove(u16),
    Take(u16),
    Resize(usize),
    Clear,
}

fn arb_op(keys: u16) -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..keys, any::<i32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        2 => (0..keys).prop_map(Op::Lookup),
        1 => (0..keys).prop_map(Op::Peek),
        2 => (0..keys).prop_map(Op::Remove),
        1 => (0..keys).prop_map(Op::Take),
        1 => (0usize..300).prop_map(Op::Resize),
        1 => Just(Op::Clear),
    ]
}

/// Reference model: entries front (newest) to back (oldest).
struct Model {
    entries: Vec<(u16, i32)>,
    access: bool,
    limit: Option<usize>,
}

impl Model {
    fn position(&self, k: u16) -> Option<usize> {
        self.entries.iter().position(|(kk, _)| *kk == k)
    }

    fn to_front(&mut self, i: usize) {
        let e = self.entries.remove(i);
        self.entries.insert(0, e);
    }

    fn insert(&mut self, k: u16, v: i32) {
        match self.position(k) {
            Some(i) => {
                self.entries[i].1 = v;
                if self.access {
                    self.to_front(i);
                }
            }
            None => {
                self.entries.insert(0, (k, v));
                if let Some(limit) = self.limit {
                    if self.entries.len() > limit {
                        self.entries.pop();
                    }
                }
            }
        }
    }

    fn lookup(&mut self, k: u16) -> Option<i32> {
        let i = self.position(k)?;
        let v = self.entries[i].1;
        if self.access {
            self.to_front(i);
        }
        Some(v)
    }

    fn remove(&mut self, k: u16) -> Option<i32> {
        let i = self.position(k)?;
        Some(self.entries.remove(i).1)
    }
}

/// Every key lands in one bucket.
#[derive(Clone, Copy, Default)]
struct Colliding;

impl KeyStrategy<u16> for Colliding {
    fn hash(&self, _key: &u16) -> u32 {
        0
    }
    fn equals(&self, a: &u16, b: &u16) -> bool {
        a == b
    }
}

fn run<S: KeyStrategy<u16>>(
    mut sut: HashTbl<u16, i32, S>,
    mut model: Model,
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    for op in ops {
        match op {
            Op::Insert(k, v) => {
                sut.insert(k, v).expect("insert");
                model.insert(k, v);
            }
            Op::Lookup(k) => {
                let got = sut.lookup(&k).expect("lookup").copied();
                prop_assert_eq!(got, model.lookup(k));
            }
            Op::Peek(k) => {
                let want = model.position(k).map(|i| model.entries[i].1);
                prop_assert_eq!(sut.peek(&k).copied(), want);
            }
            Op::Remove(k) => {
                let found = sut.remove(&k).expect("remove");
                prop_assert_eq!(found, model.remove(k).is_some());
            }
            Op::Take(k) => {
                let got = sut.take(&k).expect("take");
                prop_assert_eq!(got, model.remove(k).map(|v| (k, v)));
            }
            Op::Resize(n) => {
                let before = sut.capacity();
                sut.resize(n).expect("resize");
                let after = sut.capacity();
                prop_assert!(after.is_power_of_two());
                prop_assert!(after >= before);
                prop_assert!(after <= sut.max_capacity());
            }
            Op::Clear => {
                let cap = sut.capacity();
                sut.clear();
                model.entries.clear();
                prop_assert_eq!(sut.capacity(), cap);
            }
        }

        sut.check_invariants();
        let got: Vec<(u16, i32)> = sut.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(&got, &model.entries);
        prop_assert_eq!(sut.count(), model.entries.len());
        if sut.auto_resize() {
            prop_assert!(sut.load_factor() <= sut.max_load_factor());
        }
    }
    Ok(())
}

fn config_strategy() -> impl Strategy<Value = (bool, Option<usize>, usize, f64)> {
    (
        any::<bool>(),
        proptest::option::of(1usize..8),
        1usize..=16,
        prop_oneof![Just(0.1), Just(0.3), Just(0.75), Just(1.0), 0.05f64..1.0],
    )
}

// Property: HashTbl behaves like an ordered list model under random
// operation sequences, for both orders, with and without a size bound.
// After every op: structural invariants hold, iteration order equals the
// model, count matches, and auto-resize keeps the load factor bounded.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_matches_ordered_model(
        (access, limit, capacity, load_factor) in config_strategy(),
        ops in proptest::collection::vec(arb_op(24), 1..120),
    ) {
        let mut b = Builder::with_strategy(IntHash)
            .capacity(capacity)
            .max_load_factor(load_factor)
            .order(if access { IterationOrder::Access } else { IterationOrder::Insertion });
        if let Some(n) = limit {
            b = b.eviction(MaxEntries(n));
        }
        let sut: HashTbl<u16, i32, IntHash> = b.build().expect("build");
        run(sut, Model { entries: Vec::new(), access, limit }, ops)?;
    }
}

// Property: same model equivalence when every key collides, which puts all
// entries on one chain and stresses unlinking from the chain interior.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_matches_ordered_model_with_collisions(
        (access, limit, capacity, load_factor) in config_strategy(),
        ops in proptest::collection::vec(arb_op(12), 1..80),
    ) {
        let mut b = Builder::with_strategy(Colliding)
            .capacity(capacity)
            .max_load_factor(load_factor)
            .order(if access { IterationOrder::Access } else { IterationOrder::Insertion });
        if let Some(n) = limit {
            b = b.eviction(MaxEntries(n));
        }
        let sut: HashTbl<u16, i32, Colliding> = b.build().expect("build");
        run(sut, Model { entries: Vec::new(), access, limit }, ops)?;
    }
}
