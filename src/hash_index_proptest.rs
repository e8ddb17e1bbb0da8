#![cfg(test)]

// Property tests for HashIndex kept inside the crate so they can check
// slot-level counters that the public API does not expose.

use crate::hash_index::{HashIndex, InsertError};
use crate::prime::is_prime;
use hashbrown::HashMap;
use proptest::prelude::*;
use std::collections::BTreeSet;

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, usize),
    Remove(usize),
    Find(usize),
    Contains(String),
    Iterate,
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (usize, Vec<String>, Vec<OpI>)> {
    (0usize..12, proptest::collection::vec("[a-z]{0,5}", 1..=24)).prop_flat_map(
        |(capacity, pool)| {
            let idxs: Vec<usize> = (0..pool.len()).collect();
            let idx = proptest::sample::select(idxs);
            let contains_pool = proptest::sample::select(pool.clone());
            let op = prop_oneof![
                4 => (idx.clone(), 0usize..RECORDS).prop_map(|(i, r)| OpI::Insert(i, r)),
                2 => idx.clone().prop_map(OpI::Remove),
                2 => idx.clone().prop_map(OpI::Find),
                1 => prop_oneof![
                    contains_pool.prop_map(|s: String| s),
                    "[a-z]{0,5}".prop_map(|s| s)
                ]
                .prop_map(OpI::Contains),
                1 => Just(OpI::Iterate),
                1 => Just(OpI::Clear),
            ];
            proptest::collection::vec(op, 1..120)
                .prop_map(move |ops| (capacity, pool.clone(), ops))
        },
    )
}

const RECORDS: usize = 8;

// Property: State-machine equivalence against hashbrown::HashMap.
// Invariants exercised across random operation sequences:
// - Duplicate keys are rejected and the original record survives.
// - `find` returns the exact record reference that was inserted.
// - `remove` returns true iff the model held the key; removed keys vanish.
// - `iter` yields each live key exactly once.
// - After every op: capacity is prime, used slots stay within half the
//   capacity, and the live/tombstone counters agree with a slot census.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((capacity, pool, ops) in arb_scenario()) {
        let records: Vec<u32> = (0..RECORDS as u32).collect();
        let mut sut: HashIndex<String, u32> = HashIndex::with_capacity(capacity);
        let mut model: HashMap<String, usize> = HashMap::new();

        for op in ops {
            match op {
                OpI::Insert(i, r) => {
                    let k = pool[i].clone();
                    let already = model.contains_key(&k);
                    match sut.insert(k.clone(), &records[r]) {
                        Ok(rec) => {
                            prop_assert!(!already, "insert must fail on duplicate");
                            prop_assert!(core::ptr::eq(rec, &records[r]));
                            model.insert(k, r);
                        }
                        Err(InsertError::DuplicateKey) => {
                            prop_assert!(already, "duplicate error only when key exists");
                        }
                    }
                }
                OpI::Remove(i) => {
                    let k = &pool[i];
                    let removed = sut.remove(k.as_str());
                    prop_assert_eq!(removed, model.remove(k).is_some());
                    prop_assert!(sut.find(k.as_str()).is_none());
                }
                OpI::Find(i) => {
                    let k = &pool[i];
                    match (sut.find(k.as_str()), model.get(k)) {
                        (Some(rec), Some(&r)) => prop_assert!(core::ptr::eq(rec, &records[r])),
                        (None, None) => {}
                        (s, m) => prop_assert!(false, "find mismatch: {:?} vs {:?}", s, m),
                    }
                }
                OpI::Contains(s) => {
                    prop_assert_eq!(sut.contains_key(s.as_str()), model.contains_key(&s));
                }
                OpI::Iterate => {
                    let s_keys: Vec<_> = sut.iter().map(|(k, _)| k.clone()).collect();
                    let unique: BTreeSet<_> = s_keys.iter().cloned().collect();
                    prop_assert_eq!(s_keys.len(), unique.len(), "iter yields keys once");
                    let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                    prop_assert_eq!(unique, m_keys);
                }
                OpI::Clear => {
                    let cap = sut.capacity();
                    sut.clear();
                    model.clear();
                    prop_assert_eq!(sut.capacity(), cap);
                }
            }

            // Post-conditions after each op
            prop_assert!(is_prime(sut.capacity()));
            prop_assert!(sut.capacity() >= capacity);
            prop_assert!(sut.used_slots() <= sut.capacity() / 2);
            let (empty, active, deleted) = sut.census();
            prop_assert_eq!(active, sut.len());
            prop_assert_eq!(deleted, sut.tombstones());
            prop_assert!(empty > 0, "an empty slot always terminates probing");
            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.is_empty(), model.is_empty());
        }
    }
}

// Property: growth preserves membership. Every key live before an insert
// that rehashes is findable with its original record afterwards.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_growth_preserves_membership(keys in proptest::collection::btree_set("[a-z]{1,8}", 1..200)) {
        let keys: Vec<String> = keys.into_iter().collect();
        let records: Vec<usize> = (0..keys.len()).collect();
        let mut sut: HashIndex<&str, usize> = HashIndex::with_capacity(2);
        for (i, k) in keys.iter().enumerate() {
            let before = sut.capacity();
            sut.insert(k.as_str(), &records[i]).unwrap();
            if sut.capacity() != before {
                prop_assert!(sut.capacity() >= 2 * before);
                prop_assert_eq!(sut.tombstones(), 0);
            }
            for (j, kk) in keys[..=i].iter().enumerate() {
                let rec = sut.find(kk.as_str());
                prop_assert!(rec.is_some_and(|r| core::ptr::eq(r, &records[j])));
            }
        }
    }
}
