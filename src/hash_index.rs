//! HashIndex: open-addressed table with double hashing and lazy deletion.

use crate::key::IndexKey;
use crate::prime::next_prime;
use crate::probe::Probe;
use core::borrow::Borrow;
use core::fmt;
use thiserror::Error;

/// Capacity used by `HashIndex::new` and `Default`. Already prime.
pub const DEFAULT_CAPACITY: usize = 977;

/// Number of records `dump` renders when callers have no preference.
pub const DEFAULT_DUMP_LIMIT: usize = 50;

enum Slot<'r, K, R: ?Sized> {
    Empty,
    Active { key: K, record: &'r R },
    Deleted,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InsertError {
    #[error("duplicate key")]
    DuplicateKey,
}

/// Index from keys to records the caller owns.
///
/// Records are stored as `&'r R`; the index never clones or drops them.
/// Removal leaves a tombstone that later inserts may reuse. A rehash
/// happens when live entries plus tombstones exceed half the capacity.
/// It moves to the next prime at or above twice the capacity, or stays
/// at the current capacity when at most a quarter of it is live.
pub struct HashIndex<'r, K, R: ?Sized> {
    slots: Vec<Slot<'r, K, R>>,
    live: usize,
    tombstones: usize,
}

/// Iterator over live entries in slot order.
pub struct Iter<'a, 'r, K, R: ?Sized> {
    it: core::slice::Iter<'a, Slot<'r, K, R>>,
}

impl<'a, 'r, K, R: ?Sized> Iterator for Iter<'a, 'r, K, R> {
    type Item = (&'a K, &'r R);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.find_map(|slot| match slot {
            Slot::Active { key, record } => Some((key, *record)),
            _ => None,
        })
    }
}

fn empty_slots<'r, K, R: ?Sized>(capacity: usize) -> Vec<Slot<'r, K, R>> {
    core::iter::repeat_with(|| Slot::Empty)
        .take(capacity)
        .collect()
}

impl<'r, K, R> HashIndex<'r, K, R>
where
    K: IndexKey,
    R: ?Sized,
{
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an index with at least `capacity` slots, rounded up to a prime.
    pub fn with_capacity(capacity: usize) -> Self {
        let rounded = next_prime(capacity);
        if rounded != capacity {
            tracing::trace!(
                requested = capacity,
                capacity = rounded,
                "rounded HashIndex capacity up to prime"
            );
        }
        Self {
            slots: empty_slots(rounded),
            live: 0,
            tombstones: 0,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.live
    }
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
    /// Number of tombstoned slots awaiting reuse or the next rehash.
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    // Slots that count against the load bound.
    #[inline]
    fn used(&self) -> usize {
        self.live + self.tombstones
    }

    // Position of the live slot holding `q`, if any.
    fn position<Q>(&self, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + IndexKey,
    {
        for pos in Probe::for_key(q.key_bytes(), self.capacity()) {
            match &self.slots[pos] {
                Slot::Empty => return None,
                Slot::Active { key, .. } if key.borrow() == q => return Some(pos),
                Slot::Active { .. } | Slot::Deleted => {}
            }
        }
        None
    }

    pub fn find<Q>(&self, q: &Q) -> Option<&'r R>
    where
        K: Borrow<Q>,
        Q: ?Sized + IndexKey,
    {
        let pos = self.position(q)?;
        match &self.slots[pos] {
            Slot::Active { record, .. } => Some(*record),
            _ => None,
        }
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + IndexKey,
    {
        self.position(q).is_some()
    }

    /// Inserts `key -> record`, returning `record` on success.
    ///
    /// Fails with `DuplicateKey` if `key` is already live; the existing
    /// record stays in place. May rehash, so slot positions are not
    /// stable across inserts (records themselves are never moved).
    pub fn insert(&mut self, key: K, record: &'r R) -> Result<&'r R, InsertError> {
        let mut vacant = None;
        let mut terminal = None;
        for pos in Probe::for_key(key.key_bytes(), self.capacity()) {
            match &self.slots[pos] {
                Slot::Empty => {
                    terminal = Some(pos);
                    break;
                }
                Slot::Active { key: k, .. } if *k == key => {
                    return Err(InsertError::DuplicateKey);
                }
                Slot::Deleted => {
                    if vacant.is_none() {
                        vacant = Some(pos);
                    }
                }
                Slot::Active { .. } => {}
            }
        }

        let pos = match (vacant, terminal) {
            (Some(tomb), _) => {
                self.tombstones -= 1;
                tomb
            }
            (None, Some(empty)) => empty,
            (None, None) => {
                // Every slot probed was live; only reachable if the load
                // bound was broken. Grow and try again.
                self.grow();
                return self.insert(key, record);
            }
        };

        self.slots[pos] = Slot::Active { key, record };
        self.live += 1;
        if self.used() > self.capacity() / 2 {
            self.grow();
        }
        Ok(record)
    }

    /// Tombstones the live slot holding `q`. Returns false if absent.
    pub fn remove<Q>(&mut self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + IndexKey,
    {
        match self.position(q) {
            Some(pos) => {
                self.slots[pos] = Slot::Deleted;
                self.live -= 1;
                self.tombstones += 1;
                true
            }
            None => false,
        }
    }

    /// Resets every slot to empty. Capacity is kept.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = Slot::Empty;
        }
        tracing::trace!(
            capacity = self.capacity(),
            dropped = self.live,
            "cleared HashIndex"
        );
        self.live = 0;
        self.tombstones = 0;
    }

    pub fn iter(&self) -> Iter<'_, 'r, K, R> {
        Iter {
            it: self.slots.iter(),
        }
    }

    // Writes a known-unique entry into the first empty slot of its probe
    // sequence, skipping the duplicate check. Hands the entry back if the
    // sequence has no empty slot.
    fn place(&mut self, key: K, record: &'r R) -> Result<(), (K, &'r R)> {
        let target = Probe::for_key(key.key_bytes(), self.capacity())
            .find(|&pos| matches!(self.slots[pos], Slot::Empty));
        match target {
            Some(pos) => {
                self.slots[pos] = Slot::Active { key, record };
                self.live += 1;
                Ok(())
            }
            None => Err((key, record)),
        }
    }

    // Re-places every live entry into `capacity` fresh slots, dropping
    // tombstones. Doubles again if an entry cannot be placed.
    fn rebuild(&mut self, mut capacity: usize) {
        let mut entries: Vec<(K, &'r R)> =
            take_live(core::mem::take(&mut self.slots)).collect();
        'build: loop {
            self.slots = empty_slots(capacity);
            self.live = 0;
            self.tombstones = 0;
            while let Some((key, record)) = entries.pop() {
                if let Err(entry) = self.place(key, record) {
                    entries.push(entry);
                    entries.extend(take_live(core::mem::take(&mut self.slots)));
                    capacity = next_prime(capacity.saturating_mul(2));
                    continue 'build;
                }
            }
            break;
        }
    }

    // Rehash once used slots pass half the capacity. Moves to
    // next_prime(2 * capacity) unless tombstones dominate, in which case
    // the tombstones are purged at the current capacity.
    fn grow(&mut self) {
        let old_capacity = self.capacity();
        let tombstones_dropped = self.tombstones;
        let target = if self.live <= old_capacity / 4 {
            old_capacity
        } else {
            next_prime(old_capacity.saturating_mul(2))
        };
        self.rebuild(target);
        tracing::debug!(
            old_capacity,
            new_capacity = self.capacity(),
            live = self.live,
            tombstones_dropped,
            "rehashed HashIndex"
        );
    }
}

fn take_live<'r, K, R: ?Sized>(
    slots: Vec<Slot<'r, K, R>>,
) -> impl Iterator<Item = (K, &'r R)> {
    slots.into_iter().filter_map(|slot| match slot {
        Slot::Active { key, record } => Some((key, record)),
        _ => None,
    })
}

impl<'r, K, R> HashIndex<'r, K, R>
where
    K: IndexKey,
    R: ?Sized + fmt::Debug,
{
    /// Debug listing: the capacity, then up to `limit` records in slot order.
    pub fn dump(&self, limit: usize) -> String {
        let mut out = format!("Current size {}\n", self.capacity());
        for (_, record) in self.iter().take(limit) {
            out.push_str(&format!("{:?}\n", record));
        }
        out
    }
}

impl<'r, K, R> Default for HashIndex<'r, K, R>
where
    K: IndexKey,
    R: ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, 'r, K, R> IntoIterator for &'a HashIndex<'r, K, R>
where
    K: IndexKey,
    R: ?Sized,
{
    type Item = (&'a K, &'r R);
    type IntoIter = Iter<'a, 'r, K, R>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'r, K, R: ?Sized> fmt::Debug for HashIndex<'r, K, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashIndex")
            .field("capacity", &self.slots.len())
            .field("len", &self.live)
            .field("tombstones", &self.tombstones)
            .finish()
    }
}

#[cfg(test)]
impl<'r, K, R> HashIndex<'r, K, R>
where
    K: IndexKey,
    R: ?Sized,
{
    // Recount slot states; used by tests to cross-check the counters.
    pub(crate) fn census(&self) -> (usize, usize, usize) {
        self.slots.iter().fold((0, 0, 0), |(e, a, d), s| match s {
            Slot::Empty => (e + 1, a, d),
            Slot::Active { .. } => (e, a + 1, d),
            Slot::Deleted => (e, a, d + 1),
        })
    }

    pub(crate) fn used_slots(&self) -> usize {
        self.used()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prime::is_prime;
    use crate::probe::{primary_hash, step_hash};
    use std::cell::Cell;

    /// Invariant: construction rounds capacity up to a prime and starts empty.
    #[test]
    fn construction_rounds_to_prime() {
        let m: HashIndex<String, i32> = HashIndex::with_capacity(100);
        assert_eq!(m.capacity(), 101);
        assert!(m.is_empty());
        assert_eq!(m.census(), (101, 0, 0));

        let d: HashIndex<String, i32> = HashIndex::default();
        assert_eq!(d.capacity(), DEFAULT_CAPACITY);

        let tiny: HashIndex<String, i32> = HashIndex::with_capacity(0);
        assert_eq!(tiny.capacity(), 2);
    }

    /// Invariant: Duplicate keys are rejected and the original record is kept.
    #[test]
    fn duplicate_insert_rejected() {
        let (one, two) = (1, 2);
        let mut m: HashIndex<String, i32> = HashIndex::new();
        assert_eq!(m.insert("dup".to_string(), &one), Ok(&1));
        assert_eq!(m.insert("dup".to_string(), &two), Err(InsertError::DuplicateKey));
        assert!(core::ptr::eq(m.find("dup").unwrap(), &one));
        assert_eq!(m.len(), 1);
    }

    /// Invariant: remove leaves a tombstone that hides the key from find.
    #[test]
    fn remove_tombstones_slot() {
        let v = 7;
        let mut m: HashIndex<String, i32> = HashIndex::with_capacity(11);
        m.insert("k".to_string(), &v).unwrap();
        assert!(m.remove("k"));
        assert_eq!(m.find("k"), None);
        assert!(!m.contains_key("k"));
        assert_eq!(m.tombstones(), 1);
        assert_eq!(m.census(), (10, 0, 1));
        assert!(!m.remove("k"), "second remove finds nothing");
    }

    /// Invariant: reinserting a removed key reuses its tombstone.
    #[test]
    fn reinsert_reuses_tombstone() {
        let (a, b) = (1, 2);
        let mut m: HashIndex<String, i32> = HashIndex::with_capacity(11);
        m.insert("k".to_string(), &a).unwrap();
        m.remove("k");
        m.insert("k".to_string(), &b).unwrap();
        assert_eq!(m.find("k"), Some(&2));
        assert_eq!(m.tombstones(), 0);
        assert_eq!(m.census(), (10, 1, 0));
    }

    /// Invariant: a find must walk past tombstones to reach later entries of
    /// the same probe chain.
    #[test]
    fn find_skips_tombstones_in_chain() {
        let (a, b) = (1, 2);
        // Two keys sharing an origin on capacity 5: the second is displaced
        // along its chain past the first.
        let origin = |k: &str| primary_hash(k.as_bytes()) as usize % 5;
        let keys: Vec<String> = (0..64).map(|i| format!("w{}", i)).collect();
        let first = keys[0].as_str();
        let second = keys[1..]
            .iter()
            .map(String::as_str)
            .find(|&k| origin(k) == origin(first))
            .expect("some key shares an origin");

        let mut m: HashIndex<&str, i32> = HashIndex::with_capacity(5);
        m.insert(first, &a).unwrap();
        m.insert(second, &b).unwrap();
        assert_eq!(m.capacity(), 5);
        assert!(m.remove(first));
        assert_eq!(m.find(second), Some(&2));
        assert_eq!(m.find(first), None);
    }

    /// Invariant: the table grows once used slots pass half the capacity and
    /// lands on next_prime(2 * capacity).
    #[test]
    fn grows_past_half() {
        let recs: Vec<usize> = (0..3).collect();
        let mut m: HashIndex<String, usize> = HashIndex::with_capacity(5);
        m.insert("a".into(), &recs[0]).unwrap();
        m.insert("b".into(), &recs[1]).unwrap();
        assert_eq!(m.capacity(), 5);
        m.insert("c".into(), &recs[2]).unwrap();
        assert_eq!(m.capacity(), 11);
        for (k, r) in ["a", "b", "c"].iter().zip(&recs) {
            assert!(core::ptr::eq(m.find(*k).unwrap(), r));
        }
        assert!(is_prime(m.capacity()));
    }

    /// Invariant: rehash drops tombstones and keeps only live entries.
    #[test]
    fn rehash_drops_tombstones() {
        let recs: Vec<usize> = (0..4).collect();
        let mut m: HashIndex<String, usize> = HashIndex::with_capacity(7);
        m.insert("a".into(), &recs[0]).unwrap();
        m.insert("b".into(), &recs[1]).unwrap();
        assert!(m.remove("a"));
        // "a", "b", "c", "d" start at slots 6, 0, 1, 2: "c" takes an empty
        // slot (used 3 == 7 / 2) and "d" pushes used to 4.
        m.insert("c".into(), &recs[2]).unwrap();
        assert_eq!(m.capacity(), 7);
        assert_eq!(m.tombstones(), 1);
        m.insert("d".into(), &recs[3]).unwrap();
        assert_eq!(m.capacity(), 17);
        assert_eq!(m.tombstones(), 0);
        assert_eq!(m.len(), 3);
        assert_eq!(m.find("a"), None);
        let (_, active, deleted) = m.census();
        assert_eq!(active, 3);
        assert_eq!(deleted, m.tombstones());
        assert!(m.used_slots() <= m.capacity() / 2);
    }

    /// Invariant: a rehash with mostly tombstones purges them at the same
    /// capacity instead of doubling.
    #[test]
    fn tombstone_heavy_rehash_keeps_capacity() {
        let keys: Vec<String> = (0..500).map(|i| format!("gone{}", i)).collect();
        let keep = 1u8;
        let mut m: HashIndex<&str, u8> = HashIndex::with_capacity(11);
        m.insert("kept", &keep).unwrap();
        for k in &keys {
            m.insert(k.as_str(), &keep).unwrap();
            assert!(m.remove(k.as_str()));
            assert_eq!(m.capacity(), 11);
            assert!(m.used_slots() <= 11 / 2);
        }
        assert_eq!(m.len(), 1);
        assert_eq!(m.find("kept"), Some(&1));
        let (_, active, deleted) = m.census();
        assert_eq!((active, deleted), (1, m.tombstones()));
    }

    /// Invariant: place hands an entry back instead of panicking when its
    /// probe sequence has no empty slot.
    #[test]
    fn place_returns_entry_when_full() {
        let v = 0;
        let mut m: HashIndex<&str, i32> = HashIndex::with_capacity(2);
        assert!(m.place("a", &v).is_ok());
        assert!(m.place("b", &v).is_ok());
        match m.place("c", &v) {
            Err((key, rec)) => {
                assert_eq!(key, "c");
                assert!(core::ptr::eq(rec, &v));
            }
            Ok(()) => panic!("a full table cannot take another entry"),
        }
        assert_eq!(m.len(), 2);
    }

    /// Invariant: a rebuild too small for the live entries keeps doubling
    /// until every entry is placed.
    #[test]
    fn rebuild_escalates_when_too_small() {
        let recs: Vec<u8> = (0..3).collect();
        let mut m: HashIndex<String, u8> = HashIndex::with_capacity(7);
        for (i, r) in recs.iter().enumerate() {
            m.insert(format!("k{}", i), r).unwrap();
        }
        assert_eq!(m.capacity(), 7);
        m.rebuild(2);
        assert_eq!(m.capacity(), 5);
        assert_eq!(m.len(), 3);
        for (i, r) in recs.iter().enumerate() {
            assert!(core::ptr::eq(m.find(format!("k{}", i).as_str()).unwrap(), r));
        }
    }

    /// Invariant: churn on one key never grows the table.
    #[test]
    fn churn_on_one_key_does_not_grow() {
        let v = 0u8;
        let mut m: HashIndex<String, u8> = HashIndex::with_capacity(7);
        for _ in 0..1_000 {
            m.insert("same".into(), &v).unwrap();
            assert!(m.remove("same"));
        }
        assert_eq!(m.capacity(), 7);
        assert!(m.is_empty());
        assert_eq!(m.tombstones(), 1);
    }

    /// Invariant: the empty key is a valid key.
    #[test]
    fn empty_key_round_trips() {
        let v = 3;
        let mut m: HashIndex<String, i32> = HashIndex::new();
        m.insert(String::new(), &v).unwrap();
        assert_eq!(m.find(""), Some(&3));
        assert_eq!(step_hash(b""), crate::probe::STEP_MODULUS);
    }

    /// Invariant: clear empties every slot but keeps the grown capacity.
    #[test]
    fn clear_keeps_capacity() {
        let recs: Vec<u32> = (0..10).collect();
        let mut m: HashIndex<String, u32> = HashIndex::with_capacity(3);
        for (i, r) in recs.iter().enumerate() {
            m.insert(format!("k{}", i), r).unwrap();
        }
        m.remove("k0");
        let cap = m.capacity();
        m.clear();
        assert!(m.is_empty());
        assert_eq!(m.capacity(), cap);
        assert_eq!(m.census(), (cap, 0, 0));
        assert_eq!(m.find("k1"), None);
    }

    /// Invariant: records with interior mutability can be updated through
    /// the references the index hands back.
    #[test]
    fn records_mutate_through_cells() {
        let counter = Cell::new(0u32);
        let mut m: HashIndex<&str, Cell<u32>> = HashIndex::new();
        m.insert("the", &counter).unwrap();
        for _ in 0..3 {
            let c = m.find("the").unwrap();
            c.set(c.get() + 1);
        }
        assert_eq!(counter.get(), 3);
    }

    /// Invariant: unsized records are stored by reference.
    #[test]
    fn unsized_records() {
        let line: &str = "shall I compare thee";
        let mut m: HashIndex<String, str> = HashIndex::new();
        m.insert("sonnet".into(), line).unwrap();
        assert_eq!(m.find("sonnet"), Some("shall I compare thee"));
    }

    /// Invariant: dump shows the capacity and at most `limit` records.
    #[test]
    fn dump_respects_limit() {
        let recs: Vec<u32> = (0..5).collect();
        let mut m: HashIndex<String, u32> = HashIndex::with_capacity(31);
        for (i, r) in recs.iter().enumerate() {
            m.insert(format!("k{}", i), r).unwrap();
        }
        let full = m.dump(DEFAULT_DUMP_LIMIT);
        let mut lines = full.lines();
        assert_eq!(lines.next(), Some("Current size 31"));
        assert_eq!(lines.count(), 5);

        let short = m.dump(2);
        assert_eq!(short.lines().count(), 3);
        assert_eq!(m.dump(0), "Current size 31\n");
    }

    /// Invariant: Debug summarizes counters without requiring K/R: Debug.
    #[test]
    fn debug_summary() {
        struct Opaque;
        let o = Opaque;
        let mut m: HashIndex<String, Opaque> = HashIndex::with_capacity(13);
        m.insert("x".into(), &o).unwrap();
        assert_eq!(
            format!("{:?}", m),
            "HashIndex { capacity: 13, len: 1, tombstones: 0 }"
        );
    }
}
