//! probe-index: an open-addressed, double-hashed index from string-like
//! keys to records owned by the caller.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a small associative index whose probing, growth and deletion
//!   rules are explicit and checkable, rather than hidden behind a
//!   general-purpose map.
//! - Pieces:
//!   - `HashIndex<'r, K, R>`: the slot array plus counters. Owns its
//!     slots; stores `&'r R` borrowed from the caller.
//!   - `probe`: the two hash functions and the `Probe` sequence.
//!   - `prime`: capacity rounding.
//!   - `key::IndexKey`: the byte view both hashes consume.
//!
//! Constraints
//! - Single-threaded and synchronous; mutation needs `&mut self`.
//! - Records are never cloned, moved or dropped by the index. The borrow
//!   checker keeps every stored reference valid for `'r`.
//! - Unique keys; duplicate inserts fail with `InsertError::DuplicateKey`.
//! - Capacity is always prime, so any non-zero step reaches every slot.
//!
//! Probing
//! - Origin: `primary_hash(key) mod capacity`, where `primary_hash` folds
//!   `h = (h << 7) ^ b ^ h` over the key bytes.
//! - Step: `44497 - (h mod 44497)` with `h = 29h + b`, reduced mod
//!   capacity (0 becomes 1).
//! - A search stops at the first `Empty` slot or a live equal key and
//!   walks through tombstones. At most `capacity` slots are probed.
//!
//! Deletion and growth
//! - `remove` tombstones the slot. Inserts reuse the first tombstone on
//!   the key's probe path, after confirming the key is not live further
//!   along.
//! - Live entries and tombstones both count toward the load bound:
//!   once `live + tombstones > capacity / 2` the table rehashes,
//!   re-placing live entries and dropping tombstones. This keeps at least
//!   half the slots empty, so every probe terminates, while
//!   `len`/`is_empty` report live entries.
//! - A rehash moves to `next_prime(2 * capacity)` slots unless at most a
//!   quarter of the capacity is live; then the tombstones are purged at
//!   the current capacity. Insert/remove churn of distinct keys therefore
//!   never grows the table.
//! - The table never shrinks.
//!
//! Notes and non-goals
//! - No persistence, no concurrent access, no ordered iteration, no
//!   compaction other than rehash.
//! - `iter` walks slots in storage order.
//! - Rehash events are reported through `tracing` at debug level.

pub mod hash_index;
mod hash_index_proptest;
pub mod key;
pub mod prime;
pub mod probe;

// Public surface
pub use hash_index::{HashIndex, InsertError, Iter, DEFAULT_CAPACITY, DEFAULT_DUMP_LIMIT};
pub use key::IndexKey;
