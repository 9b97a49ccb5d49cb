// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Open-addressing hash table with a perturbed probe sequence.
//!
//! Keys are stored directly in the slot array (no chaining). Collisions are
//! resolved by walking a deterministic, hash-derived sequence of candidate
//! slots:
//!
//! ```text
//! index = hash; perturb = hash;
//! loop {
//!     slot = index & mask;
//!     index = index * 5 + perturb + 1;   // wrapping
//!     perturb >>= 5;
//! }
//! ```
//!
//! Once `perturb` reaches zero the recurrence `index = index * 5 + 1`
//! (mod capacity) has full period, so the walk visits every slot and always
//! terminates at an empty one. The high bits of the hash feed in through
//! `perturb` early on, which breaks up the clustering a fixed stride would
//! produce. The same sequence is walked on insert and on lookup, so every
//! inserted key stays reachable.
//!
//! The table is append-only and never shrinks. After an insert pushes
//! occupancy past 2/3 of capacity, the table grows to four times the used
//! count (minimum 24, rounded up to a power of two) and every existing
//! entry is re-probed under the new mask. `index & mask` is only a valid
//! fold when capacity is a power of two, so every computed capacity is
//! rounded up before `mask` is derived.

use crate::error::Error;
use crate::registry::Constructor;
use std::rc::Rc;

/// Capacity when no sizing hint is given.
const DEFAULT_CAPACITY: u64 = 64;

/// Capacity for hints too small to be worth honoring exactly.
const MIN_HINTED_CAPACITY: u64 = 8;

/// Smallest capacity a growth event may produce.
const GROWTH_FLOOR: u64 = 24;

/// Upper bound on capacity, so sizing arithmetic cannot overflow.
const MAX_CAPACITY: u64 = 1 << 31;

/// How many bits of `perturb` are consumed per probe step.
const PERTURB_SHIFT: u32 = 5;

/// The stored record for one registered key.
///
/// At least one of `constructor` and `instance` is populated from
/// construction onward; both are populated once a constructor-bound entry
/// has been built.
pub(crate) struct Entry<T> {
    /// Original identifier, for exact-match verification after a hash
    /// collision.
    key: Box<str>,
    /// Cached hash of `key`, so probing never rehashes.
    hash: u32,
    constructor: Option<Constructor<T>>,
    instance: Option<Rc<T>>,
}

impl<T> Entry<T> {
    /// Builds an entry, rejecting the nothing-to-bind case.
    pub(crate) fn new(
        key: &str,
        hash: u32,
        constructor: Option<Constructor<T>>,
        instance: Option<Rc<T>>,
    ) -> Result<Self, Error> {
        if constructor.is_none() && instance.is_none() {
            return Err(Error::InvalidPayload(key.to_owned()));
        }
        Ok(Self {
            key: key.into(),
            hash,
            constructor,
            instance,
        })
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn constructor(&self) -> Option<&Constructor<T>> {
        self.constructor.as_ref()
    }

    pub(crate) fn instance(&self) -> Option<&Rc<T>> {
        self.instance.as_ref()
    }

    pub(crate) fn set_instance(&mut self, instance: Rc<T>) {
        self.instance = Some(instance);
    }
}

/// The slot array plus the bookkeeping needed to probe it.
pub(crate) struct Table<T> {
    slots: Box<[Option<Entry<T>>]>,
    /// `capacity - 1`; capacity is always a power of two.
    mask: u32,
    /// Number of occupied slots.
    used: u32,
}

/// Initial capacity for a sizing hint, rounded up to a power of two.
fn initial_capacity(hint: Option<u32>) -> u64 {
    let raw = match hint {
        None => DEFAULT_CAPACITY,
        Some(h) if h < 6 => MIN_HINTED_CAPACITY,
        Some(h) => u64::from(h) * 3 / 2 + 2,
    };
    raw.next_power_of_two().min(MAX_CAPACITY)
}

fn empty_slots<T>(capacity: usize) -> Box<[Option<Entry<T>>]> {
    std::iter::repeat_with(|| None).take(capacity).collect()
}

impl<T> Table<T> {
    pub(crate) fn with_hint(hint: Option<u32>) -> Self {
        let capacity = initial_capacity(hint);
        Self {
            slots: empty_slots(capacity as usize),
            mask: (capacity - 1) as u32,
            used: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.used as usize
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Walks the probe sequence for `hash`, stopping at the slot holding
    /// `key` or at the first empty slot. Termination relies on the growth
    /// policy keeping at least one slot empty.
    fn find_slot(&self, hash: u32, key: &str) -> usize {
        let mut index = hash;
        let mut perturb = hash;
        loop {
            let slot = (index & self.mask) as usize;
            match &self.slots[slot] {
                None => return slot,
                Some(entry) if entry.hash == hash && entry.key() == key => return slot,
                Some(_) => {
                    index = index
                        .wrapping_mul(5)
                        .wrapping_add(perturb)
                        .wrapping_add(1);
                    perturb >>= PERTURB_SHIFT;
                }
            }
        }
    }

    /// Pure lookup; never mutates a slot.
    pub(crate) fn lookup(&self, hash: u32, key: &str) -> Option<&Entry<T>> {
        self.slots[self.find_slot(hash, key)].as_ref()
    }

    pub(crate) fn lookup_mut(&mut self, hash: u32, key: &str) -> Option<&mut Entry<T>> {
        let slot = self.find_slot(hash, key);
        self.slots[slot].as_mut()
    }

    /// Inserts a new entry. Fails without touching the table if the key is
    /// already present.
    pub(crate) fn insert(&mut self, entry: Entry<T>) -> Result<(), Error> {
        let slot = self.find_slot(entry.hash, &entry.key);
        if self.slots[slot].is_some() {
            return Err(Error::DuplicateKey(entry.key.into()));
        }
        self.slots[slot] = Some(entry);
        self.used += 1;
        self.maybe_grow();
        Ok(())
    }

    /// Grows once occupancy exceeds 2/3 of capacity (682/1024 is the
    /// integer approximation). Every existing entry is re-probed under the
    /// new mask; appending bare slots would change which hash bits the mask
    /// selects and strand entries placed under the old one.
    fn maybe_grow(&mut self) {
        let capacity = self.slots.len() as u64;
        if u64::from(self.used) <= capacity * 682 / 1024 {
            return;
        }

        let mut target = u64::from(self.used) * 4;
        while target < GROWTH_FLOOR {
            target *= 2;
        }
        let target = target.next_power_of_two().min(MAX_CAPACITY);

        let old = std::mem::replace(&mut self.slots, empty_slots(target as usize));
        self.mask = (target - 1) as u32;
        for entry in Vec::from(old).into_iter().flatten() {
            let slot = self.find_slot(entry.hash, &entry.key);
            self.slots[slot] = Some(entry);
        }
        log::trace!(
            "registry table grew from {capacity} to {target} slots ({} used)",
            self.used
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::fnv1a_32;
    use crate::registry::Registry;

    fn value_entry(key: &str, value: u32) -> Entry<u32> {
        Entry::new(key, fnv1a_32(key), None, Some(Rc::new(value))).unwrap()
    }

    #[test]
    fn entry_requires_constructor_or_instance() {
        let err = Entry::<u32>::new("empty", fnv1a_32("empty"), None, None)
            .err()
            .unwrap();
        assert_eq!(err, Error::InvalidPayload("empty".into()));

        let constructor: Constructor<u32> = Rc::new(|_: &Registry<u32>| 7);
        assert!(Entry::new("ok", fnv1a_32("ok"), Some(constructor), None).is_ok());
    }

    #[test]
    fn initial_capacity_is_a_power_of_two() {
        assert_eq!(initial_capacity(None), 64);
        assert_eq!(initial_capacity(Some(0)), 8);
        assert_eq!(initial_capacity(Some(5)), 8);
        // (6*3)/2 + 2 = 11, rounded up.
        assert_eq!(initial_capacity(Some(6)), 16);
        // (100*3)/2 + 2 = 152, rounded up.
        assert_eq!(initial_capacity(Some(100)), 256);
        for hint in 0..1000 {
            assert!(initial_capacity(Some(hint)).is_power_of_two());
        }
    }

    #[test]
    fn insert_then_lookup() {
        let mut table = Table::with_hint(None);
        table.insert(value_entry("alpha", 1)).unwrap();
        table.insert(value_entry("beta", 2)).unwrap();

        let entry = table.lookup(fnv1a_32("alpha"), "alpha").unwrap();
        assert_eq!(entry.key(), "alpha");
        assert_eq!(**entry.instance().unwrap(), 1);
        assert!(table.lookup(fnv1a_32("gamma"), "gamma").is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn duplicate_insert_rejected_without_mutation() {
        let mut table = Table::with_hint(None);
        table.insert(value_entry("alpha", 1)).unwrap();

        let err = table.insert(value_entry("alpha", 2)).unwrap_err();
        assert_eq!(err, Error::DuplicateKey("alpha".into()));
        assert_eq!(table.len(), 1);

        let entry = table.lookup(fnv1a_32("alpha"), "alpha").unwrap();
        assert_eq!(**entry.instance().unwrap(), 1);
    }

    #[test]
    fn growth_triggers_past_two_thirds() {
        // Capacity 8 has a growth threshold of 8 * 682 / 1024 = 5.
        let mut table = Table::with_hint(Some(0));
        assert_eq!(table.capacity(), 8);

        for i in 0..5u32 {
            table.insert(value_entry(&format!("key_{i}"), i)).unwrap();
        }
        assert_eq!(table.capacity(), 8);

        // Sixth insert exceeds the threshold: target = 6 * 4 = 24,
        // rounded up to 32.
        table.insert(value_entry("key_5", 5)).unwrap();
        assert_eq!(table.capacity(), 32);
    }

    #[test]
    fn growth_rehashes_every_entry() {
        let mut table = Table::with_hint(Some(0));
        let n = 300u32;
        for i in 0..n {
            table.insert(value_entry(&format!("service_{i:03}"), i)).unwrap();
        }

        assert!(table.capacity().is_power_of_two());
        assert!(table.capacity() > 8);
        assert_eq!(table.len(), n as usize);

        for i in 0..n {
            let key = format!("service_{i:03}");
            let entry = table.lookup(fnv1a_32(&key), &key).unwrap();
            assert_eq!(entry.key(), key);
            assert_eq!(**entry.instance().unwrap(), i);
        }
    }

    #[test]
    fn colliding_hashes_are_broken_by_key_comparison() {
        // Force a full-hash collision by inserting two entries that share a
        // fabricated hash value; the key string must disambiguate.
        let mut table = Table::with_hint(None);
        let hash = 0xdead_beef;
        table
            .insert(Entry::new("first", hash, None, Some(Rc::new(1u32))).unwrap())
            .unwrap();
        table
            .insert(Entry::new("second", hash, None, Some(Rc::new(2u32))).unwrap())
            .unwrap();

        assert_eq!(**table.lookup(hash, "first").unwrap().instance().unwrap(), 1);
        assert_eq!(**table.lookup(hash, "second").unwrap().instance().unwrap(), 2);
        assert!(table.lookup(hash, "third").is_none());
    }
}
