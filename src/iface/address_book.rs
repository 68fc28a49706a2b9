//! Address table mapping IPv4 addresses to the interface that owns them.
//!
//! Open addressing with linear probing over a power-of-two slot array. The
//! table is sized once, from the number of interfaces, to at least 1.5 times
//! that count and never grows. Entries are inserted once and never updated;
//! the only removal is [`AddressBook::clear`] at fabric teardown.

use std::net::Ipv4Addr;

use super::InterfaceId;

/// Multiplier of the 32-bit multiplicative hash (2^32 / golden ratio).
const GOLDEN_RATIO_32: u32 = 0x61C8_8647;

/// Errors returned by [`AddressBook::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InsertError {
    #[error("address already present")]
    Duplicate,
    #[error("no free slot among {capacity} slots")]
    Full { capacity: usize },
}

/// One occupied slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressEntry {
    pub ip: u32,
    pub owner: InterfaceId,
}

#[derive(Debug)]
pub struct AddressBook {
    slots: Vec<Option<AddressEntry>>,
    bits: u32,
    len: usize,
}

impl AddressBook {
    /// Create a table for `expected` addresses.
    ///
    /// Capacity is `ceil(1.5 * expected)` rounded up to a power of two.
    pub fn with_expected(expected: usize) -> Self {
        let wanted = expected.saturating_mul(3).div_ceil(2).max(1);
        let capacity = wanted.next_power_of_two();
        AddressBook {
            slots: vec![None; capacity],
            bits: capacity.trailing_zeros(),
            len: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn bits(&self) -> u32 {
        self.bits
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Home slot of `ip`: the top `bits` bits of the multiplicative hash.
    fn home(&self, ip: u32) -> usize {
        if self.bits == 0 {
            return 0;
        }
        (ip.wrapping_mul(GOLDEN_RATIO_32) >> (32 - self.bits)) as usize
    }

    /// Slots visited for `ip`, in probe order, at most `capacity` of them.
    fn probe(&self, ip: u32) -> impl Iterator<Item = usize> {
        let start = self.home(ip);
        let mask = self.capacity() - 1;
        (0..self.capacity()).map(move |step| (start + step) & mask)
    }

    /// Insert `ip` owned by `owner`, returning the slot it landed in.
    ///
    /// An existing entry for `ip` is never overwritten.
    pub fn insert(&mut self, ip: Ipv4Addr, owner: InterfaceId) -> Result<usize, InsertError> {
        let key = u32::from(ip);
        let mut free = None;
        for slot in self.probe(key) {
            match self.slots[slot] {
                Some(entry) if entry.ip == key => return Err(InsertError::Duplicate),
                Some(_) => continue,
                None => {
                    free = Some(slot);
                    break;
                }
            }
        }

        let slot = free.ok_or(InsertError::Full {
            capacity: self.capacity(),
        })?;
        self.slots[slot] = Some(AddressEntry { ip: key, owner });
        self.len += 1;
        tracing::trace!(%ip, %owner, slot, home = self.home(key), "address inserted");
        Ok(slot)
    }

    /// Find the interface owning `ip`.
    #[must_use]
    pub fn lookup(&self, ip: Ipv4Addr) -> Option<InterfaceId> {
        let key = u32::from(ip);
        for slot in self.probe(key) {
            match self.slots[slot] {
                Some(entry) if entry.ip == key => return Some(entry.owner),
                Some(_) => continue,
                None => return None,
            }
        }
        None
    }

    /// Occupied entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &AddressEntry> {
        self.slots.iter().flatten()
    }

    /// Remove every entry, keeping the capacity.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.len = 0;
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn every_inserted_address_is_found(
            addrs in proptest::collection::hash_set(any::<u32>(), 1..64),
        ) {
            let addrs: Vec<u32> = addrs.into_iter().collect();
            let mut book = AddressBook::with_expected(addrs.len());
            for (i, a) in addrs.iter().enumerate() {
                prop_assert!(book.insert(Ipv4Addr::from(*a), InterfaceId(i)).is_ok());
            }
            for (i, a) in addrs.iter().enumerate() {
                prop_assert_eq!(book.lookup(Ipv4Addr::from(*a)), Some(InterfaceId(i)));
            }
            prop_assert_eq!(book.len(), addrs.len());
        }

        #[test]
        fn reinserting_any_address_fails(
            addrs in proptest::collection::hash_set(any::<u32>(), 1..32),
        ) {
            let addrs: Vec<u32> = addrs.into_iter().collect();
            let mut book = AddressBook::with_expected(addrs.len());
            for (i, a) in addrs.iter().enumerate() {
                book.insert(Ipv4Addr::from(*a), InterfaceId(i)).unwrap();
            }
            for a in &addrs {
                prop_assert_eq!(
                    book.insert(Ipv4Addr::from(*a), InterfaceId(usize::MAX)),
                    Err(InsertError::Duplicate)
                );
            }
            let owners: HashSet<InterfaceId> = book.iter().map(|e| e.owner).collect();
            prop_assert_eq!(owners.len(), addrs.len());
        }

        #[test]
        fn absent_addresses_are_not_found(
            addrs in proptest::collection::hash_set(any::<u32>(), 1..32),
            probe in any::<u32>(),
        ) {
            prop_assume!(!addrs.contains(&probe));
            let mut book = AddressBook::with_expected(addrs.len());
            for (i, a) in addrs.iter().enumerate() {
                book.insert(Ipv4Addr::from(*a), InterfaceId(i)).unwrap();
            }
            prop_assert_eq!(book.lookup(Ipv4Addr::from(probe)), None);
        }
    }
}
