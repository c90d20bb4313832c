//! Capacity Ledger: total and remaining seats per offering for one run.
//!
//! Contract:
//! - Seeded once from the offerings snapshot; every offering must appear
//!   exactly once and `available_seats <= total_seats`.
//! - Only *active* offerings are admitted. Withdrawn offerings are known to the
//!   snapshot but absent from the ledger, which is how the normalizer prunes them.
//! - `reserve` is the single admission decision: check `remaining > 0`, then
//!   decrement. `remaining` never goes negative and never exceeds `total`.
//!
//! Determinism:
//! - Entries are keyed by `OfferingRef` in a `BTreeMap`; iteration is canonical.

use alloc::collections::BTreeMap;
use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::fmt;

use ea_core::entities::{Offering, OfferingRef};

/// One ledger row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerEntry {
    pub offering: OfferingRef,
    pub total_seats: u32,
    pub remaining_seats: u32,
}

impl LedgerEntry {
    /// Seats already taken (by this run or earlier ones).
    #[inline]
    pub fn committed(&self) -> u32 {
        self.total_seats - self.remaining_seats
    }
}

/// Seeding failures. These indicate an inconsistent snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerError {
    DuplicateOffering(OfferingRef),
    AvailableExceedsTotal {
        offering: OfferingRef,
        total: u32,
        available: u32,
    },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::DuplicateOffering(r) => write!(f, "offering {r} appears more than once"),
            LedgerError::AvailableExceedsTotal { offering, total, available } => write!(
                f,
                "offering {offering} has {available} available seats but only {total} total"
            ),
        }
    }
}

/// Admission failures. `Exhausted` is expected and handled by falling through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CapacityError {
    Exhausted(OfferingRef),
    Unknown(OfferingRef),
    /// `release` would raise remaining seats above total.
    Overflow(OfferingRef),
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityError::Exhausted(r) => write!(f, "no seats remain in {r}"),
            CapacityError::Unknown(r) => write!(f, "offering {r} is not in the ledger"),
            CapacityError::Overflow(r) => write!(f, "release on {r} exceeds total seats"),
        }
    }
}

/// Run-scoped seat ledger. Owned by exactly one run and handed back by value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapacityLedger {
    entries: BTreeMap<OfferingRef, LedgerEntry>,
}

impl CapacityLedger {
    /// Seed from the offerings snapshot (all offerings are checked, active ones admitted).
    pub fn seed(offerings: &[Offering]) -> Result<Self, LedgerError> {
        let mut seen: BTreeSet<OfferingRef> = BTreeSet::new();
        let mut entries = BTreeMap::new();

        for o in offerings {
            let r = o.offering_ref();
            if !seen.insert(r.clone()) {
                return Err(LedgerError::DuplicateOffering(r));
            }
            if o.available_seats() > o.total_seats() {
                return Err(LedgerError::AvailableExceedsTotal {
                    offering: r,
                    total: o.total_seats(),
                    available: o.available_seats(),
                });
            }
            if !o.is_active() {
                continue;
            }
            entries.insert(
                r.clone(),
                LedgerEntry {
                    offering: r,
                    total_seats: o.total_seats(),
                    remaining_seats: o.available_seats(),
                },
            );
        }

        Ok(Self { entries })
    }

    /// Take one seat. Fails without side effects when none remain.
    pub fn reserve(&mut self, offering: &OfferingRef) -> Result<(), CapacityError> {
        let e = self
            .entries
            .get_mut(offering)
            .ok_or_else(|| CapacityError::Unknown(offering.clone()))?;
        if e.remaining_seats == 0 {
            return Err(CapacityError::Exhausted(offering.clone()));
        }
        e.remaining_seats -= 1;
        Ok(())
    }

    /// Give one seat back. A run never calls this; reservations are permanent within a run.
    pub fn release(&mut self, offering: &OfferingRef) -> Result<(), CapacityError> {
        let e = self
            .entries
            .get_mut(offering)
            .ok_or_else(|| CapacityError::Unknown(offering.clone()))?;
        if e.remaining_seats >= e.total_seats {
            return Err(CapacityError::Overflow(offering.clone()));
        }
        e.remaining_seats += 1;
        Ok(())
    }

    #[inline]
    pub fn contains(&self, offering: &OfferingRef) -> bool {
        self.entries.contains_key(offering)
    }

    pub fn remaining(&self, offering: &OfferingRef) -> Option<u32> {
        self.entries.get(offering).map(|e| e.remaining_seats)
    }

    pub fn committed(&self, offering: &OfferingRef) -> Option<u32> {
        self.entries.get(offering).map(LedgerEntry::committed)
    }

    /// Sum of remaining seats across all admitted offerings.
    pub fn total_remaining(&self) -> u64 {
        self.entries.values().map(|e| e.remaining_seats as u64).sum()
    }

    /// Entries in canonical `OfferingRef` order.
    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hand the final ledger back to the caller (canonical order).
    pub fn into_entries(self) -> Vec<LedgerEntry> {
        self.entries.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bucket, course};
    use alloc::vec;

    #[test]
    fn seed_then_reserve_until_exhausted() {
        let mut l = CapacityLedger::seed(&[course("A", 2, 2)]).unwrap();
        let a = OfferingRef::Course("A".parse().unwrap());
        assert_eq!(l.remaining(&a), Some(2));
        l.reserve(&a).unwrap();
        l.reserve(&a).unwrap();
        assert_eq!(l.reserve(&a), Err(CapacityError::Exhausted(a.clone())));
        assert_eq!(l.remaining(&a), Some(0));
        assert_eq!(l.committed(&a), Some(2));
    }

    #[test]
    fn committed_counts_seats_taken_before_the_run() {
        let l = CapacityLedger::seed(&[course("A", 10, 7)]).unwrap();
        assert_eq!(l.committed(&OfferingRef::Course("A".parse().unwrap())), Some(3));
    }

    #[test]
    fn inactive_offerings_are_known_but_not_admitted() {
        let mut withdrawn = course("Z", 5, 5);
        if let Offering::Course(c) = &mut withdrawn {
            c.active = false;
        }
        let l = CapacityLedger::seed(&[course("A", 1, 1), withdrawn]).unwrap();
        assert_eq!(l.len(), 1);
        assert!(!l.contains(&OfferingRef::Course("Z".parse().unwrap())));
    }

    #[test]
    fn seed_rejects_duplicates_and_overfull() {
        let dup = CapacityLedger::seed(&[course("A", 1, 1), course("A", 2, 2)]);
        assert!(matches!(dup, Err(LedgerError::DuplicateOffering(_))));

        let over = CapacityLedger::seed(&[bucket("G1", 2, 3)]);
        assert!(matches!(over, Err(LedgerError::AvailableExceedsTotal { total: 2, available: 3, .. })));
    }

    #[test]
    fn course_and_bucket_ids_do_not_collide() {
        let l = CapacityLedger::seed(&[course("X", 1, 1), bucket("X", 4, 4)]).unwrap();
        assert_eq!(l.len(), 2);
        assert_eq!(l.total_remaining(), 5);
    }

    #[test]
    fn release_restores_but_never_above_total() {
        let mut l = CapacityLedger::seed(&[course("A", 1, 1)]).unwrap();
        let a = OfferingRef::Course("A".parse().unwrap());
        assert_eq!(l.release(&a), Err(CapacityError::Overflow(a.clone())));
        l.reserve(&a).unwrap();
        l.release(&a).unwrap();
        assert_eq!(l.remaining(&a), Some(1));
    }

    #[test]
    fn unknown_offering_is_reported() {
        let mut l = CapacityLedger::seed(&[]).unwrap();
        let b = OfferingRef::Bucket("nope".parse().unwrap());
        assert_eq!(l.reserve(&b), Err(CapacityError::Unknown(b)));
    }

    #[test]
    fn into_entries_is_canonical() {
        let l = CapacityLedger::seed(&[bucket("B", 1, 1), course("Z", 1, 1), course("A", 1, 1)]).unwrap();
        let order: Vec<OfferingRef> = l.into_entries().into_iter().map(|e| e.offering).collect();
        assert_eq!(
            order,
            vec![
                OfferingRef::Course("A".parse().unwrap()),
                OfferingRef::Course("Z".parse().unwrap()),
                OfferingRef::Bucket("B".parse().unwrap()),
            ]
        );
    }
}
