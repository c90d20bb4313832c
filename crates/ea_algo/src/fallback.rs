//! Pending/Fallback Assigner: least-selections-first placement.
//!
//! Contract:
//! - Runs after the resolver, over students it left unassigned (or over the
//!   unprocessed set of a pending run), in the order given.
//! - Each student takes the admitted offering with the smallest committed
//!   count that still has a seat; ties go to the smaller `OfferingRef`
//!   (courses before buckets, then id ascending).
//! - `committed = total - remaining`, so seats taken by earlier runs count.
//! - Allotments carry `rank = None`.
//! - Once no offering has a seat, every remaining student is unallottable.
//!   That is a reported outcome, not an error.

use alloc::collections::BinaryHeap;
use alloc::vec::Vec;
use core::cmp::Reverse;

use ea_core::entities::{Allotment, OfferingRef};
use ea_core::ids::{StudentId, SubjectId};
use ea_core::variables::FallbackPolicy;

use crate::ledger::CapacityLedger;

/// Fallback output, in processing order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FallbackOutput {
    pub allotments: Vec<Allotment>,
    pub unallottable: Vec<StudentId>,
}

/// Min-heap over `(committed, offering)`.
type LoadHeap = BinaryHeap<Reverse<(u32, OfferingRef)>>;

fn build_heap(ledger: &CapacityLedger) -> LoadHeap {
    ledger
        .entries()
        .filter(|e| e.remaining_seats > 0)
        .map(|e| Reverse((e.committed(), e.offering.clone())))
        .collect()
}

/// Place each student into the least-filled offering with a free seat.
pub fn assign_least_filled(
    subject: &SubjectId,
    students: &[StudentId],
    ledger: &mut CapacityLedger,
    policy: FallbackPolicy,
) -> FallbackOutput {
    let mut out = FallbackOutput::default();

    if policy == FallbackPolicy::Disabled {
        out.unallottable = students.to_vec();
        return out;
    }

    let mut heap = build_heap(ledger);

    for student in students {
        match take_least_filled(&mut heap, ledger) {
            Some(offering) => out.allotments.push(Allotment {
                student_id: student.clone(),
                subject_id: subject.clone(),
                offering,
                rank: None,
            }),
            None => out.unallottable.push(student.clone()),
        }
    }

    out
}

/// Pop until a reservation succeeds; re-push the offering while it has seats.
fn take_least_filled(heap: &mut LoadHeap, ledger: &mut CapacityLedger) -> Option<OfferingRef> {
    while let Some(Reverse((_, offering))) = heap.pop() {
        if ledger.reserve(&offering).is_err() {
            continue;
        }
        if let (Some(remaining), Some(committed)) = (ledger.remaining(&offering), ledger.committed(&offering)) {
            if remaining > 0 {
                heap.push(Reverse((committed, offering.clone())));
            }
        }
        return Some(offering);
    }
    None
}
