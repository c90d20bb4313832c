//! Allotment Resolver: serial dictatorship over the processing order.
//!
//! Contract:
//! - `students` arrive already in processing order (ascending registration
//!   number); the resolver never reorders.
//! - Each student takes the highest-ranked offering that still has a seat at
//!   their turn. Offerings hold no preferences over students, so this is not a
//!   stable-matching problem; contention is settled by order alone.
//! - Students with no usable list, or whose list is exhausted, are returned
//!   as `Unassigned` in the same order for the fallback stage.
//!
//! Determinism:
//! - No RNG, no hashing; the only state is the ledger.

use alloc::vec::Vec;

use ea_core::entities::{Allotment, OfferingRef};
use ea_core::ids::{StudentId, SubjectId};

use crate::ledger::{CapacityError, CapacityLedger};
use crate::normalize::{NormalizedStudent, UnpreferencedReason};

/// Why a student reached the fallback stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnassignedCause {
    Unpreferenced(UnpreferencedReason),
    /// Every ranked offering was full at the student's turn.
    PreferencesExhausted { tried: Vec<OfferingRef> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unassigned {
    pub student_id: StudentId,
    pub cause: UnassignedCause,
}

/// Resolver output: primary allotments and the students left over, both in processing order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolveOutput {
    pub allotments: Vec<Allotment>,
    pub unassigned: Vec<Unassigned>,
}

/// Walk each student's list in rank order and commit the first free seat.
pub fn resolve_preferences(
    subject: &SubjectId,
    students: &[NormalizedStudent],
    ledger: &mut CapacityLedger,
) -> ResolveOutput {
    let mut out = ResolveOutput::default();

    for s in students {
        if let Some(reason) = &s.unpreferenced {
            out.unassigned.push(Unassigned {
                student_id: s.student_id.clone(),
                cause: UnassignedCause::Unpreferenced(reason.clone()),
            });
            continue;
        }

        match first_free_choice(&s.choices, ledger) {
            Some((offering, rank)) => out.allotments.push(Allotment {
                student_id: s.student_id.clone(),
                subject_id: subject.clone(),
                offering,
                rank: Some(rank),
            }),
            None => out.unassigned.push(Unassigned {
                student_id: s.student_id.clone(),
                cause: UnassignedCause::PreferencesExhausted { tried: s.choices.clone() },
            }),
        }
    }

    out
}

/// Reserve the first choice with a seat; returns it with its 1-based rank.
fn first_free_choice(choices: &[OfferingRef], ledger: &mut CapacityLedger) -> Option<(OfferingRef, u8)> {
    for (i, offering) in choices.iter().enumerate() {
        match ledger.reserve(offering) {
            Ok(()) => return Some((offering.clone(), (i + 1) as u8)),
            // Full, or not admitted to the ledger: try the next rank.
            Err(CapacityError::Exhausted(_) | CapacityError::Unknown(_) | CapacityError::Overflow(_)) => {
                continue
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_all;
    use crate::test_support::{bucket, bref, course, cref, submission};
    use alloc::vec;

    fn subject() -> SubjectId {
        "OE-1".parse().unwrap()
    }

    #[test]
    fn earlier_student_wins_the_scarce_seat() {
        let mut ledger = CapacityLedger::seed(&[course("A", 1, 1), course("B", 1, 1)]).unwrap();
        let subs = vec![submission("s1001", &["A", "B"]), submission("s1002", &["A"])];
        let ids: Vec<StudentId> = vec!["s1001".parse().unwrap(), "s1002".parse().unwrap()];
        let normalized = normalize_all(&ids, &subs, &ledger, 3);

        let out = resolve_preferences(&subject(), &normalized, &mut ledger);
        assert_eq!(out.allotments.len(), 1);
        assert_eq!(out.allotments[0].offering, cref("A"));
        assert_eq!(out.allotments[0].rank, Some(1));
        assert_eq!(
            out.unassigned,
            vec![Unassigned {
                student_id: "s1002".parse().unwrap(),
                cause: UnassignedCause::PreferencesExhausted { tried: vec![cref("A")] },
            }]
        );
        assert_eq!(ledger.remaining(&cref("A")), Some(0));
        assert_eq!(ledger.remaining(&cref("B")), Some(1));
    }

    #[test]
    fn falls_through_to_lower_rank() {
        let mut ledger = CapacityLedger::seed(&[course("A", 1, 0), course("B", 3, 3)]).unwrap();
        let ids: Vec<StudentId> = vec!["s1".parse().unwrap()];
        let normalized = normalize_all(&ids, &[submission("s1", &["A", "B"])], &ledger, 3);

        let out = resolve_preferences(&subject(), &normalized, &mut ledger);
        assert_eq!(out.allotments[0].offering, cref("B"));
        assert_eq!(out.allotments[0].rank, Some(2));
    }

    #[test]
    fn bucket_seats_are_consumed_as_one_unit() {
        let mut ledger = CapacityLedger::seed(&[bucket("G1", 2, 2)]).unwrap();
        let mut subs = Vec::new();
        let mut ids: Vec<StudentId> = Vec::new();
        for id in ["s1", "s2", "s3"] {
            let mut sub = submission(id, &[]);
            sub.choices.push(ea_core::entities::RankedChoice { rank: 1, offering: bref("G1") });
            subs.push(sub);
            ids.push(id.parse().unwrap());
        }
        let normalized = normalize_all(&ids, &subs, &ledger, 3);

        let out = resolve_preferences(&subject(), &normalized, &mut ledger);
        let got: Vec<&str> = out.allotments.iter().map(|a| a.student_id.as_str()).collect();
        assert_eq!(got, vec!["s1", "s2"]);
        assert_eq!(out.unassigned.len(), 1);
        assert_eq!(out.unassigned[0].student_id.as_str(), "s3");
        assert_eq!(ledger.remaining(&bref("G1")), Some(0));
    }

    #[test]
    fn unpreferenced_students_skip_the_resolver() {
        let mut ledger = CapacityLedger::seed(&[course("A", 5, 5)]).unwrap();
        let ids: Vec<StudentId> = vec!["s1".parse().unwrap()];
        let normalized = normalize_all(&ids, &[], &ledger, 3);

        let out = resolve_preferences(&subject(), &normalized, &mut ledger);
        assert!(out.allotments.is_empty());
        assert_eq!(
            out.unassigned[0].cause,
            UnassignedCause::Unpreferenced(UnpreferencedReason::NoSubmission)
        );
        assert_eq!(ledger.remaining(&cref("A")), Some(5));
    }
}
