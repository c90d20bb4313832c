//! Preference Normalizer: raw submissions → rank-compacted choice lists.
//!
//! Per student:
//! 1. Structural checks on the raw submission. Any failure degrades the
//!    student to *unpreferenced* (fallback only); it never aborts the run.
//! 2. Prune choices whose offering is not in the ledger (withdrawn offerings).
//! 3. Compact ranks to 1..k. Zero survivors → unpreferenced.
//!
//! The output list is in the caller's student order, so handing the
//! processing order in here keeps every later stage aligned with it.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use core::fmt;

use ea_core::entities::{OfferingRef, PreferenceSubmission};
use ea_core::ids::StudentId;

use crate::ledger::CapacityLedger;

/// Malformed raw submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Same offering listed at two ranks.
    DuplicateOffering(OfferingRef),
    /// Two choices share a rank.
    DuplicateRank(u8),
    /// Ranks are not contiguous from 1.
    RankGap { expected: u8, found: u8 },
    /// Rank 0 or above `max_preferences`.
    RankOutOfRange(u8),
    TooManyChoices { count: usize, max: u8 },
    /// More than one submission for the same student and subject.
    DuplicateSubmission,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DuplicateOffering(r) => write!(f, "offering {r} listed more than once"),
            ValidationError::DuplicateRank(n) => write!(f, "rank {n} used more than once"),
            ValidationError::RankGap { expected, found } => {
                write!(f, "rank gap: expected rank {expected}, found {found}")
            }
            ValidationError::RankOutOfRange(n) => write!(f, "rank {n} out of range"),
            ValidationError::TooManyChoices { count, max } => {
                write!(f, "{count} choices submitted, at most {max} allowed")
            }
            ValidationError::DuplicateSubmission => write!(f, "more than one submission"),
        }
    }
}

/// Why a student has no usable ranked list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnpreferencedReason {
    /// No submission, or an empty one.
    NoSubmission,
    Invalid(ValidationError),
    /// Every choice pointed at an offering outside the ledger.
    AllPruned,
}

impl fmt::Display for UnpreferencedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnpreferencedReason::NoSubmission => write!(f, "no preferences submitted"),
            UnpreferencedReason::Invalid(e) => write!(f, "invalid submission: {e}"),
            UnpreferencedReason::AllPruned => write!(f, "every preferred offering was withdrawn"),
        }
    }
}

/// Normalized view of one student. `choices[i]` holds rank `i + 1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedStudent {
    pub student_id: StudentId,
    pub choices: Vec<OfferingRef>,
    /// Set iff `choices` is empty.
    pub unpreferenced: Option<UnpreferencedReason>,
    /// Choices dropped because their offering is not in the ledger (raw rank order).
    pub pruned: Vec<OfferingRef>,
}

impl NormalizedStudent {
    fn unpreferenced(student_id: StudentId, reason: UnpreferencedReason) -> Self {
        Self {
            student_id,
            choices: Vec::new(),
            unpreferenced: Some(reason),
            pruned: Vec::new(),
        }
    }
}

/// Structural checks; returns choices sorted by rank.
pub fn validate_submission(
    sub: &PreferenceSubmission,
    max_preferences: u8,
) -> Result<Vec<OfferingRef>, ValidationError> {
    if sub.choices.len() > max_preferences as usize {
        return Err(ValidationError::TooManyChoices {
            count: sub.choices.len(),
            max: max_preferences,
        });
    }
    for c in &sub.choices {
        if c.rank == 0 || c.rank > max_preferences {
            return Err(ValidationError::RankOutOfRange(c.rank));
        }
    }

    let mut ranked: Vec<(u8, &OfferingRef)> = sub.choices.iter().map(|c| (c.rank, &c.offering)).collect();
    ranked.sort_by_key(|(rank, _)| *rank);

    let mut seen: BTreeSet<&OfferingRef> = BTreeSet::new();
    for (i, (rank, offering)) in ranked.iter().enumerate() {
        let expected = (i + 1) as u8;
        if *rank != expected {
            // Sorted, so a repeat shows up as a rank below the expected one.
            return Err(if *rank < expected {
                ValidationError::DuplicateRank(*rank)
            } else {
                ValidationError::RankGap { expected, found: *rank }
            });
        }
        if !seen.insert(*offering) {
            return Err(ValidationError::DuplicateOffering((*offering).clone()));
        }
    }

    Ok(ranked.into_iter().map(|(_, o)| o.clone()).collect())
}

/// Normalize one submission against the ledger.
pub fn normalize_submission(
    sub: &PreferenceSubmission,
    ledger: &CapacityLedger,
    max_preferences: u8,
) -> NormalizedStudent {
    let ordered = match validate_submission(sub, max_preferences) {
        Ok(v) => v,
        Err(e) => {
            return NormalizedStudent::unpreferenced(
                sub.student_id.clone(),
                UnpreferencedReason::Invalid(e),
            )
        }
    };
    if ordered.is_empty() {
        return NormalizedStudent::unpreferenced(sub.student_id.clone(), UnpreferencedReason::NoSubmission);
    }

    let (choices, pruned): (Vec<OfferingRef>, Vec<OfferingRef>) =
        ordered.into_iter().partition(|o| ledger.contains(o));

    let unpreferenced = choices.is_empty().then_some(UnpreferencedReason::AllPruned);
    NormalizedStudent {
        student_id: sub.student_id.clone(),
        choices,
        unpreferenced,
        pruned,
    }
}

/// Normalize every listed student, in the order given.
///
/// Students without a submission come back unpreferenced; submissions for
/// students not listed are ignored (the pipeline rejects those earlier).
pub fn normalize_all<'a, I>(
    students: I,
    submissions: &[PreferenceSubmission],
    ledger: &CapacityLedger,
    max_preferences: u8,
) -> Vec<NormalizedStudent>
where
    I: IntoIterator<Item = &'a StudentId>,
{
    let mut by_student: BTreeMap<&StudentId, Vec<&PreferenceSubmission>> = BTreeMap::new();
    for s in submissions {
        by_student.entry(&s.student_id).or_default().push(s);
    }

    students
        .into_iter()
        .map(|id| match by_student.get(id).map(Vec::as_slice) {
            None | Some([]) => NormalizedStudent::unpreferenced(id.clone(), UnpreferencedReason::NoSubmission),
            Some([one]) => normalize_submission(one, ledger, max_preferences),
            Some(_) => NormalizedStudent::unpreferenced(
                id.clone(),
                UnpreferencedReason::Invalid(ValidationError::DuplicateSubmission),
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bucket, course, cref, submission};
    use alloc::vec;
    use ea_core::entities::{Offering, RankedChoice};

    fn ledger() -> CapacityLedger {
        let mut gone = course("OLD", 5, 5);
        if let Offering::Course(c) = &mut gone {
            c.active = false;
        }
        CapacityLedger::seed(&[course("A", 1, 1), course("B", 1, 0), bucket("G1", 2, 2), gone]).unwrap()
    }

    #[test]
    fn ranks_are_sorted_from_raw_order() {
        let mut sub = submission("s1", &["A", "B"]);
        sub.choices.reverse();
        let n = normalize_submission(&sub, &ledger(), 3);
        assert_eq!(n.choices, vec![cref("A"), cref("B")]);
        assert!(n.unpreferenced.is_none());
    }

    #[test]
    fn withdrawn_first_choice_is_pruned_and_ranks_compact() {
        let n = normalize_submission(&submission("s1", &["OLD", "A"]), &ledger(), 3);
        assert_eq!(n.choices, vec![cref("A")]);
        assert_eq!(n.pruned, vec![cref("OLD")]);
    }

    #[test]
    fn zero_capacity_offerings_are_kept() {
        // B is active but full; the resolver falls through it, the normalizer keeps it.
        let n = normalize_submission(&submission("s1", &["B"]), &ledger(), 3);
        assert_eq!(n.choices, vec![cref("B")]);
    }

    #[test]
    fn all_pruned_is_unpreferenced() {
        let n = normalize_submission(&submission("s1", &["OLD"]), &ledger(), 3);
        assert!(n.choices.is_empty());
        assert_eq!(n.unpreferenced, Some(UnpreferencedReason::AllPruned));
    }

    #[test]
    fn rank_gap_degrades_student() {
        let mut sub = submission("s1", &["A"]);
        sub.choices.push(RankedChoice { rank: 3, offering: cref("B") });
        let n = normalize_submission(&sub, &ledger(), 3);
        assert_eq!(
            n.unpreferenced,
            Some(UnpreferencedReason::Invalid(ValidationError::RankGap { expected: 2, found: 3 }))
        );
        assert!(n.choices.is_empty());
    }

    #[test]
    fn duplicate_offering_and_rank_are_rejected() {
        let dup_offering = submission("s1", &["A", "A"]);
        assert_eq!(
            validate_submission(&dup_offering, 3),
            Err(ValidationError::DuplicateOffering(cref("A")))
        );

        let mut dup_rank = submission("s1", &["A", "B"]);
        dup_rank.choices[1].rank = 1;
        assert_eq!(validate_submission(&dup_rank, 3), Err(ValidationError::DuplicateRank(1)));
    }

    #[test]
    fn out_of_range_and_too_many() {
        let mut zero = submission("s1", &["A"]);
        zero.choices[0].rank = 0;
        assert_eq!(validate_submission(&zero, 3), Err(ValidationError::RankOutOfRange(0)));

        let four = submission("s1", &["A", "B", "C", "D"]);
        assert_eq!(
            validate_submission(&four, 3),
            Err(ValidationError::TooManyChoices { count: 4, max: 3 })
        );
    }

    #[test]
    fn normalize_all_keeps_caller_order_and_flags_missing_and_duplicates() {
        let s1: StudentId = "s1".parse().unwrap();
        let s2: StudentId = "s2".parse().unwrap();
        let s3: StudentId = "s3".parse().unwrap();
        let subs = vec![
            submission("s3", &["A"]),
            submission("s1", &["G1"]),
            submission("s1", &["A"]),
        ];
        let out = normalize_all([&s3, &s2, &s1], &subs, &ledger(), 3);
        let ids: Vec<&str> = out.iter().map(|n| n.student_id.as_str()).collect();
        assert_eq!(ids, vec!["s3", "s2", "s1"]);
        assert_eq!(out[0].choices, vec![cref("A")]);
        assert_eq!(out[1].unpreferenced, Some(UnpreferencedReason::NoSubmission));
        assert_eq!(
            out[2].unpreferenced,
            Some(UnpreferencedReason::Invalid(ValidationError::DuplicateSubmission))
        );
    }
}
