//! crates/ea_pipeline/src/validate.rs
//! Snapshot consistency checks that run before any seat is touched.
//!
//! Every failure here is fatal: the snapshot itself is inconsistent, so no
//! partial allotment is produced. Per-student problems with a submission
//! (rank gaps, duplicates, too many choices) are *not* checked here; the
//! normalizer degrades those students instead.
//!
//! Checks run in a fixed order and stop at the first failure, so the same
//! bad snapshot always reports the same error.

use std::collections::BTreeSet;

use ea_core::entities::{Offering, OfferingRef, PreferenceSubmission, Student};
use ea_core::ids::{RegistrationNumber, StudentId, SubjectId};
use ea_core::variables::{self, AllotmentParams};

use crate::RunError;

/// Full-run validation: params, students, offerings, then submissions.
pub fn validate_full(
    subject: &SubjectId,
    students: &[Student],
    submissions: &[PreferenceSubmission],
    offerings: &[Offering],
    params: &AllotmentParams,
) -> Result<(), RunError> {
    check_params(params)?;
    check_students(students)?;
    check_offerings(subject, offerings)?;
    check_submissions(subject, students, submissions, offerings)?;
    Ok(())
}

/// Pending-run validation: no submissions are involved.
pub fn validate_pending(
    subject: &SubjectId,
    students: &[Student],
    offerings: &[Offering],
    params: &AllotmentParams,
) -> Result<(), RunError> {
    check_params(params)?;
    check_students(students)?;
    check_offerings(subject, offerings)?;
    Ok(())
}

fn check_params(params: &AllotmentParams) -> Result<(), RunError> {
    variables::validate_domains(params).map_err(|e| RunError::InvalidParams(e.to_string()))
}

fn check_students(students: &[Student]) -> Result<(), RunError> {
    let mut ids: BTreeSet<&StudentId> = BTreeSet::new();
    let mut regs: BTreeSet<&RegistrationNumber> = BTreeSet::new();
    for s in students {
        if !ids.insert(&s.id) {
            return Err(RunError::DuplicateStudent(s.id.clone()));
        }
        if !regs.insert(&s.registration_number) {
            return Err(RunError::DuplicateRegistration(s.registration_number.clone()));
        }
    }
    Ok(())
}

fn check_offerings(subject: &SubjectId, offerings: &[Offering]) -> Result<(), RunError> {
    let mut seen: BTreeSet<OfferingRef> = BTreeSet::new();
    for o in offerings {
        let r = o.offering_ref();
        if o.subject_id() != subject {
            return Err(RunError::SubjectMismatch {
                entity: format!("offering {r}"),
                expected: subject.clone(),
                found: o.subject_id().clone(),
            });
        }
        if o.available_seats() > o.total_seats() {
            return Err(RunError::AvailableExceedsTotal {
                offering: r,
                total: o.total_seats(),
                available: o.available_seats(),
            });
        }
        if !seen.insert(r.clone()) {
            return Err(RunError::DuplicateOffering(r));
        }
    }
    Ok(())
}

fn check_submissions(
    subject: &SubjectId,
    students: &[Student],
    submissions: &[PreferenceSubmission],
    offerings: &[Offering],
) -> Result<(), RunError> {
    let known_students: BTreeSet<&StudentId> = students.iter().map(|s| &s.id).collect();
    // Inactive offerings count as known: their choices are pruned later, not rejected.
    let known_offerings: BTreeSet<OfferingRef> = offerings.iter().map(Offering::offering_ref).collect();

    for sub in submissions {
        if &sub.subject_id != subject {
            return Err(RunError::SubjectMismatch {
                entity: format!("submission of {}", sub.student_id),
                expected: subject.clone(),
                found: sub.subject_id.clone(),
            });
        }
        if !known_students.contains(&sub.student_id) {
            return Err(RunError::UnknownStudent(sub.student_id.clone()));
        }
        for c in &sub.choices {
            if !known_offerings.contains(&c.offering) {
                return Err(RunError::UnknownOffering {
                    student: sub.student_id.clone(),
                    offering: c.offering.clone(),
                });
            }
        }
    }
    Ok(())
}
