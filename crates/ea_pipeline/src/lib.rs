//! ea_pipeline: deterministic run surface (validate → seed ledger → normalize → resolve → fallback)
//! This crate stays I/O-free and delegates JSON/Hashing to `ea_io` and seat math to `ea_algo`.
//! A run owns its ledger for its whole duration and either completes or returns a `RunError`
//! before any allotment is produced.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::{debug, info, warn};

use ea_algo::{
    assign_least_filled, normalize_all, resolve_preferences, CapacityLedger, LedgerError, UnassignedCause,
    UnpreferencedReason,
};
use ea_core::determinism::{sort_canonical, sort_students_canonical};
use ea_core::entities::{Allotment, Offering, OfferingRef, PreferenceSubmission, Student};
use ea_core::ids::{RegistrationNumber, StudentId, SubjectId};
use ea_core::variables::{AllotmentParams, FallbackPolicy};
use ea_io::loader::LoadedSnapshot;
use ea_io::manifest::RunMode;

pub mod build_result;
pub mod build_run_record;
pub mod outcome;
pub mod validate;

pub use build_result::{build_result, ResultDoc};
pub use build_run_record::{build_run_record, RunRecordDoc};
pub use outcome::{
    FallbackCause, LedgerRow, OutcomeState, RunOutcome, SeatDelta, StudentOutcome, UnallottableReason,
};

/// Engine identifiers (echoed into run records and checked against `expect.engine_version`).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EngineMeta {
    pub vendor: String,
    pub name: String,
    pub version: String,
    pub build: String,
}

/// Identifiers of this build.
pub fn engine_identifiers() -> EngineMeta {
    EngineMeta {
        vendor: "ea".to_string(),
        name: "ea-engine".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: option_env!("EA_BUILD_ID").unwrap_or("dev").to_string(),
    }
}

/// Fatal run errors. Every variant means the snapshot is inconsistent; no
/// allotment is produced.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{entity} belongs to subject {found}, run is for {expected}")]
    SubjectMismatch {
        entity: String,
        expected: SubjectId,
        found: SubjectId,
    },
    #[error("student {0} appears more than once")]
    DuplicateStudent(StudentId),
    #[error("registration number {0} is used by more than one student")]
    DuplicateRegistration(RegistrationNumber),
    #[error("offering {0} appears more than once")]
    DuplicateOffering(OfferingRef),
    #[error("offering {offering} has {available} available seats but only {total} total")]
    AvailableExceedsTotal {
        offering: OfferingRef,
        total: u32,
        available: u32,
    },
    #[error("student {student} prefers {offering}, which is not in the offerings snapshot")]
    UnknownOffering {
        student: StudentId,
        offering: OfferingRef,
    },
    #[error("preferences submitted for unknown student {0}")]
    UnknownStudent(StudentId),
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("build: {0}")]
    Build(String),
}

impl From<LedgerError> for RunError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::DuplicateOffering(r) => RunError::DuplicateOffering(r),
            LedgerError::AvailableExceedsTotal { offering, total, available } => {
                RunError::AvailableExceedsTotal { offering, total, available }
            }
        }
    }
}

impl From<ea_io::IoError> for RunError {
    fn from(e: ea_io::IoError) -> Self {
        RunError::Build(e.to_string())
    }
}

// --------------------------------- Entry points ---------------------------------

/// Full run: preference resolution for every student, then fallback for the rest.
pub fn run_allotment(
    subject: &SubjectId,
    students: &[Student],
    preferences: &[PreferenceSubmission],
    offerings: &[Offering],
    params: &AllotmentParams,
) -> Result<RunOutcome, RunError> {
    info!(
        subject = %subject,
        students = students.len(),
        submissions = preferences.len(),
        offerings = offerings.len(),
        "allotment run: start"
    );
    validate::validate_full(subject, students, preferences, offerings, params)?;

    let ordered = processing_order(students);
    let mut ledger = CapacityLedger::seed(offerings)?;
    let seeded = ledger.clone();
    debug!(admitted = ledger.len(), seats = ledger.total_remaining(), "ledger seeded");

    let normalized = normalize_all(
        ordered.iter().map(|s| &s.id),
        preferences,
        &ledger,
        params.max_preferences,
    );
    for n in &normalized {
        match &n.unpreferenced {
            Some(UnpreferencedReason::NoSubmission) | None => {}
            Some(reason) => warn!(student = %n.student_id, %reason, "preferences unusable, degraded to fallback"),
        }
        if !n.pruned.is_empty() {
            debug!(student = %n.student_id, pruned = n.pruned.len(), "withdrawn offerings pruned");
        }
    }

    let resolved = resolve_preferences(subject, &normalized, &mut ledger);
    debug!(
        allotted = resolved.allotments.len(),
        unassigned = resolved.unassigned.len(),
        "preference resolution done"
    );

    let awaiting: Vec<StudentId> = resolved.unassigned.iter().map(|u| u.student_id.clone()).collect();
    let fallback = assign_least_filled(subject, &awaiting, &mut ledger, params.fallback);
    debug!(
        allotted = fallback.allotments.len(),
        unallottable = fallback.unallottable.len(),
        "fallback done"
    );

    let causes: BTreeMap<&StudentId, &UnassignedCause> =
        resolved.unassigned.iter().map(|u| (&u.student_id, &u.cause)).collect();
    let pruned: BTreeMap<&StudentId, &Vec<OfferingRef>> =
        normalized.iter().map(|n| (&n.student_id, &n.pruned)).collect();

    let mut by_student: BTreeMap<&StudentId, &Allotment> = BTreeMap::new();
    by_student.extend(resolved.allotments.iter().map(|a| (&a.student_id, a)));
    by_student.extend(fallback.allotments.iter().map(|a| (&a.student_id, a)));

    let mut allotments = Vec::with_capacity(by_student.len());
    let mut outcomes = Vec::with_capacity(ordered.len());
    for s in &ordered {
        let allotment = by_student.get(&s.id).copied();
        if let Some(a) = allotment {
            allotments.push(a.clone());
        }
        outcomes.push(StudentOutcome {
            student_id: s.id.clone(),
            registration_number: s.registration_number.clone(),
            state: terminal_state(allotment, params.fallback),
            fallback_cause: causes.get(&s.id).map(|c| FallbackCause::from_unassigned(c)),
            pruned: pruned.get(&s.id).map(|p| p.to_vec()).unwrap_or_default(),
        });
    }

    let outcome = RunOutcome {
        subject_id: subject.clone(),
        mode: RunMode::Full,
        params: params.clone(),
        allotments,
        unallottable: fallback.unallottable,
        outcomes,
        seat_deltas: outcome::seat_deltas(&seeded, &ledger),
        ledger,
    };
    log_summary(&outcome);
    Ok(outcome)
}

/// Pending run: fallback only, over students not yet allotted for the subject.
///
/// `unprocessed_students` is usually the output of [`pending_students`].
/// Re-running with the same snapshot gives the same outcome.
pub fn run_pending_allotment(
    subject: &SubjectId,
    unprocessed_students: &[Student],
    offerings: &[Offering],
    params: &AllotmentParams,
) -> Result<RunOutcome, RunError> {
    info!(
        subject = %subject,
        students = unprocessed_students.len(),
        offerings = offerings.len(),
        "pending run: start"
    );
    validate::validate_pending(subject, unprocessed_students, offerings, params)?;

    let ordered = processing_order(unprocessed_students);
    let mut ledger = CapacityLedger::seed(offerings)?;
    let seeded = ledger.clone();
    debug!(admitted = ledger.len(), seats = ledger.total_remaining(), "ledger seeded");

    let ids: Vec<StudentId> = ordered.iter().map(|s| s.id.clone()).collect();
    let fallback = assign_least_filled(subject, &ids, &mut ledger, params.fallback);

    let by_student: BTreeMap<&StudentId, &Allotment> =
        fallback.allotments.iter().map(|a| (&a.student_id, a)).collect();
    let outcomes = ordered
        .iter()
        .map(|s| StudentOutcome {
            student_id: s.id.clone(),
            registration_number: s.registration_number.clone(),
            state: terminal_state(by_student.get(&s.id).copied(), params.fallback),
            fallback_cause: Some(FallbackCause::pending_run()),
            pruned: Vec::new(),
        })
        .collect();

    let outcome = RunOutcome {
        subject_id: subject.clone(),
        mode: RunMode::Pending,
        params: params.clone(),
        allotments: fallback.allotments,
        unallottable: fallback.unallottable,
        outcomes,
        seat_deltas: outcome::seat_deltas(&seeded, &ledger),
        ledger,
    };
    log_summary(&outcome);
    Ok(outcome)
}

/// Students of the snapshot without a prior allotment for `subject`.
///
/// Prior allotments for other subjects are ignored. Order follows the input;
/// the run applies processing order itself.
pub fn pending_students(students: &[Student], subject: &SubjectId, prior_allotments: &[Allotment]) -> Vec<Student> {
    let allotted: BTreeSet<&StudentId> = prior_allotments
        .iter()
        .filter(|a| &a.subject_id == subject)
        .map(|a| &a.student_id)
        .collect();
    students.iter().filter(|s| !allotted.contains(&s.id)).cloned().collect()
}

/// Every allotment held for `subject` after a run: the prior ones plus the
/// run's own, one per student, in canonical order.
///
/// This is the set a later pending run must see as its prior allotments.
/// Prior allotments for other subjects are dropped; on a repeated student the
/// prior allotment is kept.
pub fn cumulative_allotments(subject: &SubjectId, prior: &[Allotment], fresh: &[Allotment]) -> Vec<Allotment> {
    let mut seen: BTreeSet<StudentId> = BTreeSet::new();
    let mut all: Vec<Allotment> = prior
        .iter()
        .filter(|a| &a.subject_id == subject)
        .chain(fresh)
        .filter(|a| seen.insert(a.student_id.clone()))
        .cloned()
        .collect();
    sort_canonical(&mut all);
    all
}

/// Dispatch a loaded snapshot on its run mode.
pub fn run_snapshot(snapshot: &LoadedSnapshot) -> Result<RunOutcome, RunError> {
    match snapshot.mode {
        RunMode::Full => run_allotment(
            &snapshot.subject_id,
            &snapshot.students,
            &snapshot.submissions,
            &snapshot.offerings,
            &snapshot.params,
        ),
        RunMode::Pending => {
            let pending = pending_students(&snapshot.students, &snapshot.subject_id, &snapshot.prior_allotments);
            debug!(
                total = snapshot.students.len(),
                pending = pending.len(),
                "pending set computed from prior allotments"
            );
            run_pending_allotment(&snapshot.subject_id, &pending, &snapshot.offerings, &snapshot.params)
        }
    }
}

// ------------------------------------ Helpers ------------------------------------

fn processing_order(students: &[Student]) -> Vec<Student> {
    let mut ordered = students.to_vec();
    sort_students_canonical(&mut ordered);
    ordered
}

fn terminal_state(allotment: Option<&Allotment>, policy: FallbackPolicy) -> OutcomeState {
    match allotment {
        Some(a) => match a.rank {
            Some(rank) => OutcomeState::AssignedByPreference {
                offering: a.offering.clone(),
                rank,
            },
            None => OutcomeState::AssignedByFallback {
                offering: a.offering.clone(),
            },
        },
        None => OutcomeState::Unallottable {
            reason: match policy {
                FallbackPolicy::Disabled => UnallottableReason::FallbackDisabled,
                FallbackPolicy::LeastFilled => UnallottableReason::NoCapacity,
            },
        },
    }
}

fn log_summary(outcome: &RunOutcome) {
    info!(
        subject = %outcome.subject_id,
        mode = outcome.mode.as_str(),
        by_preference = outcome.count_by_preference(),
        by_fallback = outcome.count_by_fallback(),
        unallottable = outcome.unallottable.len(),
        seats_left = outcome.ledger.total_remaining(),
        "run complete"
    );
    if !outcome.unallottable.is_empty() {
        warn!(count = outcome.unallottable.len(), "students left without a seat");
    }
}
