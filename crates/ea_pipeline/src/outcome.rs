//! Run outcome: what a run hands back to the caller.
//!
//! Per-student terminal states follow the run's state machine:
//! `Pending → AssignedByPreference`, or `Pending → AwaitingFallback →
//! AssignedByFallback | Unallottable`. Only terminal states are recorded.

use serde::Serialize;

use ea_algo::{CapacityLedger, LedgerEntry, UnassignedCause, UnpreferencedReason, ValidationError};
use ea_core::determinism::sort_canonical;
use ea_core::entities::{Allotment, Offering, OfferingRef};
use ea_core::ids::{RegistrationNumber, StudentId, SubjectId};
use ea_core::variables::AllotmentParams;
use ea_io::manifest::RunMode;

/// Terminal state of one student.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OutcomeState {
    AssignedByPreference { offering: OfferingRef, rank: u8 },
    AssignedByFallback { offering: OfferingRef },
    Unallottable { reason: UnallottableReason },
}

/// Why an unallottable student got no seat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnallottableReason {
    /// Every admitted offering was full at the student's turn.
    NoCapacity,
    FallbackDisabled,
}

/// Why a student went through the fallback stage (stable `code` + human message).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FallbackCause {
    pub code: &'static str,
    pub message: String,
}

impl FallbackCause {
    pub(crate) fn pending_run() -> Self {
        Self {
            code: "pending_run",
            message: "processed by a pending run".to_string(),
        }
    }

    pub(crate) fn from_unassigned(cause: &UnassignedCause) -> Self {
        match cause {
            UnassignedCause::PreferencesExhausted { tried } => Self {
                code: "preferences_exhausted",
                message: format!("all {} preferred offerings were full", tried.len()),
            },
            UnassignedCause::Unpreferenced(reason) => Self {
                code: unpreferenced_code(reason),
                message: reason.to_string(),
            },
        }
    }
}

fn unpreferenced_code(reason: &UnpreferencedReason) -> &'static str {
    match reason {
        UnpreferencedReason::NoSubmission => "no_submission",
        UnpreferencedReason::AllPruned => "all_pruned",
        UnpreferencedReason::Invalid(e) => match e {
            ValidationError::DuplicateOffering(_) => "duplicate_offering",
            ValidationError::DuplicateRank(_) => "duplicate_rank",
            ValidationError::RankGap { .. } => "rank_gap",
            ValidationError::RankOutOfRange(_) => "rank_out_of_range",
            ValidationError::TooManyChoices { .. } => "too_many_choices",
            ValidationError::DuplicateSubmission => "duplicate_submission",
        },
    }
}

/// Per-student record, in processing order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StudentOutcome {
    pub student_id: StudentId,
    pub registration_number: RegistrationNumber,
    #[serde(flatten)]
    pub state: OutcomeState,
    /// Set for every student that reached fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_cause: Option<FallbackCause>,
    /// Choices dropped because their offering was withdrawn.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pruned: Vec<OfferingRef>,
}

impl StudentOutcome {
    pub fn is_assigned(&self) -> bool {
        !matches!(self.state, OutcomeState::Unallottable { .. })
    }
}

/// Seats consumed in one offering by this run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeatDelta {
    pub offering: OfferingRef,
    pub allotted: u32,
    pub remaining_before: u32,
    pub remaining_after: u32,
}

/// Ledger row as written to artifacts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerRow {
    pub offering: OfferingRef,
    pub total_seats: u32,
    pub remaining_seats: u32,
    pub committed: u32,
}

impl From<&LedgerEntry> for LedgerRow {
    fn from(e: &LedgerEntry) -> Self {
        Self {
            offering: e.offering.clone(),
            total_seats: e.total_seats,
            remaining_seats: e.remaining_seats,
            committed: e.committed(),
        }
    }
}

/// Everything a run produces. The ledger is handed back by value.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub subject_id: SubjectId,
    pub mode: RunMode,
    pub params: AllotmentParams,
    /// Preference and fallback allotments, in processing order.
    pub allotments: Vec<Allotment>,
    /// Students with no seat, in processing order.
    pub unallottable: Vec<StudentId>,
    pub outcomes: Vec<StudentOutcome>,
    /// Offerings that lost at least one seat, canonical order.
    pub seat_deltas: Vec<SeatDelta>,
    pub ledger: CapacityLedger,
}

impl RunOutcome {
    pub fn count_by_preference(&self) -> usize {
        self.allotments.iter().filter(|a| !a.is_fallback()).count()
    }

    pub fn count_by_fallback(&self) -> usize {
        self.allotments.iter().filter(|a| a.is_fallback()).count()
    }

    pub fn ledger_rows(&self) -> Vec<LedgerRow> {
        self.ledger.entries().map(LedgerRow::from).collect()
    }

    /// The offerings snapshot with `available_seats` lowered by this run's
    /// allotments, ready to persist or to seed the next run. Returned in
    /// canonical offering order.
    pub fn updated_offerings(&self, offerings: &[Offering]) -> Vec<Offering> {
        let mut updated: Vec<Offering> = offerings
            .iter()
            .map(|o| {
                let mut o = o.clone();
                if let Some(remaining) = self.ledger.remaining(&o.offering_ref()) {
                    match &mut o {
                        Offering::Course(c) => c.available_seats = remaining,
                        Offering::Bucket(b) => b.available_seats = remaining,
                    }
                }
                o
            })
            .collect();
        sort_canonical(&mut updated);
        updated
    }
}

/// Seat deltas between the seeded and final ledgers (non-zero only).
pub(crate) fn seat_deltas(before: &CapacityLedger, after: &CapacityLedger) -> Vec<SeatDelta> {
    before
        .entries()
        .filter_map(|b| {
            let remaining_after = after.remaining(&b.offering)?;
            let allotted = b.remaining_seats.checked_sub(remaining_after)?;
            (allotted > 0).then(|| SeatDelta {
                offering: b.offering.clone(),
                allotted,
                remaining_before: b.remaining_seats,
                remaining_after,
            })
        })
        .collect()
}
