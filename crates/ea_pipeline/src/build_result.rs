//! build_result.rs: canonical `result.json` for one run.
//!
//! The ID is `ALT:<sha256>` over the canonical JSON of the idless body, so two
//! runs over the same snapshot always produce the same ID. Nothing time- or
//! host-dependent goes into the body; that belongs to the run record.

use std::collections::BTreeMap;

use serde::Serialize;

use ea_core::entities::{Allotment, OfferingKind};
use ea_core::ids::{StudentId, SubjectId};
use ea_core::variables::AllotmentParams;
use ea_io::hasher;
use ea_io::manifest::RunMode;

use crate::outcome::{LedgerRow, RunOutcome, SeatDelta, StudentOutcome};
use crate::RunError;

/// `result.json`: `id` plus the hashed body.
#[derive(Debug, Clone, Serialize)]
pub struct ResultDoc {
    pub id: String, // "ALT:<hex64>"
    #[serde(flatten)]
    pub body: ResultBody,
}

/// Idless body; the ID is computed over exactly this.
#[derive(Debug, Clone, Serialize)]
pub struct ResultBody {
    pub subject_id: SubjectId,
    pub mode: RunMode,
    pub params: AllotmentParams,
    pub allotments: Vec<Allotment>,
    pub unallottable: Vec<StudentId>,
    pub outcomes: Vec<StudentOutcome>,
    pub seat_deltas: Vec<SeatDelta>,
    pub ledger: Vec<LedgerRow>,
    pub summary: ResultSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub students: usize,
    pub by_preference: usize,
    pub by_fallback: usize,
    pub unallottable: usize,
    /// Preference allotments into a single course.
    pub standalone: usize,
    /// Preference or fallback allotments into a bucket.
    pub bucket: usize,
    /// `rank -> count`, preference allotments only. Keys are decimal strings.
    pub rank_histogram: BTreeMap<String, usize>,
    pub seats_remaining: u64,
}

impl ResultSummary {
    fn from_outcome(outcome: &RunOutcome) -> Self {
        let mut s = ResultSummary {
            students: outcome.outcomes.len(),
            by_preference: outcome.count_by_preference(),
            by_fallback: outcome.count_by_fallback(),
            unallottable: outcome.unallottable.len(),
            seats_remaining: outcome.ledger.total_remaining(),
            ..ResultSummary::default()
        };
        for a in &outcome.allotments {
            match a.offering.kind() {
                OfferingKind::Course => s.standalone += 1,
                OfferingKind::Bucket => s.bucket += 1,
            }
            if let Some(rank) = a.rank {
                *s.rank_histogram.entry(rank.to_string()).or_default() += 1;
            }
        }
        s
    }
}

/// Assemble the result and its content ID.
pub fn build_result(outcome: &RunOutcome) -> Result<ResultDoc, RunError> {
    let body = ResultBody {
        subject_id: outcome.subject_id.clone(),
        mode: outcome.mode,
        params: outcome.params.clone(),
        allotments: outcome.allotments.clone(),
        unallottable: outcome.unallottable.clone(),
        outcomes: outcome.outcomes.clone(),
        seat_deltas: outcome.seat_deltas.clone(),
        ledger: outcome.ledger_rows(),
        summary: ResultSummary::from_outcome(outcome),
    };
    let id = hasher::alt_id(&body)?;
    Ok(ResultDoc { id, body })
}

/// SHA-256 of the canonical bytes of the full document (id included).
pub fn result_sha256(doc: &ResultDoc) -> Result<String, RunError> {
    Ok(hasher::sha256_canonical(doc)?)
}
