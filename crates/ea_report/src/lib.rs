//! ea_report: pure offline report model over canonical artifacts.
//!
//! Determinism rules:
//! - No I/O here. Callers supply `result.json` and `run_record.json` already parsed.
//! - No recomputation: every figure is read from the artifacts.
//! - Percent strings use one-decimal, round-half-up integer math (no floats).
//! - Stable section order and field names (see `render_json`).
//!
//! Inputs are JSON values rather than `ea_pipeline` types so that a report
//! can be rebuilt from archived artifacts alone.

#![deny(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod render_json;

pub use render_json::render_report_json;

pub type ResultArtifact = Value;
pub type RunRecordArtifact = Value;

/// Cover: what was run, when, by which engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cover {
    pub subject_id: String,
    pub mode: String,
    pub timestamp_utc: Option<String>,
    pub engine: Option<String>, // "name version (build)"
    pub max_preferences: Option<u64>,
    pub fallback_policy: Option<String>,
}

/// Headline placement counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub students: u64,
    pub by_preference: u64,
    pub by_fallback: u64,
    pub unallottable: u64,
    pub preference_rate: String,
    pub seats_remaining: u64,
}

/// Fill of one offering after the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferingFill {
    pub kind: String,
    pub id: String,
    pub total_seats: u64,
    pub remaining_seats: u64,
    pub committed: u64,
    /// Seats taken by this run only.
    pub allotted_this_run: u64,
    pub fill: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankRow {
    pub rank: u64,
    pub count: u64,
    pub share: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnallottableRow {
    pub student_id: String,
    pub registration_number: String,
    pub reason: String,
    pub cause: Option<String>,
}

/// Integrity footer (IDs and input digests).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FooterIntegrity {
    pub result_id: String,
    pub run_id: Option<String>,
    pub inputs: BTreeMap<String, String>,
}

/// Top-level report model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportModel {
    pub cover: Cover,
    pub placement: Placement,
    pub offerings: Vec<OfferingFill>,
    pub ranks: Vec<RankRow>,
    /// `fallback_cause.code -> students`, over every student that reached fallback.
    pub fallback_causes: BTreeMap<String, u64>,
    pub unallottable: Vec<UnallottableRow>,
    pub footer: FooterIntegrity,
}

/* ------------------------------- JSON helpers ------------------------------- */

/// Fetch a string at a JSON Pointer.
#[inline]
pub fn j_str(v: &Value, ptr: &str) -> Option<String> {
    v.pointer(ptr).and_then(Value::as_str).map(str::to_string)
}

/// Fetch an unsigned integer at a JSON Pointer.
#[inline]
pub fn j_u64(v: &Value, ptr: &str) -> Option<u64> {
    v.pointer(ptr).and_then(Value::as_u64)
}

fn j_array<'a>(v: &'a Value, ptr: &str) -> &'a [Value] {
    v.pointer(ptr).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

/// `{"kind":..,"id":..}` → `(kind, id)`.
fn offering_key(v: &Value) -> Option<(String, String)> {
    Some((j_str(v, "/kind")?, j_str(v, "/id")?))
}

/* --------------------------------- Mappers ---------------------------------- */

pub fn map_cover(result: &Value, run: Option<&Value>) -> Cover {
    let engine = run.and_then(|r| {
        let name = j_str(r, "/engine/name")?;
        let version = j_str(r, "/engine/version")?;
        let build = j_str(r, "/engine/build").unwrap_or_default();
        Some(format!("{name} {version} ({build})"))
    });
    Cover {
        subject_id: j_str(result, "/subject_id").unwrap_or_default(),
        mode: j_str(result, "/mode").unwrap_or_default(),
        timestamp_utc: run.and_then(|r| j_str(r, "/timestamp_utc")),
        engine,
        max_preferences: j_u64(result, "/params/max_preferences"),
        fallback_policy: j_str(result, "/params/fallback"),
    }
}

pub fn map_placement(result: &Value) -> Placement {
    let students = j_u64(result, "/summary/students").unwrap_or(0);
    let by_preference = j_u64(result, "/summary/by_preference").unwrap_or(0);
    Placement {
        students,
        by_preference,
        by_fallback: j_u64(result, "/summary/by_fallback").unwrap_or(0),
        unallottable: j_u64(result, "/summary/unallottable").unwrap_or(0),
        preference_rate: percent_1dp(by_preference, students),
        seats_remaining: j_u64(result, "/summary/seats_remaining").unwrap_or(0),
    }
}

/// Per-offering fill, in ledger (canonical) order.
pub fn map_offerings(result: &Value) -> Vec<OfferingFill> {
    let mut this_run: BTreeMap<(String, String), u64> = BTreeMap::new();
    for d in j_array(result, "/seat_deltas") {
        if let (Some(key), Some(n)) = (d.get("offering").and_then(offering_key), j_u64(d, "/allotted")) {
            this_run.insert(key, n);
        }
    }

    j_array(result, "/ledger")
        .iter()
        .filter_map(|row| {
            let key = row.get("offering").and_then(offering_key)?;
            let total_seats = j_u64(row, "/total_seats")?;
            let remaining_seats = j_u64(row, "/remaining_seats")?;
            let committed = j_u64(row, "/committed").unwrap_or(total_seats.saturating_sub(remaining_seats));
            Some(OfferingFill {
                allotted_this_run: this_run.get(&key).copied().unwrap_or(0),
                fill: percent_1dp(committed, total_seats),
                kind: key.0,
                id: key.1,
                total_seats,
                remaining_seats,
                committed,
            })
        })
        .collect()
}

/// Rank histogram, ascending rank; shares are over preference allotments.
pub fn map_ranks(result: &Value) -> Vec<RankRow> {
    let by_preference = j_u64(result, "/summary/by_preference").unwrap_or(0);
    let mut rows: Vec<RankRow> = result
        .pointer("/summary/rank_histogram")
        .and_then(Value::as_object)
        .map(|h| {
            h.iter()
                .filter_map(|(k, v)| {
                    let rank = k.parse::<u64>().ok()?;
                    let count = v.as_u64()?;
                    Some(RankRow { rank, count, share: percent_1dp(count, by_preference) })
                })
                .collect()
        })
        .unwrap_or_default();
    // Keys are strings; "10" must follow "9".
    rows.sort_by_key(|r| r.rank);
    rows
}

pub fn map_fallback_causes(result: &Value) -> BTreeMap<String, u64> {
    let mut causes = BTreeMap::new();
    for o in j_array(result, "/outcomes") {
        if let Some(code) = j_str(o, "/fallback_cause/code") {
            *causes.entry(code).or_insert(0) += 1;
        }
    }
    causes
}

/// Unallottable students in processing order.
pub fn map_unallottable(result: &Value) -> Vec<UnallottableRow> {
    j_array(result, "/outcomes")
        .iter()
        .filter(|o| j_str(o, "/state").as_deref() == Some("unallottable"))
        .map(|o| UnallottableRow {
            student_id: j_str(o, "/student_id").unwrap_or_default(),
            registration_number: j_str(o, "/registration_number").unwrap_or_default(),
            reason: j_str(o, "/reason").unwrap_or_default(),
            cause: j_str(o, "/fallback_cause/code"),
        })
        .collect()
}

pub fn map_footer(result: &Value, run: Option<&Value>) -> FooterIntegrity {
    let inputs = run
        .and_then(|r| r.pointer("/inputs"))
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();
    FooterIntegrity {
        result_id: j_str(result, "/id").unwrap_or_default(),
        run_id: run.and_then(|r| j_str(r, "/id")),
        inputs,
    }
}

/* --------------------------- Report assembly entrypoint --------------------------- */

/// Build the full `ReportModel` from canonical artifacts.
/// - `result_json`: parsed `result.json`
/// - `run`: parsed `run_record.json`, if one was written
pub fn build_report_model(result_json: &ResultArtifact, run: Option<&RunRecordArtifact>) -> ReportModel {
    ReportModel {
        cover: map_cover(result_json, run),
        placement: map_placement(result_json),
        offerings: map_offerings(result_json),
        ranks: map_ranks(result_json),
        fallback_causes: map_fallback_causes(result_json),
        unallottable: map_unallottable(result_json),
        footer: map_footer(result_json, run),
    }
}

/* --------------------------- Presentation utilities ------------------------------ */

/// `num / den` as a percentage with one decimal place, round-half-up,
/// integer-only. Returns `"n/a"` when `den == 0`.
pub fn percent_1dp(num: u64, den: u64) -> String {
    if den == 0 {
        return "n/a".to_string();
    }
    let num = u128::from(num);
    let den = u128::from(den);
    let tenths = (num * 2000 + den) / (den * 2);
    format!("{}.{}%", tenths / 10, tenths % 10)
}

/* ------------------------------------- Tests -------------------------------------- */
