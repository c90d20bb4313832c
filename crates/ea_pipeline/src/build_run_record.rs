// crates/ea_pipeline/src/build_run_record.rs
//
// Run record: the provenance side of a run. Engine identity, the normalized
// timestamp, input digests and the params echo sit next to the result ID.
// - Result ID = `ALT:` over the canonical result body (see build_result).
// - Run ID    = `RUN:<ts>-<sha256>` over the canonical idless run record.
// Unlike the result, the record depends on the timestamp passed in, so it is
// the only artifact that differs between otherwise identical runs.

use serde::Serialize;

use ea_core::ids::SubjectId;
use ea_core::variables::AllotmentParams;
use ea_io::hasher;
use ea_io::loader::SnapshotDigests;
use ea_io::manifest::RunMode;

use crate::build_result::{result_sha256, ResultDoc};
use crate::{EngineMeta, RunError};

/// `run_record.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecordDoc {
    pub id: String, // "RUN:<ts>-<hex64>"
    #[serde(flatten)]
    pub body: RunRecordBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRecordBody {
    pub timestamp_utc: String, // RFC3339, seconds, Z
    pub engine: EngineMeta,
    pub subject_id: SubjectId,
    pub mode: RunMode,
    pub inputs: SnapshotDigests,
    pub params: AllotmentParams,
    pub outputs: RunOutputs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutputs {
    pub result_id: String,
    pub result_sha256: String,
    pub allotted: usize,
    pub unallottable: usize,
}

/// Assemble the run record for an already built result.
pub fn build_run_record(
    timestamp_utc: &str,
    engine: &EngineMeta,
    inputs: &SnapshotDigests,
    result: &ResultDoc,
) -> Result<RunRecordDoc, RunError> {
    let timestamp_utc = hasher::normalize_timestamp_utc(timestamp_utc)?;
    let body = RunRecordBody {
        timestamp_utc,
        engine: engine.clone(),
        subject_id: result.body.subject_id.clone(),
        mode: result.body.mode,
        inputs: inputs.clone(),
        params: result.body.params.clone(),
        outputs: RunOutputs {
            result_id: result.id.clone(),
            result_sha256: result_sha256(result)?,
            allotted: result.body.allotments.len(),
            unallottable: result.body.unallottable.len(),
        },
    };
    let id = hasher::run_id(&body.timestamp_utc, &body)?;
    Ok(RunRecordDoc { id, body })
}
