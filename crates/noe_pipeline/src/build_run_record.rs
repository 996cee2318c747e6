// crates/noe_pipeline/src/build_run_record.rs
//
// RunRecord: provenance for one batch run.
//
// - Run ID = "RUN:<ts>:<hex>" where <hex> hashes the canonical record
//   *without* its `id` field; the timestamp is normalized to whole seconds.
// - Inputs are echoed by their canonical-bytes digests, outputs by id and
//   canonical-bytes digest, so a record can be checked against files on disk.
// - Engine meta is recorded verbatim (vendor/name/version/build).

use serde::{Deserialize, Serialize};

use noe_core::{NominationOrder, OrderId, RunId};
use noe_io::canonical_json::to_canonical_bytes;
use noe_io::hasher::{normalize_utc_seconds, run_id_for, sha256_hex};

use crate::diff::OrderDiff;
use crate::{EngineMeta, PipelineError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecordDoc {
    pub id: RunId,
    pub timestamp_utc: String,
    pub engine: EngineMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<String>,
    pub inputs: RunInputs,
    pub outputs: RunOutputs,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInputs {
    pub candidates_sha256: String,
    pub policy_sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_order_id: Option<OrderId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutputs {
    pub order_id: OrderId,
    pub order_version: u64,
    pub order_sha256: String,
    pub seats_filled: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_sha256: Option<String>,
}

/// SHA-256 of an artifact's canonical bytes (what lands on disk).
pub fn artifact_sha256<T: Serialize + ?Sized>(artifact: &T) -> Result<String, PipelineError> {
    Ok(sha256_hex(&to_canonical_bytes(artifact)?))
}

/// Assemble the record and derive its id. The timestamp is stored
/// normalized (`YYYY-MM-DDTHH:MM:SSZ`).
pub fn build_run_record(
    timestamp_utc: &str,
    engine: &EngineMeta,
    round: Option<&str>,
    inputs: RunInputs,
    order: &NominationOrder,
    diff: Option<&OrderDiff>,
) -> Result<RunRecordDoc, PipelineError> {
    let timestamp_utc = normalize_utc_seconds(timestamp_utc)?;
    let outputs = RunOutputs {
        order_id: order.order_id.clone(),
        order_version: order.version,
        order_sha256: artifact_sha256(order)?,
        seats_filled: order.entries.len() as u32,
        diff_sha256: diff.map(artifact_sha256).transpose()?,
    };

    #[derive(Serialize)]
    struct RunNoId<'a> {
        timestamp_utc: &'a str,
        engine: &'a EngineMeta,
        #[serde(skip_serializing_if = "Option::is_none")]
        round: Option<&'a str>,
        inputs: &'a RunInputs,
        outputs: &'a RunOutputs,
    }
    let payload = RunNoId { timestamp_utc: &timestamp_utc, engine, round, inputs: &inputs, outputs: &outputs };
    let id = run_id_for(&timestamp_utc, &payload)?;

    Ok(RunRecordDoc {
        id,
        timestamp_utc,
        engine: engine.clone(),
        round: round.map(str::to_string),
        inputs,
        outputs,
    })
}
