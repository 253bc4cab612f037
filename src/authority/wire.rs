//! Data shapes exchanged with the experiment authority

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Request a variant assignment (creating the experiment if absent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    /// Experiment to join
    pub canonical_name: String,
    /// Alternative label → relative weight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_weights: Option<BTreeMap<String, u32>>,
    /// Conversions that count for this experiment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_names: Option<Vec<String>>,
}

/// `{ <canonicalName>: assignedAlternativeLabel }`
pub type AssignResponse = HashMap<String, serde_json::Value>;

/// Record one conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Conversion name
    pub convert: String,
}

/// Fetch the current state of one experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRequest {
    /// Experiment name as requested by the consumer
    pub experiment_name: String,
    /// Whether archived experiments may answer
    pub include_archived: bool,
}

/// Alternative as reported by the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativePayload {
    /// Display content
    pub content: serde_json::Value,
    /// Cumulative participants
    pub participants: u64,
    /// Cumulative conversions
    pub conversions: u64,
    /// Informational only; rates are recomputed from the counts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_rate: Option<f64>,
}

/// Timeline series as reported by the authority: `[[millis, participants, conversions], ...]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePayload {
    /// Series name
    pub name: String,
    /// Raw samples, in no particular order
    pub data: Vec<(i64, u64, u64)>,
}

/// Full snapshot response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPayload {
    /// Canonical experiment name
    pub canonical_name: String,
    /// Family name shared by experiments with one assignment decision
    pub hashable_name: String,
    /// Alternative number the experiment was stopped on, `-1` while live
    #[serde(default = "no_short_circuit")]
    pub short_circuit_number: i64,
    /// Whether the experiment is running
    #[serde(default = "default_live")]
    pub live: bool,
    /// Alternatives in stable order
    pub alternatives: Vec<AlternativePayload>,
    /// Per-alternative history
    #[serde(default)]
    pub timeline_series: Vec<TimelinePayload>,
    /// Chart axis title
    #[serde(default)]
    pub y_axis_title: String,
}

const fn no_short_circuit() -> i64 {
    -1
}

const fn default_live() -> bool {
    true
}
