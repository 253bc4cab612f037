//! Experiment Snapshot - the unit the conversion cache stores

use serde::{Deserialize, Serialize};

use super::{annotate, Alternative, TimelineSample, TimelineSeries};
use crate::authority::SnapshotPayload;
use crate::stats::describe_result;
use crate::{Error, Result};

/// One experiment's alternatives and timelines at fetch time, annotated
/// against a control.
///
/// Snapshots are immutable once built; changing the control produces a new
/// snapshot via [`ExperimentSnapshot::with_control`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSnapshot {
    experiment_name: String,
    canonical_name: String,
    hashable_name: String,
    short_circuit_number: Option<usize>,
    live: bool,
    alternatives: Vec<Alternative>,
    timeline_series: Vec<TimelineSeries>,
    y_axis_title: String,
    control_index: usize,
}

impl ExperimentSnapshot {
    /// Normalize an authority payload fetched for `experiment_name` and
    /// annotate it against `control_index`.
    ///
    /// # Errors
    /// Returns `InvalidPayload` for an experiment without alternatives or
    /// with out-of-range timestamps, and `ControlIndexOutOfRange` for a bad
    /// control index.
    pub fn from_payload(
        experiment_name: impl Into<String>,
        payload: SnapshotPayload,
        control_index: impl FnOnce(&[Alternative]) -> usize,
    ) -> Result<Self> {
        if payload.alternatives.is_empty() {
            return Err(Error::InvalidPayload(format!(
                "experiment {} has no alternatives",
                payload.canonical_name
            )));
        }

        let alternatives: Vec<Alternative> = payload
            .alternatives
            .into_iter()
            .enumerate()
            .map(|(number, alt)| {
                Alternative::new(number, alt.content, alt.participants, alt.conversions)
            })
            .collect();

        let timeline_series = payload
            .timeline_series
            .into_iter()
            .map(|series| {
                let samples = series
                    .data
                    .into_iter()
                    .map(|(millis, participants, conversions)| {
                        TimelineSample::from_millis(millis, participants, conversions)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(TimelineSeries::new(series.name, samples))
            })
            .collect::<Result<Vec<_>>>()?;

        let short_circuit_number = usize::try_from(payload.short_circuit_number).ok();
        let control_index = control_index(&alternatives);

        Self {
            experiment_name: experiment_name.into(),
            canonical_name: payload.canonical_name,
            hashable_name: payload.hashable_name,
            short_circuit_number,
            live: payload.live,
            alternatives,
            timeline_series,
            y_axis_title: payload.y_axis_title,
            control_index,
        }
        .with_control(control_index)
    }

    /// Copy of this snapshot annotated against another control. Counts and
    /// timelines are carried over untouched.
    ///
    /// # Errors
    /// Returns `ControlIndexOutOfRange` if `control_index` is out of range.
    pub fn with_control(&self, control_index: usize) -> Result<Self> {
        let mut alternatives = self.alternatives.clone();
        annotate(&mut alternatives, control_index)?;
        Ok(Self {
            alternatives,
            control_index,
            ..self.clone()
        })
    }

    /// Name this snapshot was fetched for
    #[must_use]
    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    /// Canonical experiment name
    #[must_use]
    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    /// Family name
    #[must_use]
    pub fn hashable_name(&self) -> &str {
        &self.hashable_name
    }

    /// Alternative the experiment was stopped on, if any
    #[must_use]
    pub const fn short_circuit_number(&self) -> Option<usize> {
        self.short_circuit_number
    }

    /// Whether the experiment is still running
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.live
    }

    /// Annotated alternatives in stable order
    #[must_use]
    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    /// Timeline series, each sorted by timestamp
    #[must_use]
    pub fn timeline_series(&self) -> &[TimelineSeries] {
        &self.timeline_series
    }

    /// Chart axis title
    #[must_use]
    pub fn y_axis_title(&self) -> &str {
        &self.y_axis_title
    }

    /// Index of the control alternative
    #[must_use]
    pub const fn control_index(&self) -> usize {
        self.control_index
    }

    /// The control alternative, `None` only for a deserialized snapshot
    /// whose control index is out of range
    #[must_use]
    pub fn control(&self) -> Option<&Alternative> {
        self.alternatives.get(self.control_index)
    }

    /// Participants across all alternatives
    #[must_use]
    pub fn total_participants(&self) -> u64 {
        self.alternatives.iter().map(Alternative::participants).sum()
    }

    /// Conversions across all alternatives
    #[must_use]
    pub fn total_conversions(&self) -> u64 {
        self.alternatives.iter().map(Alternative::conversions).sum()
    }

    /// Plain-language result for a two-alternative experiment.
    ///
    /// # Errors
    /// See [`describe_result`].
    pub fn describe_result(&self, small_sample_threshold: u64) -> Result<String> {
        describe_result(&self.alternatives, small_sample_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::{AlternativePayload, TimelinePayload};

    fn payload() -> SnapshotPayload {
        SnapshotPayload {
            canonical_name: "mario points".to_string(),
            hashable_name: "mario points".to_string(),
            short_circuit_number: -1,
            live: true,
            alternatives: vec![
                AlternativePayload {
                    content: "off".into(),
                    participants: 1000,
                    conversions: 100,
                    conversion_rate: Some(0.1),
                },
                AlternativePayload {
                    content: "on".into(),
                    participants: 1000,
                    conversions: 150,
                    conversion_rate: None,
                },
            ],
            timeline_series: vec![TimelinePayload {
                name: "on".to_string(),
                data: vec![(3_000, 900, 140), (1_000, 100, 10)],
            }],
            y_axis_title: "Conversions".to_string(),
        }
    }

    #[test]
    fn test_from_payload() {
        let snapshot = ExperimentSnapshot::from_payload("mario points", payload(), |_| 0).unwrap();

        assert_eq!(snapshot.experiment_name(), "mario points");
        assert_eq!(snapshot.short_circuit_number(), None);
        assert_eq!(snapshot.total_participants(), 2000);
        assert_eq!(snapshot.total_conversions(), 250);
        assert_eq!(snapshot.control().unwrap().display_content(), "off");
        assert_eq!(
            snapshot.timeline_series()[0].samples()[0].participants(),
            100
        );
    }

    #[test]
    fn test_short_circuit_number() {
        let mut p = payload();
        p.short_circuit_number = 1;
        p.live = false;
        let snapshot = ExperimentSnapshot::from_payload("mario points", p, |_| 0).unwrap();
        assert_eq!(snapshot.short_circuit_number(), Some(1));
        assert!(!snapshot.is_live());
    }

    #[test]
    fn test_empty_alternatives_rejected() {
        let mut p = payload();
        p.alternatives.clear();
        let err = ExperimentSnapshot::from_payload("mario points", p, |_| 0).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
    }

    #[test]
    fn test_with_control_keeps_counts() {
        let snapshot = ExperimentSnapshot::from_payload("mario points", payload(), |_| 0).unwrap();
        let switched = snapshot.with_control(1).unwrap();

        assert_eq!(switched.control_index(), 1);
        assert!(switched.alternatives()[1].is_control());
        assert_eq!(switched.total_participants(), snapshot.total_participants());
        assert_eq!(switched.timeline_series(), snapshot.timeline_series());
    }

    #[test]
    fn test_control_of_deserialized_snapshot() {
        let snapshot = ExperimentSnapshot::from_payload("mario points", payload(), |_| 0).unwrap();
        let mut json = serde_json::to_value(&snapshot).unwrap();
        json["control_index"] = serde_json::json!(7);

        let corrupt: ExperimentSnapshot = serde_json::from_value(json).unwrap();
        assert!(corrupt.control().is_none());
        assert_eq!(snapshot.control().map(Alternative::number), Some(0));
    }

    #[test]
    fn test_describe_result() {
        let snapshot = ExperimentSnapshot::from_payload("mario points", payload(), |_| 0).unwrap();
        let words = snapshot.describe_result(10).unwrap();
        assert!(words.contains("[on]"));
    }
}
