//! In-memory experiment authority using `DashMap`.
//!
//! Stands in for the remote authority in tests and demos. It models a
//! single participant: the first assignment to an experiment counts one
//! participant, and the first conversion for it counts one conversion.
//! Assignment picks the heaviest-weighted alternative (first on ties), so
//! results are deterministic.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use super::{
    AlternativePayload, AssignRequest, AssignResponse, ConversionRequest, ExperimentAuthority,
    SnapshotPayload, SnapshotRequest, TimelinePayload,
};
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct StoredExperiment {
    payload: SnapshotPayload,
    weights: Vec<u32>,
    conversion_names: Vec<String>,
    assigned: Option<usize>,
    converted: bool,
    archived: bool,
}

impl StoredExperiment {
    fn new(payload: SnapshotPayload, conversion_names: Vec<String>) -> Self {
        let weights = vec![1; payload.alternatives.len()];
        Self {
            payload,
            weights,
            conversion_names,
            assigned: None,
            converted: false,
            archived: false,
        }
    }

    fn heaviest(&self) -> usize {
        let mut best = 0;
        for (index, weight) in self.weights.iter().enumerate() {
            if *weight > self.weights[best] {
                best = index;
            }
        }
        best
    }
}

/// In-memory authority keyed by experiment name.
///
/// Thread-safe; all operations are O(1) apart from conversion lookup,
/// which scans experiments for the conversion name.
#[derive(Debug, Default)]
pub struct MemoryAuthority {
    experiments: DashMap<String, StoredExperiment>,
    failures: DashMap<String, Error>,
    fetches: AtomicUsize,
    conversion_requests: AtomicUsize,
    latency: Option<Duration>,
}

impl MemoryAuthority {
    /// Create an empty authority that answers immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty authority that sleeps `latency` before answering
    /// each request.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Define an experiment whose canonical and hashable names equal
    /// `name`, with zero counts and equal weights.
    pub fn define<A, C>(&self, name: &str, alternatives: A, conversion_names: C)
    where
        A: IntoIterator,
        A::Item: Into<serde_json::Value>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let payload = SnapshotPayload {
            canonical_name: name.to_string(),
            hashable_name: name.to_string(),
            short_circuit_number: -1,
            live: true,
            alternatives: alternatives
                .into_iter()
                .map(|content| AlternativePayload {
                    content: content.into(),
                    participants: 0,
                    conversions: 0,
                    conversion_rate: None,
                })
                .collect(),
            timeline_series: Vec::new(),
            y_axis_title: String::new(),
        };
        let conversion_names = conversion_names.into_iter().map(Into::into).collect();
        self.experiments
            .insert(name.to_string(), StoredExperiment::new(payload, conversion_names));
    }

    /// Store a full payload under `experiment_name`, replacing any
    /// existing experiment of that name.
    pub fn insert_snapshot(&self, experiment_name: &str, payload: SnapshotPayload) {
        self.experiments.insert(
            experiment_name.to_string(),
            StoredExperiment::new(payload, Vec::new()),
        );
    }

    /// Overwrite the counts of one alternative.
    ///
    /// # Errors
    /// Returns `UnknownExperiment` for an unknown name and
    /// `ControlIndexOutOfRange` for an unknown alternative.
    pub fn set_counts(
        &self,
        experiment_name: &str,
        alternative: usize,
        participants: u64,
        conversions: u64,
    ) -> Result<()> {
        let mut stored = self
            .experiments
            .get_mut(experiment_name)
            .ok_or_else(|| Error::UnknownExperiment(experiment_name.to_string()))?;
        let len = stored.payload.alternatives.len();
        let alt = stored
            .payload
            .alternatives
            .get_mut(alternative)
            .ok_or(Error::ControlIndexOutOfRange {
                index: alternative,
                len,
            })?;
        alt.participants = participants;
        alt.conversions = conversions;
        Ok(())
    }

    /// Append the current counts of every alternative to its timeline.
    ///
    /// # Errors
    /// Returns `UnknownExperiment` for an unknown name.
    pub fn record_timeline_sample(&self, experiment_name: &str, millis: i64) -> Result<()> {
        let mut stored = self
            .experiments
            .get_mut(experiment_name)
            .ok_or_else(|| Error::UnknownExperiment(experiment_name.to_string()))?;
        let payload = &mut stored.payload;

        for (index, alt) in payload.alternatives.iter().enumerate() {
            let name = match &alt.content {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if payload.timeline_series.len() <= index {
                payload.timeline_series.push(TimelinePayload {
                    name,
                    data: Vec::new(),
                });
            }
            payload.timeline_series[index]
                .data
                .push((millis, alt.participants, alt.conversions));
        }
        Ok(())
    }

    /// Archive an experiment so it only answers requests that include
    /// archived experiments.
    ///
    /// # Errors
    /// Returns `UnknownExperiment` for an unknown name.
    pub fn archive(&self, experiment_name: &str) -> Result<()> {
        let mut stored = self
            .experiments
            .get_mut(experiment_name)
            .ok_or_else(|| Error::UnknownExperiment(experiment_name.to_string()))?;
        stored.archived = true;
        stored.payload.live = false;
        Ok(())
    }

    /// Make every snapshot fetch for `experiment_name` fail with `error`.
    pub fn fail_fetches(&self, experiment_name: &str, error: Error) {
        self.failures.insert(experiment_name.to_string(), error);
    }

    /// Stop failing fetches for `experiment_name`.
    pub fn clear_failure(&self, experiment_name: &str) {
        self.failures.remove(experiment_name);
    }

    /// Number of snapshot fetches served (including failed ones).
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of conversion requests received.
    #[must_use]
    pub fn conversion_request_count(&self) -> usize {
        self.conversion_requests.load(Ordering::SeqCst)
    }

    /// Number of stored experiments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    /// Check if no experiments are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn with_rates(mut payload: SnapshotPayload) -> SnapshotPayload {
    for alt in &mut payload.alternatives {
        alt.conversion_rate = Some(if alt.participants == 0 {
            0.0
        } else {
            alt.conversions as f64 / alt.participants as f64
        });
    }
    payload
}

impl ExperimentAuthority for MemoryAuthority {
    async fn fetch_snapshot(&self, request: &SnapshotRequest) -> Result<SnapshotPayload> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        debug!(experiment = %request.experiment_name, "memory authority serving snapshot");
        self.simulate_latency().await;

        if let Some(error) = self.failures.get(&request.experiment_name) {
            return Err(error.value().clone());
        }

        let stored = self
            .experiments
            .get(&request.experiment_name)
            .filter(|stored| request.include_archived || !stored.archived)
            .ok_or_else(|| Error::UnknownExperiment(request.experiment_name.clone()))?;
        Ok(with_rates(stored.payload.clone()))
    }

    async fn assign(&self, request: &AssignRequest) -> Result<AssignResponse> {
        self.simulate_latency().await;

        let mut stored = self
            .experiments
            .entry(request.canonical_name.clone())
            .or_insert_with(|| {
                let (contents, weights): (Vec<serde_json::Value>, Vec<u32>) =
                    match &request.alternative_weights {
                        Some(weights) if !weights.is_empty() => weights
                            .iter()
                            .map(|(label, weight)| {
                                (serde_json::Value::String(label.clone()), *weight)
                            })
                            .unzip(),
                        _ => (vec![true.into(), false.into()], vec![1, 1]),
                    };
                let payload = SnapshotPayload {
                    canonical_name: request.canonical_name.clone(),
                    hashable_name: request.canonical_name.clone(),
                    short_circuit_number: -1,
                    live: true,
                    alternatives: contents
                        .into_iter()
                        .map(|content| AlternativePayload {
                            content,
                            participants: 0,
                            conversions: 0,
                            conversion_rate: None,
                        })
                        .collect(),
                    timeline_series: Vec::new(),
                    y_axis_title: String::new(),
                };
                let conversion_names = request
                    .conversion_names
                    .clone()
                    .unwrap_or_else(|| vec![request.canonical_name.clone()]);
                let mut experiment = StoredExperiment::new(payload, conversion_names);
                experiment.weights = weights;
                experiment
            });

        let index = match stored.assigned {
            Some(index) => index,
            None => {
                let index = stored.heaviest();
                stored.assigned = Some(index);
                stored.payload.alternatives[index].participants += 1;
                index
            }
        };

        let content = stored.payload.alternatives[index].content.clone();
        let mut response = AssignResponse::new();
        response.insert(request.canonical_name.clone(), content);
        Ok(response)
    }

    async fn record_conversion(&self, request: &ConversionRequest) -> Result<()> {
        self.conversion_requests.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let mut found = false;
        for mut stored in self.experiments.iter_mut() {
            if !stored.conversion_names.contains(&request.convert) {
                continue;
            }
            found = true;
            if let (Some(index), false) = (stored.assigned, stored.converted) {
                stored.converted = true;
                stored.payload.alternatives[index].conversions += 1;
            }
        }

        if found {
            Ok(())
        } else {
            Err(Error::NoSuchConversion(request.convert.clone()))
        }
    }
}
