//! Tracking client
//!
//! Records conversions and requests alternative assignments. Each
//! conversion name is submitted as its own request; recording is
//! idempotent on the authority side, so repeats succeed like first calls.
//!
//! Without JSON transport every call is a silent no-op and returns `None`:
//! no request is issued and no outcome is delivered.
//!
//! # Example
//!
//! ```rust
//! use bingo_stats::authority::MemoryAuthority;
//! use bingo_stats::tracking::TrackingClient;
//!
//! # async fn example() -> bingo_stats::Result<()> {
//! let client = TrackingClient::new(MemoryAuthority::new());
//!
//! let assigned = client
//!     .assign("mario points", Some([("on", 90), ("off", 10)]), Some(["mario_yay"]))
//!     .await
//!     .transpose()?;
//! assert_eq!(assigned, Some(serde_json::json!("on")));
//!
//! let outcomes = client.convert("mario_yay").await.unwrap_or_default();
//! assert!(outcomes.iter().all(Result::is_ok));
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::authority::{AssignRequest, ConversionRequest, ExperimentAuthority};
use crate::config::EngineConfig;
use crate::{Error, Result};

/// One or more conversion names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversions(Vec<String>);

impl Conversions {
    /// Names in submission order
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for Conversions {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for Conversions {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for Conversions {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<&[&str]> for Conversions {
    fn from(names: &[&str]) -> Self {
        Self(names.iter().map(ToString::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Conversions {
    fn from(names: [&str; N]) -> Self {
        Self(names.iter().map(ToString::to_string).collect())
    }
}

/// Client for conversion recording and alternative assignment.
///
/// Assignments are remembered per canonical name for the client's
/// lifetime.
#[derive(Debug)]
pub struct TrackingClient<A: ExperimentAuthority> {
    authority: A,
    json_transport: bool,
    assignments: DashMap<String, serde_json::Value>,
}

impl<A: ExperimentAuthority> TrackingClient<A> {
    /// Create a client with JSON transport available.
    #[must_use]
    pub fn new(authority: A) -> Self {
        Self {
            authority,
            json_transport: true,
            assignments: DashMap::new(),
        }
    }

    /// Create a client configured from `config`.
    #[must_use]
    pub fn with_config(authority: A, config: &EngineConfig) -> Self {
        Self {
            json_transport: config.json_transport,
            ..Self::new(authority)
        }
    }

    /// The authority requests go to
    #[must_use]
    pub const fn authority(&self) -> &A {
        &self.authority
    }

    /// Whether calls reach the authority
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.json_transport
    }

    /// Record one or more conversions.
    ///
    /// Returns one outcome per name, in order, or `None` without JSON
    /// transport. Failures are not retried.
    pub async fn convert(&self, conversions: impl Into<Conversions>) -> Option<Vec<Result<()>>> {
        if !self.json_transport {
            return None;
        }

        let Conversions(names) = conversions.into();
        let mut outcomes = Vec::with_capacity(names.len());
        for name in names {
            let request = ConversionRequest { convert: name };
            let outcome = self.authority.record_conversion(&request).await;
            match &outcome {
                Ok(()) => debug!(conversion = %request.convert, "conversion recorded"),
                Err(e) => warn!(conversion = %request.convert, error = %e, "conversion failed"),
            }
            outcomes.push(outcome);
        }
        Some(outcomes)
    }

    /// Request the caller's alternative for `canonical_name`, creating the
    /// experiment on the authority if needed.
    ///
    /// `alternatives` maps labels to relative weights; `conversion_names`
    /// lists the conversions that count for the experiment. Returns `None`
    /// without JSON transport.
    pub async fn assign<W, L, C, N>(
        &self,
        canonical_name: &str,
        alternatives: Option<W>,
        conversion_names: Option<C>,
    ) -> Option<Result<serde_json::Value>>
    where
        W: IntoIterator<Item = (L, u32)>,
        L: Into<String>,
        C: IntoIterator<Item = N>,
        N: Into<String>,
    {
        if !self.json_transport {
            return None;
        }

        let request = AssignRequest {
            canonical_name: canonical_name.to_string(),
            alternative_weights: alternatives.map(|weights| {
                weights
                    .into_iter()
                    .map(|(label, weight)| (label.into(), weight))
                    .collect::<BTreeMap<String, u32>>()
            }),
            conversion_names: conversion_names
                .map(|names| names.into_iter().map(Into::into).collect()),
        };

        Some(self.request_assignment(&request).await)
    }

    /// Alternative previously assigned for `canonical_name`.
    #[must_use]
    pub fn assigned(&self, canonical_name: &str) -> Option<serde_json::Value> {
        self.assignments
            .get(canonical_name)
            .map(|label| label.value().clone())
    }

    /// Every assignment received so far.
    #[must_use]
    pub fn assignments(&self) -> BTreeMap<String, serde_json::Value> {
        self.assignments
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    async fn request_assignment(&self, request: &AssignRequest) -> Result<serde_json::Value> {
        let mut response = self.authority.assign(request).await?;
        let label = response.remove(&request.canonical_name).ok_or_else(|| {
            Error::InvalidPayload(format!(
                "assignment response has no entry for {}",
                request.canonical_name
            ))
        })?;

        debug!(canonical = %request.canonical_name, alternative = %label, "alternative assigned");
        self.assignments
            .insert(request.canonical_name.clone(), label.clone());
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::MemoryAuthority;

    const NO_WEIGHTS: Option<[(&str, u32); 0]> = None;
    const NO_CONVERSIONS: Option<[&str; 0]> = None;

    #[tokio::test]
    async fn test_assign_caches_label() {
        let client = TrackingClient::new(MemoryAuthority::new());
        let label = client
            .assign("mario points", Some([("off", 10), ("on", 90)]), Some(["mario_yay"]))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(label, serde_json::json!("on"));
        assert_eq!(client.assigned("mario points"), Some(label));
        assert_eq!(client.assignments().len(), 1);
    }

    #[tokio::test]
    async fn test_assign_without_params() {
        let client = TrackingClient::new(MemoryAuthority::new());
        let label = client
            .assign("plain", NO_WEIGHTS, NO_CONVERSIONS)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(label, serde_json::json!(true));
    }

    #[tokio::test]
    async fn test_convert_single_and_repeat() {
        let client = TrackingClient::new(MemoryAuthority::new());
        client
            .assign("exp", NO_WEIGHTS, Some(["done"]))
            .await
            .unwrap()
            .unwrap();

        let first = client.convert("done").await.unwrap();
        let repeat = client.convert("done").await.unwrap();
        assert_eq!(first, vec![Ok(())]);
        assert_eq!(repeat, vec![Ok(())]);
    }

    #[tokio::test]
    async fn test_convert_many_independently() {
        let client = TrackingClient::new(MemoryAuthority::new());
        client
            .assign("exp", NO_WEIGHTS, Some(["a", "b"]))
            .await
            .unwrap()
            .unwrap();

        let outcomes = client.convert(["a", "missing", "b"]).await.unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_ok());
        assert_eq!(
            outcomes[1],
            Err(Error::NoSuchConversion("missing".to_string()))
        );
        assert!(outcomes[2].is_ok());
        assert_eq!(client.authority().conversion_request_count(), 3);
    }

    #[tokio::test]
    async fn test_disabled_transport_is_silent() {
        let config = EngineConfig::default().json_transport(false);
        let client = TrackingClient::with_config(MemoryAuthority::new(), &config);

        assert!(!client.is_enabled());
        assert!(client.convert("done").await.is_none());
        assert!(client.assign("exp", NO_WEIGHTS, NO_CONVERSIONS).await.is_none());
        assert_eq!(client.authority().conversion_request_count(), 0);
        assert!(client.authority().is_empty());
        assert!(client.assigned("exp").is_none());
    }

    #[test]
    fn test_conversions_from() {
        assert_eq!(Conversions::from("a").names(), ["a".to_string()]);
        assert_eq!(
            Conversions::from(vec!["a".to_string(), "b".to_string()]).names().len(),
            2
        );
        let names: &[&str] = &["x", "y"];
        assert_eq!(Conversions::from(names).names().len(), 2);
    }
}
