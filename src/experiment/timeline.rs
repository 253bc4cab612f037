//! Timeline Series - per-alternative participation history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A single `(timestamp, participants, conversions)` sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineSample {
    timestamp: DateTime<Utc>,
    participants: u64,
    conversions: u64,
}

impl TimelineSample {
    /// Create a sample.
    #[must_use]
    pub const fn new(timestamp: DateTime<Utc>, participants: u64, conversions: u64) -> Self {
        Self {
            timestamp,
            participants,
            conversions,
        }
    }

    /// Decode a wire sample whose timestamp is in Unix epoch milliseconds.
    ///
    /// # Errors
    /// Returns `InvalidPayload` if the timestamp is out of range.
    pub fn from_millis(millis: i64, participants: u64, conversions: u64) -> Result<Self> {
        let timestamp = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            Error::InvalidPayload(format!("timeline timestamp out of range: {millis}"))
        })?;
        Ok(Self::new(timestamp, participants, conversions))
    }

    /// Sample time
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Participants at sample time
    #[must_use]
    pub const fn participants(&self) -> u64 {
        self.participants
    }

    /// Conversions at sample time
    #[must_use]
    pub const fn conversions(&self) -> u64 {
        self.conversions
    }
}

/// One alternative's history, ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineSeries {
    name: String,
    samples: Vec<TimelineSample>,
}

impl TimelineSeries {
    /// Create a series. Samples are sorted ascending by timestamp; samples
    /// sharing a timestamp keep their upstream order.
    #[must_use]
    pub fn new(name: impl Into<String>, mut samples: Vec<TimelineSample>) -> Self {
        samples.sort_by_key(TimelineSample::timestamp);
        Self {
            name: name.into(),
            samples,
        }
    }

    /// Series name (usually the alternative's content)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Samples in ascending timestamp order
    #[must_use]
    pub fn samples(&self) -> &[TimelineSample] {
        &self.samples
    }

    /// Most recent sample, if any
    #[must_use]
    pub fn latest(&self) -> Option<&TimelineSample> {
        self.samples.last()
    }

    /// Whether the series has no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
