//! Engine configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.

use serde::{Deserialize, Serialize};

use crate::stats::DEFAULT_SMALL_SAMPLE_THRESHOLD;
use crate::{Error, Result};

/// Configuration shared by the conversion cache, tracking client and
/// logging setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Let archived experiments answer snapshot requests
    pub include_archived: bool,
    /// JSON transport is available; without it tracking calls are no-ops
    pub json_transport: bool,
    /// Participants below which result summaries carry a caution
    pub small_sample_threshold: u64,
    /// Default `tracing` filter directive (overridden by `RUST_LOG`)
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            include_archived: false,
            json_transport: true,
            small_sample_threshold: DEFAULT_SMALL_SAMPLE_THRESHOLD,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    /// Returns `Config` for malformed JSON or invalid values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that values are usable.
    ///
    /// # Errors
    /// Returns `Config` if `log_filter` is blank.
    pub fn validate(&self) -> Result<()> {
        if self.log_filter.trim().is_empty() {
            return Err(Error::Config("log_filter must not be empty".to_string()));
        }
        Ok(())
    }

    /// Set whether archived experiments are fetched
    #[must_use]
    pub const fn include_archived(mut self, include: bool) -> Self {
        self.include_archived = include;
        self
    }

    /// Set JSON transport availability
    #[must_use]
    pub const fn json_transport(mut self, available: bool) -> Self {
        self.json_transport = available;
        self
    }

    /// Set the small-sample caution threshold
    #[must_use]
    pub const fn small_sample_threshold(mut self, participants: u64) -> Self {
        self.small_sample_threshold = participants;
        self
    }

    /// Set the default log filter
    #[must_use]
    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }
}
