//! Error types for bingo-stats
//!
//! Every failure is either absorbed into a sentinel statistic (`None`) or
//! returned to the caller. Nothing here is fatal to the process.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// bingo-stats error types
///
/// `Clone` so that a single failed fetch can be handed to every caller
/// waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A comparison needs participants on both sides
    #[error("No data: {0}")]
    NoData(String),

    /// Non-success response from the experiment authority
    #[error("Transport error (status {status}): {message}")]
    Transport {
        /// Status code reported by the transport
        status: u16,
        /// Message reported by the transport
        message: String,
    },

    /// The authority does not know this conversion name
    #[error("No experiment found for conversion: {0}")]
    NoSuchConversion(String),

    /// The authority does not know this experiment name
    #[error("No experiment matching name: {0}")]
    UnknownExperiment(String),

    /// Payload from the authority could not be decoded
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Control index does not address an alternative
    #[error("Control index {index} out of range for {len} alternatives")]
    ControlIndexOutOfRange {
        /// Requested control index
        index: usize,
        /// Number of alternatives in the experiment
        len: usize,
    },

    /// Statistics can only be summarized for two-alternative experiments
    #[error("Can't summarize an experiment with {0} alternatives (exactly 2 required)")]
    UnsupportedComparison(usize),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidPayload(err.to_string())
    }
}
