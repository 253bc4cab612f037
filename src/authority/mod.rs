//! Experiment authority protocol
//!
//! The authority is the remote side that assigns alternatives, tallies
//! conversions and answers snapshot requests. Transport is left to the
//! implementor; errors come back verbatim and are never retried here.
//!
//! # Example
//!
//! ```rust
//! use bingo_stats::authority::{ExperimentAuthority, MemoryAuthority, SnapshotRequest};
//!
//! # async fn example() -> bingo_stats::Result<()> {
//! let authority = MemoryAuthority::new();
//! authority.define("mario points", ["off", "on"], ["mario_yay"]);
//!
//! let payload = authority
//!     .fetch_snapshot(&SnapshotRequest {
//!         experiment_name: "mario points".to_string(),
//!         include_archived: false,
//!     })
//!     .await?;
//! assert_eq!(payload.alternatives.len(), 2);
//! # Ok(())
//! # }
//! ```

mod memory;
mod wire;

pub use memory::MemoryAuthority;
pub use wire::{
    AlternativePayload, AssignRequest, AssignResponse, ConversionRequest, SnapshotPayload,
    SnapshotRequest, TimelinePayload,
};

use crate::Result;
use std::future::Future;
use std::sync::Arc;

/// Remote authority for experiment assignment, conversion tallies and
/// snapshots.
pub trait ExperimentAuthority: Send + Sync {
    /// Fetch the current snapshot of one experiment.
    fn fetch_snapshot(
        &self,
        request: &SnapshotRequest,
    ) -> impl Future<Output = Result<SnapshotPayload>> + Send;

    /// Request (and implicitly create) an experiment and return the
    /// caller's assigned alternative.
    fn assign(&self, request: &AssignRequest) -> impl Future<Output = Result<AssignResponse>> + Send;

    /// Record one conversion. Recording an already recorded conversion
    /// succeeds.
    fn record_conversion(
        &self,
        request: &ConversionRequest,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl<T: ExperimentAuthority> ExperimentAuthority for Arc<T> {
    fn fetch_snapshot(
        &self,
        request: &SnapshotRequest,
    ) -> impl Future<Output = Result<SnapshotPayload>> + Send {
        (**self).fetch_snapshot(request)
    }

    fn assign(&self, request: &AssignRequest) -> impl Future<Output = Result<AssignResponse>> + Send {
        (**self).assign(request)
    }

    fn record_conversion(
        &self,
        request: &ConversionRequest,
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).record_conversion(request)
    }
}
