//! Experiment snapshot model
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentSnapshot (1) ──< Alternative (N)    [annotated vs control]
//!                        └──< TimelineSeries (N) ──< TimelineSample (N)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use bingo_stats::experiment::{annotate, Alternative};
//!
//! let mut alternatives = vec![
//!     Alternative::new(0, "off", 1000, 100),
//!     Alternative::new(1, "on", 1000, 150),
//! ];
//! annotate(&mut alternatives, 0)?;
//!
//! let rate = alternatives[1].relative_rate().unwrap();
//! assert_eq!(rate.to_string(), "+50.00%");
//! # Ok::<(), bingo_stats::Error>(())
//! ```

mod alternative;
mod annotate;
mod snapshot;
mod timeline;

pub use alternative::Alternative;
pub use annotate::annotate;
pub use snapshot::ExperimentSnapshot;
pub use timeline::{TimelineSample, TimelineSeries};
