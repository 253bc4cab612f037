//! # bingo-stats: A/B Experiment Statistics Engine
//!
//! Decides whether an experiment alternative outperforms its control:
//!
//! - **Control inference**: picks the baseline when none is marked
//! - **Relative rates**: conversion-rate change of each alternative vs control
//! - **Significance**: two-proportion z-test banded into confidence labels
//! - **Conversion cache**: one fetch per experiment, shared by concurrent
//!   callers, with forced refresh and control overrides
//! - **Tracking**: fire-and-forget conversion recording and assignment
//!
//! ## Example Usage
//!
//! ```rust
//! use bingo_stats::authority::MemoryAuthority;
//! use bingo_stats::cache::ConversionCache;
//! use bingo_stats::stats::PValueBand;
//!
//! # async fn example() -> bingo_stats::Result<()> {
//! let authority = MemoryAuthority::new();
//! authority.define("mario points", ["off", "on"], ["mario_yay"]);
//! authority.set_counts("mario points", 0, 1000, 100)?;
//! authority.set_counts("mario points", 1, 1000, 150)?;
//!
//! let cache = ConversionCache::new(authority);
//! let snapshot = cache.get("mario points", false).await?;
//!
//! let on = &snapshot.alternatives()[1];
//! assert_eq!(on.relative_rate().unwrap().to_string(), "+50.00%");
//! assert_eq!(on.significance().unwrap().band, PValueBand::BelowPointOnePercent);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod authority;
pub mod cache;
pub mod config;
pub mod control;
pub mod error;
pub mod experiment;
pub mod logging;
pub mod stats;
pub mod tracking;

pub use cache::ConversionCache;
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use tracking::TrackingClient;
