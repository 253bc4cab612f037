//! Experiment statistics
//!
//! - [`normal`]: error function and normal CDF
//! - [`significance`]: two-proportion z-test, p-value bands, relative rates
//! - [`summary`]: plain-language description of a two-arm result

pub mod normal;
pub mod significance;
pub mod summary;

pub use normal::{cdf, erf, normal_cdf};
pub use significance::{
    one_sided_p_value, relative_rate, relative_rate_intensity, z_score, Direction, PValueBand,
    RelativeRate, Significance,
};
pub use summary::{describe_result, Confidence, DEFAULT_SMALL_SAMPLE_THRESHOLD};
