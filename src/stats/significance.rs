//! Two-proportion significance test and relative-rate helpers
//!
//! All functions are pure. "Cannot compute" is expressed as `None` or
//! [`RelativeRate::NotApplicable`], never as an error.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::normal::normal_cdf;

/// Relative-rate percentage at which the intensity channels saturate.
pub const INTENSITY_CLAMP_PERCENT: f64 = 25.0;

/// Two-proportion z-score of `control_rate` against `treatment_rate`.
///
/// Returns `None` when either sample is empty or the pooled variance is
/// negative (multiple conversions per participant push rates above 1).
/// Identical deterministic rates have zero variance and score `0.0`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn z_score(
    control_rate: f64,
    treatment_rate: f64,
    control_n: u64,
    treatment_n: u64,
) -> Option<f64> {
    if control_n == 0 || treatment_n == 0 {
        return None;
    }

    let varc = control_rate * (1.0 - control_rate) / control_n as f64;
    let vart = treatment_rate * (1.0 - treatment_rate) / treatment_n as f64;
    let variance = varc + vart;

    if variance == 0.0 {
        return Some(0.0);
    }
    if variance < 0.0 || variance.is_nan() {
        return None;
    }

    Some((control_rate - treatment_rate) / variance.sqrt())
}

/// One-sided p-value for a z-score: `P(Z >= |z|)`.
#[must_use]
pub fn one_sided_p_value(z: f64) -> f64 {
    normal_cdf(-z.abs())
}

/// Coarse confidence label for a p-value.
///
/// Variants are ordered from tightest to loosest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PValueBand {
    /// p < 0.001
    BelowPointOnePercent,
    /// p < 0.01
    BelowOnePercent,
    /// p < 0.05
    BelowFivePercent,
    /// p < 0.1
    BelowTenPercent,
    /// p >= 0.1
    AboveTenPercent,
}

impl PValueBand {
    const THRESHOLDS: [(f64, Self); 4] = [
        (0.001, Self::BelowPointOnePercent),
        (0.01, Self::BelowOnePercent),
        (0.05, Self::BelowFivePercent),
        (0.1, Self::BelowTenPercent),
    ];

    /// Band a p-value. First matching threshold wins.
    #[must_use]
    pub fn from_p_value(p: f64) -> Self {
        Self::THRESHOLDS
            .iter()
            .find(|(threshold, _)| p < *threshold)
            .map_or(Self::AboveTenPercent, |(_, band)| *band)
    }

    /// Human-facing label
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::BelowPointOnePercent => "<0.1%",
            Self::BelowOnePercent => "<1%",
            Self::BelowFivePercent => "<5%",
            Self::BelowTenPercent => "<10%",
            Self::AboveTenPercent => ">10%",
        }
    }
}

impl fmt::Display for PValueBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Direction of an alternative's rate relative to control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Alternative converts better than control
    Up,
    /// Alternative converts the same or worse
    Down,
}

/// Relative difference of an alternative's conversion rate from control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RelativeRate {
    /// Control rate is zero, so no ratio exists
    NotApplicable,
    /// Measured change
    Change {
        /// Up or down
        direction: Direction,
        /// `|relative rate| * 100`, rounded to two decimals
        magnitude_percent: f64,
    },
}

impl RelativeRate {
    /// Signed percentage, `None` for [`RelativeRate::NotApplicable`].
    #[must_use]
    pub fn signed_percent(&self) -> Option<f64> {
        match *self {
            Self::NotApplicable => None,
            Self::Change {
                direction: Direction::Up,
                magnitude_percent,
            } => Some(magnitude_percent),
            Self::Change {
                direction: Direction::Down,
                magnitude_percent,
            } => Some(-magnitude_percent),
        }
    }

    /// Direction, `None` for [`RelativeRate::NotApplicable`].
    #[must_use]
    pub const fn direction(&self) -> Option<Direction> {
        match self {
            Self::NotApplicable => None,
            Self::Change { direction, .. } => Some(*direction),
        }
    }
}

impl fmt::Display for RelativeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotApplicable => f.write_str("N/A"),
            Self::Change {
                direction,
                magnitude_percent,
            } => {
                let sign = match direction {
                    Direction::Up => '+',
                    Direction::Down => '-',
                };
                write!(f, "{sign}{magnitude_percent:.2}%")
            }
        }
    }
}

/// Relative change of `alternative_rate` against `control_rate`.
#[must_use]
pub fn relative_rate(alternative_rate: f64, control_rate: f64) -> RelativeRate {
    if control_rate <= 0.0 || control_rate.is_nan() {
        return RelativeRate::NotApplicable;
    }

    let rr = (alternative_rate - control_rate) / control_rate;
    let direction = if rr > 0.0 {
        Direction::Up
    } else {
        Direction::Down
    };

    RelativeRate::Change {
        direction,
        magnitude_percent: (rr.abs() * 100.0 * 100.0).round() / 100.0,
    }
}

/// Map a signed relative-rate percentage onto `(red, green)` channel
/// intensities. Losses light red, gains light green; both saturate at
/// +/-25%.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn relative_rate_intensity(percent: f64) -> (u8, u8) {
    let scale = 255.0 / INTENSITY_CLAMP_PERCENT;
    let red = (percent.clamp(-INTENSITY_CLAMP_PERCENT, 0.0) * scale).round().abs();
    let green = (percent.clamp(0.0, INTENSITY_CLAMP_PERCENT) * scale).round();
    (red as u8, green as u8)
}

/// Significance of one alternative against control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Significance {
    /// Positive when the alternative converts better than control
    pub z_score: f64,
    /// One-sided p-value
    pub p_value: f64,
    /// Banded p-value
    pub band: PValueBand,
}

impl Significance {
    /// Compare an alternative `(rate, n)` against control `(rate, n)`.
    ///
    /// Returns `None` when the z-score is undefined.
    #[must_use]
    pub fn compare(
        alternative_rate: f64,
        alternative_n: u64,
        control_rate: f64,
        control_n: u64,
    ) -> Option<Self> {
        let z = z_score(alternative_rate, control_rate, alternative_n, control_n)?;
        let p_value = one_sided_p_value(z);
        Some(Self {
            z_score: z,
            p_value,
            band: PValueBand::from_p_value(p_value),
        })
    }
}
