//! Plain-language summary of a two-alternative experiment
//!
//! Uses a z-score cheat sheet rather than the continuous p-value so the
//! wording stays stable as counts trickle in.

use super::significance::z_score;
use crate::experiment::Alternative;
use crate::{Error, Result};

/// Participants below which results get a small-sample caution.
pub const DEFAULT_SMALL_SAMPLE_THRESHOLD: u64 = 10;

/// Confidence level reached by a z-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Confidence {
    /// |z| > 1.29 (p = 0.10)
    Ninety,
    /// |z| > 1.65 (p = 0.05)
    NinetyFive,
    /// |z| > 2.33 (p = 0.01)
    NinetyNine,
    /// |z| > 3.08 (p = 0.001)
    NinetyNinePointNine,
}

impl Confidence {
    const CHEAT_SHEET: [(f64, Self); 4] = [
        (1.29, Self::Ninety),
        (1.65, Self::NinetyFive),
        (2.33, Self::NinetyNine),
        (3.08, Self::NinetyNinePointNine),
    ];

    /// Strongest level whose critical value `|z|` exceeds.
    #[must_use]
    pub fn from_z_score(z: f64) -> Option<Self> {
        let z = z.abs();
        Self::CHEAT_SHEET
            .iter()
            .rev()
            .find(|(critical, _)| z > *critical)
            .map(|(_, level)| *level)
    }

    /// p-value this level corresponds to
    #[must_use]
    pub const fn p_value(&self) -> f64 {
        match self {
            Self::Ninety => 0.10,
            Self::NinetyFive => 0.05,
            Self::NinetyNine => 0.01,
            Self::NinetyNinePointNine => 0.001,
        }
    }

    /// Likelihood label, e.g. `"95%"`
    #[must_use]
    pub const fn percentage(&self) -> &'static str {
        match self {
            Self::Ninety => "90%",
            Self::NinetyFive => "95%",
            Self::NinetyNine => "99%",
            Self::NinetyNinePointNine => "99.9%",
        }
    }

    /// Description in words
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Ninety => "fairly confident",
            Self::NinetyFive => "confident",
            Self::NinetyNine => "very confident",
            Self::NinetyNinePointNine => "extremely confident",
        }
    }
}

/// Describe which of two alternatives is winning and how confident the
/// test is about it.
///
/// # Errors
/// Returns `UnsupportedComparison` unless there are exactly two
/// alternatives, and `NoData` if either has no participants or the
/// z-score cannot be computed.
pub fn describe_result(alternatives: &[Alternative], small_sample_threshold: u64) -> Result<String> {
    let [first, second] = alternatives else {
        return Err(Error::UnsupportedComparison(alternatives.len()));
    };

    if first.participants() == 0 || second.participants() == 0 {
        return Err(Error::NoData(
            "can't calculate the z score if either alternative lacks participants".to_string(),
        ));
    }

    let z = z_score(
        first.conversion_rate(),
        second.conversion_rate(),
        first.participants(),
        second.participants(),
    )
    .ok_or_else(|| {
        Error::NoData(
            "can't calculate the z score when multiple conversions per participant are allowed"
                .to_string(),
        )
    })?;

    let mut words = String::new();

    if first.participants() < small_sample_threshold
        || second.participants() < small_sample_threshold
    {
        words.push_str(
            "Take these results with a grain of salt since your samples are so small: ",
        );
    }

    let (best, worst) = if second.conversion_rate() > first.conversion_rate() {
        (second, first)
    } else {
        (first, second)
    };

    words.push_str(&format!(
        "The best alternative you have is: [{}], which had {} conversions from {} participants ({}). \
         The other alternative was [{}], which had {} conversions from {} participants ({}). ",
        best.display_content(),
        best.conversions(),
        best.participants(),
        best.pretty_conversion_rate(),
        worst.display_content(),
        worst.conversions(),
        worst.participants(),
        worst.pretty_conversion_rate(),
    ));

    match Confidence::from_z_score(z) {
        None => words.push_str("However, this difference is not statistically significant."),
        Some(level) => {
            words.push_str(&format!(
                "This difference is {} likely to be statistically significant, which means you can be \
                 {} that it is the result of your alternatives actually mattering, rather than being \
                 due to random chance. However, this statistical test can't measure how likely the \
                 currently observed magnitude of the difference is to be accurate or not. It only \
                 says \"better,\" not \"better by so much.\"",
                level.percentage(),
                level.description(),
            ));
        }
    }

    Ok(words)
}
