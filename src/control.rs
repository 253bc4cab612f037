//! Control inference
//!
//! Decides which alternative is the baseline when the authority has not
//! marked one. Strategies are swappable so a cache can be built with a
//! different heuristic without touching the statistics.

use crate::experiment::Alternative;

/// Control index used when nothing identifies a baseline, and before any
/// inference has run.
pub const DEFAULT_CONTROL_INDEX: usize = 0;

/// Keywords that mark an alternative's content as control-like.
pub const DEFAULT_CONTROL_KEYWORDS: [&str; 4] = ["old", "original", "false", "control"];

/// Picks the control alternative of an experiment.
pub trait ControlStrategy: Send + Sync {
    /// Index of the control within `alternatives`.
    ///
    /// Must return an in-range index for a non-empty slice.
    fn infer_control(&self, alternatives: &[Alternative]) -> usize;
}

/// Case-sensitive substring match on display content.
///
/// The first alternative containing any keyword wins; with no match the
/// first alternative is the control.
///
/// # Example
///
/// ```rust
/// use bingo_stats::control::{ControlStrategy, KeywordControl};
/// use bingo_stats::experiment::Alternative;
///
/// let alternatives = vec![
///     Alternative::new(0, "variant A", 10, 1),
///     Alternative::new(1, "variant B (control)", 10, 2),
/// ];
/// assert_eq!(KeywordControl::default().infer_control(&alternatives), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordControl {
    keywords: Vec<String>,
}

impl KeywordControl {
    /// Strategy with the default keyword list.
    #[must_use]
    pub fn new() -> Self {
        Self::with_keywords(DEFAULT_CONTROL_KEYWORDS)
    }

    /// Strategy with a custom keyword list.
    #[must_use]
    pub fn with_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    /// Keywords in match order
    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    fn is_control_like(&self, content: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| content.contains(keyword.as_str()))
    }
}

impl Default for KeywordControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlStrategy for KeywordControl {
    fn infer_control(&self, alternatives: &[Alternative]) -> usize {
        alternatives
            .iter()
            .position(|alt| self.is_control_like(&alt.display_content()))
            .unwrap_or(DEFAULT_CONTROL_INDEX)
    }
}
