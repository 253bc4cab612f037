//! Alternative - one arm of an experiment

use serde::{Deserialize, Serialize};

use crate::stats::{RelativeRate, Significance};

/// One arm of an experiment with its cumulative counts and derived
/// comparison against control.
///
/// The derived fields (`is_control`, `relative_rate`, `significance`) are
/// only meaningful after the annotation pass has run; the control itself
/// carries `None` for both comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    number: usize,
    content: serde_json::Value,
    participants: u64,
    conversions: u64,
    is_control: bool,
    relative_rate: Option<RelativeRate>,
    significance: Option<Significance>,
}

impl Alternative {
    /// Create an unannotated alternative.
    #[must_use]
    pub fn new(
        number: usize,
        content: impl Into<serde_json::Value>,
        participants: u64,
        conversions: u64,
    ) -> Self {
        Self {
            number,
            content: content.into(),
            participants,
            conversions,
            is_control: false,
            relative_rate: None,
            significance: None,
        }
    }

    /// Position within the experiment
    #[must_use]
    pub const fn number(&self) -> usize {
        self.number
    }

    /// Raw display content
    #[must_use]
    pub const fn content(&self) -> &serde_json::Value {
        &self.content
    }

    /// Content as text. Strings are returned without quotes, everything
    /// else in its JSON form (`true`, `42`, ...).
    #[must_use]
    pub fn display_content(&self) -> String {
        match &self.content {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Content with the first character upper-cased and the rest lower-cased
    #[must_use]
    pub fn pretty_content(&self) -> String {
        let text = self.display_content();
        let mut chars = text.chars();
        chars.next().map_or_else(String::new, |first| {
            first
                .to_uppercase()
                .chain(chars.flat_map(char::to_lowercase))
                .collect()
        })
    }

    /// Cumulative participant count
    #[must_use]
    pub const fn participants(&self) -> u64 {
        self.participants
    }

    /// Cumulative conversion count
    #[must_use]
    pub const fn conversions(&self) -> u64 {
        self.conversions
    }

    /// `conversions / participants`, or 0 without participants
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn conversion_rate(&self) -> f64 {
        if self.participants == 0 {
            return 0.0;
        }
        self.conversions as f64 / self.participants as f64
    }

    /// Conversion rate as a percentage with two decimals, e.g. `"10.00%"`
    #[must_use]
    pub fn pretty_conversion_rate(&self) -> String {
        format!("{:4.2}%", self.conversion_rate() * 100.0)
    }

    /// Whether this alternative is the baseline
    #[must_use]
    pub const fn is_control(&self) -> bool {
        self.is_control
    }

    /// Relative rate vs control (`None` for the control itself)
    #[must_use]
    pub const fn relative_rate(&self) -> Option<RelativeRate> {
        self.relative_rate
    }

    /// Significance vs control (`None` for the control or without data)
    #[must_use]
    pub const fn significance(&self) -> Option<Significance> {
        self.significance
    }

    pub(crate) fn set_comparison(
        &mut self,
        is_control: bool,
        relative_rate: Option<RelativeRate>,
        significance: Option<Significance>,
    ) {
        self.is_control = is_control;
        self.relative_rate = relative_rate;
        self.significance = significance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_rate_without_participants() {
        let alt = Alternative::new(0, "off", 0, 0);
        assert!(alt.conversion_rate().abs() < f64::EPSILON);
        assert_eq!(alt.pretty_conversion_rate(), "0.00%");
    }

    #[test]
    fn test_conversion_rate() {
        let alt = Alternative::new(1, "on", 1000, 150);
        assert!((alt.conversion_rate() - 0.15).abs() < f64::EPSILON);
        assert_eq!(alt.pretty_conversion_rate(), "15.00%");
    }

    #[test]
    fn test_display_content() {
        assert_eq!(Alternative::new(0, "old page", 0, 0).display_content(), "old page");
        assert_eq!(Alternative::new(0, false, 0, 0).display_content(), "false");
        assert_eq!(Alternative::new(0, 7, 0, 0).display_content(), "7");
    }

    #[test]
    fn test_pretty_content() {
        assert_eq!(Alternative::new(0, "nEW design", 0, 0).pretty_content(), "New design");
        assert_eq!(Alternative::new(0, true, 0, 0).pretty_content(), "True");
        assert_eq!(Alternative::new(0, "", 0, 0).pretty_content(), "");
    }

    #[test]
    fn test_new_is_unannotated() {
        let alt = Alternative::new(0, "x", 10, 1);
        assert!(!alt.is_control());
        assert!(alt.relative_rate().is_none());
        assert!(alt.significance().is_none());
    }
}
