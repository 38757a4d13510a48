//! Reaction-time summaries shared by every rollup level
//!
//! - [`Summary`]: the five descriptive features of an RT array
//! - [`Normality`]: Shapiro-Wilk based classification of the same array
//! - [`ConditionSummary`]: a summary plus normality and the RTs it was built from,
//!   used for the per-condition maps
//!
//! An empty array is summarized as if it held a single NaN: every feature is
//! NaN and normality is [`Normality::InsufficientData`]. Missing groups stay
//! visible in the output instead of aborting a rollup.

use std::str::FromStr;

use rtfeat_stats::{descriptive::DescriptiveStats, normality::ShapiroWilk};
use serde::{Deserialize, Serialize};

/// Significance level of the normality test.
pub const NORMALITY_ALPHA: f64 = 0.05;

/// Descriptive features of an RT array, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    /// Summarizes `rt`; an empty slice yields all-NaN features.
    ///
    /// # Examples
    ///
    /// ```
    /// use rtfeat_analysis::summary::Summary;
    ///
    /// let summary = Summary::from_values(&[100.0, 200.0, 300.0]);
    /// assert_eq!(summary.mean, 200.0);
    /// assert!(Summary::from_values(&[]).mean.is_nan());
    /// ```
    #[must_use]
    pub fn from_values(rt: &[f64]) -> Self {
        DescriptiveStats::new(rt.iter().copied())
            .unwrap_or_else(DescriptiveStats::missing)
            .into()
    }

    #[must_use]
    pub fn get(&self, field: SummaryField) -> f64 {
        match field {
            SummaryField::Mean => self.mean,
            SummaryField::Median => self.median,
            SummaryField::Std => self.std,
            SummaryField::Min => self.min,
            SummaryField::Max => self.max,
        }
    }

    /// Whether this summary stands for an empty group.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.mean.is_nan()
    }
}

impl From<DescriptiveStats> for Summary {
    fn from(stats: DescriptiveStats) -> Self {
        Self {
            mean: stats.mean,
            median: stats.median,
            std: stats.std_dev,
            min: stats.min,
            max: stats.max,
        }
    }
}

/// Normality classification of an RT distribution.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    derive_more::Display,
    derive_more::IsVariant,
)]
#[serde(rename_all = "snake_case")]
pub enum Normality {
    #[display("normal")]
    Normal,
    #[display("not normal")]
    NotNormal,
    #[display("insufficient data")]
    InsufficientData,
}

impl Normality {
    /// Classifies `rt` with a Shapiro-Wilk test at [`NORMALITY_ALPHA`].
    ///
    /// Fewer than three values are [`InsufficientData`](Self::InsufficientData).
    #[must_use]
    pub fn classify(rt: &[f64]) -> Self {
        match ShapiroWilk::test(rt.iter().copied()) {
            None => Self::InsufficientData,
            Some(result) if result.p_value > NORMALITY_ALPHA => Self::Normal,
            Some(_) => Self::NotNormal,
        }
    }
}

/// Summary of one condition group, with its diagnostics and raw RTs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionSummary {
    pub summary: Summary,
    pub normality: Normality,
    /// RTs of the accepted trials in this group, after filtering
    pub rt: Vec<f64>,
}

impl ConditionSummary {
    #[must_use]
    pub fn from_values(rt: Vec<f64>) -> Self {
        Self {
            summary: Summary::from_values(&rt),
            normality: Normality::classify(&rt),
            rt,
        }
    }
}

/// One of the five summary features.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum SummaryField {
    #[display("mean")]
    Mean,
    #[display("median")]
    Median,
    #[display("std")]
    Std,
    #[display("min")]
    Min,
    #[display("max")]
    Max,
}

impl SummaryField {
    pub const ALL: [Self; 5] = [Self::Mean, Self::Median, Self::Std, Self::Min, Self::Max];

    /// Whether comparisons report absolute and percentage differences for this field.
    #[must_use]
    pub fn has_difference(self) -> bool {
        matches!(self, Self::Mean | Self::Median)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unknown summary field '{name}'")]
pub struct UnknownSummaryFieldError {
    pub name: String,
}

impl FromStr for SummaryField {
    type Err = UnknownSummaryFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownSummaryFieldError { name: s.to_owned() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_group_is_all_nan() {
        let summary = Summary::from_values(&[]);
        assert!(summary.is_missing());
        for field in SummaryField::ALL {
            assert!(summary.get(field).is_nan(), "{field} should be NaN");
        }
        let group = ConditionSummary::from_values(vec![]);
        assert_eq!(group.normality, Normality::InsufficientData);
    }

    #[test]
    fn test_reference_summary() {
        let summary = Summary::from_values(&[100.0, 200.0, 300.0]);
        assert_eq!(summary.mean, 200.0);
        assert_eq!(summary.median, 200.0);
        assert!((summary.std - 81.6497).abs() < 1e-4);
        assert_eq!(summary.min, 100.0);
        assert_eq!(summary.max, 300.0);
    }

    #[test]
    fn test_normality_needs_three_values() {
        assert_eq!(Normality::classify(&[300.0, 310.0]), Normality::InsufficientData);
        assert!(Normality::classify(&[300.0, 310.0, 320.0]).is_normal());
    }

    #[test]
    fn test_skewed_group_is_not_normal() {
        let mut rt = vec![300.0; 15];
        rt.extend((0..15).map(|i| 300.0 + f64::from(i)));
        rt.extend([1500.0, 1900.0]);
        assert!(Normality::classify(&rt).is_not_normal());
    }

    #[test]
    fn test_field_names() {
        assert_eq!("mean".parse::<SummaryField>().unwrap(), SummaryField::Mean);
        assert_eq!(" STD ".parse::<SummaryField>().unwrap(), SummaryField::Std);
        assert!("variance".parse::<SummaryField>().is_err());
        assert!(SummaryField::Median.has_difference());
        assert!(!SummaryField::Max.has_difference());
    }
}
