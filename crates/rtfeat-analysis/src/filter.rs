//! Physiological range filter for reaction times
//!
//! RTs outside a plausible physiological window (anticipations, lapses) are
//! dropped, and every array aligned with the RTs is filtered with the same
//! mask so the label of each surviving trial is preserved.

use serde::{Deserialize, Serialize};

/// Default lower limit in milliseconds (exclusive).
pub const DEFAULT_LOWER_LIMIT: f64 = 200.0;
/// Default upper limit in milliseconds (exclusive).
pub const DEFAULT_UPPER_LIMIT: f64 = 700.0;

#[derive(Debug, Clone, Copy, PartialEq, derive_more::Display, derive_more::Error)]
#[display("invalid physiological limits ({lower}, {upper}): need finite lower < upper")]
pub struct FilterLimitsError {
    pub lower: f64,
    pub upper: f64,
}

/// Keeps RTs strictly inside the open interval `(lower, upper)`.
///
/// # Examples
///
/// ```
/// use rtfeat_analysis::filter::PhysiologicalFilter;
///
/// let filter = PhysiologicalFilter::default();
/// let (rt, labels) = filter.apply(&[150.0, 200.0, 350.0, 700.0, 520.0], &[1, 2, 3, 4, 1]);
/// assert_eq!(rt, vec![350.0, 520.0]);
/// assert_eq!(labels, vec![3, 1]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FilterLimits", into = "FilterLimits")]
pub struct PhysiologicalFilter {
    lower: f64,
    upper: f64,
}

impl Default for PhysiologicalFilter {
    fn default() -> Self {
        Self {
            lower: DEFAULT_LOWER_LIMIT,
            upper: DEFAULT_UPPER_LIMIT,
        }
    }
}

impl PhysiologicalFilter {
    pub fn new(lower: f64, upper: f64) -> Result<Self, FilterLimitsError> {
        if lower.is_finite() && upper.is_finite() && lower < upper {
            Ok(Self { lower, upper })
        } else {
            Err(FilterLimitsError { lower, upper })
        }
    }

    #[must_use]
    pub fn lower(&self) -> f64 {
        self.lower
    }

    #[must_use]
    pub fn upper(&self) -> f64 {
        self.upper
    }

    #[must_use]
    pub fn contains(&self, rt: f64) -> bool {
        self.lower < rt && rt < self.upper
    }

    /// Boolean mask of the RTs the filter keeps.
    #[must_use]
    pub fn mask(&self, rt: &[f64]) -> Vec<bool> {
        rt.iter().map(|&v| self.contains(v)).collect()
    }

    /// Filters RTs that have no aligned labels.
    #[must_use]
    pub fn filter_rt(&self, rt: &[f64]) -> Vec<f64> {
        rt.iter().copied().filter(|&v| self.contains(v)).collect()
    }

    /// Filters RTs together with one aligned array.
    ///
    /// Further aligned arrays can be filtered with [`mask`](Self::mask) and [`select`].
    #[must_use]
    pub fn apply<T>(&self, rt: &[f64], aligned: &[T]) -> (Vec<f64>, Vec<T>)
    where
        T: Clone,
    {
        let mask = self.mask(rt);
        (select(&mask, rt), select(&mask, aligned))
    }
}

/// Elements of `values` whose mask entry is `true`.
#[must_use]
pub fn select<T>(mask: &[bool], values: &[T]) -> Vec<T>
where
    T: Clone,
{
    mask.iter()
        .zip(values)
        .filter(|(keep, _)| **keep)
        .map(|(_, v)| v.clone())
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct FilterLimits {
    #[serde(default = "default_lower")]
    lower: f64,
    #[serde(default = "default_upper")]
    upper: f64,
}

fn default_lower() -> f64 {
    DEFAULT_LOWER_LIMIT
}

fn default_upper() -> f64 {
    DEFAULT_UPPER_LIMIT
}

impl TryFrom<FilterLimits> for PhysiologicalFilter {
    type Error = FilterLimitsError;

    fn try_from(limits: FilterLimits) -> Result<Self, Self::Error> {
        Self::new(limits.lower, limits.upper)
    }
}

impl From<PhysiologicalFilter> for FilterLimits {
    fn from(filter: PhysiologicalFilter) -> Self {
        Self {
            lower: filter.lower,
            upper: filter.upper,
        }
    }
}
