/// Descriptive statistics summarizing a dataset.
///
/// This structure contains the measures of central tendency and spread
/// used throughout the reaction-time rollups, computed over `f64` values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptiveStats {
    /// The minimum value in the dataset.
    pub min: f64,
    /// The maximum value in the dataset.
    pub max: f64,
    /// The arithmetic mean (average) of the dataset.
    pub mean: f64,
    /// The median value of the dataset.
    ///
    /// For an even number of values this is the mean of the two middle values.
    pub median: f64,
    /// The population standard deviation (divides by `N`, not `N - 1`).
    pub std_dev: f64,
}

impl DescriptiveStats {
    /// Computes descriptive statistics from unsorted values.
    ///
    /// This method will sort the values internally before computing statistics.
    ///
    /// # Returns
    ///
    /// * `Some(DescriptiveStats)` - if the dataset contains at least one value
    /// * `None` - if the dataset is empty
    ///
    /// # Examples
    ///
    /// ```
    /// # use rtfeat_stats::descriptive::DescriptiveStats;
    /// let values = [300.0, 100.0, 200.0];
    /// let stats = DescriptiveStats::new(values).unwrap();
    /// assert_eq!(stats.min, 100.0);
    /// assert_eq!(stats.max, 300.0);
    /// assert_eq!(stats.mean, 200.0);
    /// assert_eq!(stats.median, 200.0);
    /// ```
    #[must_use]
    pub fn new<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut values = values.into_iter().collect::<Vec<_>>();
        values.sort_by(f64::total_cmp);
        Self::from_sorted(&values)
    }

    /// Computes descriptive statistics from pre-sorted values.
    ///
    /// NaN values are not rejected: a dataset containing NaN yields NaN for
    /// every measure that touches it, which is how missing groups surface.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `sorted_values` is not sorted by [`f64::total_cmp`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use rtfeat_stats::descriptive::DescriptiveStats;
    /// let stats = DescriptiveStats::from_sorted(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    /// assert_eq!(stats.median, 2.5);
    /// assert!(DescriptiveStats::from_sorted(&[]).is_none());
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_sorted(sorted_values: &[f64]) -> Option<Self> {
        debug_assert!(
            sorted_values.is_sorted_by(|a, b| a.total_cmp(b).is_le()),
            "values must be sorted in ascending order"
        );

        let min = *sorted_values.first()?;
        let max = *sorted_values.last()?;
        let n = sorted_values.len() as f64;
        let mean = sorted_values.iter().sum::<f64>() / n;
        let mid = sorted_values.len() / 2;
        let median = if sorted_values.len() % 2 == 0 {
            f64::midpoint(sorted_values[mid - 1], sorted_values[mid])
        } else {
            sorted_values[mid]
        };
        let variance = sorted_values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / n;
        let std_dev = variance.sqrt();

        Some(Self {
            min,
            max,
            mean,
            median,
            std_dev,
        })
    }

    /// Statistics of a single NaN observation.
    ///
    /// Every field is NaN. Used when an empty dataset has to be reported as a
    /// visible missing value rather than skipped.
    #[must_use]
    pub fn missing() -> Self {
        Self {
            min: f64::NAN,
            max: f64::NAN,
            mean: f64::NAN,
            median: f64::NAN,
            std_dev: f64::NAN,
        }
    }
}

/// Arithmetic mean of `values`, NaN when empty.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-4,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_reference_values() {
        let stats = DescriptiveStats::new([100.0, 200.0, 300.0]).unwrap();
        assert_close(stats.mean, 200.0);
        assert_close(stats.median, 200.0);
        assert_close(stats.std_dev, 81.6497);
        assert_close(stats.min, 100.0);
        assert_close(stats.max, 300.0);
    }

    #[test]
    fn test_empty_values() {
        assert!(DescriptiveStats::new(Vec::new()).is_none());
    }

    #[test]
    fn test_even_median_is_midpoint() {
        let stats = DescriptiveStats::new([4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_close(stats.median, 2.5);
    }

    #[test]
    fn test_ordering_bounds() {
        let stats = DescriptiveStats::new([512.0, 233.5, 401.0, 689.9, 250.0, 250.0]).unwrap();
        assert!(stats.min <= stats.median && stats.median <= stats.max);
        assert!(stats.min <= stats.mean && stats.mean <= stats.max);
        assert!(stats.std_dev > 0.0);
    }

    #[test]
    fn test_constant_values_have_zero_std() {
        let stats = DescriptiveStats::new([42.0; 7]).unwrap();
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.mean, 42.0);
    }

    #[test]
    fn test_nan_singleton_propagates() {
        let stats = DescriptiveStats::new([f64::NAN]).unwrap();
        assert!(stats.mean.is_nan());
        assert!(stats.median.is_nan());
        assert!(stats.std_dev.is_nan());
        assert!(stats.min.is_nan());
        assert!(stats.max.is_nan());
    }

    #[test]
    fn test_mean_of_empty_is_nan() {
        assert!(mean(&[]).is_nan());
        assert_close(mean(&[10.0, 20.0]), 15.0);
    }
}
