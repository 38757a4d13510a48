//! Pearson correlation and a permutation test for its significance.
//!
//! The permutation test builds a null distribution by randomly re-pairing
//! `y` against a fixed `x` and recomputing the correlation. Randomness comes
//! from the caller's [`Rng`], so seeding that generator makes the p-value
//! reproducible.

use std::{cmp::Ordering, num::NonZeroUsize};

use rand::{Rng, seq::SliceRandom as _};

/// Significance level used to classify a permutation p-value.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Absolute tolerance when comparing permuted statistics with the observed one.
///
/// Re-pairings that reproduce the observed pairing can differ from it in the
/// last bits because of summation order.
const TIE_TOLERANCE: f64 = 1e-12;

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("number of permutations must be positive")]
pub struct PermutationCountError;

/// Pearson correlation coefficient of paired values.
///
/// Only the first `min(x.len(), y.len())` pairs are used. Returns NaN when
/// fewer than two pairs are available or either side has zero variance, so a
/// degenerate input never looks like a computed coefficient.
///
/// # Examples
///
/// ```
/// # use rtfeat_stats::correlation::pearson;
/// let r = pearson(&[1.0, 2.0, 4.0], &[1.0, 2.0, 4.0]);
/// assert!((r - 1.0).abs() < 1e-12);
/// assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let den = (sxx * syy).sqrt();
    if den == 0.0 {
        return f64::NAN;
    }
    (sxy / den).clamp(-1.0, 1.0)
}

/// Outcome of a permutation test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PermutationResult {
    /// Correlation of the pairs as given.
    pub observed: f64,
    /// Two-sided p-value in `[0, 1]`.
    pub p_value: f64,
    /// Number of re-pairings the null distribution was built from.
    pub n_permutations: usize,
}

impl PermutationResult {
    /// Whether the p-value falls below [`SIGNIFICANCE_LEVEL`].
    #[must_use]
    pub fn is_significant(&self) -> bool {
        self.p_value < SIGNIFICANCE_LEVEL
    }
}

/// Two-sided permutation test on the Pearson correlation of paired data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermutationTest {
    n_permutations: NonZeroUsize,
}

impl PermutationTest {
    /// Creates a test that draws `n_permutations` re-pairings.
    ///
    /// # Errors
    ///
    /// Returns [`PermutationCountError`] when `n_permutations` is zero.
    pub fn new(n_permutations: usize) -> Result<Self, PermutationCountError> {
        NonZeroUsize::new(n_permutations)
            .map(|n_permutations| Self { n_permutations })
            .ok_or(PermutationCountError)
    }

    #[must_use]
    pub fn n_permutations(&self) -> usize {
        self.n_permutations.get()
    }

    /// Runs the test on paired `x` and `y`.
    ///
    /// The p-value is the fraction of re-pairings whose absolute correlation
    /// is at least the observed absolute correlation. Non-finite permuted
    /// statistics count as at least as extreme, so a degenerate input yields
    /// `p = 1` rather than a spurious significance.
    ///
    /// # Examples
    ///
    /// ```
    /// # use rand::SeedableRng as _;
    /// # use rtfeat_stats::correlation::PermutationTest;
    /// let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    /// let x = (0..20).map(f64::from).collect::<Vec<_>>();
    /// let result = PermutationTest::new(500).unwrap().run(&x, &x, &mut rng);
    /// assert!(result.is_significant());
    /// ```
    #[expect(clippy::cast_precision_loss)]
    pub fn run<R>(&self, x: &[f64], y: &[f64], rng: &mut R) -> PermutationResult
    where
        R: Rng + ?Sized,
    {
        let n = x.len().min(y.len());
        let x = &x[..n];
        let observed = pearson(x, &y[..n]);
        let threshold = observed.abs() - TIE_TOLERANCE;

        let mut shuffled = y[..n].to_vec();
        let mut extreme = 0_usize;
        for _ in 0..self.n_permutations.get() {
            shuffled.shuffle(rng);
            let statistic = pearson(x, &shuffled).abs();
            if statistic.partial_cmp(&threshold) != Some(Ordering::Less) {
                extreme += 1;
            }
        }

        PermutationResult {
            observed,
            p_value: extreme as f64 / self.n_permutations.get() as f64,
            n_permutations: self.n_permutations.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64;

    use super::*;

    #[test]
    fn test_perfect_correlation() {
        let r = pearson(&[1.0, 2.0, 4.0], &[2.0, 4.0, 8.0]);
        assert!((r - 1.0).abs() < 1e-12);
        let r = pearson(&[1.0, 2.0, 4.0], &[8.0, 4.0, 2.0]);
        assert!(r < -0.9);
    }

    #[test]
    fn test_degenerate_correlation_is_nan() {
        assert!(pearson(&[1.0], &[2.0]).is_nan());
        assert!(pearson(&[], &[]).is_nan());
        assert!(pearson(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0]).is_nan());
    }

    #[test]
    fn test_zero_permutations_rejected() {
        assert!(PermutationTest::new(0).is_err());
        assert_eq!(PermutationTest::new(10).unwrap().n_permutations(), 10);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let x = [310.0, 295.0, 402.0, 388.0, 350.0, 280.0, 512.0, 333.0];
        let y = [305.0, 300.0, 390.0, 395.0, 342.0, 290.0, 498.0, 340.0];
        let test = PermutationTest::new(200).unwrap();
        let a = test.run(&x, &y, &mut Pcg64::seed_from_u64(42));
        let b = test.run(&x, &y, &mut Pcg64::seed_from_u64(42));
        assert_eq!(a, b);
        assert!(a.is_significant());
    }

    #[test]
    fn test_p_value_bounds() {
        let mut rng = Pcg64::seed_from_u64(1);
        let test = PermutationTest::new(100).unwrap();
        for (x, y) in [
            (vec![1.0, 2.0, 3.0], vec![3.0, 1.0, 2.0]),
            (vec![1.0, 2.0], vec![2.0, 1.0]),
            (vec![5.0, 5.0, 5.0], vec![1.0, 2.0, 3.0]),
            (vec![], vec![]),
        ] {
            let result = test.run(&x, &y, &mut rng);
            assert!((0.0..=1.0).contains(&result.p_value));
        }
    }

    #[test]
    fn test_degenerate_input_is_not_significant() {
        let mut rng = Pcg64::seed_from_u64(3);
        let result = PermutationTest::new(50)
            .unwrap()
            .run(&[5.0, 5.0, 5.0, 5.0], &[1.0, 2.0, 3.0, 4.0], &mut rng);
        assert!(result.observed.is_nan());
        assert_eq!(result.p_value, 1.0);
        assert!(!result.is_significant());
    }
}
