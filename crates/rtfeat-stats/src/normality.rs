//! Shapiro-Wilk test for normality.
//!
//! Coefficients and the p-value use Royston's (1995) approximation, valid for
//! sample sizes from 3 up to 5000. Larger samples are still evaluated but the
//! p-value loses accuracy.

use statrs::distribution::{ContinuousCDF, Normal};

/// Minimum sample size the test is defined for.
pub const MIN_SAMPLE_SIZE: usize = 3;

const SMALL: f64 = 1e-19;

const C1: [f64; 6] = [0.0, 0.221_157, -0.147_981, -2.071_19, 4.434_685, -2.706_056];
const C2: [f64; 6] = [0.0, 0.042_981, -0.293_762, -1.752_461, 5.682_633, -3.582_633];
const C3: [f64; 4] = [0.544, -0.399_78, 0.025_054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.778_57, 0.062_767, -0.002_032_2];
const C5: [f64; 4] = [-1.5861, -0.310_82, -0.083_751, 0.003_891_5];
const C6: [f64; 3] = [-0.4803, -0.082_676, 0.003_030_2];
const G: [f64; 2] = [-2.273, 0.459];

/// Result of a Shapiro-Wilk test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapiroWilk {
    /// The W statistic, in `[0, 1]`. Values close to 1 indicate normality.
    pub w: f64,
    /// Probability of observing a W this small under the normal hypothesis.
    pub p_value: f64,
    /// Number of observations tested.
    pub n: usize,
}

impl ShapiroWilk {
    /// Runs the test on unsorted values.
    ///
    /// Returns `None` when fewer than [`MIN_SAMPLE_SIZE`] values are given.
    ///
    /// # Examples
    ///
    /// ```
    /// # use rtfeat_stats::normality::ShapiroWilk;
    /// let result = ShapiroWilk::test([148.0, 154.0, 158.0, 160.0, 161.0, 162.0, 166.0]).unwrap();
    /// assert!(result.p_value > 0.05);
    /// assert!(ShapiroWilk::test([1.0, 2.0]).is_none());
    /// ```
    #[must_use]
    pub fn test<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut values = values.into_iter().collect::<Vec<_>>();
        values.sort_by(f64::total_cmp);
        Self::from_sorted(&values)
    }

    /// Runs the test on values sorted in ascending order.
    ///
    /// A sample with zero range is reported as `w = 1, p = 1`.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_sorted(sorted_values: &[f64]) -> Option<Self> {
        let n = sorted_values.len();
        if n < MIN_SAMPLE_SIZE {
            return None;
        }

        let range = sorted_values[n - 1] - sorted_values[0];
        if range < SMALL {
            return Some(Self {
                w: 1.0,
                p_value: 1.0,
                n,
            });
        }

        let coefficients = coefficients(n);
        let mean = sorted_values.iter().sum::<f64>() / n as f64;
        let ss = sorted_values
            .iter()
            .map(|x| (x - mean).powi(2))
            .sum::<f64>();
        let numerator = coefficients
            .iter()
            .zip(sorted_values)
            .map(|(a, x)| a * x)
            .sum::<f64>();
        let w = (numerator.powi(2) / ss).min(1.0);

        Some(Self {
            w,
            p_value: p_value(w, n),
            n,
        })
    }
}

/// Evaluates `cc[0] + cc[1] x + cc[2] x^2 + ...`.
fn poly(cc: &[f64], x: f64) -> f64 {
    cc.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Full antisymmetric coefficient vector, normalized to unit sum of squares.
#[expect(clippy::cast_precision_loss)]
fn coefficients(n: usize) -> Vec<f64> {
    let half = n / 2;
    let mut upper = vec![0.0; half];

    if n == 3 {
        upper[0] = 0.5_f64.sqrt();
    } else {
        let normal = Normal::standard();
        let an = n as f64;
        let an25 = an + 0.25;
        let m = (1..=half)
            .map(|i| normal.inverse_cdf((i as f64 - 0.375) / an25))
            .collect::<Vec<_>>();
        let summ2 = 2.0 * m.iter().map(|mi| mi * mi).sum::<f64>();
        let ssumm2 = summ2.sqrt();
        let rsn = 1.0 / an.sqrt();
        let a1 = poly(&C1, rsn) - m[0] / ssumm2;

        let (first_scaled, fac) = if n > 5 {
            let a2 = -m[1] / ssumm2 + poly(&C2, rsn);
            let fac = ((summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1])
                / (1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2))
                .sqrt();
            upper[1] = a2;
            (2, fac)
        } else {
            let fac = ((summ2 - 2.0 * m[0] * m[0]) / (1.0 - 2.0 * a1 * a1)).sqrt();
            (1, fac)
        };
        upper[0] = a1;
        for (a, mi) in upper.iter_mut().zip(&m).skip(first_scaled) {
            *a = -mi / fac;
        }
    }

    let mut full = vec![0.0; n];
    for (i, a) in upper.iter().enumerate() {
        full[i] = -a;
        full[n - 1 - i] = *a;
    }
    full
}

#[expect(clippy::cast_precision_loss)]
fn p_value(w: f64, n: usize) -> f64 {
    const PI6: f64 = 6.0 / std::f64::consts::PI;
    const STQR: f64 = std::f64::consts::FRAC_PI_3;

    if n == 3 {
        return (PI6 * (w.sqrt().asin() - STQR)).clamp(0.0, 1.0);
    }

    let w1 = 1.0 - w;
    if w1 <= 0.0 {
        return 1.0;
    }
    let an = n as f64;
    let mut y = w1.ln();
    let (m, s) = if n <= 11 {
        let gamma = poly(&G, an);
        if y >= gamma {
            return 0.0;
        }
        y = -(gamma - y).ln();
        (poly(&C3, an), poly(&C4, an).exp())
    } else {
        let xx = an.ln();
        (poly(&C5, xx), poly(&C6, xx).exp())
    };

    Normal::standard().sf((y - m) / s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_sample() {
        assert!(ShapiroWilk::test([]).is_none());
        assert!(ShapiroWilk::test([1.0, 2.0]).is_none());
    }

    #[test]
    fn test_coefficients_are_unit_antisymmetric() {
        for n in [3, 4, 5, 6, 11, 12, 50] {
            let a = coefficients(n);
            let sum_sq = a.iter().map(|v| v * v).sum::<f64>();
            assert!((sum_sq - 1.0).abs() < 1e-6, "n={n}: sum of squares {sum_sq}");
            for i in 0..n {
                assert!((a[i] + a[n - 1 - i]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_three_equally_spaced_is_perfectly_normal() {
        let result = ShapiroWilk::test([100.0, 200.0, 300.0]).unwrap();
        assert!((result.w - 1.0).abs() < 1e-9);
        assert!((result.p_value - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_range() {
        let result = ShapiroWilk::test([5.0; 10]).unwrap();
        assert_eq!(result.w, 1.0);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn test_symmetric_sample_is_normal() {
        // Quantiles of a standard normal at evenly spaced probabilities.
        let normal = Normal::standard();
        let values = (1..=30)
            .map(|i| 400.0 + 50.0 * normal.inverse_cdf(f64::from(i) / 31.0))
            .collect::<Vec<_>>();
        let result = ShapiroWilk::test(values).unwrap();
        assert!(result.w > 0.95);
        assert!(result.p_value > 0.05);
    }

    #[test]
    fn test_heavily_skewed_sample_is_not_normal() {
        let mut values = vec![250.0; 20];
        values.extend((0..20).map(|i| 250.0 + f64::from(i)));
        values.extend([2000.0, 2500.0, 3000.0]);
        let result = ShapiroWilk::test(values).unwrap();
        assert!(result.p_value < 0.05, "p = {}", result.p_value);
    }

    #[test]
    fn test_p_value_in_unit_interval() {
        for values in [
            vec![1.0, 2.0, 10.0],
            vec![1.0, 1.0, 1.0, 9.0],
            vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0],
        ] {
            let result = ShapiroWilk::test(values).unwrap();
            assert!((0.0..=1.0).contains(&result.p_value));
            assert!((0.0..=1.0).contains(&result.w));
        }
    }
}
