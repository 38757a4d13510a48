//! Statistical primitives for reaction-time feature extraction.
//!
//! This crate knows nothing about subjects, runs or conditions; it provides
//! the numeric building blocks the analysis crate rolls up:
//!
//! - **Descriptive statistics**: mean, median, population standard deviation, min, max
//! - **Normality**: Shapiro-Wilk W test
//! - **Correlation**: Pearson coefficient and a seedable permutation test
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`normality`]: Shapiro-Wilk test for distributional normality
//! - [`correlation`]: Paired correlation and its permutation significance
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use rtfeat_stats::descriptive::DescriptiveStats;
//!
//! let values = [100.0, 200.0, 300.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 200.0);
//! assert!((stats.std_dev - 81.6497).abs() < 1e-4);
//! ```
//!
//! ## Testing a correlation for significance
//!
//! ```
//! use rand::SeedableRng as _;
//! use rtfeat_stats::correlation::PermutationTest;
//!
//! let x = [310.0, 295.0, 402.0, 388.0, 350.0, 280.0, 512.0, 333.0];
//! let y = [305.0, 300.0, 390.0, 395.0, 342.0, 290.0, 498.0, 340.0];
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let result = PermutationTest::new(1000).unwrap().run(&x, &y, &mut rng);
//! assert!(result.observed > 0.9);
//! assert!(result.is_significant());
//! ```

pub mod correlation;
pub mod descriptive;
pub mod normality;
