//! Reaction-time feature extraction for multi-subject, multi-run experiments.
//!
//! # Modules
//!
//! - [`dataset`]: Trial records, condition codes and the subject/run hierarchy
//! - [`filter`]: Physiological range filter over RTs and aligned labels
//! - [`summary`]: Per-array summaries and normality classification
//! - [`rollup`]: Run, subject and overall features of one dataset
//! - [`comparison`]: Cross-pipeline comparison of two rollups
//! - [`report`]: Plain-text rendering of rollups and comparisons
//!
//! # Workflow
//!
//! 1. Load a [`Dataset`](dataset::Dataset) (subject -> run -> trial record)
//! 2. Compute one [`Features`](rollup::Features) per extraction pipeline
//! 3. Compare the two rollups with a [`Comparator`](comparison::Comparator)
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use rtfeat_analysis::{
//!     comparison::{Comparator, ComparatorConfig},
//!     dataset::{ConditionCode, Dataset, Modality, TrialRecord},
//!     rollup::{Features, FeaturesConfig},
//! };
//!
//! let record = TrialRecord::from_raw(
//!     vec![312.0, 298.0, 405.0, 441.0, 388.0],
//!     vec![1, 1, 3, 3, 1],
//!     vec![1, 1, 3, 3, 1, 3],
//!     &[312.0, 298.0, 405.0, 441.0, 388.0, -1.0],
//!     &[309.0, 301.0, 411.0, 437.0, 380.0, 452.0],
//! );
//! let dataset: Dataset = BTreeMap::from([("S01".to_owned(), BTreeMap::from([(1, record)]))]);
//!
//! let a = Features::compute(&dataset, FeaturesConfig::default())?;
//! let b = Features::compute(
//!     &dataset,
//!     FeaturesConfig { modality: Modality::B, ..FeaturesConfig::default() },
//! )?;
//!
//! let config = ComparatorConfig::default().with_n_permutations(500).with_seed(7);
//! let comparator = Comparator::new(&a, &b, config)?;
//! let correlations = comparator.correlate_overall(&mut comparator.rng());
//! let heterotopic = ConditionCode::new(1).unwrap();
//! assert!(correlations[&heterotopic].is_computed());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod comparison;
pub mod dataset;
pub mod filter;
pub mod report;
pub mod rollup;
pub mod summary;
