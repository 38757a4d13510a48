//! Cross-pipeline comparison of two rollups
//!
//! A [`Comparator`] reads two completed [`Features`] rollups built from the same
//! subjects and runs but with different RT-extraction pipelines (`A` and `B`)
//! and reports:
//!
//! - **Scalar comparisons**: selected summary fields side by side at every
//!   level, with absolute and percentage differences for mean and median
//! - **Paired correlations**: per condition, the Pearson correlation between the
//!   two pipelines' per-trial RTs, with a permutation-test p-value
//!
//! # Pairing
//!
//! Trials are paired by position in the full-trial sequences. A trial enters a
//! condition's paired set only when both pipelines measured a response and its
//! label matches the condition; trials past the end of the shorter sequence
//! count as missing. The conditions correlated are those observed in `B`'s
//! overall rollup.
//!
//! # Reproducibility
//!
//! Permutation tests draw from a caller-provided [`Rng`]. [`Comparator::rng`]
//! builds one from the configured seed, or from OS entropy when no seed is set.

use std::collections::{BTreeMap, BTreeSet};

use rand::{Rng, SeedableRng as _};
use rand_pcg::Pcg64;
use rtfeat_stats::correlation::{PermutationCountError, PermutationTest};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    dataset::{ConditionCode, RunId},
    rollup::{Features, FullTrials, LevelFeatures},
    summary::{Summary, SummaryField},
};

/// Default number of re-pairings per permutation test.
pub const DEFAULT_PERMUTATIONS: usize = 10_000;

/// Options of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparatorConfig {
    /// Unknown names are skipped when deserializing, as in [`Self::with_field_names`]
    #[serde(deserialize_with = "deserialize_field_names")]
    pub features_to_compare: BTreeSet<SummaryField>,
    pub n_permutations: usize,
    /// Seed of the permutation RNG; `None` draws from OS entropy
    pub seed: Option<u64>,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            features_to_compare: SummaryField::ALL.into_iter().collect(),
            n_permutations: DEFAULT_PERMUTATIONS,
            seed: None,
        }
    }
}

impl ComparatorConfig {
    /// Replaces the compared fields by parsing `names`; unknown names are skipped.
    #[must_use]
    pub fn with_field_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.features_to_compare = parse_field_names(names);
        self
    }

    #[must_use]
    pub fn with_n_permutations(mut self, n_permutations: usize) -> Self {
        self.n_permutations = n_permutations;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

fn parse_field_names<I, S>(names: I) -> BTreeSet<SummaryField>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|name| match name.as_ref().parse::<SummaryField>() {
            Ok(field) => Some(field),
            Err(e) => {
                tracing::warn!("skipping comparison field: {e}");
                None
            }
        })
        .collect()
}

fn deserialize_field_names<'de, D>(deserializer: D) -> Result<BTreeSet<SummaryField>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = Vec::<String>::deserialize(deserializer)?;
    Ok(parse_field_names(names))
}

/// One of the two compared rollups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display)]
pub enum Side {
    A,
    B,
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum ComparisonError {
    #[display("rollup {side} has not calculated every level")]
    Incomplete { side: Side },
    #[display("invalid comparison configuration: {_0}")]
    #[from]
    Permutation(PermutationCountError),
    #[display("subject '{subject}' is not common to both rollups")]
    UnknownSubject { subject: String },
    #[display("run {run} of subject '{subject}' is not common to both rollups")]
    UnknownRun { subject: String, run: RunId },
}

/// Rollup cell a comparison refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, derive_more::Display)]
pub enum Scope {
    #[display("subject {subject} run {run}")]
    Run { subject: String, run: RunId },
    #[display("subject {subject}")]
    Subject { subject: String },
    #[display("overall")]
    Overall,
}

/// Absolute and relative difference between two values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Difference {
    pub absolute: f64,
    /// `|a - b| / b * 100`; NaN when `b` is zero
    pub percent: f64,
}

impl Difference {
    #[must_use]
    pub fn between(a: f64, b: f64) -> Self {
        let absolute = (a - b).abs();
        let percent = if b == 0.0 {
            f64::NAN
        } else {
            absolute / b * 100.0
        };
        Self { absolute, percent }
    }
}

/// One summary field of one cell, as computed by both rollups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldComparison {
    pub scope: Scope,
    /// `None` for the ungrouped summary
    pub condition: Option<ConditionCode>,
    pub field: SummaryField,
    pub a: f64,
    pub b: f64,
    /// Present for mean and median only
    pub difference: Option<Difference>,
}

/// Classification of a permutation p-value.
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
pub enum Significance {
    #[display("significantly correlated")]
    Correlated,
    #[display("not significantly correlated")]
    NotCorrelated,
}

/// Per-condition outcome of a paired correlation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, derive_more::IsVariant)]
pub enum ConditionCorrelation {
    /// No trial of the condition was measured by both pipelines.
    NoData { missing_a: usize, missing_b: usize },
    Computed {
        n_pairs: usize,
        missing_a: usize,
        missing_b: usize,
        /// Pearson coefficient; NaN for degenerate pairs
        r: f64,
        p_value: f64,
        significance: Significance,
    },
}

/// Trials of one condition measured by both pipelines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairedTrials {
    pub a: Vec<f64>,
    pub b: Vec<f64>,
    /// Trials of the condition `A` has no response for
    pub missing_a: usize,
    /// Trials of the condition `B` has no response for
    pub missing_b: usize,
}

impl PairedTrials {
    /// Pairs the trials of `code` by position.
    ///
    /// Labels come from `b`'s sequence, falling back to `a`'s past its end.
    ///
    /// # Examples
    ///
    /// ```
    /// use rtfeat_analysis::{comparison::PairedTrials, dataset::ConditionCode, rollup::FullTrials};
    ///
    /// let a = FullTrials { rt: vec![Some(1.0), Some(2.0), None, Some(4.0)], condition: vec![1; 4] };
    /// let b = FullTrials { rt: vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)], condition: vec![1; 4] };
    /// let paired = PairedTrials::pair(&a, &b, ConditionCode::new(1).unwrap());
    /// assert_eq!(paired.a, vec![1.0, 2.0, 4.0]);
    /// assert_eq!(paired.missing_a, 1);
    /// ```
    #[must_use]
    pub fn pair(a: &FullTrials, b: &FullTrials, code: ConditionCode) -> Self {
        let mut paired = Self::default();
        for i in 0..a.len().max(b.len()) {
            let label = b.condition.get(i).or_else(|| a.condition.get(i));
            if label.and_then(|&l| ConditionCode::from_label(l)) != Some(code) {
                continue;
            }
            let rt_a = a.rt.get(i).copied().flatten();
            let rt_b = b.rt.get(i).copied().flatten();
            match (rt_a, rt_b) {
                (Some(x), Some(y)) => {
                    paired.a.push(x);
                    paired.b.push(y);
                }
                (x, y) => {
                    paired.missing_a += usize::from(x.is_none());
                    paired.missing_b += usize::from(y.is_none());
                }
            }
        }
        paired
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.a.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }
}

/// Observed correlation of one condition in one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationEntry {
    pub scope: Scope,
    pub condition: ConditionCode,
    pub r: f64,
    pub p_value: f64,
}

/// Correlations collected across many cells, for summarizing afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorrelationLog {
    pub entries: Vec<CorrelationEntry>,
    /// Cells and conditions that had no paired data
    pub no_data: Vec<(Scope, ConditionCode)>,
}

impl CorrelationLog {
    fn record(
        &mut self,
        scope: &Scope,
        correlations: &BTreeMap<ConditionCode, ConditionCorrelation>,
    ) {
        for (&condition, correlation) in correlations {
            match *correlation {
                ConditionCorrelation::Computed { r, p_value, .. } => {
                    self.entries.push(CorrelationEntry {
                        scope: scope.clone(),
                        condition,
                        r,
                        p_value,
                    });
                }
                ConditionCorrelation::NoData { .. } => {
                    self.no_data.push((scope.clone(), condition));
                }
            }
        }
    }

    /// Observed correlations of `condition`, in cell order.
    #[must_use]
    pub fn r_values(&self, condition: ConditionCode) -> Vec<f64> {
        self.entries_for(condition).map(|e| e.r).collect()
    }

    /// Permutation p-values of `condition`, in cell order.
    #[must_use]
    pub fn p_values(&self, condition: ConditionCode) -> Vec<f64> {
        self.entries_for(condition).map(|e| e.p_value).collect()
    }

    /// Summary of the finite observed correlations of `condition`.
    #[must_use]
    pub fn r_summary(&self, condition: ConditionCode) -> Summary {
        let r = self
            .entries_for(condition)
            .map(|e| e.r)
            .filter(|r| r.is_finite())
            .collect::<Vec<_>>();
        Summary::from_values(&r)
    }

    fn entries_for(&self, condition: ConditionCode) -> impl Iterator<Item = &CorrelationEntry> {
        self.entries.iter().filter(move |e| e.condition == condition)
    }
}

/// Read-only comparison of two completed rollups.
#[derive(Debug, Clone)]
pub struct Comparator<'a> {
    a: &'a Features,
    b: &'a Features,
    config: ComparatorConfig,
    test: PermutationTest,
}

impl<'a> Comparator<'a> {
    /// # Errors
    ///
    /// Fails when either rollup is missing a level or `n_permutations` is zero.
    pub fn new(
        a: &'a Features,
        b: &'a Features,
        config: ComparatorConfig,
    ) -> Result<Self, ComparisonError> {
        if !a.is_complete() {
            return Err(ComparisonError::Incomplete { side: Side::A });
        }
        if !b.is_complete() {
            return Err(ComparisonError::Incomplete { side: Side::B });
        }
        let test = PermutationTest::new(config.n_permutations)?;
        Ok(Self { a, b, config, test })
    }

    #[must_use]
    pub fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    /// Random source for the permutation tests, seeded from the configuration.
    #[must_use]
    pub fn rng(&self) -> Pcg64 {
        match self.config.seed {
            Some(seed) => Pcg64::seed_from_u64(seed),
            None => Pcg64::from_os_rng(),
        }
    }

    /// Subjects present in both rollups.
    #[must_use]
    pub fn common_subjects(&self) -> Vec<&'a str> {
        let b = self.b.run_features();
        self.a
            .run_features()
            .keys()
            .filter(|subject| b.contains_key(*subject))
            .map(String::as_str)
            .collect()
    }

    /// Runs of `subject` present in both rollups.
    #[must_use]
    pub fn common_runs(&self, subject: &str) -> Vec<RunId> {
        let (Some(a), Some(b)) = (
            self.a.run_features().get(subject),
            self.b.run_features().get(subject),
        ) else {
            return vec![];
        };
        a.keys().filter(|run| b.contains_key(run)).copied().collect()
    }

    /// Conditions correlated at every level: those observed in `B`'s overall rollup.
    #[must_use]
    pub fn conditions(&self) -> Vec<ConditionCode> {
        self.b
            .overall()
            .map(|overall| overall.by_condition.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Compares the configured fields of every common run.
    #[must_use]
    pub fn compare_runs(&self) -> Vec<FieldComparison> {
        let mut rows = vec![];
        for subject in self.common_subjects() {
            for run in self.common_runs(subject) {
                if let (Some(a), Some(b)) = (self.a.run(subject, run), self.b.run(subject, run)) {
                    let scope = Scope::Run {
                        subject: subject.to_owned(),
                        run,
                    };
                    self.compare_level(&scope, a, b, &mut rows);
                }
            }
        }
        rows
    }

    /// Compares the configured fields of every common subject.
    #[must_use]
    pub fn compare_subjects(&self) -> Vec<FieldComparison> {
        let mut rows = vec![];
        for subject in self.common_subjects() {
            if let (Some(a), Some(b)) = (self.a.subject(subject), self.b.subject(subject)) {
                let scope = Scope::Subject {
                    subject: subject.to_owned(),
                };
                self.compare_level(&scope, a, b, &mut rows);
            }
        }
        rows
    }

    /// Compares the configured fields of the overall level.
    #[must_use]
    pub fn compare_overall(&self) -> Vec<FieldComparison> {
        let mut rows = vec![];
        if let (Some(a), Some(b)) = (self.a.overall(), self.b.overall()) {
            self.compare_level(&Scope::Overall, a, b, &mut rows);
        }
        rows
    }

    /// Ungrouped rows first, then one block per condition present in both cells.
    fn compare_level(
        &self,
        scope: &Scope,
        a: &LevelFeatures,
        b: &LevelFeatures,
        rows: &mut Vec<FieldComparison>,
    ) {
        self.compare_summaries(scope, None, &a.summary, &b.summary, rows);
        for (code, group_a) in &a.by_condition {
            if let Some(group_b) = b.by_condition.get(code) {
                self.compare_summaries(
                    scope,
                    Some(*code),
                    &group_a.summary,
                    &group_b.summary,
                    rows,
                );
            }
        }
    }

    fn compare_summaries(
        &self,
        scope: &Scope,
        condition: Option<ConditionCode>,
        a: &Summary,
        b: &Summary,
        rows: &mut Vec<FieldComparison>,
    ) {
        for &field in &self.config.features_to_compare {
            let (a, b) = (a.get(field), b.get(field));
            rows.push(FieldComparison {
                scope: scope.clone(),
                condition,
                field,
                a,
                b,
                difference: field.has_difference().then(|| Difference::between(a, b)),
            });
        }
    }

    /// Correlates every condition over a pair of full-trial sequences.
    pub fn correlate<R>(
        &self,
        a: &FullTrials,
        b: &FullTrials,
        rng: &mut R,
    ) -> BTreeMap<ConditionCode, ConditionCorrelation>
    where
        R: Rng + ?Sized,
    {
        self.conditions()
            .into_iter()
            .map(|code| {
                let paired = PairedTrials::pair(a, b, code);
                let correlation = if paired.is_empty() {
                    tracing::warn!(
                        condition = %code,
                        missing_a = paired.missing_a,
                        missing_b = paired.missing_b,
                        "no paired data for condition"
                    );
                    ConditionCorrelation::NoData {
                        missing_a: paired.missing_a,
                        missing_b: paired.missing_b,
                    }
                } else {
                    let result = self.test.run(&paired.a, &paired.b, rng);
                    ConditionCorrelation::Computed {
                        n_pairs: paired.len(),
                        missing_a: paired.missing_a,
                        missing_b: paired.missing_b,
                        r: result.observed,
                        p_value: result.p_value,
                        significance: if result.is_significant() {
                            Significance::Correlated
                        } else {
                            Significance::NotCorrelated
                        },
                    }
                };
                (code, correlation)
            })
            .collect()
    }

    /// Per-condition correlations of one run.
    pub fn correlate_run<R>(
        &self,
        subject: &str,
        run: RunId,
        rng: &mut R,
    ) -> Result<BTreeMap<ConditionCode, ConditionCorrelation>, ComparisonError>
    where
        R: Rng + ?Sized,
    {
        if !self.common_subjects().contains(&subject) {
            return Err(ComparisonError::UnknownSubject {
                subject: subject.to_owned(),
            });
        }
        match (self.a.run(subject, run), self.b.run(subject, run)) {
            (Some(a), Some(b)) => Ok(self.correlate(&a.full_trials, &b.full_trials, rng)),
            _ => Err(ComparisonError::UnknownRun {
                subject: subject.to_owned(),
                run,
            }),
        }
    }

    /// Per-condition correlations of one subject's concatenated runs.
    pub fn correlate_subject<R>(
        &self,
        subject: &str,
        rng: &mut R,
    ) -> Result<BTreeMap<ConditionCode, ConditionCorrelation>, ComparisonError>
    where
        R: Rng + ?Sized,
    {
        match (self.a.subject(subject), self.b.subject(subject)) {
            (Some(a), Some(b)) => Ok(self.correlate(&a.full_trials, &b.full_trials, rng)),
            _ => Err(ComparisonError::UnknownSubject {
                subject: subject.to_owned(),
            }),
        }
    }

    /// Per-condition correlations over the whole dataset.
    pub fn correlate_overall<R>(&self, rng: &mut R) -> BTreeMap<ConditionCode, ConditionCorrelation>
    where
        R: Rng + ?Sized,
    {
        match (self.a.overall(), self.b.overall()) {
            (Some(a), Some(b)) => self.correlate(&a.full_trials, &b.full_trials, rng),
            _ => BTreeMap::new(),
        }
    }

    /// Correlates every common run and collects the results.
    pub fn correlate_all_runs<R>(&self, rng: &mut R) -> CorrelationLog
    where
        R: Rng + ?Sized,
    {
        let mut log = CorrelationLog::default();
        for subject in self.common_subjects() {
            for run in self.common_runs(subject) {
                if let (Some(a), Some(b)) = (self.a.run(subject, run), self.b.run(subject, run)) {
                    let scope = Scope::Run {
                        subject: subject.to_owned(),
                        run,
                    };
                    log.record(&scope, &self.correlate(&a.full_trials, &b.full_trials, rng));
                }
            }
        }
        log
    }

    /// Correlates every common subject and collects the results.
    pub fn correlate_all_subjects<R>(&self, rng: &mut R) -> CorrelationLog
    where
        R: Rng + ?Sized,
    {
        let mut log = CorrelationLog::default();
        for subject in self.common_subjects() {
            if let (Some(a), Some(b)) = (self.a.subject(subject), self.b.subject(subject)) {
                let scope = Scope::Subject {
                    subject: subject.to_owned(),
                };
                log.record(&scope, &self.correlate(&a.full_trials, &b.full_trials, rng));
            }
        }
        log
    }
}
