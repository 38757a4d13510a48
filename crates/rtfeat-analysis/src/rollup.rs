//! Hierarchical run -> subject -> overall rollup of reaction-time features
//!
//! [`Features`] walks a [`Dataset`] and computes, at each of three levels, a
//! [`LevelFeatures`] record:
//!
//! - the ungrouped [`Summary`] of the accepted RTs
//! - one [`ConditionSummary`] per condition code observed at that level
//! - the heterotopic/homotopic ratio
//! - the full per-trial sequence of the configured [`Modality`], kept for
//!   cross-pipeline comparison
//!
//! # Levels
//!
//! ```text
//! run      accepted RTs of one run, filtered
//! subject  concatenation of the filtered RTs of every run of a subject
//! overall  concatenation across all subjects and runs
//! ```
//!
//! Higher levels are summarized from the concatenated RTs, not averaged from
//! lower-level summaries. Each `calculate_*` call re-traverses the dataset and
//! replaces that level, so repeating a call yields identical results.
//!
//! # Condition codes
//!
//! The codes of a level are the sorted unique positive labels of its full
//! condition sequence. Different runs may expose different code sets; a code
//! that is observed but has no accepted trial is summarized as an empty group.

use std::collections::BTreeMap;

use rtfeat_stats::descriptive;
use serde::{Deserialize, Serialize};

use crate::{
    dataset::{ConditionCode, ConditionSet, Dataset, Modality, RecordError, RunId, TrialRecord},
    filter::{self, PhysiologicalFilter},
    summary::{ConditionSummary, Summary},
};

/// Construction-time options of a rollup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Drop accepted RTs outside `limits` before summarizing
    pub only_physiological: bool,
    pub limits: PhysiologicalFilter,
    /// Pipeline whose full per-trial sequence is retained
    pub modality: Modality,
}

/// Per-trial RTs of one pipeline with their condition labels, non-responses included.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FullTrials {
    pub rt: Vec<Option<f64>>,
    pub condition: Vec<i32>,
}

impl FullTrials {
    #[must_use]
    pub fn from_record(record: &TrialRecord, modality: Modality) -> Self {
        Self {
            rt: record.full_rt(modality).to_vec(),
            condition: record.full_condition.clone(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rt.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rt.is_empty()
    }

    /// Number of trials without a measurable response.
    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.rt.iter().filter(|rt| rt.is_none()).count()
    }

    fn extend(&mut self, other: &Self) {
        self.rt.extend_from_slice(&other.rt);
        self.condition.extend_from_slice(&other.condition);
    }
}

/// Features of one rollup cell (a run, a subject, or the whole dataset).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelFeatures {
    /// Summary of all accepted RTs, regardless of condition
    pub summary: Summary,
    /// Condition codes observed in the full condition sequence
    pub conditions: ConditionSet,
    pub by_condition: BTreeMap<ConditionCode, ConditionSummary>,
    /// Mean RT of conditions 1 and 2 over mean RT of conditions 3 and 4
    pub ratio: f64,
    pub full_trials: FullTrials,
}

impl LevelFeatures {
    /// Computes features from aligned accepted RTs/labels and the full-trial sequence.
    ///
    /// `accepted_rt` and `accepted_condition` must have equal length.
    #[must_use]
    pub fn from_trials(
        accepted_rt: &[f64],
        accepted_condition: &[i32],
        full_trials: FullTrials,
    ) -> Self {
        debug_assert_eq!(accepted_rt.len(), accepted_condition.len());

        let conditions = ConditionSet::from_labels(&full_trials.condition);
        let by_condition = conditions
            .iter()
            .map(|code| {
                let rt = select_by_condition(accepted_rt, accepted_condition, |c| c == code);
                (code, ConditionSummary::from_values(rt))
            })
            .collect();

        Self {
            summary: Summary::from_values(accepted_rt),
            conditions,
            by_condition,
            ratio: heterotopic_homotopic_ratio(accepted_rt, accepted_condition),
            full_trials,
        }
    }

    #[must_use]
    pub fn condition(&self, code: ConditionCode) -> Option<&ConditionSummary> {
        self.by_condition.get(&code)
    }
}

/// Mean RT of heterotopic trials (codes 1, 2) over mean RT of homotopic trials (codes 3, 4).
///
/// The division is not guarded: an empty group or a zero homotopic mean yields
/// NaN or infinity.
///
/// # Examples
///
/// ```
/// use rtfeat_analysis::rollup::heterotopic_homotopic_ratio;
///
/// let ratio = heterotopic_homotopic_ratio(&[10.0, 20.0, 30.0, 40.0], &[1, 2, 3, 4]);
/// assert!((ratio - 15.0 / 35.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn heterotopic_homotopic_ratio(rt: &[f64], condition: &[i32]) -> f64 {
    let heterotopic = select_by_condition(rt, condition, ConditionCode::is_heterotopic);
    let homotopic = select_by_condition(rt, condition, ConditionCode::is_homotopic);
    descriptive::mean(&heterotopic) / descriptive::mean(&homotopic)
}

fn select_by_condition<F>(rt: &[f64], condition: &[i32], mut predicate: F) -> Vec<f64>
where
    F: FnMut(ConditionCode) -> bool,
{
    rt.iter()
        .zip(condition)
        .filter(|(_, label)| ConditionCode::from_label(**label).is_some_and(&mut predicate))
        .map(|(rt, _)| *rt)
        .collect()
}

/// Filtered trials of one level, before summarizing.
#[derive(Debug, Clone, Default)]
struct LevelTrials {
    accepted_rt: Vec<f64>,
    accepted_condition: Vec<i32>,
    full: FullTrials,
}

impl LevelTrials {
    fn from_record(
        subject: &str,
        run: RunId,
        record: &TrialRecord,
        config: &FeaturesConfig,
    ) -> Result<Self, RecordError> {
        record.validate(subject, run)?;

        let (accepted_rt, accepted_condition) = if config.only_physiological {
            let mask = config.limits.mask(&record.accepted_rt);
            (
                filter::select(&mask, &record.accepted_rt),
                filter::select(&mask, &record.accepted_condition),
            )
        } else {
            (
                record.accepted_rt.clone(),
                record.accepted_condition.clone(),
            )
        };

        Ok(Self {
            accepted_rt,
            accepted_condition,
            full: FullTrials::from_record(record, config.modality),
        })
    }

    fn extend(&mut self, other: &Self) {
        self.accepted_rt.extend_from_slice(&other.accepted_rt);
        self.accepted_condition
            .extend_from_slice(&other.accepted_condition);
        self.full.extend(&other.full);
    }

    fn into_features(self) -> LevelFeatures {
        LevelFeatures::from_trials(&self.accepted_rt, &self.accepted_condition, self.full)
    }
}

/// Run, subject and overall features of one dataset under one configuration.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
///
/// use rtfeat_analysis::{
///     dataset::{Dataset, TrialRecord},
///     rollup::{Features, FeaturesConfig},
/// };
///
/// let record = TrialRecord::from_raw(
///     vec![310.0, 420.0, 505.0],
///     vec![1, 3, 3],
///     vec![1, 2, 3, 3],
///     &[310.0, -1.0, 420.0, 505.0],
///     &[305.0, -1.0, 431.0, -1.0],
/// );
/// let dataset: Dataset = BTreeMap::from([("S01".to_owned(), BTreeMap::from([(1, record)]))]);
///
/// let features = Features::compute(&dataset, FeaturesConfig::default())?;
/// let run = features.run("S01", 1).unwrap();
/// assert_eq!(run.by_condition.len(), 3);
/// // Condition 2 was presented but never answered.
/// assert!(run.by_condition.values().nth(1).unwrap().summary.is_missing());
/// # Ok::<(), rtfeat_analysis::dataset::RecordError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Features {
    config: FeaturesConfig,
    runs: BTreeMap<String, BTreeMap<RunId, LevelFeatures>>,
    subjects: BTreeMap<String, LevelFeatures>,
    overall: Option<LevelFeatures>,
}

impl Features {
    /// Creates an empty rollup; levels are filled by the `calculate_*` methods.
    #[must_use]
    pub fn new(config: FeaturesConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Computes every level in order.
    pub fn compute(dataset: &Dataset, config: FeaturesConfig) -> Result<Self, RecordError> {
        let mut features = Self::new(config);
        features.calculate_run_features(dataset)?;
        features.calculate_subject_features(dataset)?;
        features.calculate_overall_features(dataset)?;
        Ok(features)
    }

    #[must_use]
    pub fn config(&self) -> &FeaturesConfig {
        &self.config
    }

    /// Computes the features of every run.
    pub fn calculate_run_features(&mut self, dataset: &Dataset) -> Result<(), RecordError> {
        let mut runs = BTreeMap::new();
        for (subject, subject_runs) in dataset {
            let mut features = BTreeMap::new();
            for (&run, record) in subject_runs {
                let trials = LevelTrials::from_record(subject, run, record, &self.config)?;
                features.insert(run, trials.into_features());
            }
            runs.insert(subject.clone(), features);
        }
        tracing::debug!(
            subjects = runs.len(),
            runs = runs.values().map(BTreeMap::len).sum::<usize>(),
            "calculated run features"
        );
        self.runs = runs;
        Ok(())
    }

    /// Computes the features of every subject from its concatenated runs.
    pub fn calculate_subject_features(&mut self, dataset: &Dataset) -> Result<(), RecordError> {
        let mut subjects = BTreeMap::new();
        for (subject, subject_runs) in dataset {
            let trials = self.concatenate_runs(subject, subject_runs)?;
            subjects.insert(subject.clone(), trials.into_features());
        }
        tracing::debug!(subjects = subjects.len(), "calculated subject features");
        self.subjects = subjects;
        Ok(())
    }

    /// Computes the features of the whole dataset.
    pub fn calculate_overall_features(&mut self, dataset: &Dataset) -> Result<(), RecordError> {
        let mut trials = LevelTrials::default();
        for (subject, subject_runs) in dataset {
            trials.extend(&self.concatenate_runs(subject, subject_runs)?);
        }
        tracing::debug!(
            accepted = trials.accepted_rt.len(),
            full = trials.full.len(),
            "calculated overall features"
        );
        self.overall = Some(trials.into_features());
        Ok(())
    }

    fn concatenate_runs(
        &self,
        subject: &str,
        runs: &BTreeMap<RunId, TrialRecord>,
    ) -> Result<LevelTrials, RecordError> {
        let mut trials = LevelTrials::default();
        for (&run, record) in runs {
            trials.extend(&LevelTrials::from_record(
                subject,
                run,
                record,
                &self.config,
            )?);
        }
        Ok(trials)
    }

    /// Whether all three levels have been calculated.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.overall.is_some()
            && self.subjects.len() == self.runs.len()
            && self.runs.keys().eq(self.subjects.keys())
    }

    /// Subject -> run -> features.
    #[must_use]
    pub fn run_features(&self) -> &BTreeMap<String, BTreeMap<RunId, LevelFeatures>> {
        &self.runs
    }

    #[must_use]
    pub fn run(&self, subject: &str, run: RunId) -> Option<&LevelFeatures> {
        self.runs.get(subject)?.get(&run)
    }

    /// Subject -> features.
    #[must_use]
    pub fn subject_features(&self) -> &BTreeMap<String, LevelFeatures> {
        &self.subjects
    }

    #[must_use]
    pub fn subject(&self, subject: &str) -> Option<&LevelFeatures> {
        self.subjects.get(subject)
    }

    #[must_use]
    pub fn overall(&self) -> Option<&LevelFeatures> {
        self.overall.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn codes(features: &LevelFeatures) -> Vec<u32> {
        features.by_condition.keys().map(|c| c.get()).collect()
    }

    fn code(n: u32) -> ConditionCode {
        ConditionCode::new(n).unwrap()
    }

    fn dataset() -> Dataset {
        let s01r1 = TrialRecord::from_raw(
            vec![150.0, 320.0, 410.0, 380.0, 520.0],
            vec![1, 1, 2, 3, 0],
            vec![1, 1, 2, 3, 0, 3],
            &[150.0, 320.0, 410.0, 380.0, 520.0, -1.0],
            &[155.0, 318.0, -1.0, 377.0, 530.0, 600.0],
        );
        let s01r2 = TrialRecord::from_raw(
            vec![300.0, 350.0, 750.0, 400.0],
            vec![1, 3, 4, 4],
            vec![1, 3, 4, 4],
            &[300.0, 350.0, 750.0, 400.0],
            &[290.0, 360.0, 760.0, 395.0],
        );
        let s02r1 = TrialRecord::from_raw(
            vec![10.0, 20.0, 30.0, 40.0],
            vec![1, 2, 3, 4],
            vec![1, 2, 3, 4],
            &[10.0, 20.0, 30.0, 40.0],
            &[11.0, 19.0, 31.0, 42.0],
        );
        BTreeMap::from([
            ("S01".to_owned(), BTreeMap::from([(1, s01r1), (2, s01r2)])),
            ("S02".to_owned(), BTreeMap::from([(1, s02r1)])),
        ])
    }

    fn physiological() -> FeaturesConfig {
        FeaturesConfig {
            only_physiological: true,
            ..FeaturesConfig::default()
        }
    }

    #[test]
    fn test_ratio_reference() {
        assert_close(
            heterotopic_homotopic_ratio(&[10.0, 20.0, 30.0, 40.0], &[1, 2, 3, 4]),
            15.0 / 35.0,
        );
    }

    #[test]
    fn test_ratio_degenerate_propagates() {
        assert!(heterotopic_homotopic_ratio(&[10.0, 20.0], &[1, 2]).is_nan());
        assert!(heterotopic_homotopic_ratio(&[10.0, 0.0], &[1, 3]).is_infinite());
    }

    #[test]
    fn test_grouping_uses_codes_from_full_sequence() {
        let features = Features::compute(&dataset(), FeaturesConfig::default()).unwrap();
        let run = features.run("S01", 1).unwrap();
        assert_eq!(codes(run), vec![1, 2, 3]);

        let c1 = &run.by_condition[&code(1)];
        assert_eq!(c1.rt, vec![150.0, 320.0]);
        assert_eq!(run.by_condition[&code(3)].rt, vec![380.0]);
        assert_eq!(run.summary.max, 520.0);

        // Different runs expose different code sets.
        let run = features.run("S01", 2).unwrap();
        assert_eq!(codes(run), vec![1, 3, 4]);
    }

    #[test]
    fn test_physiological_filter_applies_to_groups() {
        let features = Features::compute(&dataset(), physiological()).unwrap();
        let run = features.run("S01", 1).unwrap();
        assert_eq!(run.by_condition[&code(1)].rt, vec![320.0]);
        assert_eq!(run.summary.min, 320.0);

        // Every accepted RT of S02 is below the lower limit.
        let run = features.run("S02", 1).unwrap();
        assert_eq!(codes(run), vec![1, 2, 3, 4]);
        assert!(run.summary.is_missing());
        assert!(run.by_condition.values().all(|c| c.summary.is_missing()));
        assert!(run.ratio.is_nan());
    }

    #[test]
    fn test_observed_code_without_accepted_trials_is_missing() {
        let record = TrialRecord::from_raw(
            vec![300.0],
            vec![1],
            vec![1, 2],
            &[300.0, -1.0],
            &[300.0, -1.0],
        );
        let features = LevelTrials::from_record("S", 1, &record, &FeaturesConfig::default())
            .unwrap()
            .into_features();
        assert!(features.conditions.contains(code(2)));
        let missing = features.condition(code(2)).unwrap();
        assert!(missing.summary.is_missing());
        assert!(missing.normality.is_insufficient_data());
        assert!(features.condition(code(3)).is_none());
    }

    #[test]
    fn test_subject_rollup_is_concatenation() {
        let data = dataset();
        let features = Features::compute(&data, physiological()).unwrap();
        let subject = features.subject("S01").unwrap();

        let filter = PhysiologicalFilter::default();
        let mut concatenated = filter.filter_rt(&data["S01"][&1].accepted_rt);
        concatenated.extend(filter.filter_rt(&data["S01"][&2].accepted_rt));
        assert_eq!(subject.summary, Summary::from_values(&concatenated));

        assert_eq!(codes(subject), vec![1, 2, 3, 4]);
        assert_eq!(subject.by_condition[&code(1)].rt, vec![320.0, 300.0]);
        assert_eq!(subject.full_trials.len(), 10);
    }

    #[test]
    fn test_subject_ratio() {
        let features = Features::compute(&dataset(), FeaturesConfig::default()).unwrap();
        assert_close(features.subject("S02").unwrap().ratio, 15.0 / 35.0);
        assert_close(features.run("S02", 1).unwrap().ratio, 15.0 / 35.0);
    }

    #[test]
    fn test_overall_rollup() {
        let data = dataset();
        let features = Features::compute(&data, FeaturesConfig::default()).unwrap();
        let overall = features.overall().unwrap();

        let all_rt = data
            .values()
            .flat_map(BTreeMap::values)
            .flat_map(|record| record.accepted_rt.iter().copied())
            .collect::<Vec<_>>();
        assert_eq!(overall.summary, Summary::from_values(&all_rt));
        assert_eq!(codes(overall), vec![1, 2, 3, 4]);
        assert_eq!(overall.full_trials.len(), 14);
        assert!(features.is_complete());
    }

    #[test]
    fn test_full_trials_follow_modality() {
        let data = dataset();
        let a = Features::compute(&data, FeaturesConfig::default()).unwrap();
        let b = Features::compute(
            &data,
            FeaturesConfig {
                modality: Modality::B,
                ..FeaturesConfig::default()
            },
        )
        .unwrap();
        let run_a = &a.run("S01", 1).unwrap().full_trials;
        let run_b = &b.run("S01", 1).unwrap().full_trials;
        assert_eq!(run_a.rt[5], None);
        assert_eq!(run_b.rt[5], Some(600.0));
        assert_eq!(run_a.condition, run_b.condition);
        assert_eq!(run_b.missing_count(), 1);
    }

    #[test]
    fn test_recalculation_is_idempotent() {
        let data = dataset();
        let mut features = Features::new(physiological());
        features.calculate_run_features(&data).unwrap();
        features.calculate_subject_features(&data).unwrap();
        features.calculate_overall_features(&data).unwrap();
        let first = features.clone();

        features.calculate_run_features(&data).unwrap();
        features.calculate_subject_features(&data).unwrap();
        features.calculate_overall_features(&data).unwrap();
        assert_eq!(format!("{first:?}"), format!("{features:?}"));
    }

    #[test]
    fn test_incomplete_until_every_level() {
        let data = dataset();
        let mut features = Features::new(FeaturesConfig::default());
        assert!(!features.is_complete());
        features.calculate_run_features(&data).unwrap();
        features.calculate_subject_features(&data).unwrap();
        assert!(!features.is_complete());
        features.calculate_overall_features(&data).unwrap();
        assert!(features.is_complete());
    }

    #[test]
    fn test_misaligned_record_names_location() {
        let mut data = dataset();
        data.get_mut("S02")
            .unwrap()
            .get_mut(&1)
            .unwrap()
            .accepted_condition
            .push(1);
        let err = Features::compute(&data, FeaturesConfig::default()).unwrap_err();
        assert!(matches!(
            &err,
            RecordError::MisalignedAccepted { subject, run: 1, .. } if subject == "S02"
        ));
    }
}
