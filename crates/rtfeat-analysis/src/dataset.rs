//! Trial records as produced by the dataset loader
//!
//! A [`Dataset`] maps subject ids to runs, and each run holds one
//! [`TrialRecord`] with two views of the same trials:
//!
//! - **Accepted view**: RT and condition of every trial with a valid response
//! - **Full view**: condition of every trial plus the RT measured by each of the
//!   two extraction pipelines ([`Modality`]), `None` where a pipeline saw no response
//!
//! The two views have independent indices and are only related through their
//! condition codes.
//!
//! # Data Structure
//!
//! ```text
//! Dataset
//! └─ subject id -> run id -> TrialRecord
//!     ├─ accepted_rt / accepted_condition     (same length)
//!     └─ full_condition / full_rt_a / full_rt_b (same length)
//! ```
//!
//! # Serialization
//!
//! On the wire a missing per-modality RT is the sentinel [`NO_RESPONSE`] (`-1`).
//! It is translated to `None` when deserializing and back when serializing, so
//! no code past this boundary compares RTs against the sentinel:
//!
//! ```json
//! {
//!   "accepted_rt": [312.5, 401.0],
//!   "accepted_condition": [1, 3],
//!   "full_condition": [1, 2, 3],
//!   "full_rt_a": [312.5, -1, 401.0],
//!   "full_rt_b": [309.0, 455.0, -1]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Wire value marking a trial without a measurable response.
pub const NO_RESPONSE: f64 = -1.0;

/// Identifier of a run within a subject.
pub type RunId = u32;

/// Subject id -> run id -> trial record.
pub type Dataset = BTreeMap<String, BTreeMap<RunId, TrialRecord>>;

/// RT-extraction pipeline a full-trial sequence was measured with.
#[derive(
    Debug,
    Default,
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
pub enum Modality {
    #[default]
    #[display("modality A")]
    A,
    #[display("modality B")]
    B,
}

/// A positive experimental condition code.
///
/// Labels of zero or below mean "no condition" and never become a
/// `ConditionCode`. By convention codes 1 and 2 are heterotopic, 3 and 4
/// homotopic.
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
#[serde(transparent)]
pub struct ConditionCode(u32);

impl ConditionCode {
    pub const HETEROTOPIC: [Self; 2] = [Self(1), Self(2)];
    pub const HOMOTOPIC: [Self; 2] = [Self(3), Self(4)];

    /// Returns `None` for zero.
    #[must_use]
    pub const fn new(code: u32) -> Option<Self> {
        if code == 0 { None } else { Some(Self(code)) }
    }

    /// Interprets a raw trial label, rejecting zero and negative values.
    #[must_use]
    pub fn from_label(label: i32) -> Option<Self> {
        u32::try_from(label).ok().and_then(Self::new)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn is_heterotopic(self) -> bool {
        Self::HETEROTOPIC.contains(&self)
    }

    #[must_use]
    pub fn is_homotopic(self) -> bool {
        Self::HOMOTOPIC.contains(&self)
    }
}

/// Ordered set of the condition codes observed in a label sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConditionSet(BTreeSet<ConditionCode>);

impl ConditionSet {
    /// Collects the sorted unique positive codes of `labels`.
    #[must_use]
    pub fn from_labels(labels: &[i32]) -> Self {
        Self(
            labels
                .iter()
                .copied()
                .filter_map(ConditionCode::from_label)
                .collect(),
        )
    }

    #[must_use]
    pub fn contains(&self, code: ConditionCode) -> bool {
        self.0.contains(&code)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ConditionCode> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<ConditionCode> for ConditionSet {
    fn from_iter<T: IntoIterator<Item = ConditionCode>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Structural violation in a trial record.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum RecordError {
    #[display(
        "subject '{subject}' run {run}: {rt_len} accepted RTs but {condition_len} accepted conditions"
    )]
    MisalignedAccepted {
        subject: String,
        run: RunId,
        rt_len: usize,
        condition_len: usize,
    },
    #[display(
        "subject '{subject}' run {run}: {rt_len} full RTs for {modality} but {condition_len} full conditions"
    )]
    MisalignedFull {
        subject: String,
        run: RunId,
        modality: Modality,
        rt_len: usize,
        condition_len: usize,
    },
}

/// Raw measurements of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// RTs of trials with a valid response
    pub accepted_rt: Vec<f64>,
    /// Condition label of each accepted trial, aligned with `accepted_rt`
    pub accepted_condition: Vec<i32>,
    /// Condition label of every trial, including non-responses
    pub full_condition: Vec<i32>,
    /// Per-trial RT measured by [`Modality::A`], aligned with `full_condition`
    #[serde(with = "sentinel")]
    pub full_rt_a: Vec<Option<f64>>,
    /// Per-trial RT measured by [`Modality::B`], aligned with `full_condition`
    #[serde(with = "sentinel")]
    pub full_rt_b: Vec<Option<f64>>,
}

impl TrialRecord {
    /// Builds a record from loader arrays where [`NO_RESPONSE`] marks missing RTs.
    #[must_use]
    pub fn from_raw(
        accepted_rt: Vec<f64>,
        accepted_condition: Vec<i32>,
        full_condition: Vec<i32>,
        full_rt_a: &[f64],
        full_rt_b: &[f64],
    ) -> Self {
        Self {
            accepted_rt,
            accepted_condition,
            full_condition,
            full_rt_a: full_rt_a.iter().copied().map(response_from_raw).collect(),
            full_rt_b: full_rt_b.iter().copied().map(response_from_raw).collect(),
        }
    }

    /// Per-trial RTs of the given pipeline.
    #[must_use]
    pub fn full_rt(&self, modality: Modality) -> &[Option<f64>] {
        match modality {
            Modality::A => &self.full_rt_a,
            Modality::B => &self.full_rt_b,
        }
    }

    /// Checks that both views have aligned array lengths.
    pub fn validate(&self, subject: &str, run: RunId) -> Result<(), RecordError> {
        if self.accepted_rt.len() != self.accepted_condition.len() {
            return Err(RecordError::MisalignedAccepted {
                subject: subject.to_owned(),
                run,
                rt_len: self.accepted_rt.len(),
                condition_len: self.accepted_condition.len(),
            });
        }
        for modality in [Modality::A, Modality::B] {
            let rt_len = self.full_rt(modality).len();
            if rt_len != self.full_condition.len() {
                return Err(RecordError::MisalignedFull {
                    subject: subject.to_owned(),
                    run,
                    modality,
                    rt_len,
                    condition_len: self.full_condition.len(),
                });
            }
        }
        Ok(())
    }
}

/// Translates a raw per-trial RT into `None` for the no-response sentinel or NaN.
#[must_use]
pub fn response_from_raw(value: f64) -> Option<f64> {
    if value.is_nan() || (value - NO_RESPONSE).abs() < f64::EPSILON {
        None
    } else {
        Some(value)
    }
}

mod sentinel {
    use serde::{Deserialize as _, Deserializer, Serializer};

    use super::{NO_RESPONSE, response_from_raw};

    pub(super) fn serialize<S>(values: &[Option<f64>], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(values.iter().map(|v| v.unwrap_or(NO_RESPONSE)))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Option<f64>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<f64>::deserialize(deserializer)?;
        Ok(raw.into_iter().map(response_from_raw).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TrialRecord {
        TrialRecord::from_raw(
            vec![300.0, 450.0],
            vec![1, 3],
            vec![1, 2, 3],
            &[300.0, -1.0, 450.0],
            &[310.0, 520.0, -1.0],
        )
    }

    #[test]
    fn test_condition_code_rejects_non_positive() {
        assert_eq!(ConditionCode::from_label(0), None);
        assert_eq!(ConditionCode::from_label(-3), None);
        assert_eq!(ConditionCode::from_label(2).map(ConditionCode::get), Some(2));
        assert!(ConditionCode::from_label(1).unwrap().is_heterotopic());
        assert!(ConditionCode::from_label(4).unwrap().is_homotopic());
    }

    #[test]
    fn test_condition_set_is_sorted_unique() {
        let set = ConditionSet::from_labels(&[3, 0, 1, 3, -1, 2, 1]);
        let codes = set.iter().map(ConditionCode::get).collect::<Vec<_>>();
        assert_eq!(codes, vec![1, 2, 3]);
        assert_eq!(set.len(), 3);
        assert!(set.contains(ConditionCode::new(2).unwrap()));
        assert!(!set.contains(ConditionCode::new(4).unwrap()));

        let empty = ConditionSet::from_labels(&[0, -1]);
        assert!(empty.is_empty());
        assert_eq!(empty, ConditionSet::default());
    }

    #[test]
    fn test_sentinel_translated_at_boundary() {
        let record = record();
        assert_eq!(record.full_rt(Modality::A), &[Some(300.0), None, Some(450.0)]);
        assert_eq!(record.full_rt(Modality::B), &[Some(310.0), Some(520.0), None]);
    }

    #[test]
    fn test_json_round_trip_keeps_sentinel_on_wire() {
        let json = r#"{
            "accepted_rt": [300.0],
            "accepted_condition": [1],
            "full_condition": [1, 2],
            "full_rt_a": [300.0, -1],
            "full_rt_b": [-1, 280.5]
        }"#;
        let record: TrialRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.full_rt_a, vec![Some(300.0), None]);
        assert_eq!(record.full_rt_b, vec![None, Some(280.5)]);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["full_rt_a"], serde_json::json!([300.0, -1.0]));
    }

    #[test]
    fn test_validate_names_subject_and_run() {
        assert!(record().validate("S01", 1).is_ok());

        let mut broken = record();
        broken.accepted_condition.pop();
        let err = broken.validate("S07", 3).unwrap_err();
        assert!(matches!(
            &err,
            RecordError::MisalignedAccepted { subject, run: 3, .. } if subject == "S07"
        ));
        assert!(err.to_string().contains("S07"));

        let mut broken = record();
        broken.full_rt_b.push(None);
        let err = broken.validate("S02", 5).unwrap_err();
        assert!(matches!(
            err,
            RecordError::MisalignedFull {
                modality: Modality::B,
                run: 5,
                ..
            }
        ));
    }
}
