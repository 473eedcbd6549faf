//! Core domain model for ExpertRank patent-expert matching.
//!
//! This crate defines the fundamental types used throughout the system:
//! - `CpcCode`: A hierarchical Cooperative Patent Classification code
//! - `LevelEntry`: A group suffix paired with its hierarchy depth
//! - `Weights`: The 17-coordinate parameter vector tuned by the optimizer
//! - `PatentId` / `ExpertId`: Opaque keys for patents and experts
//! - `RankedExpert`: One entry of a prediction list
//! - `Aggregate`: The pairwise-score reduction strategy

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of coordinates in a full parameter vector.
pub const PARAM_COUNT: usize = 17;

/// Coordinates used for the class-level (coarse) comparison stage:
/// one per character of the section+scheme prefix, plus the exact-class bonus.
pub const CLASS_PARAMS: usize = 5;

/// Coordinates used for the group-level (fine) comparison stage.
pub const GROUP_PARAMS: usize = PARAM_COUNT - CLASS_PARAMS;

/// Opaque patent key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatentId(pub u64);

impl std::fmt::Display for PatentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque expert key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpertId(pub u64);

impl std::fmt::Display for ExpertId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Cooperative Patent Classification code.
///
/// Structure: `section` (1 char) + `scheme` (3 chars) + `class` (remaining
/// characters up to `/`) + `/` + `group` (remainder). Example: `A01B1/02`.
///
/// Codes are immutable and compared structurally by the scoring stages;
/// malformed codes (too short, missing separator) are representable and
/// simply score low via early mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CpcCode(String);

impl CpcCode {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Full raw code text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Text before the `/` separator (section + scheme + class).
    pub fn class_half(&self) -> &str {
        match self.0.find('/') {
            Some(pos) => &self.0[..pos],
            None => &self.0,
        }
    }

    /// Group suffix after the `/` separator; empty when absent.
    pub fn group(&self) -> &str {
        match self.0.find('/') {
            Some(pos) => &self.0[pos + 1..],
            None => "",
        }
    }
}

impl From<&str> for CpcCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for CpcCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A group suffix paired with its depth in the classification hierarchy.
///
/// Levels range from 0 (coarsest grouping marker) to 12 (finest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelEntry {
    /// Group suffix (the part of the code after `/`).
    pub group: String,

    /// Hierarchy depth, 0..=12.
    pub level: u8,
}

impl LevelEntry {
    pub fn new(group: impl Into<String>, level: u8) -> Self {
        Self {
            group: group.into(),
            level,
        }
    }
}

/// Errors raised when a parameter vector is rejected at the boundary.
#[derive(Debug, Error, PartialEq)]
pub enum WeightsError {
    #[error("Expected {PARAM_COUNT} parameters, got {0}")]
    WrongLength(usize),

    #[error("Parameter {index} out of range [0, 1]: {value}")]
    OutOfRange { index: usize, value: f64 },
}

/// The parameter vector driving both scoring stages.
///
/// Exactly 17 coordinates, each in [0, 1]: the first 5 weight the
/// class-level comparison (4 prefix characters + exact-class bonus), the
/// remaining 12 weight hierarchy-depth closeness at the group level.
/// Validated on construction; scorers may assume the invariants hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Weights([f64; PARAM_COUNT]);

impl Weights {
    /// Validate and wrap a raw coordinate slice.
    pub fn new(values: &[f64]) -> Result<Self, WeightsError> {
        if values.len() != PARAM_COUNT {
            return Err(WeightsError::WrongLength(values.len()));
        }
        for (index, &value) in values.iter().enumerate() {
            if !(0.0..=1.0).contains(&value) || value.is_nan() {
                return Err(WeightsError::OutOfRange { index, value });
            }
        }
        let mut array = [0.0; PARAM_COUNT];
        array.copy_from_slice(values);
        Ok(Self(array))
    }

    /// The uniform baseline vector (every coordinate 1.0).
    pub fn uniform() -> Self {
        Self([1.0; PARAM_COUNT])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Class-stage coordinates: 4 prefix-character weights + exact-class bonus.
    pub fn class(&self) -> &[f64] {
        &self.0[..CLASS_PARAMS]
    }

    /// Group-stage coordinates (hierarchy-depth weights).
    pub fn group(&self) -> &[f64] {
        &self.0[CLASS_PARAMS..]
    }

    /// Maximum attainable class-stage score: all 4 characters matched plus
    /// the exact-class bonus.
    pub fn max_class_score(&self) -> f64 {
        self.class().iter().sum()
    }

    /// Score assigned to a byte-identical code pair: the sum of every
    /// coordinate except the last. The final hierarchy-depth weight models
    /// refinement between *distinct* sibling groups and cannot apply to an
    /// identical pair.
    pub fn full_match_score(&self) -> f64 {
        self.0[..PARAM_COUNT - 1].iter().sum()
    }
}

impl<'de> Deserialize<'de> for Weights {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let values = Vec::<f64>::deserialize(deserializer)?;
        Weights::new(&values).map_err(serde::de::Error::custom)
    }
}

/// One entry of a prediction list: an expert and the score of their
/// best-matching patent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedExpert {
    pub expert: ExpertId,
    pub score: f64,
}

/// Reduction collapsing a pairwise score sequence into one scalar per
/// compared patent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    /// Arithmetic mean over all code-pair scores.
    Mean,
    /// Best single code-pair score.
    Max,
}

impl Aggregate {
    /// Apply the reduction. An empty sequence aggregates to 0.0 so that a
    /// patent with no retrievable codes contributes nothing.
    pub fn apply(self, scores: &[f64]) -> f64 {
        if scores.is_empty() {
            return 0.0;
        }
        match self {
            Self::Mean => scores.iter().sum::<f64>() / scores.len() as f64,
            Self::Max => scores.iter().copied().fold(f64::MIN, f64::max),
        }
    }
}

impl std::str::FromStr for Aggregate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "max" => Ok(Self::Max),
            other => Err(format!("Unknown aggregate function: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_code_halves() {
        let code = CpcCode::new("A01B1/02");
        assert_eq!(code.class_half(), "A01B1");
        assert_eq!(code.group(), "02");
    }

    #[test]
    fn test_code_without_separator() {
        let code = CpcCode::new("A01B1");
        assert_eq!(code.class_half(), "A01B1");
        assert_eq!(code.group(), "");
    }

    #[test]
    fn test_weights_length_rejected() {
        assert_eq!(
            Weights::new(&[0.5; 16]),
            Err(WeightsError::WrongLength(16))
        );
    }

    #[test]
    fn test_weights_range_rejected() {
        let mut values = [0.5; PARAM_COUNT];
        values[3] = 1.5;
        assert_eq!(
            Weights::new(&values),
            Err(WeightsError::OutOfRange {
                index: 3,
                value: 1.5
            })
        );
    }

    #[test]
    fn test_weights_sums() {
        let mut values = [0.0; PARAM_COUNT];
        for (i, v) in values.iter_mut().enumerate() {
            *v = (i as f64 + 1.0) / 20.0;
        }
        let weights = Weights::new(&values).unwrap();
        let class_sum: f64 = values[..5].iter().sum();
        let all_but_last: f64 = values[..16].iter().sum();
        assert!((weights.max_class_score() - class_sum).abs() < 1e-12);
        assert!((weights.full_match_score() - all_but_last).abs() < 1e-12);
    }

    #[test]
    fn test_weights_serde_round_trip() {
        let weights = Weights::uniform();
        let json = serde_json::to_string(&weights).unwrap();
        let parsed: Weights = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, weights);
    }

    #[test]
    fn test_weights_deserialize_rejects_out_of_range() {
        let json = "[2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]";
        assert!(serde_json::from_str::<Weights>(json).is_err());
    }

    #[test]
    fn test_aggregate_apply() {
        assert_eq!(Aggregate::Mean.apply(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(Aggregate::Max.apply(&[1.0, 3.0, 2.0]), 3.0);
        assert_eq!(Aggregate::Mean.apply(&[]), 0.0);
        assert_eq!(Aggregate::Max.apply(&[]), 0.0);
    }

    #[test]
    fn test_aggregate_from_str() {
        assert_eq!("mean".parse::<Aggregate>(), Ok(Aggregate::Mean));
        assert_eq!("MAX".parse::<Aggregate>(), Ok(Aggregate::Max));
        assert!("median".parse::<Aggregate>().is_err());
    }
}
