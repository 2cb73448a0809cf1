//! Core data model types for catsim.
//!
//! Items and pools, the estimation and stopping-rule switches, and the
//! per-examinee records (progression steps and trajectories) that every
//! other part of the system produces or consumes.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Lower bound for any working ability estimate.
pub const MIN_ABILITY: f64 = -4.0;
/// Upper bound for any working ability estimate.
pub const MAX_ABILITY: f64 = 4.0;

/// Fixed test length used when none is configured.
pub const DEFAULT_FIXED_LENGTH: usize = 7;
/// Target SEM used when a target-SEM rule is chosen without one.
pub const DEFAULT_TARGET_SEM: f64 = 0.3;

/// A single test item under the 2PL model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier within a pool.
    pub id: u32,
    /// Location on the ability (logit) scale.
    pub difficulty: f64,
    /// Slope of the response curve.
    #[serde(default = "default_discrimination")]
    pub discrimination: f64,
}

fn default_discrimination() -> f64 {
    1.0
}

impl Item {
    pub fn new(id: u32, difficulty: f64, discrimination: f64) -> Self {
        Self {
            id,
            difficulty,
            discrimination,
        }
    }

    /// An item with the default discrimination of 1.0.
    pub fn rasch(id: u32, difficulty: f64) -> Self {
        Self::new(id, difficulty, default_discrimination())
    }
}

/// Unit-discrimination items numbered from 1 in list order.
pub fn rasch_items(difficulties: &[f64]) -> Vec<Item> {
    difficulties
        .iter()
        .enumerate()
        .map(|(idx, &d)| Item::rasch(idx as u32 + 1, d))
        .collect()
}

/// A validated, ordered collection of items.
///
/// Order is significant: the item selector breaks ties by pool order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Item>", into = "Vec<Item>")]
pub struct ItemPool {
    items: Vec<Item>,
}

impl ItemPool {
    /// Build a pool, rejecting empty input, duplicate ids, non-finite
    /// parameters and non-positive discrimination.
    pub fn new(items: Vec<Item>) -> Result<Self, ConfigError> {
        if items.is_empty() {
            return Err(ConfigError::EmptyItemPool);
        }

        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !seen.insert(item.id) {
                return Err(ConfigError::DuplicateItemId(item.id));
            }
            if !item.difficulty.is_finite() {
                return Err(ConfigError::non_finite(
                    format!("item {} difficulty", item.id),
                    item.difficulty,
                ));
            }
            if !item.discrimination.is_finite() {
                return Err(ConfigError::non_finite(
                    format!("item {} discrimination", item.id),
                    item.discrimination,
                ));
            }
            if item.discrimination <= 0.0 {
                return Err(ConfigError::NonPositiveDiscrimination {
                    id: item.id,
                    value: item.discrimination,
                });
            }
        }

        Ok(Self { items })
    }

    /// Build a pool from difficulties alone: ids 1..=n, discrimination 1.0.
    pub fn from_difficulties(difficulties: &[f64]) -> Result<Self, ConfigError> {
        Self::new(rasch_items(difficulties))
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }
}

impl TryFrom<Vec<Item>> for ItemPool {
    type Error = ConfigError;

    fn try_from(items: Vec<Item>) -> Result<Self, Self::Error> {
        Self::new(items)
    }
}

impl From<ItemPool> for Vec<Item> {
    fn from(pool: ItemPool) -> Self {
        pool.items
    }
}

impl<'a> IntoIterator for &'a ItemPool {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Ability estimation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimationMethod {
    /// Newton-Raphson maximum likelihood.
    #[default]
    Mle,
    /// Warm's weighted likelihood (bias-corrected MLE).
    Wle,
}

impl fmt::Display for EstimationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimationMethod::Mle => write!(f, "mle"),
            EstimationMethod::Wle => write!(f, "wle"),
        }
    }
}

impl FromStr for EstimationMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mle" => Ok(EstimationMethod::Mle),
            "wle" | "warm" => Ok(EstimationMethod::Wle),
            other => Err(ConfigError::UnknownMethod(other.to_string())),
        }
    }
}

/// When a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum StoppingRule {
    /// Administer exactly `min(length, pool size)` items.
    FixedLength { length: usize },
    /// Stop once the standard error is at or below `target`, or the pool runs out.
    TargetSem { target: f64 },
}

impl StoppingRule {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            StoppingRule::FixedLength { length } if length < 1 => {
                Err(ConfigError::InvalidFixedLength)
            }
            StoppingRule::TargetSem { target } if !(target > 0.0 && target <= 1.0) => {
                Err(ConfigError::InvalidTargetSem(target))
            }
            _ => Ok(()),
        }
    }
}

impl Default for StoppingRule {
    fn default() -> Self {
        StoppingRule::FixedLength {
            length: DEFAULT_FIXED_LENGTH,
        }
    }
}

impl fmt::Display for StoppingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoppingRule::FixedLength { length } => write!(f, "fixed-length({length})"),
            StoppingRule::TargetSem { target } => write!(f, "target-sem({target})"),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    FixedLengthReached,
    TargetSemReached,
    /// Every item in the pool was administered.
    PoolExhausted,
    /// Unused items remain but none carries information at the estimate.
    NoInformativeItem,
    /// The caller froze the session before any stopping condition fired.
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::FixedLengthReached => "fixed length reached",
            StopReason::TargetSemReached => "target SEM reached",
            StopReason::PoolExhausted => "pool exhausted",
            StopReason::NoInformativeItem => "no informative item",
            StopReason::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

/// One administered item and the simulated 0/1 response to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Administration {
    pub item: Item,
    pub response: u8,
}

/// A record of one administration within a session.
///
/// Step 0 is a synthetic pre-test entry with no item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionStep {
    pub step: usize,
    pub item_id: Option<u32>,
    pub difficulty: Option<f64>,
    pub response: Option<u8>,
    /// Ability estimate after this response.
    pub ability_estimate: f64,
    /// Standard error after this response.
    #[serde(with = "extended_float")]
    pub standard_error: f64,
    /// Information of this item at the post-update estimate.
    pub fisher_info: f64,
    /// Running sum of `fisher_info` over all steps so far.
    pub cumulative_fisher_info: f64,
    /// Total information of all administered items at the post-update estimate.
    pub test_information: f64,
}

impl ProgressionStep {
    /// The synthetic pre-test entry.
    pub fn initial() -> Self {
        Self {
            step: 0,
            item_id: None,
            difficulty: None,
            response: None,
            ability_estimate: 0.0,
            standard_error: f64::INFINITY,
            fisher_info: 0.0,
            cumulative_fisher_info: 0.0,
            test_information: 0.0,
        }
    }
}

/// The full record of one examinee's simulated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub true_ability: f64,
    pub final_estimate: f64,
    #[serde(with = "extended_float")]
    pub final_se: f64,
    pub items_administered: usize,
    pub stop_reason: StopReason,
    /// Seed of the random stream this session drew from, when known.
    #[serde(default)]
    pub seed: Option<u64>,
    pub progression: Vec<ProgressionStep>,
}

impl Trajectory {
    pub fn error(&self) -> f64 {
        self.final_estimate - self.true_ability
    }

    /// Steps excluding the synthetic step 0.
    pub fn administered_steps(&self) -> &[ProgressionStep] {
        self.progression.get(1..).unwrap_or(&[])
    }
}

/// Serde adapter for floats that may be infinite or NaN.
///
/// JSON has no representation for non-finite numbers, so they are written
/// as the strings `"inf"`, `"-inf"` and `"nan"`.
pub(crate) mod extended_float {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(text) => match text.to_lowercase().as_str() {
                "inf" | "infinity" => Ok(f64::INFINITY),
                "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(serde::de::Error::custom(format!(
                    "expected a number, 'inf', '-inf' or 'nan', got '{other}'"
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_rejects_empty() {
        assert_eq!(ItemPool::new(vec![]), Err(ConfigError::EmptyItemPool));
    }

    #[test]
    fn pool_rejects_duplicate_ids() {
        let items = vec![Item::rasch(1, 0.0), Item::rasch(1, 0.5)];
        assert_eq!(ItemPool::new(items), Err(ConfigError::DuplicateItemId(1)));
    }

    #[test]
    fn pool_rejects_non_positive_discrimination() {
        let err = ItemPool::new(vec![Item::new(4, 0.0, 0.0)]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NonPositiveDiscrimination { id: 4, .. }
        ));
        assert!(ItemPool::new(vec![Item::new(4, 0.0, -1.0)]).is_err());
    }

    #[test]
    fn pool_rejects_non_finite_difficulty() {
        let err = ItemPool::new(vec![Item::rasch(1, f64::NAN)]).unwrap_err();
        assert!(matches!(err, ConfigError::NonFiniteValue { .. }));
    }

    #[test]
    fn pool_from_difficulties_assigns_ids() {
        let pool = ItemPool::from_difficulties(&[-1.0, 0.0, 1.0]).unwrap();
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.items()[0].id, 1);
        assert_eq!(pool.items()[2].id, 3);
        assert_eq!(pool.get(2).map(|i| i.difficulty), Some(0.0));
        assert!(pool.iter().all(|i| i.discrimination == 1.0));
    }

    #[test]
    fn rasch_items_match_pool_numbering() {
        let items = rasch_items(&[0.5, -0.5]);
        assert_eq!(items, vec![Item::rasch(1, 0.5), Item::rasch(2, -0.5)]);
        assert_eq!(ItemPool::from_difficulties(&[0.5, -0.5]).unwrap().items(), &items[..]);
    }

    #[test]
    fn default_rule_uses_default_length() {
        assert_eq!(
            StoppingRule::default(),
            StoppingRule::FixedLength {
                length: DEFAULT_FIXED_LENGTH
            }
        );
    }

    #[test]
    fn method_display_and_parse() {
        assert_eq!(EstimationMethod::Mle.to_string(), "mle");
        assert_eq!("WLE".parse::<EstimationMethod>().unwrap(), EstimationMethod::Wle);
        assert_eq!("warm".parse::<EstimationMethod>().unwrap(), EstimationMethod::Wle);
        assert!("eap".parse::<EstimationMethod>().is_err());
    }

    #[test]
    fn stopping_rule_validation() {
        assert!(StoppingRule::FixedLength { length: 1 }.validate().is_ok());
        assert_eq!(
            StoppingRule::FixedLength { length: 0 }.validate(),
            Err(ConfigError::InvalidFixedLength)
        );
        assert!(StoppingRule::TargetSem { target: 1.0 }.validate().is_ok());
        assert!(StoppingRule::TargetSem { target: 0.0 }.validate().is_err());
        assert!(StoppingRule::TargetSem { target: f64::NAN }.validate().is_err());
    }

    #[test]
    fn initial_step_has_infinite_se() {
        let step = ProgressionStep::initial();
        assert_eq!(step.step, 0);
        assert!(step.item_id.is_none());
        assert!(step.standard_error.is_infinite());
    }

    #[test]
    fn infinite_se_survives_json() {
        let step = ProgressionStep::initial();
        let json = serde_json::to_string(&step).unwrap();
        assert!(json.contains("\"standard_error\":\"inf\""));
        let back: ProgressionStep = serde_json::from_str(&json).unwrap();
        assert!(back.standard_error.is_infinite());
        assert_eq!(back.ability_estimate, 0.0);
    }

    #[test]
    fn pool_serde_validates() {
        let json = r#"[{"id":1,"difficulty":0.0},{"id":1,"difficulty":1.0}]"#;
        assert!(serde_json::from_str::<ItemPool>(json).is_err());
        let json = r#"[{"id":1,"difficulty":0.0}]"#;
        let pool: ItemPool = serde_json::from_str(json).unwrap();
        assert_eq!(pool.items()[0].discrimination, 1.0);
    }
}
