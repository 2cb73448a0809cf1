//! Simulation configuration.
//!
//! A [`SimulationConfig`] is built once, validated, and then passed by
//! reference into every session. Nothing mutates it during a run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{EstimationMethod, ItemPool, StoppingRule};

/// Everything needed to run a batch of simulated sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// The item pool shared read-only by every session.
    pub pool: ItemPool,
    /// True abilities of the simulated examinees, in output order.
    pub abilities: Vec<f64>,
    pub stopping_rule: StoppingRule,
    pub method: EstimationMethod,
    /// Base seed; session `i` draws from `seed + i`. Random when `None`.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Independent sessions per examinee.
    #[serde(default = "default_replications")]
    pub replications: u32,
    /// Maximum concurrent sessions.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Overall wall-clock budget for the whole batch.
    #[serde(default)]
    pub time_budget: Option<Duration>,
}

fn default_replications() -> u32 {
    1
}

fn default_parallelism() -> usize {
    4
}

impl SimulationConfig {
    /// Validated configuration with default seed, replication and parallelism settings.
    pub fn new(
        pool: ItemPool,
        abilities: Vec<f64>,
        stopping_rule: StoppingRule,
        method: EstimationMethod,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            pool,
            abilities,
            stopping_rule,
            method,
            seed: None,
            replications: default_replications(),
            parallelism: default_parallelism(),
            time_budget: None,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_replications(mut self, replications: u32) -> Self {
        self.replications = replications;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Check every invariant the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.is_empty() {
            return Err(ConfigError::EmptyItemPool);
        }
        if self.abilities.is_empty() {
            return Err(ConfigError::NoExaminees);
        }
        if let Some((idx, &ability)) = self
            .abilities
            .iter()
            .enumerate()
            .find(|(_, a)| !a.is_finite())
        {
            return Err(ConfigError::non_finite(
                format!("examinee {} ability", idx + 1),
                ability,
            ));
        }
        self.stopping_rule.validate()?;
        if self.replications < 1 {
            return Err(ConfigError::InvalidReplications);
        }
        if self.parallelism < 1 {
            return Err(ConfigError::InvalidParallelism);
        }
        Ok(())
    }

    /// Number of sessions a run will produce.
    pub fn session_count(&self) -> usize {
        self.abilities.len() * self.replications as usize
    }

    /// True ability for every session, examinee-major.
    pub fn session_abilities(&self) -> Vec<f64> {
        self.abilities
            .iter()
            .flat_map(|&a| std::iter::repeat(a).take(self.replications as usize))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> ItemPool {
        ItemPool::from_difficulties(&[-1.0, 0.0, 1.0]).unwrap()
    }

    #[test]
    fn valid_config() {
        let config = SimulationConfig::new(
            pool(),
            vec![0.7],
            StoppingRule::default(),
            EstimationMethod::Mle,
        )
        .unwrap();
        assert_eq!(config.replications, 1);
        assert_eq!(config.parallelism, 4);
        assert!(config.seed.is_none());
        assert_eq!(config.session_count(), 1);
    }

    #[test]
    fn rejects_missing_examinees() {
        let err = SimulationConfig::new(
            pool(),
            vec![],
            StoppingRule::default(),
            EstimationMethod::Mle,
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::NoExaminees);
    }

    #[test]
    fn rejects_non_finite_ability() {
        let err = SimulationConfig::new(
            pool(),
            vec![0.0, f64::INFINITY],
            StoppingRule::default(),
            EstimationMethod::Mle,
        )
        .unwrap_err();
        assert!(err.to_string().contains("examinee 2"));
    }

    #[test]
    fn rejects_bad_stopping_rule() {
        let err = SimulationConfig::new(
            pool(),
            vec![0.0],
            StoppingRule::TargetSem { target: 2.0 },
            EstimationMethod::Wle,
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidTargetSem(2.0));
    }

    #[test]
    fn replications_expand_examinee_major() {
        let config = SimulationConfig::new(
            pool(),
            vec![-1.0, 1.0],
            StoppingRule::default(),
            EstimationMethod::Mle,
        )
        .unwrap()
        .with_replications(3);
        assert!(config.validate().is_ok());
        assert_eq!(config.session_count(), 6);
        assert_eq!(
            config.session_abilities(),
            vec![-1.0, -1.0, -1.0, 1.0, 1.0, 1.0]
        );
    }

    #[test]
    fn zero_replications_or_parallelism_rejected() {
        let base = SimulationConfig::new(
            pool(),
            vec![0.0],
            StoppingRule::default(),
            EstimationMethod::Mle,
        )
        .unwrap();
        assert_eq!(
            base.clone().with_replications(0).validate(),
            Err(ConfigError::InvalidReplications)
        );
        assert_eq!(
            base.with_parallelism(0).validate(),
            Err(ConfigError::InvalidParallelism)
        );
    }
}
