//! TOML configuration parser.
//!
//! Loads simulation settings from TOML files, parses comma-separated numeric
//! lists, and reports non-fatal configuration warnings.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::SimulationConfig;
use crate::error::ConfigError;
use crate::model::{
    rasch_items, EstimationMethod, Item, ItemPool, StoppingRule, MAX_ABILITY, MIN_ABILITY,
};

/// Intermediate TOML structure for configuration files.
#[derive(Debug, Default, Deserialize)]
struct TomlConfigFile {
    #[serde(default)]
    simulation: TomlSimulation,
    #[serde(default)]
    stopping: Option<TomlStopping>,
    #[serde(default)]
    examinees: Option<TomlExaminees>,
    #[serde(default)]
    pool: Option<TomlPool>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlSimulation {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    replications: Option<u32>,
    #[serde(default)]
    parallelism: Option<usize>,
    #[serde(default)]
    time_budget_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TomlStopping {
    rule: String,
    #[serde(default)]
    length: Option<usize>,
    #[serde(default)]
    target: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TomlExaminees {
    #[serde(default)]
    abilities: Vec<f64>,
    #[serde(default)]
    list: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlPool {
    #[serde(default)]
    difficulties: Option<String>,
    #[serde(default)]
    items: Vec<TomlItem>,
}

#[derive(Debug, Deserialize)]
struct TomlItem {
    #[serde(default)]
    id: Option<u32>,
    difficulty: f64,
    #[serde(default = "default_discrimination")]
    discrimination: f64,
}

fn default_discrimination() -> f64 {
    1.0
}

pub use crate::model::{DEFAULT_FIXED_LENGTH, DEFAULT_TARGET_SEM};

/// A partially specified configuration.
///
/// Config files and command-line flags each produce a draft; drafts are
/// merged and then built into a validated [`SimulationConfig`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDraft {
    pub items: Option<Vec<Item>>,
    pub abilities: Option<Vec<f64>>,
    pub stopping_rule: Option<StoppingRule>,
    pub method: Option<EstimationMethod>,
    pub seed: Option<u64>,
    pub replications: Option<u32>,
    pub parallelism: Option<usize>,
    pub time_budget_secs: Option<u64>,
}

impl ConfigDraft {
    /// Overlay `overrides` on top of `self`; set fields in `overrides` win.
    pub fn merge(self, overrides: ConfigDraft) -> ConfigDraft {
        ConfigDraft {
            items: overrides.items.or(self.items),
            abilities: overrides.abilities.or(self.abilities),
            stopping_rule: overrides.stopping_rule.or(self.stopping_rule),
            method: overrides.method.or(self.method),
            seed: overrides.seed.or(self.seed),
            replications: overrides.replications.or(self.replications),
            parallelism: overrides.parallelism.or(self.parallelism),
            time_budget_secs: overrides.time_budget_secs.or(self.time_budget_secs),
        }
    }

    /// Validate and freeze. Missing pool or examinees are errors; every
    /// other field falls back to its documented default.
    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let pool = ItemPool::new(self.items.unwrap_or_default())?;
        let abilities = self.abilities.ok_or(ConfigError::NoExaminees)?;

        let mut config = SimulationConfig::new(
            pool,
            abilities,
            self.stopping_rule.unwrap_or_default(),
            self.method.unwrap_or_default(),
        )?;
        config.seed = self.seed;
        if let Some(r) = self.replications {
            config.replications = r;
        }
        if let Some(p) = self.parallelism {
            config.parallelism = p;
        }
        config.time_budget = self.time_budget_secs.map(Duration::from_secs);
        config.validate()?;
        Ok(config)
    }
}

/// Parse a comma-separated list of finite numbers.
///
/// Blank tokens (e.g. a trailing comma) are skipped; anything else that is
/// not a finite number is an error naming the offending token.
pub fn parse_number_list(field: &str, input: &str) -> Result<Vec<f64>, ConfigError> {
    let mut values = Vec::new();
    for (idx, token) in input.split(',').enumerate() {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let value: f64 = token.parse().map_err(|_| ConfigError::InvalidNumber {
            field: field.to_string(),
            token: token.to_string(),
            position: idx + 1,
        })?;
        if !value.is_finite() {
            return Err(ConfigError::non_finite(format!("{field}[{}]", idx + 1), value));
        }
        values.push(value);
    }
    Ok(values)
}

/// Build a stopping rule from its name and parameters.
pub fn parse_stopping_rule(
    rule: &str,
    length: Option<usize>,
    target: Option<f64>,
) -> Result<StoppingRule, ConfigError> {
    let stopping = match rule.trim().to_lowercase().as_str() {
        "fixed-length" | "fixed" => StoppingRule::FixedLength {
            length: length.ok_or_else(|| ConfigError::MissingStoppingParameter {
                rule: rule.to_string(),
                parameter: "length".into(),
            })?,
        },
        "target-sem" | "sem" => StoppingRule::TargetSem {
            target: target.ok_or_else(|| ConfigError::MissingStoppingParameter {
                rule: rule.to_string(),
                parameter: "target".into(),
            })?,
        },
        other => return Err(ConfigError::UnknownStoppingRule(other.to_string())),
    };
    stopping.validate()?;
    Ok(stopping)
}

/// Parse a configuration file into a draft.
pub fn parse_config(path: &Path) -> Result<ConfigDraft> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    parse_config_str(&content, path)
}

/// Parse a TOML string into a draft (useful for testing).
pub fn parse_config_str(content: &str, source_path: &Path) -> Result<ConfigDraft> {
    let parsed: TomlConfigFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let method = parsed
        .simulation
        .method
        .as_deref()
        .map(str::parse::<EstimationMethod>)
        .transpose()?;

    let stopping_rule = parsed
        .stopping
        .map(|s| parse_stopping_rule(&s.rule, s.length, s.target))
        .transpose()?;

    let abilities = match parsed.examinees {
        Some(ex) => {
            let mut abilities = ex.abilities;
            if let Some(list) = &ex.list {
                abilities.extend(parse_number_list("examinees.list", list)?);
            }
            Some(abilities)
        }
        None => None,
    };

    let items = match parsed.pool {
        Some(pool) => {
            let mut items: Vec<Item> = Vec::new();
            if let Some(list) = &pool.difficulties {
                items.extend(rasch_items(&parse_number_list("pool.difficulties", list)?));
            }
            for item in pool.items {
                let id = item.id.unwrap_or(items.len() as u32 + 1);
                items.push(Item::new(id, item.difficulty, item.discrimination));
            }
            Some(items)
        }
        None => None,
    };

    Ok(ConfigDraft {
        items,
        abilities,
        stopping_rule,
        method,
        seed: parsed.simulation.seed,
        replications: parsed.simulation.replications,
        parallelism: parsed.simulation.parallelism,
        time_budget_secs: parsed.simulation.time_budget_secs,
    })
}

/// Parse, build and validate a configuration file.
pub fn load_config(path: &Path) -> Result<SimulationConfig> {
    let draft = parse_config(path)?;
    draft
        .build()
        .with_context(|| format!("invalid configuration in {}", path.display()))
}

/// A non-fatal configuration issue.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub message: String,
}

/// Check a valid configuration for settings that are legal but likely
/// not what the caller intended.
pub fn validate_config(config: &SimulationConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    match config.stopping_rule {
        StoppingRule::FixedLength { length } if length > config.pool.len() => {
            warnings.push(ValidationWarning {
                message: format!(
                    "fixed length {length} exceeds pool size {}; sessions will stop at {}",
                    config.pool.len(),
                    config.pool.len()
                ),
            });
        }
        StoppingRule::TargetSem { target } => {
            // Each item contributes at most a^2 / 4.
            let max_info: f64 = config
                .pool
                .iter()
                .map(|i| i.discrimination * i.discrimination / 4.0)
                .sum();
            let best_se = (1.0 / max_info).sqrt();
            if best_se > target {
                warnings.push(ValidationWarning {
                    message: format!(
                        "target SEM {target} is unreachable with this pool (best possible {best_se:.3}); \
                         every session will administer the whole pool"
                    ),
                });
            }
        }
        _ => {}
    }

    for (idx, &ability) in config.abilities.iter().enumerate() {
        if !(MIN_ABILITY..=MAX_ABILITY).contains(&ability) {
            warnings.push(ValidationWarning {
                message: format!(
                    "examinee {} has true ability {ability} outside the estimable range [{MIN_ABILITY}, {MAX_ABILITY}]",
                    idx + 1
                ),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[simulation]
method = "wle"
seed = 42
replications = 2
parallelism = 2
time_budget_secs = 30

[stopping]
rule = "fixed-length"
length = 7

[examinees]
abilities = [0.7, -1.0]

[pool]
difficulties = "-2.0, -1.5, -1.0, -0.5, 0.0, 0.5, 1.0, 1.5, 2.0, 2.5"
"#;

    #[test]
    fn parse_valid_toml() {
        let draft = parse_config_str(VALID_TOML, &PathBuf::from("catsim.toml")).unwrap();
        let config = draft.build().unwrap();
        assert_eq!(config.method, EstimationMethod::Wle);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.replications, 2);
        assert_eq!(config.parallelism, 2);
        assert_eq!(config.time_budget, Some(Duration::from_secs(30)));
        assert_eq!(config.stopping_rule, StoppingRule::FixedLength { length: 7 });
        assert_eq!(config.abilities, vec![0.7, -1.0]);
        assert_eq!(config.pool.len(), 10);
        assert_eq!(config.pool.items()[9].id, 10);
    }

    #[test]
    fn parse_explicit_items() {
        let toml = r#"
[stopping]
rule = "target-sem"
target = 0.3

[examinees]
list = "0.1, 0.2"

[[pool.items]]
id = 10
difficulty = -0.5
discrimination = 1.8

[[pool.items]]
id = 11
difficulty = 0.5
"#;
        let config = parse_config_str(toml, &PathBuf::from("t.toml"))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.stopping_rule, StoppingRule::TargetSem { target: 0.3 });
        assert_eq!(config.method, EstimationMethod::Mle);
        assert_eq!(config.abilities, vec![0.1, 0.2]);
        assert_eq!(config.pool.items()[0].discrimination, 1.8);
        assert_eq!(config.pool.items()[1].discrimination, 1.0);
        assert_eq!(config.pool.get(11).map(|i| i.difficulty), Some(0.5));
    }

    #[test]
    fn missing_pool_fails_fast() {
        let toml = r#"
[examinees]
abilities = [0.0]
"#;
        let draft = parse_config_str(toml, &PathBuf::from("t.toml")).unwrap();
        assert_eq!(draft.build().unwrap_err(), ConfigError::EmptyItemPool);
    }

    #[test]
    fn missing_examinees_fails_fast() {
        let toml = r#"
[pool]
difficulties = "0.0"
"#;
        let draft = parse_config_str(toml, &PathBuf::from("t.toml")).unwrap();
        assert_eq!(draft.build().unwrap_err(), ConfigError::NoExaminees);
    }

    #[test]
    fn malformed_difficulty_list_is_rejected() {
        let toml = r#"
[pool]
difficulties = "-1.0, abc, 1.0"
"#;
        let err = parse_config_str(toml, &PathBuf::from("t.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("invalid number 'abc' at position 2"));
    }

    #[test]
    fn stopping_rule_requires_parameter() {
        let toml = r#"
[stopping]
rule = "target-sem"
"#;
        let err = parse_config_str(toml, &PathBuf::from("t.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("requires 'target'"));
    }

    #[test]
    fn unknown_method_is_rejected() {
        let toml = r#"
[simulation]
method = "eap"
"#;
        assert!(parse_config_str(toml, &PathBuf::from("t.toml")).is_err());
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        assert!(parse_config_str(bad, &PathBuf::from("bad.toml")).is_err());
    }

    #[test]
    fn number_list_parsing() {
        assert_eq!(
            parse_number_list("x", " -2.0, 0 ,1.5, ").unwrap(),
            vec![-2.0, 0.0, 1.5]
        );
        assert!(parse_number_list("x", "").unwrap().is_empty());
        assert!(matches!(
            parse_number_list("x", "1, NaN"),
            Err(ConfigError::NonFiniteValue { .. })
        ));
        assert!(matches!(
            parse_number_list("x", "1;2"),
            Err(ConfigError::InvalidNumber { position: 1, .. })
        ));
    }

    #[test]
    fn stopping_rule_aliases() {
        assert_eq!(
            parse_stopping_rule("fixed", Some(3), None).unwrap(),
            StoppingRule::FixedLength { length: 3 }
        );
        assert_eq!(
            parse_stopping_rule("SEM", None, Some(0.25)).unwrap(),
            StoppingRule::TargetSem { target: 0.25 }
        );
        assert_eq!(
            parse_stopping_rule("fixed", Some(0), None).unwrap_err(),
            ConfigError::InvalidFixedLength
        );
        assert!(matches!(
            parse_stopping_rule("adaptive", None, None),
            Err(ConfigError::UnknownStoppingRule(_))
        ));
    }

    #[test]
    fn merge_prefers_overrides() {
        let base = ConfigDraft {
            abilities: Some(vec![0.0]),
            method: Some(EstimationMethod::Mle),
            seed: Some(1),
            ..Default::default()
        };
        let overrides = ConfigDraft {
            method: Some(EstimationMethod::Wle),
            ..Default::default()
        };
        let merged = base.merge(overrides);
        assert_eq!(merged.method, Some(EstimationMethod::Wle));
        assert_eq!(merged.seed, Some(1));
        assert_eq!(merged.abilities, Some(vec![0.0]));
    }

    #[test]
    fn warnings_for_unreachable_target_and_long_fixed_length() {
        let config = parse_config_str(VALID_TOML, &PathBuf::from("t.toml"))
            .unwrap()
            .build()
            .unwrap();
        assert!(validate_config(&config).is_empty());

        let mut sem = config.clone();
        sem.stopping_rule = StoppingRule::TargetSem { target: 0.3 };
        let warnings = validate_config(&sem);
        assert!(warnings.iter().any(|w| w.message.contains("unreachable")));

        let mut long = config;
        long.stopping_rule = StoppingRule::FixedLength { length: 20 };
        long.abilities.push(5.0);
        let warnings = validate_config(&long);
        assert!(warnings.iter().any(|w| w.message.contains("exceeds pool size")));
        assert!(warnings.iter().any(|w| w.message.contains("examinee 3")));
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catsim.toml");
        std::fs::write(&path, VALID_TOML).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.pool.len(), 10);
        assert!(load_config(&dir.path().join("missing.toml")).is_err());
    }
}
