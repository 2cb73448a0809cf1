//! Configuration error types.
//!
//! Every malformed configuration is rejected with one of these before any
//! session starts. Numeric edge cases inside a session are never errors;
//! they surface in the trajectory instead (infinite SE, early stop).

use thiserror::Error;

/// Errors raised while loading or validating a simulation configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The item pool has no items.
    #[error("item pool is empty")]
    EmptyItemPool,

    /// No examinee abilities were supplied.
    #[error("no examinees configured")]
    NoExaminees,

    /// Two items share an id.
    #[error("duplicate item id: {0}")]
    DuplicateItemId(u32),

    /// A numeric field is NaN or infinite.
    #[error("{field} must be a finite number, got {value}")]
    NonFiniteValue { field: String, value: f64 },

    /// Discrimination must be strictly positive.
    #[error("item {id}: discrimination must be positive, got {value}")]
    NonPositiveDiscrimination { id: u32, value: f64 },

    /// A token in a comma-separated list is not a number.
    #[error("invalid number '{token}' at position {position} in {field}")]
    InvalidNumber {
        field: String,
        token: String,
        position: usize,
    },

    /// Fixed-length stopping rule with a length of zero.
    #[error("fixed test length must be at least 1")]
    InvalidFixedLength,

    /// Target SEM outside (0, 1].
    #[error("target SEM must be in (0, 1], got {0}")]
    InvalidTargetSem(f64),

    /// Replication count of zero.
    #[error("replications must be at least 1")]
    InvalidReplications,

    /// Parallelism of zero.
    #[error("parallelism must be at least 1")]
    InvalidParallelism,

    /// Unknown estimation method name.
    #[error("unknown estimation method: {0}")]
    UnknownMethod(String),

    /// Unknown stopping rule name.
    #[error("unknown stopping rule: {0}")]
    UnknownStoppingRule(String),

    /// A stopping rule was named without the parameter it needs.
    #[error("stopping rule '{rule}' requires '{parameter}'")]
    MissingStoppingParameter { rule: String, parameter: String },
}

impl ConfigError {
    pub(crate) fn non_finite(field: impl Into<String>, value: f64) -> Self {
        ConfigError::NonFiniteValue {
            field: field.into(),
            value,
        }
    }
}
