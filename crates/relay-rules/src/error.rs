//! Error types for rule registration and configuration

use crate::model::RuleType;
use thiserror::Error;

/// Errors that can occur while building a rule set.
///
/// Rule evaluation itself never fails; these are all configuration-time errors.
#[derive(Error, Debug)]
pub enum RuleError {
    /// No free slot left for this rule type
    #[error("No capacity left for {kind:?} rules (max {capacity})")]
    CapacityExhausted { kind: RuleType, capacity: usize },

    /// Rule identity 0 is reserved for "no rule"
    #[error("Rule identity must be non-zero")]
    ZeroIdentity,

    /// Timeline has more windows than it can hold
    #[error("Timeline holds at most {0} windows")]
    TooManyWindows(usize),

    /// Rule list has more rules than a tick can evaluate
    #[error("Rule list holds at most {0} rules")]
    TooManyRules(usize),

    /// Two configured rules share an identity
    #[error("Duplicate rule identity: {0}")]
    DuplicateIdentity(u64),

    /// Handle does not refer to a registered rule
    #[error("Unknown rule handle: {0}")]
    UnknownHandle(String),

    /// Invalid time format
    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),

    /// Day number outside 0 (Sunday) ..= 6 (Saturday)
    #[error("Invalid day of week: {0}")]
    InvalidDay(u8),

    /// IO error (configuration file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
