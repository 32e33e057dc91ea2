//! Error taxonomy for the oracle.
//!
//! | error | raised by | effect |
//! |---|---|---|
//! | [`ConfigurationError`] | requirement / config construction | never reaches a run |
//! | [`OrchestratorError::Infrastructure`] | network or container start-up | aborted, torn down |
//! | `rigel_env::BusError` | connect / subscribe | absorbed, requirement stays FAILURE |
//! | [`EvaluationError`] | one message evaluation | absorbed, message still counted |

use crate::requirement::Condition;
use rigel_env::RuntimeError;
use thiserror::Error;

/// Rejected configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A comparison condition without a field to compare
    #[error("Requirement on '{topic}' uses {condition} but declares no field")]
    MissingField { topic: String, condition: Condition },

    /// RECEIVED_COUNT whose value is not a non-negative integer
    #[error("Requirement on '{topic}' expects an integer call count, got {value}")]
    InvalidCallCount {
        topic: String,
        value: serde_json::Value,
    },

    #[error("Requirement topic must not be empty")]
    EmptyTopic,

    #[error("Requirement on '{0}' has an empty message type")]
    EmptyMessageType(String),

    #[error("Container name '{0}' is declared more than once")]
    DuplicateContainer(String),

    #[error("Container name '{0}' is reserved for the ROS master")]
    ReservedName(String),

    /// Malformed configuration document
    #[error("Cannot parse configuration: {0}")]
    Parse(String),
}

/// Failure to evaluate one message against one requirement.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("Field '{path}' not present in message")]
    MissingField { path: String },

    #[error("No value extracted for {0}")]
    MissingValue(Condition),

    #[error("Cannot compare {extracted} with {declared}")]
    TypeMismatch {
        extracted: &'static str,
        declared: &'static str,
    },

    #[error("Values of kind {0} have no ordering")]
    Unorderable(&'static str),

    #[error("Declared call count {0} is not a non-negative integer")]
    InvalidCallCount(serde_json::Value),
}

/// Fatal outcome of a run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Network or container start-up failed; partial state was torn down.
    #[error("Infrastructure failure: {source}")]
    Infrastructure {
        #[source]
        source: RuntimeError,
        /// Removal failures collected during the teardown that followed
        teardown_errors: Vec<String>,
    },
}
