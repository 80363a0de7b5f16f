//! Error types for reward-forge operations.
//!
//! Defines error types for each subsystem:
//! - Ground-truth call decoding
//! - Trajectory scoring (harness invariant violations)
//! - Rubric configuration loading
//! - Dataset record I/O

use thiserror::Error;

/// Errors that can occur while decoding a ground-truth call expression.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
    #[error("Call expression is empty")]
    Empty,

    #[error("Unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("Unterminated string literal starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("Invalid escape sequence '\\{sequence}' at offset {offset}")]
    InvalidEscape { sequence: String, offset: usize },

    #[error("Invalid numeric literal '{text}' at offset {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("Expected {expected} at offset {offset}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("Expression is not a function call")]
    NotACall,

    #[error("Could not determine function name: callee is not a bare identifier")]
    UnnamedCallee,

    #[error("Argument at offset {offset} is not a literal value")]
    NonLiteralArgument { offset: usize },

    #[error("Positional argument follows keyword argument at offset {offset}")]
    PositionalAfterKeyword { offset: usize },

    #[error("Keyword argument '{0}' repeated")]
    DuplicateKeyword(String),

    #[error("Unexpected trailing input at offset {offset}")]
    TrailingInput { offset: usize },
}

/// Errors that abort scoring of a record.
///
/// None of these are converted into a score: they signal corrupted reference
/// data or a broken harness.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Failed to decode ground truth call '{call}': {source}")]
    GroundTruthCall {
        call: String,
        #[source]
        source: DecodeError,
    },

    #[error("Ground truth answer is not a JSON list of call lists: {0}")]
    MalformedAnswer(#[source] serde_json::Error),

    #[error("Turn alignment mismatch: {model} model call turns vs {ground_truth} ground truth turns")]
    TurnAlignment { model: usize, ground_truth: usize },

    #[error("Objects are not of the same kind: model is '{model}', ground truth is '{ground_truth}'")]
    KindMismatch { model: String, ground_truth: String },

    #[error("Model object of kind '{kind}' has no attribute '{attribute}'")]
    MissingAttribute { kind: String, attribute: String },

    #[error("Environment has no object for ground truth key '{0}'")]
    MissingEnvironmentObject(String),

    #[error("Unexpected tool result payload: {0}")]
    UnexpectedToolResult(String),

    #[error("Batch length mismatch: {completions} trajectories vs {states} states")]
    BatchLength { completions: usize, states: usize },
}

/// Errors that can occur while loading or validating rubric configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid score budget '{name}': {value} (must be finite and non-negative)")]
    InvalidBudget { name: &'static str, value: f64 },

    #[error("Terminal marker list must not contain empty markers")]
    EmptyTerminalMarker,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors that can occur while reading or writing scoring records.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Invalid record on line {line}: {source}")]
    InvalidRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
