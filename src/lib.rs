//! reward-forge: reward rubrics for multi-turn tool-calling trajectories.
//!
//! This library scores agent conversations against reference data: how many
//! tool calls the environment executed successfully, whether the final
//! environment state and executed calls match the ground truth, and whether
//! agent turns are well formed.

// Core modules
pub mod calls;
pub mod cli;
pub mod config;
pub mod error;
pub mod parser;
pub mod rubric;
pub mod state;
pub mod trajectory;

// Re-export commonly used types
pub use calls::{parse_function_call, CallKey, CanonicalKey, FunctionCall, Literal};
pub use config::RubricConfig;
pub use error::{ConfigError, DatasetError, DecodeError, ScoringError};
pub use parser::{MessageParser, ParsedMessage, XmlParser};
pub use rubric::{
    is_subsequence_unordered, RewardFunc, Rubric, ToolExecutionScorer, UnifiedBreakdown,
    UnifiedScorer,
};
pub use state::{compare_instances, EnvironmentSnapshot, StateDiff, StateObject};
pub use trajectory::{ArgValue, Message, ModelCall, Role, StateBundle};
