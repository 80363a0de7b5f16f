//! Rubric configuration.
//!
//! Score budgets are independent: the unified scorer's state and function
//! budgets and its format budget are not normalized against each other, and
//! the tool-execution budget is separate again.
//!
//! ```yaml
//! debug: false
//! tool_execution:
//!   max_score: 0.2
//! unified:
//!   func_match_max_score: 0.5
//!   state_match_max_score: 0.5
//!   format_max_score: 0.2
//!   terminal_markers: ["<TASK_FINISHED>", "<TASK_ERROR>"]
//!   empty_ground_truth_matches: false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default budget of the tool-execution reward.
pub const DEFAULT_TOOL_EXECUTION_MAX_SCORE: f64 = 0.2;

/// Default budget of the function-call match.
pub const DEFAULT_FUNC_MATCH_MAX_SCORE: f64 = 0.5;

/// Default budget of the environment state match.
pub const DEFAULT_STATE_MATCH_MAX_SCORE: f64 = 0.5;

/// Default budget of the format check.
pub const DEFAULT_FORMAT_MAX_SCORE: f64 = 0.2;

/// Marker an agent emits when it considers the task done.
pub const TASK_FINISHED_MARKER: &str = "<TASK_FINISHED>";

/// Marker an agent emits when it gives up on the task.
pub const TASK_ERROR_MARKER: &str = "<TASK_ERROR>";

/// Settings of the tool-execution scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolExecutionConfig {
    /// Score awarded when every attempted tool call succeeded.
    pub max_score: f64,
}

impl Default for ToolExecutionConfig {
    fn default() -> Self {
        Self {
            max_score: DEFAULT_TOOL_EXECUTION_MAX_SCORE,
        }
    }
}

/// Settings of the unified (state + function + format) scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnifiedConfig {
    /// Budget for matching the ground-truth calls of every turn.
    pub func_match_max_score: f64,

    /// Budget for matching every ground-truth environment object.
    pub state_match_max_score: f64,

    /// Budget for well-formed assistant turns, awarded only past the gate.
    pub format_max_score: f64,

    /// Raw-content markers that stand in for a tool call in the format check.
    pub terminal_markers: Vec<String>,

    /// Whether a turn with no ground-truth calls counts as matched.
    pub empty_ground_truth_matches: bool,
}

impl Default for UnifiedConfig {
    fn default() -> Self {
        Self {
            func_match_max_score: DEFAULT_FUNC_MATCH_MAX_SCORE,
            state_match_max_score: DEFAULT_STATE_MATCH_MAX_SCORE,
            format_max_score: DEFAULT_FORMAT_MAX_SCORE,
            terminal_markers: vec![
                TASK_FINISHED_MARKER.to_string(),
                TASK_ERROR_MARKER.to_string(),
            ],
            empty_ground_truth_matches: false,
        }
    }
}

/// Complete rubric configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RubricConfig {
    /// Verbose per-turn diagnostics; never changes scores.
    pub debug: bool,

    pub tool_execution: ToolExecutionConfig,

    pub unified: UnifiedConfig,
}

impl RubricConfig {
    /// Parses and validates a YAML configuration.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: RubricConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Enables or disables verbose diagnostics.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the tool-execution budget.
    pub fn with_tool_execution_max_score(mut self, max_score: f64) -> Self {
        self.tool_execution.max_score = max_score;
        self
    }

    /// Sets the function-call match budget.
    pub fn with_func_match_max_score(mut self, max_score: f64) -> Self {
        self.unified.func_match_max_score = max_score;
        self
    }

    /// Sets the state match budget.
    pub fn with_state_match_max_score(mut self, max_score: f64) -> Self {
        self.unified.state_match_max_score = max_score;
        self
    }

    /// Sets the format budget.
    pub fn with_format_max_score(mut self, max_score: f64) -> Self {
        self.unified.format_max_score = max_score;
        self
    }

    /// Checks that every budget is finite and non-negative and that no
    /// terminal marker is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let budgets = [
            ("tool_execution.max_score", self.tool_execution.max_score),
            ("unified.func_match_max_score", self.unified.func_match_max_score),
            ("unified.state_match_max_score", self.unified.state_match_max_score),
            ("unified.format_max_score", self.unified.format_max_score),
        ];
        for (name, value) in budgets {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidBudget { name, value });
            }
        }

        // An empty marker would match every turn.
        if self.unified.terminal_markers.iter().any(|m| m.is_empty()) {
            return Err(ConfigError::EmptyTerminalMarker);
        }

        Ok(())
    }
}
