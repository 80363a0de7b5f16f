//! Reward functions for tool-calling trajectories.
//!
//! A [`Rubric`] runs a list of [`RewardFunc`]s over a batch of trajectories.
//! The standard rubric pairs [`ToolExecutionScorer`] with [`UnifiedScorer`].

/// Logs a scoring diagnostic at `info` when debugging, `trace` otherwise.
macro_rules! diag {
    ($debug:expr, $($arg:tt)+) => {
        if $debug {
            tracing::info!($($arg)+);
        } else {
            tracing::trace!($($arg)+);
        }
    };
}

pub mod matcher;
pub mod tool_execution;
pub mod unified;

use tracing::debug;

pub use matcher::is_subsequence_unordered;
pub use tool_execution::{ExecutionStats, ToolExecutionScorer};
pub use unified::{MatchCount, MissingCalls, UnifiedBreakdown, UnifiedScorer};

use crate::config::RubricConfig;
use crate::error::ScoringError;
use crate::state::{EnvironmentSnapshot, StateObject};
use crate::trajectory::{Message, StateBundle};

/// A reward over one trajectory and its final state.
pub trait RewardFunc<O: StateObject = EnvironmentSnapshot>: Send + Sync {
    /// Stable name used in logs and output records.
    fn name(&self) -> &str;

    /// Scores one trajectory. `debug` only affects diagnostics.
    fn score(
        &self,
        trajectory: &[Message],
        state: &StateBundle<O>,
        debug: bool,
    ) -> Result<f64, ScoringError>;
}

/// Ordered set of reward functions applied to batches.
pub struct Rubric<O: StateObject = EnvironmentSnapshot> {
    reward_funcs: Vec<Box<dyn RewardFunc<O>>>,
    debug: bool,
}

impl<O: StateObject> Default for Rubric<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: StateObject> Rubric<O> {
    /// Creates an empty rubric.
    pub fn new() -> Self {
        Self {
            reward_funcs: Vec::new(),
            debug: false,
        }
    }

    /// Creates the standard rubric: tool execution, then unified.
    pub fn from_config(config: &RubricConfig) -> Self {
        Self::new()
            .with_debug(config.debug)
            .with_reward_func(ToolExecutionScorer::new(&config.tool_execution))
            .with_reward_func(UnifiedScorer::new(config.unified.clone()))
    }

    /// Appends a reward function.
    pub fn with_reward_func(mut self, func: impl RewardFunc<O> + 'static) -> Self {
        self.reward_funcs.push(Box::new(func));
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Names of the reward functions, in scoring order.
    pub fn reward_names(&self) -> Vec<&str> {
        self.reward_funcs.iter().map(|f| f.name()).collect()
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Scores a single trajectory with every reward function, in order.
    pub fn score(
        &self,
        trajectory: &[Message],
        state: &StateBundle<O>,
        debug: bool,
    ) -> Result<Vec<f64>, ScoringError> {
        self.reward_funcs
            .iter()
            .map(|func| func.score(trajectory, state, debug))
            .collect()
    }

    /// Scores a batch. Returns one score vector per reward function, each
    /// aligned with `completions`.
    ///
    /// Diagnostics are only emitted for the first trajectory of the batch.
    pub fn score_batch(
        &self,
        completions: &[Vec<Message>],
        states: &[StateBundle<O>],
    ) -> Result<Vec<Vec<f64>>, ScoringError> {
        if completions.len() != states.len() {
            return Err(ScoringError::BatchLength {
                completions: completions.len(),
                states: states.len(),
            });
        }

        self.reward_funcs
            .iter()
            .map(|func| {
                debug!(reward = func.name(), batch = completions.len(), "scoring batch");
                completions
                    .iter()
                    .zip(states)
                    .enumerate()
                    .map(|(j, (trajectory, state))| {
                        func.score(trajectory, state, self.debug && j == 0)
                    })
                    .collect()
            })
            .collect()
    }
}
