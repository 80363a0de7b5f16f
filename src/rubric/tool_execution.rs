//! Tool-execution reward.
//!
//! Counts the tool results the environment reported right after each agent
//! tool call and rewards the fraction that did not fail.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ToolExecutionConfig;
use crate::error::ScoringError;
use crate::parser::{MessageParser, XmlParser};
use crate::state::StateObject;
use crate::trajectory::{Message, StateBundle};

use super::RewardFunc;

/// Substring that marks a tool result as failed, compared case-insensitively.
const ERROR_MARKER: &str = "error";

/// Attempt and success counts over one trajectory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Tool results observed after agent tool calls.
    pub attempts: usize,

    /// Results not containing the error marker.
    pub successes: usize,
}

impl ExecutionStats {
    /// Scales the success ratio to `max_score`. No attempts scores 0.0.
    pub fn score(&self, max_score: f64) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        max_score * (self.successes as f64 / self.attempts as f64)
    }
}

/// Rewards the fraction of tool calls the environment executed successfully.
#[derive(Clone)]
pub struct ToolExecutionScorer {
    parser: Arc<dyn MessageParser>,
    env_parser: Arc<dyn MessageParser>,
    max_score: f64,
}

impl Default for ToolExecutionScorer {
    fn default() -> Self {
        Self::new(&ToolExecutionConfig::default())
    }
}

impl ToolExecutionScorer {
    /// Creates a scorer using the default tag parsers.
    pub fn new(config: &ToolExecutionConfig) -> Self {
        Self::with_parsers(
            config,
            Arc::new(XmlParser::assistant()),
            Arc::new(XmlParser::environment()),
        )
    }

    /// Creates a scorer with custom agent and environment parsers.
    pub fn with_parsers(
        config: &ToolExecutionConfig,
        parser: Arc<dyn MessageParser>,
        env_parser: Arc<dyn MessageParser>,
    ) -> Self {
        Self {
            parser,
            env_parser,
            max_score: config.max_score,
        }
    }

    pub fn max_score(&self) -> f64 {
        self.max_score
    }

    /// Counts attempts and successes.
    ///
    /// An agent turn with a tool call counts only when the very next turn is
    /// a system turn carrying a `tool_result` field. Each string in that JSON
    /// array is one attempt; results that are not valid JSON add nothing.
    ///
    /// # Errors
    ///
    /// [`ScoringError::UnexpectedToolResult`] when the result is valid JSON
    /// but not an array of strings.
    pub fn execution_stats(
        &self,
        trajectory: &[Message],
        debug: bool,
    ) -> Result<ExecutionStats, ScoringError> {
        let mut stats = ExecutionStats::default();

        for (i, message) in trajectory.iter().enumerate() {
            if !message.is_assistant() {
                continue;
            }
            let parsed = self.parser.parse(&message.content);
            if parsed.tool().is_none() {
                continue;
            }

            let Some(next) = trajectory.get(i + 1).filter(|m| m.is_system()) else {
                continue;
            };
            let response = self.env_parser.parse(&next.content);
            let Some(raw) = response.tool_result() else {
                continue;
            };

            for result in decode_tool_results(raw)? {
                stats.attempts += 1;
                if result.to_lowercase().contains(ERROR_MARKER) {
                    diag!(debug, turn = i + 1, result = %result, "tool call failed");
                } else {
                    stats.successes += 1;
                }
            }
        }

        Ok(stats)
    }
}

impl<O: StateObject> RewardFunc<O> for ToolExecutionScorer {
    fn name(&self) -> &str {
        "tool_execution"
    }

    fn score(
        &self,
        trajectory: &[Message],
        _state: &StateBundle<O>,
        debug: bool,
    ) -> Result<f64, ScoringError> {
        let stats = self.execution_stats(trajectory, debug)?;
        let score = stats.score(self.max_score);
        diag!(
            debug,
            attempts = stats.attempts,
            successes = stats.successes,
            score,
            "tool execution scored"
        );
        Ok(score)
    }
}

/// Decodes a `tool_result` payload into its result strings.
///
/// Payloads that are not valid JSON decode to no results.
fn decode_tool_results(raw: &str) -> Result<Vec<String>, ScoringError> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "tool result is not valid JSON, ignoring");
            return Ok(Vec::new());
        }
    };

    let Value::Array(items) = value else {
        return Err(ScoringError::UnexpectedToolResult(format!(
            "expected a JSON array of strings, got {value}"
        )));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            other => {
                debug!(entry = %other, "non-string tool result entry");
                Err(ScoringError::UnexpectedToolResult(format!(
                    "tool result entry is not a string: {other}"
                )))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> ToolExecutionScorer {
        ToolExecutionScorer::default()
    }

    fn call(tool: &str) -> Message {
        Message::assistant(format!("<reasoning>go</reasoning><tool>{tool}</tool>"))
    }

    fn results(payload: &str) -> Message {
        Message::system(format!("<tool_result>{payload}</tool_result>"))
    }

    fn score(trajectory: &[Message]) -> f64 {
        let state: StateBundle = StateBundle::default();
        RewardFunc::score(&scorer(), trajectory, &state, false).expect("scorable")
    }

    #[test]
    fn test_all_successful() {
        let trajectory = vec![
            Message::user("list files"),
            call("ls()"),
            results(r#"["{\"current_directory_content\": []}"]"#),
        ];
        assert!((score(&trajectory) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_error_ratio() {
        let trajectory = vec![
            call("cd(folder='x')"),
            results(r#"["{\"error\": \"cd: x: No such directory\"}", "ok"]"#),
            call("ls()"),
            results(r#"["OK", "Error: denied"]"#),
        ];
        let stats = scorer().execution_stats(&trajectory, false).expect("scorable");
        assert_eq!(
            stats,
            ExecutionStats {
                attempts: 4,
                successes: 2
            }
        );
        assert!((score(&trajectory) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_error_marker_is_case_insensitive() {
        let trajectory = vec![call("ls()"), results(r#"["FATAL ERROR"]"#)];
        assert!(score(&trajectory).abs() < 1e-9);
    }

    #[test]
    fn test_no_attempts_scores_zero() {
        assert!(score(&[]).abs() < 1e-9);
        assert!(score(&[Message::assistant("<reasoning>done</reasoning>")]).abs() < 1e-9);
    }

    #[test]
    fn test_result_must_immediately_follow() {
        let trajectory = vec![
            call("ls()"),
            Message::user("interrupt"),
            results(r#"["ok"]"#),
        ];
        let stats = scorer().execution_stats(&trajectory, false).expect("scorable");
        assert_eq!(stats.attempts, 0);
    }

    #[test]
    fn test_system_turn_without_result_is_skipped() {
        let trajectory = vec![call("ls()"), Message::system("no results here")];
        assert_eq!(
            scorer().execution_stats(&trajectory, false).expect("scorable"),
            ExecutionStats::default()
        );
    }

    #[test]
    fn test_invalid_json_counts_nothing() {
        let trajectory = vec![
            call("ls()"),
            results("not json"),
            call("pwd()"),
            results(r#"["ok"]"#),
        ];
        let stats = scorer().execution_stats(&trajectory, false).expect("scorable");
        assert_eq!(
            stats,
            ExecutionStats {
                attempts: 1,
                successes: 1
            }
        );
    }

    #[test]
    fn test_non_array_result_is_fatal() {
        let trajectory = vec![call("ls()"), results(r#"{"status": "ok"}"#)];
        let err = scorer()
            .execution_stats(&trajectory, false)
            .expect_err("object payload");
        assert!(matches!(err, ScoringError::UnexpectedToolResult(_)));

        let trajectory = vec![call("ls()"), results("[1, 2]")];
        assert!(scorer().execution_stats(&trajectory, false).is_err());
    }

    #[test]
    fn test_custom_budget() {
        let scorer = ToolExecutionScorer::new(&ToolExecutionConfig { max_score: 1.0 });
        let trajectory = vec![call("ls()"), results(r#"["ok", "error"]"#)];
        let state: StateBundle = StateBundle::default();
        let score = RewardFunc::score(&scorer, &trajectory, &state, true).expect("scorable");
        assert!((score - 0.5).abs() < 1e-9);
    }
}
