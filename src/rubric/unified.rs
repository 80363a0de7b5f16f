//! Unified state, function-call and format reward.
//!
//! The score is built in four steps:
//!
//! 1. State match: fraction of ground-truth environment objects whose public
//!    attributes match the agent's final objects.
//! 2. Function match: fraction of turns whose ground-truth calls are all
//!    contained, as a multiset, in the calls the agent executed that turn.
//! 3. Gate: unless both matches are perfect the whole reward is 0.0.
//! 4. Format: past the gate, the fraction of agent turns that carry
//!    reasoning plus either a tool call or a terminal marker is added.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::calls::{CallKey, FunctionCall};
use crate::config::UnifiedConfig;
use crate::error::ScoringError;
use crate::parser::{MessageParser, XmlParser};
use crate::state::{compare_instances, StateDiff, StateObject};
use crate::trajectory::{Message, StateBundle};

use super::matcher::is_subsequence_unordered;
use super::RewardFunc;

/// Matched versus total items of one sub-score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCount {
    pub matched: usize,
    pub total: usize,
}

impl MatchCount {
    /// Scales the match ratio to `max_score`. A zero total scores 0.0.
    pub fn score(&self, max_score: f64) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        max_score * (self.matched as f64 / self.total as f64)
    }
}

/// Ground-truth calls of one turn that the agent never executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingCalls {
    /// Zero-based turn index.
    pub turn: usize,

    /// Source text of each missing call, one entry per missing occurrence.
    pub calls: Vec<String>,
}

/// Full breakdown of a unified score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedBreakdown {
    pub state_score: f64,
    pub func_score: f64,

    /// Format component; only evaluated when the gate passed.
    pub format_score: f64,

    /// Whether state and function matches were both perfect.
    pub gate_passed: bool,

    pub state: MatchCount,
    pub func: MatchCount,
    pub format: MatchCount,

    /// Diffs of ground-truth objects that did not match, by key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub state_differences: BTreeMap<String, StateDiff>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_calls: Vec<MissingCalls>,
}

impl UnifiedBreakdown {
    /// Final reward: the three components past the gate, 0.0 otherwise.
    pub fn total(&self) -> f64 {
        if self.gate_passed {
            self.state_score + self.func_score + self.format_score
        } else {
            0.0
        }
    }
}

/// Gated state + function-call + format reward.
#[derive(Clone)]
pub struct UnifiedScorer {
    parser: Arc<dyn MessageParser>,
    config: UnifiedConfig,
}

impl Default for UnifiedScorer {
    fn default() -> Self {
        Self::new(UnifiedConfig::default())
    }
}

impl UnifiedScorer {
    /// Creates a scorer using the default agent tag parser.
    pub fn new(config: UnifiedConfig) -> Self {
        Self::with_parser(config, Arc::new(XmlParser::assistant()))
    }

    pub fn with_parser(config: UnifiedConfig, parser: Arc<dyn MessageParser>) -> Self {
        Self { parser, config }
    }

    pub fn config(&self) -> &UnifiedConfig {
        &self.config
    }

    /// Scores a trajectory and returns every component.
    ///
    /// # Errors
    ///
    /// Fails on broken reference data: undecodable answers or calls,
    /// misaligned turns, missing environment objects, or objects that cannot
    /// be compared.
    pub fn evaluate<O: StateObject>(
        &self,
        trajectory: &[Message],
        state: &StateBundle<O>,
        debug: bool,
    ) -> Result<UnifiedBreakdown, ScoringError> {
        let mut breakdown = UnifiedBreakdown::default();

        breakdown.state = self.match_state(state, debug, &mut breakdown.state_differences)?;
        breakdown.state_score = breakdown.state.score(self.config.state_match_max_score);

        breakdown.func = self.match_calls(state, debug, &mut breakdown.missing_calls)?;
        breakdown.func_score = breakdown.func.score(self.config.func_match_max_score);

        let base = breakdown.state_score + breakdown.func_score;
        let perfect = self.config.state_match_max_score + self.config.func_match_max_score;
        breakdown.gate_passed = base == perfect;

        if breakdown.gate_passed {
            breakdown.format = self.check_format(trajectory, debug);
            breakdown.format_score = breakdown.format.score(self.config.format_max_score);
        } else {
            diag!(
                debug,
                state_score = breakdown.state_score,
                func_score = breakdown.func_score,
                "gate failed, reward is 0.0"
            );
        }

        diag!(
            debug,
            state = breakdown.state_score,
            func = breakdown.func_score,
            format = breakdown.format_score,
            total = breakdown.total(),
            "unified reward scored"
        );
        Ok(breakdown)
    }

    /// Compares every ground-truth environment object with the agent's.
    fn match_state<O: StateObject>(
        &self,
        state: &StateBundle<O>,
        debug: bool,
        differences: &mut BTreeMap<String, StateDiff>,
    ) -> Result<MatchCount, ScoringError> {
        let mut count = MatchCount {
            matched: 0,
            total: state.ground_truth_environment.len(),
        };

        for (key, ground_truth) in &state.ground_truth_environment {
            let model = state
                .environment
                .get(key)
                .ok_or_else(|| ScoringError::MissingEnvironmentObject(key.clone()))?;

            let diff = compare_instances(model, ground_truth)?;
            if diff.valid {
                count.matched += 1;
            } else {
                for (attribute, difference) in &diff.differences {
                    diag!(
                        debug,
                        object = %key,
                        attribute = %attribute,
                        model = %difference.model,
                        ground_truth = %difference.ground_truth,
                        "state mismatch"
                    );
                }
                differences.insert(key.clone(), diff);
            }
        }

        Ok(count)
    }

    /// Checks each turn's ground-truth calls against the executed calls.
    fn match_calls<O>(
        &self,
        state: &StateBundle<O>,
        debug: bool,
        missing_calls: &mut Vec<MissingCalls>,
    ) -> Result<MatchCount, ScoringError> {
        let ground_truth: Vec<Vec<String>> =
            serde_json::from_str(&state.dataset_row.answer).map_err(ScoringError::MalformedAnswer)?;

        if ground_truth.len() != state.successful_func_calls.len() {
            return Err(ScoringError::TurnAlignment {
                model: state.successful_func_calls.len(),
                ground_truth: ground_truth.len(),
            });
        }

        let mut count = MatchCount {
            matched: 0,
            total: ground_truth.len(),
        };

        for (turn, (expected, executed)) in ground_truth
            .iter()
            .zip(&state.successful_func_calls)
            .enumerate()
        {
            let expected_keys = expected
                .iter()
                .map(|source| {
                    FunctionCall::parse(source)
                        .map(|call| call.key())
                        .map_err(|e| ScoringError::GroundTruthCall {
                            call: source.clone(),
                            source: e,
                        })
                })
                .collect::<Result<Vec<CallKey>, _>>()?;

            if expected_keys.is_empty() && self.config.empty_ground_truth_matches {
                count.matched += 1;
                continue;
            }

            let executed_keys: Vec<CallKey> = executed.iter().map(CallKey::from).collect();
            let (matched, missing) = is_subsequence_unordered(&expected_keys, &executed_keys);
            if matched {
                count.matched += 1;
                continue;
            }

            // Nothing executed: every expected call is missing.
            let calls: Vec<String> = if missing.is_empty() {
                expected.clone()
            } else {
                missing
                    .iter()
                    .filter_map(|key| {
                        expected_keys
                            .iter()
                            .position(|k| k == key)
                            .map(|idx| expected[idx].clone())
                    })
                    .collect()
            };
            diag!(
                debug,
                turn,
                expected = expected.len(),
                executed = executed.len(),
                missing = ?calls,
                "turn calls did not match"
            );
            missing_calls.push(MissingCalls { turn, calls });
        }

        Ok(count)
    }

    /// Counts agent turns with non-blank reasoning and a tool call or marker.
    fn check_format(&self, trajectory: &[Message], debug: bool) -> MatchCount {
        let mut count = MatchCount::default();

        for (i, message) in trajectory.iter().enumerate() {
            if !message.is_assistant() {
                continue;
            }
            count.total += 1;

            let parsed = self.parser.parse(&message.content);
            let has_reasoning = parsed.reasoning().is_some_and(|r| !r.trim().is_empty());
            let has_action = parsed.tool().is_some()
                || self
                    .config
                    .terminal_markers
                    .iter()
                    .any(|marker| message.content.contains(marker.as_str()));

            if has_reasoning && has_action {
                count.matched += 1;
            } else {
                diag!(debug, turn = i, has_reasoning, has_action, "malformed agent turn");
            }
        }

        count
    }
}

impl<O: StateObject> RewardFunc<O> for UnifiedScorer {
    fn name(&self) -> &str {
        "unified"
    }

    fn score(
        &self,
        trajectory: &[Message],
        state: &StateBundle<O>,
        debug: bool,
    ) -> Result<f64, ScoringError> {
        Ok(self.evaluate(trajectory, state, debug)?.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::EnvironmentSnapshot;
    use crate::trajectory::{ArgValue, ModelCall};
    use serde_json::json;

    fn fs(cwd: &str) -> EnvironmentSnapshot {
        EnvironmentSnapshot::new("GorillaFileSystem").with_attribute("cwd", json!(cwd))
    }

    fn bundle(
        model_cwd: &str,
        executed: Vec<Vec<ModelCall>>,
        answer: serde_json::Value,
    ) -> StateBundle {
        StateBundle {
            environment: BTreeMap::from([("fs".to_string(), fs(model_cwd))]),
            ground_truth_environment: BTreeMap::from([("fs".to_string(), fs("/docs"))]),
            successful_func_calls: executed,
            dataset_row: crate::trajectory::DatasetRow {
                answer: answer.to_string(),
            },
        }
    }

    fn good_turn() -> Message {
        Message::assistant("<reasoning>Move into docs.</reasoning><tool>cd(folder='docs')</tool>")
    }

    fn cd(folder: &str) -> ModelCall {
        ModelCall::new("cd", json!({"folder": folder}))
    }

    #[test]
    fn test_perfect_trajectory() {
        let state = bundle("/docs", vec![vec![cd("docs")]], json!([["cd(folder='docs')"]]));
        let breakdown = UnifiedScorer::default()
            .evaluate(&[good_turn()], &state, false)
            .expect("scorable");

        assert!(breakdown.gate_passed);
        assert_eq!(breakdown.state, MatchCount { matched: 1, total: 1 });
        assert_eq!(breakdown.func, MatchCount { matched: 1, total: 1 });
        assert_eq!(breakdown.format, MatchCount { matched: 1, total: 1 });
        assert!((breakdown.total() - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_state_mismatch_fails_gate() {
        let state = bundle("/", vec![vec![cd("docs")]], json!([["cd(folder='docs')"]]));
        let breakdown = UnifiedScorer::default()
            .evaluate(&[good_turn()], &state, false)
            .expect("scorable");

        assert!(!breakdown.gate_passed);
        assert!(breakdown.state_score.abs() < 1e-9);
        assert!((breakdown.func_score - 0.5).abs() < 1e-9);
        assert!(breakdown.format_score.abs() < 1e-9);
        assert!(breakdown.total().abs() < 1e-9);
        assert!(breakdown.state_differences.contains_key("fs"));
    }

    #[test]
    fn test_missing_call_is_reported() {
        let state = bundle(
            "/docs",
            vec![vec![cd("docs")]],
            json!([["cd(folder='docs')", "ls(a=True)"]]),
        );
        let breakdown = UnifiedScorer::default()
            .evaluate(&[good_turn()], &state, false)
            .expect("scorable");

        assert!(!breakdown.gate_passed);
        assert_eq!(
            breakdown.missing_calls,
            vec![MissingCalls {
                turn: 0,
                calls: vec!["ls(a=True)".to_string()],
            }]
        );
    }

    #[test]
    fn test_extra_model_calls_are_allowed() {
        let state = bundle(
            "/docs",
            vec![vec![ModelCall::new("pwd", json!({})), cd("docs")]],
            json!([["cd(folder='docs')"]]),
        );
        let breakdown = UnifiedScorer::default()
            .evaluate(&[good_turn()], &state, false)
            .expect("scorable");
        assert!(breakdown.gate_passed);
    }

    #[test]
    fn test_set_arguments_match_ground_truth_sets() {
        let answer = json!([["tag(names={'a', 'b'})"]]);
        let tagged = ModelCall::new("tag", json!({})).with_arg("names", ArgValue::set(["b", "a"]));
        let state = bundle("/docs", vec![vec![tagged]], answer.clone());
        let breakdown = UnifiedScorer::default()
            .evaluate(&[], &state, false)
            .expect("scorable");
        assert_eq!(breakdown.func, MatchCount { matched: 1, total: 1 });
        assert!(breakdown.gate_passed);

        let listed = ModelCall::new("tag", json!({"names": ["a", "b"]}));
        let state = bundle("/docs", vec![vec![listed]], answer);
        let breakdown = UnifiedScorer::default()
            .evaluate(&[], &state, false)
            .expect("scorable");
        assert_eq!(breakdown.func, MatchCount { matched: 0, total: 1 });
        assert!(!breakdown.gate_passed);
    }

    #[test]
    fn test_debug_does_not_change_scores() {
        let answer = json!([["cd(folder='docs')"]]);
        for model_cwd in ["/docs", "/"] {
            let state = bundle(model_cwd, vec![vec![cd("docs")]], answer.clone());
            let scorer = UnifiedScorer::default();
            let quiet = scorer
                .evaluate(&[good_turn()], &state, false)
                .expect("scorable");
            let verbose = scorer
                .evaluate(&[good_turn()], &state, true)
                .expect("scorable");
            assert_eq!(quiet, verbose, "cwd {}", model_cwd);
            assert_eq!(quiet.total(), verbose.total());
            assert_eq!(
                RewardFunc::score(&scorer, &[good_turn()], &state, true).expect("scorable"),
                quiet.total()
            );
        }
    }

    #[test]
    fn test_empty_ground_truth_turn() {
        let state = bundle("/docs", vec![vec![]], json!([[]]));
        let strict = UnifiedScorer::default()
            .evaluate(&[good_turn()], &state, false)
            .expect("scorable");
        assert!(!strict.gate_passed);
        assert_eq!(strict.func, MatchCount { matched: 0, total: 1 });

        let lenient = UnifiedScorer::new(UnifiedConfig {
            empty_ground_truth_matches: true,
            ..UnifiedConfig::default()
        })
        .evaluate(&[good_turn()], &state, false)
        .expect("scorable");
        assert!(lenient.gate_passed);
    }

    #[test]
    fn test_terminal_marker_counts_as_action() {
        let state = bundle("/docs", vec![vec![cd("docs")]], json!([["cd(folder='docs')"]]));
        let trajectory = vec![
            good_turn(),
            Message::assistant("<reasoning>All done.</reasoning>\n<TASK_FINISHED>"),
            Message::assistant("<reasoning>   </reasoning><tool>ls()</tool>"),
            Message::assistant("no tags at all"),
        ];
        let breakdown = UnifiedScorer::default()
            .evaluate(&trajectory, &state, false)
            .expect("scorable");

        assert_eq!(breakdown.format, MatchCount { matched: 2, total: 4 });
        assert!((breakdown.format_score - 0.1).abs() < 1e-9);
        assert!((breakdown.total() - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_no_agent_turns_gives_no_format_score() {
        let state = bundle("/docs", vec![vec![cd("docs")]], json!([["cd(folder='docs')"]]));
        let breakdown = UnifiedScorer::default()
            .evaluate(&[], &state, false)
            .expect("scorable");
        assert!(breakdown.gate_passed);
        assert!((breakdown.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_turn_misalignment_is_fatal() {
        let state = bundle("/docs", vec![vec![cd("docs")]], json!([["cd(folder='docs')"], []]));
        let err = UnifiedScorer::default()
            .evaluate(&[good_turn()], &state, false)
            .expect_err("misaligned");
        assert!(matches!(
            err,
            ScoringError::TurnAlignment {
                model: 1,
                ground_truth: 2
            }
        ));
    }

    #[test]
    fn test_undecodable_ground_truth_is_fatal() {
        let state = bundle("/docs", vec![vec![cd("docs")]], json!([["cd(folder=docs)"]]));
        let err = UnifiedScorer::default()
            .evaluate(&[good_turn()], &state, false)
            .expect_err("non-literal argument");
        assert!(matches!(err, ScoringError::GroundTruthCall { .. }));

        let mut state = bundle("/docs", vec![vec![cd("docs")]], json!([]));
        state.dataset_row.answer = "not json".to_string();
        let err = UnifiedScorer::default()
            .evaluate(&[good_turn()], &state, false)
            .expect_err("malformed answer");
        assert!(matches!(err, ScoringError::MalformedAnswer(_)));
    }

    #[test]
    fn test_missing_environment_object_is_fatal() {
        let mut state = bundle("/docs", vec![vec![cd("docs")]], json!([["cd(folder='docs')"]]));
        state.environment.clear();
        let err = UnifiedScorer::default()
            .evaluate(&[good_turn()], &state, false)
            .expect_err("object missing");
        assert!(matches!(err, ScoringError::MissingEnvironmentObject(ref key) if key == "fs"));
    }

    #[test]
    fn test_breakdown_serializes() {
        let state = bundle("/", vec![vec![]], json!([["cd(folder='docs')"]]));
        let breakdown = UnifiedScorer::default()
            .evaluate(&[good_turn()], &state, false)
            .expect("scorable");
        let value = serde_json::to_value(&breakdown).expect("serialize");
        assert_eq!(value["gate_passed"], json!(false));
        assert_eq!(value["missing_calls"][0]["calls"][0], json!("cd(folder='docs')"));

        let back: UnifiedBreakdown = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, breakdown);
    }
}
