//! Trajectory data types consumed by the reward rubrics.
//!
//! A trajectory is the ordered conversation between the agent and the
//! simulated environment. The state bundle carries everything the rubric
//! needs besides the conversation: the final environment objects, their
//! ground-truth counterparts, the calls the agent executed successfully and
//! the dataset row holding the reference answer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::state::EnvironmentSnapshot;

/// Speaker of a single turn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// The agent being scored.
    Assistant,

    /// The environment; tool results are reported in system turns.
    System,

    /// The human or task prompt.
    User,

    /// A dedicated tool turn (not produced by the environments scored here).
    Tool,

    /// Any other role name, kept verbatim.
    Other(String),
}

impl Role {
    /// Returns the wire name of this role.
    pub fn as_str(&self) -> &str {
        match self {
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::User => "user",
            Role::Tool => "tool",
            Role::Other(name) => name,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "assistant" => Role::Assistant,
            "system" => Role::System,
            "user" => Role::User,
            "tool" => Role::Tool,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this turn.
    pub role: Role,

    /// Raw text, possibly embedding tagged fields.
    pub content: String,
}

impl Message {
    /// Creates a message with an arbitrary role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

/// Object key that marks a set in JSON call arguments: `{"$set": [..]}`.
pub const SET_MARKER: &str = "$set";

/// Argument value of an executed call.
///
/// Mirrors JSON, plus sets. In JSON a set is written as an object whose only
/// key is [`SET_MARKER`] and whose value is an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum ArgValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<ArgValue>),
    Set(Vec<ArgValue>),
    Map(BTreeMap<String, ArgValue>),
}

impl ArgValue {
    /// Builds a set value.
    pub fn set<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ArgValue>,
    {
        ArgValue::Set(items.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for ArgValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => ArgValue::Null,
            Value::Bool(b) => ArgValue::Bool(b),
            Value::Number(n) => ArgValue::Number(n),
            Value::String(s) => ArgValue::String(s),
            Value::Array(items) => ArgValue::List(items.into_iter().map(ArgValue::from).collect()),
            Value::Object(mut map) => {
                if map.len() == 1 {
                    if let Some(Value::Array(items)) = map.remove(SET_MARKER) {
                        return ArgValue::set(items);
                    }
                }
                ArgValue::Map(map.into_iter().map(|(k, v)| (k, ArgValue::from(v))).collect())
            }
        }
    }
}

impl From<ArgValue> for serde_json::Value {
    fn from(value: ArgValue) -> Self {
        use serde_json::Value;

        match value {
            ArgValue::Null => Value::Null,
            ArgValue::Bool(b) => Value::Bool(b),
            ArgValue::Number(n) => Value::Number(n),
            ArgValue::String(s) => Value::String(s),
            ArgValue::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            ArgValue::Set(items) => {
                let mut map = serde_json::Map::new();
                map.insert(
                    SET_MARKER.to_string(),
                    Value::Array(items.into_iter().map(Value::from).collect()),
                );
                Value::Object(map)
            }
            ArgValue::Map(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::String(value.to_string())
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Number(value.into())
    }
}

/// A function call the agent executed successfully, as recorded by the
/// environment loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCall {
    /// Name of the invoked function.
    pub name: String,

    /// Keyword arguments, already structured.
    #[serde(default)]
    pub args: BTreeMap<String, ArgValue>,
}

impl ModelCall {
    /// Creates a call from a name and a JSON object of arguments.
    ///
    /// Non-object `args` values are treated as an empty argument map.
    pub fn new(name: impl Into<String>, args: serde_json::Value) -> Self {
        let args = match args {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| (k, ArgValue::from(v)))
                .collect(),
            _ => BTreeMap::new(),
        };
        Self {
            name: name.into(),
            args,
        }
    }

    /// Adds or replaces an argument.
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }
}

/// The original dataset row a trajectory was generated from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    /// JSON string: a list with one inner list of call expressions per turn.
    pub answer: String,
}

/// Per-trajectory state handed to the rubric alongside the conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateBundle<O = EnvironmentSnapshot> {
    /// Environment objects as left by the agent, keyed by resource name.
    #[serde(default)]
    pub environment: BTreeMap<String, O>,

    /// Ground-truth environment objects; their key set is authoritative.
    #[serde(default)]
    pub ground_truth_environment: BTreeMap<String, O>,

    /// Successfully executed calls, one inner list per turn that attempted calls.
    #[serde(default)]
    pub successful_func_calls: Vec<Vec<ModelCall>>,

    /// Dataset row holding the reference answer.
    pub dataset_row: DatasetRow,
}
