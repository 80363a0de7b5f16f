//! Tag-based extraction of structured fields from turn content.
//!
//! Agent turns embed their reasoning and tool call in tags:
//!
//! ```text
//! <reasoning>List the folder first.</reasoning>
//! <tool>ls(a=True)</tool>
//! ```
//!
//! and the environment answers in a system turn:
//!
//! ```text
//! <tool_result>["{\"current_directory_content\": [\"docs\"]}"]</tool_result>
//! ```
//!
//! The rubrics only depend on the [`MessageParser`] trait; [`XmlParser`] is
//! the default implementation.

use std::collections::BTreeMap;

use regex::Regex;

/// Field name of the agent's free-text reasoning.
pub const REASONING_FIELD: &str = "reasoning";

/// Field name of the agent's tool call expression.
pub const TOOL_FIELD: &str = "tool";

/// Field name of the environment's JSON-encoded tool results.
pub const TOOL_RESULT_FIELD: &str = "tool_result";

/// Extracts structured fields from raw turn content.
pub trait MessageParser: Send + Sync {
    /// Parses one turn. Fields that are absent are simply missing from the result.
    fn parse(&self, content: &str) -> ParsedMessage;
}

/// Structured view of a single turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    fields: BTreeMap<String, String>,
}

impl ParsedMessage {
    /// Adds or replaces a field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns a field by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn reasoning(&self) -> Option<&str> {
        self.get(REASONING_FIELD)
    }

    pub fn tool(&self) -> Option<&str> {
        self.get(TOOL_FIELD)
    }

    pub fn tool_result(&self) -> Option<&str> {
        self.get(TOOL_RESULT_FIELD)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Regex-driven tag parser.
///
/// For each configured field the first `<field>...</field>` span wins; its
/// content is trimmed. Nested or doubled tags are not balanced, so
/// `<tool_result><tool_result>[..]</tool_result>` yields a value starting
/// with the inner opening tag.
#[derive(Debug, Clone)]
pub struct XmlParser {
    fields: Vec<(String, Regex)>,
}

impl XmlParser {
    /// Creates a parser recognising the given field names.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|name| {
                let name = name.into();
                let escaped = regex::escape(&name);
                let pattern = format!(r"(?s)<{escaped}>\s*(.*?)\s*</{escaped}>");
                let re = Regex::new(&pattern).expect("escaped tag pattern is always valid");
                (name, re)
            })
            .collect();
        Self { fields }
    }

    /// Parser for agent turns: `reasoning` and `tool`.
    pub fn assistant() -> Self {
        Self::new([REASONING_FIELD, TOOL_FIELD])
    }

    /// Parser for environment turns: `tool_result`.
    pub fn environment() -> Self {
        Self::new([TOOL_RESULT_FIELD])
    }

    /// Names of the recognised fields, in configuration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

impl MessageParser for XmlParser {
    fn parse(&self, content: &str) -> ParsedMessage {
        let mut parsed = ParsedMessage::default();
        for (name, re) in &self.fields {
            if let Some(value) = re.captures(content).and_then(|caps| caps.get(1)) {
                parsed = parsed.with_field(name.clone(), value.as_str());
            }
        }
        parsed
    }
}
