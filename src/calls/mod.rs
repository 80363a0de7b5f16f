//! Ground-truth function calls and their comparison keys.
//!
//! Reference answers store calls as source text (`cd(folder="docs")`). This
//! module decodes them into [`FunctionCall`]s and reduces both decoded and
//! agent-executed calls to [`CallKey`]s, which compare by name and
//! canonicalised arguments.

pub mod canonical;
pub mod decoder;
pub mod literal;

use std::collections::BTreeMap;

use serde::Serialize;

pub use canonical::{CallKey, CanonicalKey};
pub use decoder::parse_function_call;
pub use literal::Literal;

use crate::error::DecodeError;

/// A decoded ground-truth call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCall {
    /// Callee name.
    pub name: String,

    /// Arguments by keyword; positional arguments appear as `arg1`, `arg2`, ...
    pub args: BTreeMap<String, Literal>,
}

impl FunctionCall {
    /// Decodes a call expression. See [`parse_function_call`].
    pub fn parse(source: &str) -> Result<Self, DecodeError> {
        parse_function_call(source)
    }

    /// Returns the comparison key of this call.
    pub fn key(&self) -> CallKey {
        CallKey::from(self)
    }
}
