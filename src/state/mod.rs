//! Structural comparison of environment objects.
//!
//! Environment objects expose their comparable fields through
//! [`StateObject`]. The ground-truth object's public attribute set is
//! authoritative: attributes only the model object has are ignored, and
//! attributes whose name starts with `_` are private and never compared.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calls::CanonicalKey;
use crate::error::ScoringError;

/// Prefix marking attributes excluded from comparison.
pub const PRIVATE_PREFIX: char = '_';

/// An environment object whose final state can be diffed.
pub trait StateObject {
    /// Kind of object (e.g. `"GorillaFileSystem"`). Only objects of the same
    /// kind may be compared.
    fn kind(&self) -> &str;

    /// All attributes of the object, including private ones.
    fn attributes(&self) -> BTreeMap<String, serde_json::Value>;

    /// Attributes that take part in comparison.
    fn public_attributes(&self) -> BTreeMap<String, serde_json::Value> {
        self.attributes()
            .into_iter()
            .filter(|(name, _)| !name.starts_with(PRIVATE_PREFIX))
            .collect()
    }
}

/// Serde-backed environment object, the form used in JSON scoring records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    /// Object kind.
    pub kind: String,

    /// Attribute values by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl EnvironmentSnapshot {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds or replaces an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Captures a typed environment object through its `Serialize` impl.
    pub fn capture<T: Serialize>(kind: impl Into<String>, object: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: kind.into(),
            attributes: attributes_of(object)?,
        })
    }
}

impl StateObject for EnvironmentSnapshot {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn attributes(&self) -> BTreeMap<String, serde_json::Value> {
        self.attributes.clone()
    }
}

/// Field map of a serializable struct, for typed [`StateObject`] impls.
///
/// Values that do not serialize to a JSON object yield an empty map.
pub fn attributes_of<T: Serialize>(
    object: &T,
) -> Result<BTreeMap<String, serde_json::Value>, serde_json::Error> {
    Ok(match serde_json::to_value(object)? {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        _ => BTreeMap::new(),
    })
}

/// Differing values of one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDifference {
    pub model: serde_json::Value,
    pub ground_truth: serde_json::Value,
}

/// Outcome of comparing a model object against its ground truth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDiff {
    /// True when every public ground-truth attribute matched.
    pub valid: bool,

    /// Mismatching attributes by name.
    pub differences: BTreeMap<String, AttributeDifference>,
}

/// Compares `model` against `ground_truth` attribute by attribute.
///
/// Values compare by canonical equality: sequences by order, maps ignoring
/// key order, integral floats equal to ints.
///
/// # Errors
///
/// - [`ScoringError::KindMismatch`] when the objects are of different kinds
/// - [`ScoringError::MissingAttribute`] when the model object lacks a public
///   ground-truth attribute
pub fn compare_instances<O: StateObject + ?Sized>(
    model: &O,
    ground_truth: &O,
) -> Result<StateDiff, ScoringError> {
    if model.kind() != ground_truth.kind() {
        return Err(ScoringError::KindMismatch {
            model: model.kind().to_string(),
            ground_truth: ground_truth.kind().to_string(),
        });
    }

    let model_attributes = model.attributes();
    let mut differences = BTreeMap::new();

    for (name, expected) in ground_truth.public_attributes() {
        let actual = model_attributes
            .get(&name)
            .ok_or_else(|| ScoringError::MissingAttribute {
                kind: model.kind().to_string(),
                attribute: name.clone(),
            })?;

        if CanonicalKey::from_json(actual) != CanonicalKey::from_json(&expected) {
            debug!(kind = model.kind(), attribute = %name, "attribute differs");
            differences.insert(
                name,
                AttributeDifference {
                    model: actual.clone(),
                    ground_truth: expected,
                },
            );
        }
    }

    Ok(StateDiff {
        valid: differences.is_empty(),
        differences,
    })
}
