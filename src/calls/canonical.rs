//! Hashable, totally ordered normal forms of argument values.
//!
//! Ground-truth arguments (decoded literals) and model arguments (JSON) are
//! both reduced to [`CanonicalKey`]s so that calls can be compared as plain
//! values:
//!
//! - lists and tuples become an order-preserving `Seq`
//! - dicts become an order-insensitive `Map`
//! - sets become an order-insensitive `Set`; on the model side these are
//!   [`ArgValue::Set`] arguments
//! - floats with an integral value become `Int`, so `100` equals `100.0`
//!
//! Booleans stay distinct from integers.

use std::collections::{BTreeMap, BTreeSet};

use ordered_float::OrderedFloat;

use super::literal::Literal;
use super::FunctionCall;
use crate::trajectory::{ArgValue, ModelCall};

/// Canonical form of a single argument value.
///
/// `Bool` and `Int` never compare equal: `True` does not match `1` and
/// `False` does not match `0`, unlike Python where bools are ints.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CanonicalKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
    Seq(Vec<CanonicalKey>),
    Set(BTreeSet<CanonicalKey>),
    Map(BTreeMap<CanonicalKey, CanonicalKey>),
}

impl CanonicalKey {
    fn number(value: f64) -> Self {
        // i64::MAX is not representable as f64; the bound below is 2^63.
        if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
            CanonicalKey::Int(value as i64)
        } else {
            CanonicalKey::Float(OrderedFloat(value))
        }
    }

    /// Canonicalises a decoded ground-truth literal.
    pub fn from_literal(literal: &Literal) -> Self {
        match literal {
            Literal::None => CanonicalKey::Null,
            Literal::Bool(b) => CanonicalKey::Bool(*b),
            Literal::Int(i) => CanonicalKey::Int(*i),
            Literal::Float(f) => Self::number(*f),
            Literal::Str(s) => CanonicalKey::Str(s.clone()),
            Literal::List(items) | Literal::Tuple(items) => {
                CanonicalKey::Seq(items.iter().map(Self::from_literal).collect())
            }
            Literal::Set(items) => CanonicalKey::Set(items.iter().map(Self::from_literal).collect()),
            Literal::Dict(pairs) => CanonicalKey::Map(
                pairs
                    .iter()
                    .map(|(k, v)| (Self::from_literal(k), Self::from_literal(v)))
                    .collect(),
            ),
        }
    }

    fn from_number(n: &serde_json::Number) -> Self {
        if let Some(i) = n.as_i64() {
            CanonicalKey::Int(i)
        } else if let Some(u) = n.as_u64() {
            Self::number(u as f64)
        } else {
            Self::number(n.as_f64().unwrap_or(f64::NAN))
        }
    }

    /// Canonicalises an executed call's argument.
    pub fn from_arg(value: &ArgValue) -> Self {
        match value {
            ArgValue::Null => CanonicalKey::Null,
            ArgValue::Bool(b) => CanonicalKey::Bool(*b),
            ArgValue::Number(n) => Self::from_number(n),
            ArgValue::String(s) => CanonicalKey::Str(s.clone()),
            ArgValue::List(items) => CanonicalKey::Seq(items.iter().map(Self::from_arg).collect()),
            ArgValue::Set(items) => CanonicalKey::Set(items.iter().map(Self::from_arg).collect()),
            ArgValue::Map(map) => CanonicalKey::Map(
                map.iter()
                    .map(|(k, v)| (CanonicalKey::Str(k.clone()), Self::from_arg(v)))
                    .collect(),
            ),
        }
    }

    /// Canonicalises a JSON value, such as an environment attribute.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => CanonicalKey::Null,
            Value::Bool(b) => CanonicalKey::Bool(*b),
            Value::Number(n) => Self::from_number(n),
            Value::String(s) => CanonicalKey::Str(s.clone()),
            Value::Array(items) => CanonicalKey::Seq(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => CanonicalKey::Map(
                map.iter()
                    .map(|(k, v)| (CanonicalKey::Str(k.clone()), Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&Literal> for CanonicalKey {
    fn from(literal: &Literal) -> Self {
        Self::from_literal(literal)
    }
}

impl From<&ArgValue> for CanonicalKey {
    fn from(value: &ArgValue) -> Self {
        Self::from_arg(value)
    }
}

impl From<&serde_json::Value> for CanonicalKey {
    fn from(value: &serde_json::Value) -> Self {
        Self::from_json(value)
    }
}

/// Comparison key of a whole call: its name plus canonicalised arguments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallKey {
    pub name: String,
    pub args: BTreeMap<String, CanonicalKey>,
}

impl From<&FunctionCall> for CallKey {
    fn from(call: &FunctionCall) -> Self {
        Self {
            name: call.name.clone(),
            args: call
                .args
                .iter()
                .map(|(k, v)| (k.clone(), CanonicalKey::from_literal(v)))
                .collect(),
        }
    }
}

impl From<&ModelCall> for CallKey {
    fn from(call: &ModelCall) -> Self {
        Self {
            name: call.name.clone(),
            args: call
                .args
                .iter()
                .map(|(k, v)| (k.clone(), CanonicalKey::from_arg(v)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calls::parse_function_call;
    use serde_json::json;

    #[test]
    fn test_integral_floats_equal_ints() {
        assert_eq!(
            CanonicalKey::from_json(&json!(100.0)),
            CanonicalKey::from_literal(&Literal::Int(100))
        );
        assert_ne!(
            CanonicalKey::from_json(&json!(100.5)),
            CanonicalKey::from_literal(&Literal::Int(100))
        );
    }

    #[test]
    fn test_bool_is_not_int() {
        assert_ne!(
            CanonicalKey::from_json(&json!(true)),
            CanonicalKey::from_literal(&Literal::Int(1))
        );
        assert_ne!(
            CanonicalKey::from_literal(&Literal::Bool(false)),
            CanonicalKey::from_json(&json!(0))
        );
    }

    #[test]
    fn test_sequences_keep_order() {
        let tuple = Literal::Tuple(vec![Literal::Int(1), Literal::Int(2)]);
        assert_eq!(
            CanonicalKey::from_literal(&tuple),
            CanonicalKey::from_json(&json!([1, 2]))
        );
        assert_ne!(
            CanonicalKey::from_literal(&tuple),
            CanonicalKey::from_json(&json!([2, 1]))
        );
    }

    #[test]
    fn test_maps_and_sets_ignore_order() {
        let dict = Literal::Dict(vec![
            (Literal::Str("b".into()), Literal::Int(2)),
            (Literal::Str("a".into()), Literal::Int(1)),
        ]);
        assert_eq!(
            CanonicalKey::from_literal(&dict),
            CanonicalKey::from_json(&json!({"a": 1, "b": 2}))
        );

        let left = Literal::Set(vec![Literal::Str("x".into()), Literal::Str("y".into())]);
        let right = Literal::Set(vec![
            Literal::Str("y".into()),
            Literal::Str("x".into()),
            Literal::Str("x".into()),
        ]);
        assert_eq!(CanonicalKey::from_literal(&left), CanonicalKey::from_literal(&right));
    }

    #[test]
    fn test_model_sets_match_literal_sets() {
        let gt = parse_function_call("tag(names={'a', 'b'})").expect("call should decode");
        let model = ModelCall::new("tag", json!({"names": {"$set": ["b", "a", "a"]}}));
        assert_eq!(CallKey::from(&gt), CallKey::from(&model));

        let as_list = ModelCall::new("tag", json!({"names": ["a", "b"]}));
        assert_ne!(CallKey::from(&gt), CallKey::from(&as_list));
    }

    #[test]
    fn test_call_keys_match_across_sources() {
        let gt = parse_function_call(r#"transfer_money(amount=100, to="bob")"#)
            .expect("call should decode");
        let model = ModelCall::new("transfer_money", json!({"to": "bob", "amount": 100}));
        assert_eq!(CallKey::from(&gt), CallKey::from(&model));

        let other = ModelCall::new("transfer_money", json!({"to": "alice", "amount": 100}));
        assert_ne!(CallKey::from(&gt), CallKey::from(&other));
    }
}
