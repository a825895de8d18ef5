//! Fact and literal values.
//!
//! Case facts and condition literals share one value model. Numbers use
//! `rust_decimal::Decimal` -- never `f64` -- so threshold comparisons in
//! correctness rules are exact. Text equality is normalized (lowercased,
//! whitespace collapsed) because the compared text ultimately comes from
//! free-form model output and hand-entered case data.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::MalformedSop;

/// A fact or literal value referenced by a correctness rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Number(Decimal),
    Text(String),
}

impl Value {
    /// Human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Bool",
            Value::Number(_) => "Number",
            Value::Text(_) => "Text",
        }
    }

    /// Parse a value from plain JSON (case facts, condition literals).
    ///
    /// JSON numbers go through their decimal string representation so
    /// `0.1` stays `0.1`.
    pub fn from_json(v: &serde_json::Value) -> Result<Value, MalformedSop> {
        match v {
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                let d = Decimal::from_str(&n.to_string()).map_err(|e| {
                    MalformedSop::invalid(format!("unrepresentable number {}: {}", n, e))
                })?;
                Ok(Value::Number(d))
            }
            serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
            other => Err(MalformedSop::invalid(format!(
                "expected bool, number, or string, got {}",
                other
            ))),
        }
    }

    /// Serialize back to plain JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(d) => serde_json::Value::String(d.to_string()),
            Value::Text(t) => serde_json::Value::String(t.clone()),
        }
    }

    /// Equality with text normalization.
    ///
    /// Values of different types are never equal. Text is compared after
    /// [`normalize`].
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => normalize(a) == normalize(b),
            _ => false,
        }
    }

    /// Numeric ordering. `None` when either side is not a `Number`.
    pub fn partial_cmp_numeric(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Normalize a text value for comparison: lowercase and collapse runs of
/// whitespace to a single space.
pub fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
