//! Correctness conditions.
//!
//! Each candidate action carries a `when` condition: a declarative
//! predicate over the case facts and the choices recorded at earlier
//! decision points. Conditions are parsed from the definition JSON into a
//! recursive tree; evaluation lives in `maze-eval` because it needs the
//! case context and the three-valued logic for missing facts.
//!
//! JSON forms:
//!
//! ```json
//! {"fact": "risk", "op": "=", "value": "high"}
//! {"all": [ .. ]}        {"any": [ .. ]}        {"not": .. }
//! {"chose": {"point": "triage", "action": "escalate"}}
//! {"always": true}
//! ```

use crate::error::MalformedSop;
use crate::value::Value;

/// Comparison operator in a fact condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn parse(s: &str) -> Result<CompareOp, MalformedSop> {
        match s {
            "=" => Ok(CompareOp::Eq),
            "!=" => Ok(CompareOp::Ne),
            "<" => Ok(CompareOp::Lt),
            "<=" => Ok(CompareOp::Le),
            ">" => Ok(CompareOp::Gt),
            ">=" => Ok(CompareOp::Ge),
            other => Err(MalformedSop::invalid(format!(
                "unknown comparison operator '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// A correctness rule node.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Compare a named case fact against a literal.
    Fact {
        key: String,
        op: CompareOp,
        value: Value,
    },
    /// True iff every child is true.
    All(Vec<Condition>),
    /// True iff at least one child is true.
    Any(Vec<Condition>),
    /// Logical negation.
    Not(Box<Condition>),
    /// True iff the given action was the recorded choice at the given
    /// earlier decision point (history-dependent rule).
    Chose { point: String, action: String },
    /// Constant.
    Always(bool),
}

impl Condition {
    /// Parse a condition from definition JSON.
    pub fn from_json(v: &serde_json::Value) -> Result<Condition, MalformedSop> {
        let obj = v
            .as_object()
            .ok_or_else(|| MalformedSop::invalid(format!("condition must be an object: {}", v)))?;

        if let Some(fact) = obj.get("fact") {
            let key = fact
                .as_str()
                .ok_or_else(|| MalformedSop::invalid("'fact' must be a string"))?
                .to_string();
            let op_str = obj
                .get("op")
                .and_then(|o| o.as_str())
                .ok_or_else(|| MalformedSop::invalid("fact condition missing 'op'"))?;
            let op = CompareOp::parse(op_str)?;
            let value_json = obj
                .get("value")
                .ok_or_else(|| MalformedSop::invalid("fact condition missing 'value'"))?;
            let value = Value::from_json(value_json)?;
            return Ok(Condition::Fact { key, op, value });
        }

        if let Some(children) = obj.get("all") {
            return Ok(Condition::All(parse_children(children, "all")?));
        }

        if let Some(children) = obj.get("any") {
            return Ok(Condition::Any(parse_children(children, "any")?));
        }

        if let Some(inner) = obj.get("not") {
            return Ok(Condition::Not(Box::new(Condition::from_json(inner)?)));
        }

        if let Some(chose) = obj.get("chose") {
            let point = chose
                .get("point")
                .and_then(|p| p.as_str())
                .ok_or_else(|| MalformedSop::invalid("'chose' missing 'point'"))?
                .to_string();
            let action = chose
                .get("action")
                .and_then(|a| a.as_str())
                .ok_or_else(|| MalformedSop::invalid("'chose' missing 'action'"))?
                .to_string();
            return Ok(Condition::Chose { point, action });
        }

        if let Some(b) = obj.get("always") {
            let b = b
                .as_bool()
                .ok_or_else(|| MalformedSop::invalid("'always' must be a boolean"))?;
            return Ok(Condition::Always(b));
        }

        Err(MalformedSop::invalid(format!(
            "unrecognized condition: {}",
            v
        )))
    }

    /// Fact keys read anywhere in this condition tree.
    pub fn fact_keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        self.collect_fact_keys(&mut keys);
        keys
    }

    fn collect_fact_keys<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Fact { key, .. } => {
                if !out.contains(&key.as_str()) {
                    out.push(key);
                }
            }
            Condition::All(children) | Condition::Any(children) => {
                for c in children {
                    c.collect_fact_keys(out);
                }
            }
            Condition::Not(inner) => inner.collect_fact_keys(out),
            Condition::Chose { .. } | Condition::Always(_) => {}
        }
    }

    /// Decision points referenced by `chose` nodes anywhere in the tree.
    pub fn chose_points(&self) -> Vec<&str> {
        let mut points = Vec::new();
        self.collect_chose_points(&mut points);
        points
    }

    fn collect_chose_points<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Chose { point, .. } => {
                if !out.contains(&point.as_str()) {
                    out.push(point);
                }
            }
            Condition::All(children) | Condition::Any(children) => {
                for c in children {
                    c.collect_chose_points(out);
                }
            }
            Condition::Not(inner) => inner.collect_chose_points(out),
            Condition::Fact { .. } | Condition::Always(_) => {}
        }
    }
}

fn parse_children(v: &serde_json::Value, kind: &str) -> Result<Vec<Condition>, MalformedSop> {
    let arr = v
        .as_array()
        .ok_or_else(|| MalformedSop::invalid(format!("'{}' must be an array", kind)))?;
    if arr.is_empty() {
        return Err(MalformedSop::invalid(format!(
            "'{}' must not be empty",
            kind
        )));
    }
    arr.iter().map(Condition::from_json).collect()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
