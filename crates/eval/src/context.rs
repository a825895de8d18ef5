//! Case context and input records.
//!
//! A `CaseContext` holds the fixed facts of one task instance. It is
//! loaded once per record and read-only afterwards; correctness rules
//! query it by key, and an absent key makes the rule indeterminate rather
//! than false (see `rules`).

use std::collections::BTreeMap;
use std::fmt;

use maze_core::Value;

/// Errors while parsing a case + response record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// A required field is missing or ill-typed.
    Invalid { message: String },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::Invalid { message } => write!(f, "invalid record: {}", message),
        }
    }
}

impl std::error::Error for RecordError {}

fn invalid(message: impl Into<String>) -> RecordError {
    RecordError::Invalid {
        message: message.into(),
    }
}

/// Immutable fact map for one evaluation instance.
#[derive(Debug, Clone, Default)]
pub struct CaseContext(BTreeMap<String, Value>);

impl CaseContext {
    pub fn new() -> Self {
        CaseContext(BTreeMap::new())
    }

    /// Load facts from a JSON object of key -> scalar value.
    pub fn load(facts: &serde_json::Value) -> Result<CaseContext, RecordError> {
        let obj = facts
            .as_object()
            .ok_or_else(|| invalid("'facts' must be an object"))?;
        let mut map = BTreeMap::new();
        for (k, v) in obj {
            let value = Value::from_json(v)
                .map_err(|e| invalid(format!("fact '{}': {}", k, e)))?;
            map.insert(k.clone(), value);
        }
        Ok(CaseContext(map))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: String, value: Value) {
        self.0.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One case + response input record, as produced by the surrounding
/// collection tooling.
#[derive(Debug, Clone)]
pub struct CaseRecord {
    pub case_id: String,
    pub sop_id: String,
    pub facts: CaseContext,
    /// The model's raw response text.
    pub model_response: String,
}

impl CaseRecord {
    /// Parse a record from JSON.
    pub fn from_json(v: &serde_json::Value) -> Result<CaseRecord, RecordError> {
        let case_id = get_str(v, "case_id")?;
        let sop_id = get_str(v, "sop_id")?;
        let facts = CaseContext::load(
            v.get("facts")
                .ok_or_else(|| invalid("record missing 'facts'"))?,
        )?;
        let model_response = get_str(v, "model_response")?;
        Ok(CaseRecord {
            case_id,
            sop_id,
            facts,
            model_response,
        })
    }
}

fn get_str(obj: &serde_json::Value, field: &str) -> Result<String, RecordError> {
    obj.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| invalid(format!("missing string field '{}'", field)))
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
