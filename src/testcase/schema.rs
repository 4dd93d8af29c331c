//! Test case schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A declarative browser test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    /// Display name.
    pub name: String,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Ordered steps. Later steps may reference variables produced by
    /// earlier ones.
    pub steps: Vec<StepSpec>,
}

/// One declarative unit of work within a test case.
///
/// Immutable once a run starts; the executor only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Surface type tag, folded onto a canonical capability at execution
    /// time (`aiTap`, `click`, `goto`, ...).
    #[serde(rename = "type")]
    pub type_tag: String,

    /// Free-form parameter bag. String leaves may contain `${...}`
    /// expressions.
    #[serde(default)]
    pub params: Value,

    /// Human description, forwarded to the backend for context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Name under which the handler's result is stored for later steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_variable: Option<String>,

    /// Skip this step without executing it.
    #[serde(default)]
    pub skip: bool,

    /// Per-step handler timeout override, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl StepSpec {
    /// The parameter bag, with "absent" normalized to an empty map.
    pub fn effective_params(&self) -> Value {
        match &self.params {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other.clone(),
        }
    }

    /// Whether the bag carries any parameters.
    pub fn has_params(&self) -> bool {
        match &self.params {
            Value::Null => false,
            Value::Object(map) => !map.is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        }
    }
}
