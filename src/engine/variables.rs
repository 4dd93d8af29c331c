//! Per-run variable storage.
//!
//! Each run owns one [`VariableStore`]. Steps write at most one variable
//! (their configured output), later steps read any number of them through
//! interpolation. Writes always come from the run's single sequential
//! execution thread; reads may also come from concurrent status queries,
//! so the store guards its map with a read-write lock.
//!
//! Every value carries provenance: which step produced it, with which
//! action, from which parameters. The store also collects the run's
//! reference trace - an append-only list of every expression the resolver
//! touched, for debugging data dependencies between steps.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use crate::engine::interpolation::{stringify, ExpressionOutcome};

/// Maximum characters of a value rendered into a summary preview.
const PREVIEW_LIMIT: usize = 60;

/// Semantic type of a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Null,
}

impl VarType {
    /// Detect the semantic type of a value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => Self::String,
            Value::Number(_) => Self::Number,
            Value::Bool(_) => Self::Boolean,
            Value::Object(_) => Self::Object,
            Value::Array(_) => Self::Array,
            Value::Null => Self::Null,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }
}

/// Provenance of a stored variable.
#[derive(Debug, Clone, Serialize)]
pub struct VariableMetadata {
    /// Detected semantic type.
    pub var_type: VarType,
    /// Index of the step that produced the value.
    pub source_step: usize,
    /// Canonical action name of that step.
    pub source_action: String,
    /// Resolved parameters the producing step ran with.
    pub source_params: Value,
    /// When the value was stored.
    pub created_at: DateTime<Utc>,
}

/// Summary row for variable listings.
#[derive(Debug, Clone, Serialize)]
pub struct VariableSummary {
    pub name: String,
    pub var_type: VarType,
    pub source_step: usize,
    /// Truncated rendering of the value.
    pub preview: String,
}

/// One recorded expression resolution.
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceTrace {
    /// Step whose parameters contained the expression.
    pub step_index: usize,
    /// Dotted location of the parameter within the bag.
    pub parameter: String,
    /// Base variable name.
    pub variable: String,
    /// Full access path, e.g. `product.name`.
    pub path: String,
    /// Original expression text.
    pub expression: String,
    /// Substituted text, when resolution succeeded.
    pub resolved: Option<String>,
    /// `resolved` or the failure kind, for display.
    pub status: String,
}

impl ReferenceTrace {
    /// Build a trace entry from a resolver outcome.
    pub fn from_outcome(step_index: usize, outcome: &ExpressionOutcome) -> Self {
        Self {
            step_index,
            parameter: outcome.parameter.clone(),
            variable: outcome.variable.clone(),
            path: outcome.path.clone(),
            expression: outcome.expression.clone(),
            resolved: outcome.resolved.clone(),
            status: match outcome.error {
                None => "resolved".to_string(),
                Some(kind) => kind.as_str().to_string(),
            },
        }
    }
}

#[derive(Debug)]
struct StoredVariable {
    value: Value,
    metadata: VariableMetadata,
}

#[derive(Debug, Default)]
struct StoreInner {
    values: HashMap<String, StoredVariable>,
    trace: Vec<ReferenceTrace>,
}

/// Typed key/value registry owned by one run.
#[derive(Debug, Default)]
pub struct VariableStore {
    inner: RwLock<StoreInner>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value. Overwrites any previous value under the same name.
    pub fn set(
        &self,
        name: &str,
        value: Value,
        source_step: usize,
        source_action: &str,
        source_params: Value,
    ) {
        let metadata = VariableMetadata {
            var_type: VarType::of(&value),
            source_step,
            source_action: source_action.to_string(),
            source_params,
            created_at: Utc::now(),
        };
        self.inner
            .write()
            .values
            .insert(name.to_string(), StoredVariable { value, metadata });
    }

    /// Fetch a value by name. Absence is `None`, never an error.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.read().values.get(name).map(|v| v.value.clone())
    }

    /// Fetch provenance for a variable.
    pub fn metadata(&self, name: &str) -> Option<VariableMetadata> {
        self.inner
            .read()
            .values
            .get(name)
            .map(|v| v.metadata.clone())
    }

    /// Check whether a name is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().values.contains_key(name)
    }

    /// Number of stored variables.
    pub fn len(&self) -> usize {
        self.inner.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summaries of all variables, ordered by producing step index then name.
    pub fn summaries(&self) -> Vec<VariableSummary> {
        let inner = self.inner.read();
        let mut rows: Vec<VariableSummary> = inner
            .values
            .iter()
            .map(|(name, stored)| VariableSummary {
                name: name.clone(),
                var_type: stored.metadata.var_type,
                source_step: stored.metadata.source_step,
                preview: preview(&stored.value),
            })
            .collect();
        rows.sort_by(|a, b| {
            a.source_step
                .cmp(&b.source_step)
                .then_with(|| a.name.cmp(&b.name))
        });
        rows
    }

    /// Export all variables as one JSON object, for diagnostics.
    pub fn snapshot(&self) -> Value {
        let inner = self.inner.read();
        let map: serde_json::Map<String, Value> = inner
            .values
            .iter()
            .map(|(name, stored)| (name.clone(), stored.value.clone()))
            .collect();
        Value::Object(map)
    }

    /// Append a reference trace entry.
    pub fn record_trace(&self, entry: ReferenceTrace) {
        self.inner.write().trace.push(entry);
    }

    /// The reference trace collected so far.
    pub fn trace(&self) -> Vec<ReferenceTrace> {
        self.inner.read().trace.clone()
    }
}

fn preview(value: &Value) -> String {
    let rendered = stringify(value);
    if rendered.chars().count() <= PREVIEW_LIMIT {
        return rendered;
    }
    let mut truncated: String = rendered.chars().take(PREVIEW_LIMIT).collect();
    truncated.push('…');
    truncated
}
