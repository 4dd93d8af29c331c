//! Variable interpolation for step parameters.
//!
//! Steps reference values produced by earlier steps using `${...}` syntax.
//!
//! # Syntax
//!
//! - `${name}` - replaced with the variable's value
//! - `${name.prop}` - object property access
//! - `${name[2].prop}` - sequence index access, negative indexes count
//!   from the end (`${items[-1]}` is the last element)
//!
//! A string may contain any number of independent expressions; each is
//! resolved on its own and substituted in place. Resolution is total: a
//! failed expression leaves its original text in the output and records a
//! diagnostic instead of raising, so one bad reference never invalidates an
//! otherwise well-formed parameter bag.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use crate::engine::variables::VariableStore;

/// Maximum accessor chain length after the base identifier.
///
/// Bounds pathological input like `${a[0][0][0][0][0][0]...}`.
pub const MAX_ACCESSOR_DEPTH: usize = 5;

/// A segment of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal text, passed through untouched.
    Literal(String),
    /// A parsed `${...}` expression.
    Expression(Expression),
}

/// A parsed variable expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// The original text, including the `${` and `}` delimiters.
    pub raw: String,
    /// Base variable name.
    pub base: String,
    /// Accessor chain applied to the base value, in order.
    pub accessors: Vec<Accessor>,
}

impl Expression {
    /// The dotted/bracketed path without delimiters, e.g. `user.name` or
    /// `items[-1].price`.
    pub fn path(&self) -> String {
        let mut out = self.base.clone();
        for accessor in &self.accessors {
            match accessor {
                Accessor::Property(p) => {
                    out.push('.');
                    out.push_str(p);
                }
                Accessor::Index(i) => {
                    out.push('[');
                    out.push_str(&i.to_string());
                    out.push(']');
                }
            }
        }
        out
    }
}

/// One element of an accessor chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Accessor {
    /// `.name` - object property access.
    Property(String),
    /// `[idx]` - sequence index access, possibly negative.
    Index(i64),
}

/// Why an expression failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionErrorKind {
    /// The base variable is not present in the store.
    UndefinedVariable,
    /// A property accessor was applied to a non-object, or the key is
    /// missing, or the accessor chain is too deep.
    InvalidAccess,
    /// A sequence index (after negative normalization) is out of bounds.
    IndexOutOfRange,
}

impl ResolutionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UndefinedVariable => "undefined variable",
            Self::InvalidAccess => "invalid access",
            Self::IndexOutOfRange => "index out of range",
        }
    }
}

/// Outcome of resolving one expression inside a parameter bag.
#[derive(Debug, Clone, Serialize)]
pub struct ExpressionOutcome {
    /// Dotted location of the parameter that contained the expression,
    /// e.g. `locate.prompt` or `values[2]`.
    pub parameter: String,
    /// Base variable name referenced by the expression.
    pub variable: String,
    /// Full access path, e.g. `user.name`.
    pub path: String,
    /// Original expression text including delimiters.
    pub expression: String,
    /// Substituted text when resolution succeeded.
    pub resolved: Option<String>,
    /// Failure kind when resolution did not succeed.
    pub error: Option<ResolutionErrorKind>,
    /// Human-readable detail for failures.
    pub message: Option<String>,
}

impl ExpressionOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of resolving a parameter bag.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The bag with every resolvable expression substituted.
    pub value: Value,
    /// Per-expression outcomes, in document order.
    pub outcomes: Vec<ExpressionOutcome>,
}

impl Resolution {
    /// Outcomes that failed to resolve.
    pub fn failures(&self) -> impl Iterator<Item = &ExpressionOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }
}

/// Parse a string into literal and expression segments.
///
/// Text that looks like an expression but does not parse as one (for
/// example `${9bad}` or an unterminated `${`) is kept as literal text.
pub fn parse_segments(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current_literal = String::new();
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        let (before, tail) = rest.split_at(start);
        current_literal.push_str(before);

        let Some(end) = tail.find('}') else {
            // Unterminated expression, keep the remainder verbatim
            current_literal.push_str(tail);
            rest = "";
            break;
        };

        let raw = &tail[..=end];
        let body = &tail[2..end];

        match parse_path(body) {
            Some((base, accessors)) => {
                if !current_literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut current_literal)));
                }
                segments.push(Segment::Expression(Expression {
                    raw: raw.to_string(),
                    base,
                    accessors,
                }));
            }
            None => current_literal.push_str(raw),
        }

        rest = &tail[end + 1..];
    }

    current_literal.push_str(rest);
    if !current_literal.is_empty() {
        segments.push(Segment::Literal(current_literal));
    }

    segments
}

/// Parse an expression body (`name.prop[idx]...`) into a base identifier
/// and its accessor chain. Returns `None` for malformed input.
pub fn parse_path(body: &str) -> Option<(String, Vec<Accessor>)> {
    let base_len = scan_identifier(body)?;
    let base = body[..base_len].to_string();

    let mut accessors = Vec::new();
    let mut pos = base_len;

    while pos < body.len() {
        let rest = &body[pos..];
        if let Some(after_dot) = rest.strip_prefix('.') {
            let end = scan_identifier(after_dot)?;
            accessors.push(Accessor::Property(after_dot[..end].to_string()));
            pos += 1 + end;
        } else if let Some(after_bracket) = rest.strip_prefix('[') {
            let close = after_bracket.find(']')?;
            let index: i64 = after_bracket[..close].trim().parse().ok()?;
            accessors.push(Accessor::Index(index));
            pos += 1 + close + 1;
        } else {
            return None;
        }
    }

    Some((base, accessors))
}

/// Length of the leading identifier (`[A-Za-z_][A-Za-z0-9_]*`), or `None`
/// if the input does not start with one.
fn scan_identifier(input: &str) -> Option<usize> {
    let bytes = input.as_bytes();
    let first = *bytes.first()?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let mut end = 1;
    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }
    Some(end)
}

/// Check whether a string contains at least one parseable expression.
pub fn has_expressions(input: &str) -> bool {
    parse_segments(input)
        .iter()
        .any(|seg| matches!(seg, Segment::Expression(_)))
}

/// Base variable names referenced anywhere in a string.
pub fn referenced_variables(input: &str) -> HashSet<String> {
    parse_segments(input)
        .into_iter()
        .filter_map(|seg| match seg {
            Segment::Expression(expr) => Some(expr.base),
            Segment::Literal(_) => None,
        })
        .collect()
}

/// Collect every expression in a parameter bag together with the dotted
/// location of the parameter that contains it. Used by static lint.
pub fn collect_expressions(params: &Value) -> Vec<(String, Expression)> {
    let mut found = Vec::new();
    collect_node(params, &mut String::new(), &mut found);
    found
}

fn collect_node(node: &Value, path: &mut String, found: &mut Vec<(String, Expression)>) {
    match node {
        Value::String(text) => {
            for segment in parse_segments(text) {
                if let Segment::Expression(expr) = segment {
                    found.push((path.clone(), expr));
                }
            }
        }
        Value::Object(map) => {
            for (key, value) in map {
                let saved = path.len();
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(key);
                collect_node(value, path, found);
                path.truncate(saved);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                let saved = path.len();
                path.push('[');
                path.push_str(&index.to_string());
                path.push(']');
                collect_node(value, path, found);
                path.truncate(saved);
            }
        }
        _ => {}
    }
}

/// Resolve every expression in a parameter bag against a variable store.
///
/// Maps and sequences are walked depth-first; string leaves are resolved,
/// all other scalars pass through unchanged. Never fails: unresolvable
/// expressions keep their original text and show up in `outcomes`.
pub fn resolve_params(params: &Value, store: &VariableStore) -> Resolution {
    let mut outcomes = Vec::new();
    let value = resolve_node(params, &mut String::new(), store, &mut outcomes);
    Resolution { value, outcomes }
}

/// Resolve a single string. The `parameter` label is carried into the
/// outcomes for trace purposes.
pub fn resolve_text(
    input: &str,
    parameter: &str,
    store: &VariableStore,
) -> (String, Vec<ExpressionOutcome>) {
    let mut outcomes = Vec::new();
    let resolved = resolve_string_value(input, parameter, store, &mut outcomes);
    (resolved, outcomes)
}

fn resolve_node(
    node: &Value,
    path: &mut String,
    store: &VariableStore,
    outcomes: &mut Vec<ExpressionOutcome>,
) -> Value {
    match node {
        Value::String(text) => {
            Value::String(resolve_string_value(text, path, store, outcomes))
        }
        Value::Object(map) => {
            let mut resolved = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                let saved = path.len();
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(key);
                resolved.insert(key.clone(), resolve_node(value, path, store, outcomes));
                path.truncate(saved);
            }
            Value::Object(resolved)
        }
        Value::Array(items) => {
            let mut resolved = Vec::with_capacity(items.len());
            for (index, value) in items.iter().enumerate() {
                let saved = path.len();
                path.push('[');
                path.push_str(&index.to_string());
                path.push(']');
                resolved.push(resolve_node(value, path, store, outcomes));
                path.truncate(saved);
            }
            Value::Array(resolved)
        }
        other => other.clone(),
    }
}

fn resolve_string_value(
    input: &str,
    parameter: &str,
    store: &VariableStore,
    outcomes: &mut Vec<ExpressionOutcome>,
) -> String {
    let segments = parse_segments(input);
    let mut result = String::new();

    for segment in segments {
        match segment {
            Segment::Literal(text) => result.push_str(&text),
            Segment::Expression(expr) => {
                let outcome = resolve_expression(&expr, parameter, store);
                match &outcome.resolved {
                    Some(text) => result.push_str(text),
                    None => result.push_str(&expr.raw),
                }
                outcomes.push(outcome);
            }
        }
    }

    result
}

fn resolve_expression(
    expr: &Expression,
    parameter: &str,
    store: &VariableStore,
) -> ExpressionOutcome {
    let mut outcome = ExpressionOutcome {
        parameter: parameter.to_string(),
        variable: expr.base.clone(),
        path: expr.path(),
        expression: expr.raw.clone(),
        resolved: None,
        error: None,
        message: None,
    };

    if expr.accessors.len() > MAX_ACCESSOR_DEPTH {
        outcome.error = Some(ResolutionErrorKind::InvalidAccess);
        outcome.message = Some(format!(
            "accessor chain has {} elements (maximum {})",
            expr.accessors.len(),
            MAX_ACCESSOR_DEPTH
        ));
        return outcome;
    }

    let Some(mut current) = store.get(&expr.base) else {
        outcome.error = Some(ResolutionErrorKind::UndefinedVariable);
        outcome.message = Some(format!("variable '{}' is not defined", expr.base));
        return outcome;
    };

    for accessor in &expr.accessors {
        match accessor {
            Accessor::Property(key) => match current {
                Value::Object(ref map) => match map.get(key) {
                    Some(next) => current = next.clone(),
                    None => {
                        outcome.error = Some(ResolutionErrorKind::InvalidAccess);
                        outcome.message =
                            Some(format!("'{}' has no property '{}'", expr.base, key));
                        return outcome;
                    }
                },
                _ => {
                    outcome.error = Some(ResolutionErrorKind::InvalidAccess);
                    outcome.message = Some(format!(
                        "cannot read property '{}' of non-object value",
                        key
                    ));
                    return outcome;
                }
            },
            Accessor::Index(index) => match current {
                Value::Array(ref items) => {
                    let len = items.len() as i64;
                    let normalized = if *index < 0 { len + index } else { *index };
                    if normalized < 0 || normalized >= len {
                        outcome.error = Some(ResolutionErrorKind::IndexOutOfRange);
                        outcome.message = Some(format!(
                            "index {} out of range for sequence of length {}",
                            index, len
                        ));
                        return outcome;
                    }
                    current = items[normalized as usize].clone();
                }
                _ => {
                    outcome.error = Some(ResolutionErrorKind::InvalidAccess);
                    outcome.message =
                        Some(format!("cannot index non-sequence value with [{}]", index));
                    return outcome;
                }
            },
        }
    }

    outcome.resolved = Some(stringify(&current));
    outcome
}

/// Render a value for substitution into a string: scalars use their natural
/// form, objects and sequences their canonical JSON serialization.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
