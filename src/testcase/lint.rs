//! Static lint for test cases.
//!
//! Catches mistakes that would only surface mid-run: unknown action types,
//! variable references that can never resolve, accessor chains over the
//! depth cap. Runs entirely offline.

use std::collections::HashMap;

use crate::engine::capability::Capability;
use crate::engine::interpolation::{collect_expressions, parse_path, MAX_ACCESSOR_DEPTH};
use crate::testcase::schema::TestCase;

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintSeverity {
    /// Suspicious but runnable.
    Warning,
    /// Will misbehave at run time.
    Error,
}

impl LintSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// One lint finding.
#[derive(Debug, Clone)]
pub struct LintFinding {
    /// Step the finding applies to, when step-specific.
    pub step: Option<usize>,
    pub severity: LintSeverity,
    pub message: String,
}

impl LintFinding {
    fn error(step: usize, message: String) -> Self {
        Self {
            step: Some(step),
            severity: LintSeverity::Error,
            message,
        }
    }

    fn warning(step: usize, message: String) -> Self {
        Self {
            step: Some(step),
            severity: LintSeverity::Warning,
            message,
        }
    }
}

/// Lint a test case. Findings come back in step order.
pub fn lint_case(case: &TestCase) -> Vec<LintFinding> {
    let mut findings = Vec::new();

    // Where each output variable is defined (first definition wins for
    // availability; duplicates are reported separately).
    let mut first_definition: HashMap<&str, usize> = HashMap::new();
    for (index, step) in case.steps.iter().enumerate() {
        if let Some(name) = step.output_variable.as_deref() {
            if let Some(previous) = first_definition.get(name) {
                findings.push(LintFinding::warning(
                    index,
                    format!(
                        "output variable '{}' overwrites the value defined at step {}",
                        name, previous
                    ),
                ));
            } else {
                first_definition.insert(name, index);
            }
        }
    }

    for (index, step) in case.steps.iter().enumerate() {
        let capability = Capability::normalize(&step.type_tag);
        if capability.is_none() {
            findings.push(LintFinding::error(
                index,
                format!("unknown action type '{}'", step.type_tag),
            ));
        }

        if let Some(name) = step.output_variable.as_deref() {
            if parse_path(name).map(|(_, accessors)| !accessors.is_empty()).unwrap_or(true) {
                findings.push(LintFinding::warning(
                    index,
                    format!(
                        "output variable '{}' is not a plain identifier and cannot be referenced",
                        name
                    ),
                ));
            }
        }

        if !step.has_params() && capability != Some(Capability::Wait) {
            findings.push(LintFinding::warning(
                index,
                format!("step has no parameters for '{}'", step.type_tag),
            ));
        }

        for (parameter, expression) in collect_expressions(&step.effective_params()) {
            if expression.accessors.len() > MAX_ACCESSOR_DEPTH {
                findings.push(LintFinding::error(
                    index,
                    format!(
                        "expression '{}' in '{}' exceeds the accessor depth limit of {}",
                        expression.raw, parameter, MAX_ACCESSOR_DEPTH
                    ),
                ));
            }

            match first_definition.get(expression.base.as_str()) {
                None => findings.push(LintFinding::error(
                    index,
                    format!(
                        "expression '{}' in '{}' references '{}', which no step defines",
                        expression.raw, parameter, expression.base
                    ),
                )),
                Some(&defined_at) if defined_at >= index => findings.push(LintFinding::error(
                    index,
                    format!(
                        "expression '{}' in '{}' references '{}' before step {} defines it",
                        expression.raw, parameter, expression.base, defined_at
                    ),
                )),
                Some(_) => {}
            }
        }
    }

    findings.sort_by_key(|f| f.step);
    findings
}

/// Whether any finding is an error.
pub fn has_errors(findings: &[LintFinding]) -> bool {
    findings.iter().any(|f| f.severity == LintSeverity::Error)
}
