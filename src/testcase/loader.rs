//! Test case file loading.

use std::fs;
use std::path::Path;

use crate::error::{PilotError, Result};
use crate::testcase::schema::TestCase;

/// Load and validate a test case from a YAML file.
pub fn load_case(path: &Path) -> Result<TestCase> {
    if !path.exists() {
        return Err(PilotError::CaseNotFound {
            path: path.to_path_buf(),
        });
    }

    let text = fs::read_to_string(path)?;
    let case: TestCase = serde_yaml::from_str(&text).map_err(|e| PilotError::CaseParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    validate(&case)?;
    Ok(case)
}

/// Structural validation applied after parsing.
pub fn validate(case: &TestCase) -> Result<()> {
    if case.name.trim().is_empty() {
        return Err(PilotError::CaseValidationError {
            message: "test case name is empty".to_string(),
        });
    }

    if case.steps.is_empty() {
        return Err(PilotError::CaseValidationError {
            message: format!("test case '{}' has no steps", case.name),
        });
    }

    for (index, step) in case.steps.iter().enumerate() {
        if step.type_tag.trim().is_empty() {
            return Err(PilotError::CaseValidationError {
                message: format!("step {} has an empty type tag", index),
            });
        }
        if let Some(name) = &step.output_variable {
            if name.trim().is_empty() {
                return Err(PilotError::CaseValidationError {
                    message: format!("step {} has an empty output variable name", index),
                });
            }
        }
    }

    Ok(())
}
