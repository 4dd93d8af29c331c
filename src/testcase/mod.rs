//! Test case model, loading, and static lint.
//!
//! A test case is a named, ordered list of declarative steps stored as a
//! YAML document. Loading and validation happen before a run is created;
//! the lint pass catches data-dependency mistakes (references to variables
//! that can never resolve) without touching a browser.

pub mod lint;
pub mod loader;
pub mod schema;

pub use lint::{lint_case, LintFinding, LintSeverity};
pub use loader::load_case;
pub use schema::{StepSpec, TestCase};
