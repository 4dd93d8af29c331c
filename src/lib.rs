//! Pilot - AI-assisted browser test case orchestration.
//!
//! Pilot runs declarative browser test cases whose individual actions are
//! performed by an external AI automation backend. The engine sequences
//! heterogeneous steps, resolves `${...}` data dependencies between them,
//! retries transient backend failures, supports cooperative mid-run
//! cancellation, and tracks every run - each with its own isolated
//! browser session - in a bounded in-process registry.
//!
//! # Modules
//!
//! - [`bridge`] - HTTP adapter to the automation sidecar
//! - [`cli`] - Command-line interface and argument parsing
//! - [`engine`] - Variable resolution, step execution, run coordination
//! - [`error`] - Error types and result aliases
//! - [`session`] - Isolated browser session traits
//! - [`testcase`] - Test case schema, loading, and static lint
//!
//! # Example
//!
//! ```
//! use pilot::engine::{resolve_text, VariableStore};
//! use serde_json::json;
//!
//! // Resolve a reference to a value produced by an earlier step
//! let store = VariableStore::new();
//! store.set("product", json!({"name": "Lamp"}), 0, "query", json!(null));
//! let (text, _) = resolve_text("add ${product.name} to cart", "text", &store);
//! assert_eq!(text, "add Lamp to cart");
//! ```

pub mod bridge;
pub mod cli;
pub mod engine;
pub mod error;
pub mod session;
pub mod testcase;

pub use error::{PilotError, Result};
