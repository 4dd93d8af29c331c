//! Canonical action capabilities and the handler contract.
//!
//! Test case steps carry free-form type tags (`aiTap`, `click`, `goto`,
//! ...). A static alias table folds them onto one canonical [`Capability`]
//! per action kind, and a [`HandlerRegistry`] maps each capability to the
//! handler object that performs it. New capabilities are added by
//! registering a handler, not by growing a dispatch conditional.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::session::BrowserSession;

/// A canonical action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Click an element described in natural language.
    Tap,
    /// Type text into an element.
    Input,
    /// Assert a condition about the page.
    Assert,
    /// Extract structured data from the page.
    Query,
    /// Extract a single string.
    ExtractString,
    /// Extract a single number.
    ExtractNumber,
    /// Extract a single boolean.
    ExtractBoolean,
    /// Locate an element, returning its position.
    Locate,
    /// Hover over an element.
    Hover,
    /// Scroll the page or an element.
    Scroll,
    /// Wait for a duration or condition.
    Wait,
    /// Navigate to a URL.
    Navigate,
    /// Evaluate a raw script in the page.
    Evaluate,
}

impl Capability {
    /// All capabilities, in display order.
    pub fn all() -> &'static [Capability] {
        &[
            Self::Tap,
            Self::Input,
            Self::Assert,
            Self::Query,
            Self::ExtractString,
            Self::ExtractNumber,
            Self::ExtractBoolean,
            Self::Locate,
            Self::Hover,
            Self::Scroll,
            Self::Wait,
            Self::Navigate,
            Self::Evaluate,
        ]
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tap => "tap",
            Self::Input => "input",
            Self::Assert => "assert",
            Self::Query => "query",
            Self::ExtractString => "string",
            Self::ExtractNumber => "number",
            Self::ExtractBoolean => "boolean",
            Self::Locate => "locate",
            Self::Hover => "hover",
            Self::Scroll => "scroll",
            Self::Wait => "wait",
            Self::Navigate => "navigate",
            Self::Evaluate => "evaluate",
        }
    }

    /// Accepted surface spellings besides the canonical name.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Tap => &["aiTap", "click"],
            Self::Input => &["aiInput", "type", "fill"],
            Self::Assert => &["aiAssert", "expect"],
            Self::Query => &["aiQuery", "extract"],
            Self::ExtractString => &["aiString"],
            Self::ExtractNumber => &["aiNumber"],
            Self::ExtractBoolean => &["aiBoolean"],
            Self::Locate => &["aiLocate"],
            Self::Hover => &["aiHover"],
            Self::Scroll => &["aiScroll"],
            Self::Wait => &["sleep", "waitFor", "aiWaitFor"],
            Self::Navigate => &["goto", "open"],
            Self::Evaluate => &["eval", "script", "evaluateJavaScript"],
        }
    }

    /// Fold a surface type tag onto its canonical capability.
    ///
    /// Matching is case-insensitive and tolerant of surrounding whitespace.
    pub fn normalize(tag: &str) -> Option<Capability> {
        let normalized = tag.trim().to_ascii_lowercase();
        let capability = match normalized.as_str() {
            "tap" | "aitap" | "click" => Self::Tap,
            "input" | "aiinput" | "type" | "fill" => Self::Input,
            "assert" | "aiassert" | "expect" => Self::Assert,
            "query" | "aiquery" | "extract" => Self::Query,
            "string" | "aistring" => Self::ExtractString,
            "number" | "ainumber" => Self::ExtractNumber,
            "boolean" | "aiboolean" => Self::ExtractBoolean,
            "locate" | "ailocate" => Self::Locate,
            "hover" | "aihover" => Self::Hover,
            "scroll" | "aiscroll" => Self::Scroll,
            "wait" | "sleep" | "waitfor" | "aiwaitfor" => Self::Wait,
            "navigate" | "goto" | "open" => Self::Navigate,
            "evaluate" | "eval" | "script" | "evaluatejavascript" => Self::Evaluate,
            _ => return None,
        };
        Some(capability)
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved action, ready for a handler.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    /// Canonical action kind.
    pub capability: Capability,
    /// Parameter bag with all `${...}` expressions substituted.
    pub params: Value,
    /// Budget for this single invocation. Handlers must honor it and
    /// report [`HandlerError::Timeout`] when exceeded.
    pub timeout: Duration,
    /// Human description from the step, for backend context.
    pub description: Option<String>,
}

/// Failure reported by an action handler.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// Could not reach the automation backend.
    #[error("backend connection failed: {0}")]
    Connectivity(String),

    /// The invocation exceeded its time budget.
    #[error("action timed out: {0}")]
    Timeout(String),

    /// The backend could not recognize the target (empty or ambiguous
    /// content). Often succeeds once the page settles.
    #[error("backend returned no usable content: {0}")]
    EmptyContent(String),

    /// An assertion evaluated to false. Never retried.
    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    /// Any other handler failure. Never retried.
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connectivity(_) | Self::Timeout(_) | Self::EmptyContent(_)
        )
    }
}

/// Outcome of a handler invocation: an optional value to capture.
pub type HandlerResult = std::result::Result<Option<Value>, HandlerError>;

/// An object that performs one or more capabilities against a session.
pub trait ActionHandler: Send + Sync {
    fn perform(&self, session: &mut dyn BrowserSession, request: &ActionRequest) -> HandlerResult;
}

/// Map from capability to its registered handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Capability, Arc<dyn ActionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one capability, replacing any previous one.
    pub fn register(&mut self, capability: Capability, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(capability, handler);
    }

    /// Register one handler for every capability. Useful for backends that
    /// multiplex all actions over a single protocol.
    pub fn register_all(&mut self, handler: Arc<dyn ActionHandler>) {
        for capability in Capability::all() {
            self.handlers.insert(*capability, Arc::clone(&handler));
        }
    }

    /// Look up the handler for a capability.
    pub fn get(&self, capability: Capability) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(&capability).cloned()
    }

    /// Capabilities that currently have a handler.
    pub fn registered(&self) -> Vec<Capability> {
        let mut list: Vec<Capability> = self.handlers.keys().copied().collect();
        list.sort_by_key(|c| c.as_str());
        list
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("registered", &self.registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHandler;

    impl ActionHandler for NoopHandler {
        fn perform(
            &self,
            _session: &mut dyn BrowserSession,
            _request: &ActionRequest,
        ) -> HandlerResult {
            Ok(None)
        }
    }

    #[test]
    fn normalize_folds_aliases() {
        assert_eq!(Capability::normalize("aiTap"), Some(Capability::Tap));
        assert_eq!(Capability::normalize("click"), Some(Capability::Tap));
        assert_eq!(Capability::normalize("goto"), Some(Capability::Navigate));
        assert_eq!(Capability::normalize("type"), Some(Capability::Input));
        assert_eq!(
            Capability::normalize("aiString"),
            Some(Capability::ExtractString)
        );
        assert_eq!(Capability::normalize("sleep"), Some(Capability::Wait));
        assert_eq!(Capability::normalize("eval"), Some(Capability::Evaluate));
    }

    #[test]
    fn normalize_is_case_insensitive_and_trims() {
        assert_eq!(Capability::normalize("  AITAP  "), Some(Capability::Tap));
        assert_eq!(Capability::normalize("Navigate"), Some(Capability::Navigate));
    }

    #[test]
    fn normalize_rejects_unknown_tags() {
        assert_eq!(Capability::normalize("teleport"), None);
        assert_eq!(Capability::normalize(""), None);
    }

    #[test]
    fn canonical_names_round_trip_through_normalize() {
        for capability in Capability::all() {
            assert_eq!(Capability::normalize(capability.as_str()), Some(*capability));
        }
    }

    #[test]
    fn aliases_normalize_to_their_capability() {
        for capability in Capability::all() {
            for alias in capability.aliases() {
                assert_eq!(
                    Capability::normalize(alias),
                    Some(*capability),
                    "alias '{alias}' does not fold onto {capability}"
                );
            }
        }
    }

    #[test]
    fn transient_classification() {
        assert!(HandlerError::Connectivity("refused".into()).is_transient());
        assert!(HandlerError::Timeout("30s".into()).is_transient());
        assert!(HandlerError::EmptyContent("no match".into()).is_transient());
        assert!(!HandlerError::AssertionFailed("price wrong".into()).is_transient());
        assert!(!HandlerError::Failed("boom".into()).is_transient());
    }

    #[test]
    fn registry_register_and_get() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(Capability::Tap).is_none());

        registry.register(Capability::Tap, Arc::new(NoopHandler));
        assert!(registry.get(Capability::Tap).is_some());
        assert!(registry.get(Capability::Input).is_none());
    }

    #[test]
    fn registry_register_all_covers_every_capability() {
        let mut registry = HandlerRegistry::new();
        registry.register_all(Arc::new(NoopHandler));

        for capability in Capability::all() {
            assert!(registry.get(*capability).is_some(), "{capability} missing");
        }
        assert_eq!(registry.registered().len(), Capability::all().len());
    }
}
