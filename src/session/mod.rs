//! Browser session abstraction.
//!
//! Every run owns exactly one browser session for its whole lifetime: the
//! coordinator acquires it from a [`SessionProvider`] before the first step
//! and releases it on every exit path (success, failure, stop, or an
//! internal fault). Sessions are never shared between runs.
//!
//! The concrete browser lives behind these traits - in production a remote
//! session managed by the automation sidecar, in tests a scripted stand-in.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How the browser window is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// No visible window.
    #[default]
    Headless,
    /// Visible window, for debugging test cases locally.
    Headed,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Headless => "headless",
            Self::Headed => "headed",
        }
    }
}

/// One isolated browser session, owned by a single run.
pub trait BrowserSession: Send {
    /// Identifier handlers use to address this session.
    fn id(&self) -> &str;

    /// Capture a screenshot of the current page, base64-encoded.
    ///
    /// Best effort: failure is reported as a message, the run keeps going.
    fn capture_screenshot(&mut self) -> std::result::Result<String, String>;

    /// Release the session. Must be idempotent.
    fn close(&mut self);
}

/// Source of isolated browser sessions.
pub trait SessionProvider: Send + Sync {
    /// Acquire a fresh session for one run.
    fn acquire(&self, mode: SessionMode) -> Result<Box<dyn BrowserSession>>;
}
