//! HTTP bridge to the automation sidecar.
//!
//! The AI capability itself lives in a separate sidecar process that owns
//! the actual browsers. This module adapts its HTTP protocol onto the
//! engine's traits: [`BridgeProvider`] creates one sidecar session per run,
//! and [`BridgeHandler`] forwards every resolved action to that session.
//!
//! Protocol:
//!
//! - `POST   /sessions`                  `{"mode": ...}` -> `{"session_id": ...}`
//! - `POST   /sessions/{id}/actions`     action request  -> `{"value": ...}`
//! - `POST   /sessions/{id}/screenshot`  -> `{"data": ...}`
//! - `DELETE /sessions/{id}`
//!
//! Action failures come back as a JSON body `{"error": {"kind": ..,
//! "message": ..}}`; the kind maps onto [`HandlerError`] so the retry
//! policy can classify transport and recognition problems as transient.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::engine::capability::{ActionHandler, ActionRequest, HandlerError, HandlerResult};
use crate::error::{PilotError, Result};
use crate::session::{BrowserSession, SessionMode, SessionProvider};

/// Timeout for session management calls (not actions, which carry their
/// own budget).
const CONTROL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct SessionCreated {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct ActionValue {
    #[serde(default)]
    value: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ScreenshotData {
    data: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    message: String,
}

/// Shared sidecar endpoint configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Base URL of the sidecar, e.g. `http://127.0.0.1:4173`.
    pub endpoint: String,
}

impl BridgeConfig {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        let trimmed = endpoint.trim_end_matches('/').to_string();
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(PilotError::BridgeConfigError {
                message: format!("endpoint '{endpoint}' is not an http(s) URL"),
            });
        }
        Ok(Self { endpoint: trimmed })
    }
}

/// Creates one sidecar-managed browser session per run.
pub struct BridgeProvider {
    client: reqwest::blocking::Client,
    config: BridgeConfig,
}

impl BridgeProvider {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            config,
        }
    }
}

impl SessionProvider for BridgeProvider {
    fn acquire(&self, mode: SessionMode) -> Result<Box<dyn BrowserSession>> {
        let url = format!("{}/sessions", self.config.endpoint);
        let response = self
            .client
            .post(&url)
            .timeout(CONTROL_TIMEOUT)
            .json(&json!({"mode": mode.as_str()}))
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| PilotError::SessionError {
                message: e.to_string(),
            })?;

        let created: SessionCreated =
            response.json().map_err(|e| PilotError::SessionError {
                message: format!("malformed session response: {e}"),
            })?;

        debug!("sidecar session {} acquired", created.session_id);
        Ok(Box::new(BridgeSession {
            id: created.session_id,
            client: self.client.clone(),
            endpoint: self.config.endpoint.clone(),
            closed: false,
        }))
    }
}

/// A browser session living inside the sidecar.
pub struct BridgeSession {
    id: String,
    client: reqwest::blocking::Client,
    endpoint: String,
    closed: bool,
}

impl BrowserSession for BridgeSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture_screenshot(&mut self) -> std::result::Result<String, String> {
        let url = format!("{}/sessions/{}/screenshot", self.endpoint, self.id);
        let response = self
            .client
            .post(&url)
            .timeout(CONTROL_TIMEOUT)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;
        let body: ScreenshotData = response.json().map_err(|e| e.to_string())?;
        Ok(body.data)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let url = format!("{}/sessions/{}", self.endpoint, self.id);
        if let Err(e) = self.client.delete(&url).timeout(CONTROL_TIMEOUT).send() {
            warn!("sidecar session {} release failed: {e}", self.id);
        }
    }
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Forwards actions to the sidecar session the run owns.
pub struct BridgeHandler {
    client: reqwest::blocking::Client,
    config: BridgeConfig,
}

impl BridgeHandler {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            config,
        }
    }
}

impl ActionHandler for BridgeHandler {
    fn perform(&self, session: &mut dyn BrowserSession, request: &ActionRequest) -> HandlerResult {
        let url = format!(
            "{}/sessions/{}/actions",
            self.config.endpoint,
            session.id()
        );
        let body = json!({
            "capability": request.capability.as_str(),
            "params": request.params,
            "timeout_ms": request.timeout.as_millis() as u64,
            "description": request.description,
        });

        let response = self
            .client
            .post(&url)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .map_err(classify_transport_error)?;

        if response.status().is_success() {
            let body: ActionValue = response
                .json()
                .map_err(|e| HandlerError::Failed(format!("malformed action response: {e}")))?;
            return Ok(body.value);
        }

        let status = response.status();
        match response.json::<ErrorBody>() {
            Ok(body) => Err(classify_sidecar_error(&body.error)),
            Err(_) => Err(HandlerError::Failed(format!(
                "sidecar returned HTTP {status}"
            ))),
        }
    }
}

fn classify_transport_error(error: reqwest::Error) -> HandlerError {
    if error.is_timeout() {
        HandlerError::Timeout(error.to_string())
    } else {
        HandlerError::Connectivity(error.to_string())
    }
}

fn classify_sidecar_error(detail: &ErrorDetail) -> HandlerError {
    let message = if detail.message.is_empty() {
        "sidecar reported an error".to_string()
    } else {
        detail.message.clone()
    };
    match detail.kind.as_str() {
        "empty-content" | "ambiguous" => HandlerError::EmptyContent(message),
        "timeout" => HandlerError::Timeout(message),
        "connectivity" => HandlerError::Connectivity(message),
        "assertion-failed" => HandlerError::AssertionFailed(message),
        _ => HandlerError::Failed(message),
    }
}
