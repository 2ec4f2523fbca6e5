//! Authenticated request relay.
//!
//! Every enterprise-proxy request passes through [`AuthenticatedFetch`], which
//! injects identification and auth headers and runs the recovery protocol for
//! authentication and quota failures:
//!
//! ```text
//!   request ──▶ headers ──▶ send ──┬─ 429 ──────▶ UsageExceeded + quota prompt ──▶ Err
//!                                  ├─ 401/403 ──▶ (enterprise) refresh + resend once
//!                                  │              (others) SilentLogout ──────────▶ Err
//!                                  └─ other ────▶ Ok(response)
//! ```

mod fetch;

use reqwest::Method;
use reqwest::header::HeaderMap;
use serde_json::Value;

pub use fetch::{AuthenticatedFetch, RelaySettings};

use crate::credentials::CredentialError;

/// Responses are handed back to the caller untouched.
pub type RelayResponse = reqwest::Response;

/// Errors surfaced by relay calls.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Missing or invalid configuration (base URL, model mapping, header value).
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("credential lookup failed: {0}")]
    CredentialLookup(String),

    /// Credentials were rejected. A `SilentLogout` event has already been sent.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The backend reported an exhausted usage quota. Never retried.
    #[error("usage quota exceeded (HTTP {status}): {detail}")]
    UsageQuotaExceeded { status: u16, detail: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("request signing failed: {0}")]
    Signing(String),

    #[error("failed to serialize request body: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CredentialError> for RelayError {
    fn from(e: CredentialError) -> Self {
        Self::CredentialLookup(e.to_string())
    }
}

impl RelayError {
    /// Whether a caller-side retry loop may try the request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    pub fn is_usage_quota(&self) -> bool {
        matches!(self, Self::UsageQuotaExceeded { .. })
    }

    /// HTTP status associated with the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UsageQuotaExceeded { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// A single outbound request, owned by one relay call.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl RelayRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// A POST carrying a JSON body.
    pub fn post_json(url: impl Into<String>, body: &Value) -> Result<Self, RelayError> {
        Ok(Self {
            body: Some(serde_json::to_vec(body)?),
            ..Self::new(Method::POST, url)
        })
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Whether this is a call to a Messages endpoint.
    pub fn is_messages_call(&self) -> bool {
        self.url.contains("/messages")
    }
}

/// Prompt-cache breakpoints in a Messages request body.
///
/// Returns the message count and one `index:role` entry per message carrying
/// a `cache_control` marker (on the message or on any content part), or
/// `None` when the body is not a Messages payload.
pub fn cache_breakpoints(body: &[u8]) -> Option<(usize, Vec<String>)> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let messages = value.get("messages")?.as_array()?;
    let marks = messages
        .iter()
        .enumerate()
        .filter(|(_, message)| has_cache_control(message))
        .map(|(i, message)| {
            let role = message.get("role").and_then(Value::as_str).unwrap_or("?");
            format!("{i}:{role}")
        })
        .collect();
    Some((messages.len(), marks))
}

fn has_cache_control(message: &Value) -> bool {
    if message.get("cache_control").is_some() {
        return true;
    }
    message
        .get("content")
        .and_then(Value::as_array)
        .is_some_and(|parts| parts.iter().any(|p| p.get("cache_control").is_some()))
}
