//! Session events emitted towards the host's session state machine.

use std::fmt;

use serde::Serialize;

/// Events the relay reports to the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    /// The user accepted the re-login prompt.
    Login,
    /// Credentials were rejected; drop the session without user interaction.
    SilentLogout,
    /// The backend reported an exhausted usage quota.
    UsageExceeded,
    /// The user chose to switch to an API key after a quota error.
    AuthWithApiKey,
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Login => "login",
            Self::SilentLogout => "silent_logout",
            Self::UsageExceeded => "usage_exceeded",
            Self::AuthWithApiKey => "auth_with_api_key",
        })
    }
}

/// Fire-and-forget event delivery.
pub trait SessionEventSink: Send + Sync {
    fn send_event(&self, event: SessionEvent);
}

/// Sink that only records events in the trace log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl SessionEventSink for TracingEventSink {
    fn send_event(&self, event: SessionEvent) {
        tracing::info!(%event, "session event");
    }
}
