//! User-facing prompts raised by the relay.
//!
//! Two prompts exist: the re-login prompt after an unrecoverable
//! authentication failure, and the quota prompt after a 429. Both run as
//! detached tasks so the relay call that triggered them returns immediately
//! and dropping that call never leaves a prompt half-finished.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::BoxFuture;
use crate::session::{SessionEvent, SessionEventSink};

pub const RELOGIN_MESSAGE: &str =
    "Your session is no longer valid for the current environment. Please sign in again.";
pub const SIGN_IN: &str = "Sign In";

pub const QUOTA_MESSAGE: &str = "Your free usage quota has been exceeded. Set your own Anthropic API key to continue with unlimited access.";
pub const SET_API_KEY: &str = "Set API Key";
pub const LEARN_MORE: &str = "Learn More";

/// Opened by the quota prompt's "Learn More" choice.
pub const PROVIDER_CONSOLE_URL: &str = "https://console.anthropic.com/";

#[derive(Debug, thiserror::Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// The host's notification surface.
pub trait Notifier: Send + Sync {
    /// Show a warning with the given choices. Resolves to the selected
    /// choice, or `None` when dismissed.
    fn show_warning<'a>(
        &'a self,
        message: &'a str,
        choices: &'a [&'a str],
    ) -> BoxFuture<'a, Result<Option<String>, NotifyError>>;

    /// Open the host's sign-in / configuration surface.
    fn open_configuration_surface(&self);

    fn open_external(&self, url: &str);
}

/// Process-wide "a re-login prompt is showing" flag.
///
/// Cloning shares the flag. Separate `PromptGuard::new()` values are
/// independent, so two relays in one process never suppress each other.
#[derive(Debug, Clone, Default)]
pub struct PromptGuard {
    in_flight: Arc<AtomicBool>,
}

impl PromptGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flag. Returns `None` when a prompt is already in flight.
    pub fn try_acquire(&self) -> Option<PromptPermit> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PromptPermit {
                in_flight: Arc::clone(&self.in_flight),
            })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Holds the prompt flag; clears it when dropped, including on panic or task
/// cancellation.
#[derive(Debug)]
pub struct PromptPermit {
    in_flight: Arc<AtomicBool>,
}

impl Drop for PromptPermit {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Raises prompts and turns the user's choice into session events.
#[derive(Clone)]
pub struct PromptDispatcher {
    guard: PromptGuard,
    notifier: Arc<dyn Notifier>,
    events: Arc<dyn SessionEventSink>,
}

impl PromptDispatcher {
    pub fn new(
        guard: PromptGuard,
        notifier: Arc<dyn Notifier>,
        events: Arc<dyn SessionEventSink>,
    ) -> Self {
        Self {
            guard,
            notifier,
            events,
        }
    }

    pub fn guard(&self) -> &PromptGuard {
        &self.guard
    }

    /// Show the re-login prompt unless one is already showing.
    ///
    /// The flag is claimed before this returns, so concurrent callers are
    /// de-duplicated deterministically. Returns the prompt task, or `None`
    /// when suppressed.
    pub fn relogin(&self) -> Option<JoinHandle<()>> {
        let Some(permit) = self.guard.try_acquire() else {
            debug!("re-login prompt already in flight");
            return None;
        };
        let this = self.clone();
        Some(tokio::spawn(async move { this.run_relogin(permit).await }))
    }

    /// Body of the re-login prompt. The flag is released when `permit`
    /// drops at the end of this call.
    pub async fn run_relogin(&self, permit: PromptPermit) {
        let choices = [SIGN_IN];
        match self.notifier.show_warning(RELOGIN_MESSAGE, &choices).await {
            Ok(Some(choice)) if choice == SIGN_IN => {
                self.notifier.open_configuration_surface();
                self.events.send_event(SessionEvent::Login);
            }
            Ok(_) => debug!("re-login prompt dismissed"),
            Err(e) => warn!(error = %e, "re-login prompt failed"),
        }
        drop(permit);
    }

    /// Show the quota prompt. Not de-duplicated.
    pub fn usage_exceeded(&self, detail: &str) -> JoinHandle<()> {
        debug!(detail, "raising usage quota prompt");
        let this = self.clone();
        tokio::spawn(async move { this.run_usage_exceeded().await })
    }

    async fn run_usage_exceeded(&self) {
        let choices = [SET_API_KEY, LEARN_MORE];
        match self.notifier.show_warning(QUOTA_MESSAGE, &choices).await {
            Ok(Some(choice)) if choice == SET_API_KEY => {
                self.notifier.open_configuration_surface();
                self.events.send_event(SessionEvent::AuthWithApiKey);
            }
            Ok(Some(choice)) if choice == LEARN_MORE => {
                self.notifier.open_external(PROVIDER_CONSOLE_URL);
            }
            Ok(_) => debug!("quota prompt dismissed"),
            Err(e) => warn!(error = %e, "quota prompt failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_acquire_and_release() {
        let guard = PromptGuard::new();
        let permit = guard.try_acquire().expect("first acquire succeeds");
        assert!(guard.is_in_flight());
        assert!(guard.try_acquire().is_none());

        drop(permit);
        assert!(!guard.is_in_flight());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn test_cloned_guard_shares_flag() {
        let guard = PromptGuard::new();
        let other = guard.clone();
        let _permit = guard.try_acquire().unwrap();
        assert!(other.is_in_flight());
        assert!(other.try_acquire().is_none());
    }

    #[test]
    fn test_independent_guards() {
        let a = PromptGuard::new();
        let b = PromptGuard::new();
        let _permit = a.try_acquire().unwrap();
        assert!(!b.is_in_flight());
        assert!(b.try_acquire().is_some());
    }

    #[test]
    fn test_permit_released_on_panic() {
        let guard = PromptGuard::new();
        let cloned = guard.clone();
        let result = std::panic::catch_unwind(move || {
            let _permit = cloned.try_acquire().unwrap();
            panic!("prompt blew up");
        });
        assert!(result.is_err());
        assert!(!guard.is_in_flight());
    }
}
