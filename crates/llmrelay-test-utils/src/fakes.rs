//! Scriptable fakes for the host-side collaborators.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use llmrelay_core::{
    BoxFuture, CloudCredentials, CredentialError, CredentialProvider, LoginMethod, Notifier,
    NotifyError, SecretValue, SessionEvent, SessionEventSink,
};
use tokio::sync::{Notify, Semaphore};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// A credential failure the fake can replay any number of times.
#[derive(Debug, Clone)]
pub enum FakeFailure {
    TokenExpired,
    Unavailable(String),
}

impl FakeFailure {
    fn to_error(&self) -> CredentialError {
        match self {
            Self::TokenExpired => CredentialError::TokenExpired,
            Self::Unavailable(reason) => CredentialError::Unavailable(reason.clone()),
        }
    }
}

/// In-memory credential store with call counters.
pub struct FakeCredentials {
    login_method: Mutex<LoginMethod>,
    access_token: Mutex<Result<Option<String>, FakeFailure>>,
    refreshed_token: Mutex<Result<String, FakeFailure>>,
    cloud: Mutex<Option<CloudCredentials>>,
    base_url: Mutex<Option<String>>,
    refresh_calls: AtomicUsize,
    cloud_calls: AtomicUsize,
}

impl FakeCredentials {
    pub fn new(login_method: LoginMethod) -> Self {
        Self {
            login_method: Mutex::new(login_method),
            access_token: Mutex::new(Ok(None)),
            refreshed_token: Mutex::new(Err(FakeFailure::Unavailable(
                "no refresh configured".to_string(),
            ))),
            cloud: Mutex::new(None),
            base_url: Mutex::new(None),
            refresh_calls: AtomicUsize::new(0),
            cloud_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_access_token(self, token: &str) -> Self {
        self.set_access_token(Some(token));
        self
    }

    pub fn with_access_failure(self, failure: FakeFailure) -> Self {
        *self.access_token.lock().unwrap() = Err(failure);
        self
    }

    pub fn with_refreshed_token(self, token: &str) -> Self {
        *self.refreshed_token.lock().unwrap() = Ok(token.to_string());
        self
    }

    pub fn with_refresh_failure(self, failure: FakeFailure) -> Self {
        *self.refreshed_token.lock().unwrap() = Err(failure);
        self
    }

    pub fn with_cloud_credentials(self, credentials: CloudCredentials) -> Self {
        *self.cloud.lock().unwrap() = Some(credentials);
        self
    }

    pub fn with_base_url(self, url: &str) -> Self {
        *self.base_url.lock().unwrap() = Some(url.to_string());
        self
    }

    pub fn set_login_method(&self, method: LoginMethod) {
        *self.login_method.lock().unwrap() = method;
    }

    pub fn set_access_token(&self, token: Option<&str>) {
        *self.access_token.lock().unwrap() = Ok(token.map(str::to_string));
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn cloud_calls(&self) -> usize {
        self.cloud_calls.load(Ordering::SeqCst)
    }
}

impl CredentialProvider for FakeCredentials {
    fn access_token(&self) -> BoxFuture<'_, Result<Option<SecretValue>, CredentialError>> {
        let result = match &*self.access_token.lock().unwrap() {
            Ok(token) => Ok(token.as_deref().map(SecretValue::new)),
            Err(failure) => Err(failure.to_error()),
        };
        Box::pin(async move { result })
    }

    fn refreshed_access_token(&self) -> BoxFuture<'_, Result<SecretValue, CredentialError>> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let result = match &*self.refreshed_token.lock().unwrap() {
            Ok(token) => Ok(SecretValue::new(token.as_str())),
            Err(failure) => Err(failure.to_error()),
        };
        Box::pin(async move { result })
    }

    fn login_method(&self) -> BoxFuture<'_, Result<LoginMethod, CredentialError>> {
        let method = *self.login_method.lock().unwrap();
        Box::pin(async move { Ok(method) })
    }

    fn cloud_credentials(
        &self,
    ) -> BoxFuture<'_, Result<Option<CloudCredentials>, CredentialError>> {
        self.cloud_calls.fetch_add(1, Ordering::SeqCst);
        let credentials = self.cloud.lock().unwrap().clone();
        Box::pin(async move { Ok(credentials) })
    }

    fn backend_base_url(&self) -> Option<String> {
        self.base_url.lock().unwrap().clone()
    }
}

/// Session sink that records every event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SessionEvent>>,
    changed: Notify,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: SessionEvent) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| **e == event)
            .count()
    }

    /// Wait until `event` has been recorded at least once.
    pub async fn wait_for(&self, event: SessionEvent) {
        tokio::time::timeout(WAIT_TIMEOUT, async {
            loop {
                let changed = self.changed.notified();
                if self.count(event) > 0 {
                    return;
                }
                changed.await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {event}"));
    }
}

impl SessionEventSink for RecordingSink {
    fn send_event(&self, event: SessionEvent) {
        self.events.lock().unwrap().push(event);
        self.changed.notify_one();
    }
}

/// How [`ScriptedNotifier::show_warning`] resolves.
#[derive(Debug, Clone)]
pub enum NotifierResponse {
    Choose(String),
    Dismiss,
    Fail(String),
    Panic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShownWarning {
    pub message: String,
    pub choices: Vec<String>,
}

/// Notification UI that answers every prompt the same scripted way.
///
/// A gated notifier blocks each prompt until [`ScriptedNotifier::release`],
/// which keeps a prompt "in flight" for as long as a test needs.
pub struct ScriptedNotifier {
    response: Mutex<NotifierResponse>,
    gate: Option<Semaphore>,
    shown: Mutex<Vec<ShownWarning>>,
    shown_changed: Notify,
    configuration_opened: AtomicUsize,
    external_opened: Mutex<Vec<String>>,
}

impl ScriptedNotifier {
    pub fn new(response: NotifierResponse) -> Self {
        Self {
            response: Mutex::new(response),
            gate: None,
            shown: Mutex::new(Vec::new()),
            shown_changed: Notify::new(),
            configuration_opened: AtomicUsize::new(0),
            external_opened: Mutex::new(Vec::new()),
        }
    }

    pub fn dismissing() -> Self {
        Self::new(NotifierResponse::Dismiss)
    }

    pub fn choosing(choice: &str) -> Self {
        Self::new(NotifierResponse::Choose(choice.to_string()))
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn set_response(&self, response: NotifierResponse) {
        *self.response.lock().unwrap() = response;
    }

    /// Let `n` gated prompts resolve.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn shown(&self) -> Vec<ShownWarning> {
        self.shown.lock().unwrap().clone()
    }

    /// Wait until at least `count` prompts have been shown.
    pub async fn wait_for_warnings(&self, count: usize) -> Vec<ShownWarning> {
        tokio::time::timeout(WAIT_TIMEOUT, async {
            loop {
                let changed = self.shown_changed.notified();
                let shown = self.shown();
                if shown.len() >= count {
                    return shown;
                }
                changed.await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {count} warning(s)"))
    }

    pub fn configuration_opened(&self) -> usize {
        self.configuration_opened.load(Ordering::SeqCst)
    }

    pub fn external_opened(&self) -> Vec<String> {
        self.external_opened.lock().unwrap().clone()
    }
}

impl Notifier for ScriptedNotifier {
    fn show_warning<'a>(
        &'a self,
        message: &'a str,
        choices: &'a [&'a str],
    ) -> BoxFuture<'a, Result<Option<String>, NotifyError>> {
        self.shown.lock().unwrap().push(ShownWarning {
            message: message.to_string(),
            choices: choices.iter().map(|c| c.to_string()).collect(),
        });
        self.shown_changed.notify_one();
        let response = self.response.lock().unwrap().clone();

        Box::pin(async move {
            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            match response {
                NotifierResponse::Choose(choice) => Ok(Some(choice)),
                NotifierResponse::Dismiss => Ok(None),
                NotifierResponse::Fail(reason) => Err(NotifyError(reason)),
                NotifierResponse::Panic => panic!("notifier panicked"),
            }
        })
    }

    fn open_configuration_surface(&self) {
        self.configuration_opened.fetch_add(1, Ordering::SeqCst);
    }

    fn open_external(&self, url: &str) {
        self.external_opened.lock().unwrap().push(url.to_string());
    }
}
