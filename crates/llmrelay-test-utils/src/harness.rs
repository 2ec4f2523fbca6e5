//! A resolver wired to fakes.

use std::sync::Arc;

use llmrelay_config::AppConfig;
use llmrelay_core::{AuthenticatedFetch, ModelResolver};

use crate::fakes::{FakeCredentials, RecordingSink, ScriptedNotifier};

/// A [`ModelResolver`] built from config, with handles on every fake it was
/// wired to.
pub struct TestRelay {
    pub resolver: ModelResolver,
    pub credentials: Arc<FakeCredentials>,
    pub events: Arc<RecordingSink>,
    pub notifier: Arc<ScriptedNotifier>,
}

impl TestRelay {
    pub fn new(config: &AppConfig, credentials: FakeCredentials) -> Self {
        Self::with_notifier(config, credentials, ScriptedNotifier::dismissing())
    }

    pub fn with_notifier(
        config: &AppConfig,
        credentials: FakeCredentials,
        notifier: ScriptedNotifier,
    ) -> Self {
        let credentials = Arc::new(credentials);
        let events = Arc::new(RecordingSink::new());
        let notifier = Arc::new(notifier);
        let resolver = ModelResolver::from_config(
            config,
            credentials.clone(),
            events.clone(),
            notifier.clone(),
        )
        .expect("failed to build resolver");
        Self {
            resolver,
            credentials,
            events,
            notifier,
        }
    }

    pub fn fetch(&self) -> &Arc<AuthenticatedFetch> {
        self.resolver.cache().fetch()
    }
}
