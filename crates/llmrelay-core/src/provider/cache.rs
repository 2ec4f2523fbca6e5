//! Provider handle cache.
//!
//! Holds at most one handle, tagged by the login method it was built for.
//! The tag is re-checked against the credential provider on every lookup so a
//! login-method switch transparently rebuilds the handle.

use std::sync::Arc;

use llmrelay_config::AppConfig;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::debug;

use super::ProviderHandle;
use crate::credentials::{CredentialProvider, LoginMethod};
use crate::relay::{AuthenticatedFetch, RelayError};

/// Where direct API-key handles point.
#[derive(Debug, Clone)]
pub struct DirectApiSettings {
    pub base_url: String,
    pub version: String,
}

impl DirectApiSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.backend.anthropic_base_url.clone(),
            version: config.backend.anthropic_version.clone(),
        }
    }
}

pub struct ProviderCacheState {
    credentials: Arc<dyn CredentialProvider>,
    fetch: Arc<AuthenticatedFetch>,
    client: Client,
    direct: DirectApiSettings,
    cached: Mutex<Option<Arc<ProviderHandle>>>,
}

impl ProviderCacheState {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        fetch: Arc<AuthenticatedFetch>,
        client: Client,
        direct: DirectApiSettings,
    ) -> Self {
        Self {
            credentials,
            fetch,
            client,
            direct,
            cached: Mutex::new(None),
        }
    }

    /// The authenticated fetch enterprise handles are built on.
    pub fn fetch(&self) -> &Arc<AuthenticatedFetch> {
        &self.fetch
    }

    /// Handle for the active login method, reusing the cached one when the
    /// method is unchanged.
    pub async fn get_handle(&self) -> Result<Arc<ProviderHandle>, RelayError> {
        let mut cached = self.cached.lock().await;
        let login_method = self.credentials.login_method().await?;

        if let Some(handle) = cached.as_ref()
            && handle.login_method() == login_method
        {
            debug!(%login_method, "provider cache hit");
            return Ok(Arc::clone(handle));
        }

        if let Some(stale) = cached.take() {
            debug!(
                from = %stale.login_method(),
                to = %login_method,
                "login method changed, dropping cached provider"
            );
        }

        let handle = Arc::new(self.build(login_method).await?);
        debug!(%login_method, base_url = handle.base_url(), "provider handle built");
        *cached = Some(Arc::clone(&handle));
        Ok(handle)
    }

    async fn build(&self, login_method: LoginMethod) -> Result<ProviderHandle, RelayError> {
        match login_method {
            LoginMethod::EnterpriseProxy => {
                let base_url = self
                    .credentials
                    .backend_base_url()
                    .filter(|url| !url.trim().is_empty())
                    .ok_or_else(|| {
                        RelayError::Configuration(
                            "enterprise proxy base URL is not configured".to_string(),
                        )
                    })?;
                Ok(ProviderHandle::relay(base_url, Arc::clone(&self.fetch)))
            }
            LoginMethod::DirectApiKey => {
                let api_key = self
                    .credentials
                    .access_token()
                    .await?
                    .filter(|key| !key.is_empty())
                    .ok_or_else(|| {
                        RelayError::AuthenticationFailed("unable to get API key".to_string())
                    })?;
                Ok(ProviderHandle::api_key(
                    self.client.clone(),
                    &self.direct.base_url,
                    api_key,
                    &self.direct.version,
                ))
            }
            LoginMethod::CloudIam => Ok(ProviderHandle::placeholder(LoginMethod::CloudIam)),
        }
    }

    /// Drop the cached handle.
    pub async fn invalidate(&self) {
        if let Some(handle) = self.cached.lock().await.take() {
            debug!(login_method = %handle.login_method(), "provider cache invalidated");
        }
    }

    /// Login method of the cached handle, if any.
    pub async fn cached_method(&self) -> Option<LoginMethod> {
        self.cached
            .lock()
            .await
            .as_ref()
            .map(|handle| handle.login_method())
    }
}
