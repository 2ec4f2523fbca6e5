//! Logical model → callable model client.
//!
//! Cloud IAM sessions get a freshly signed Bedrock handle per call (STS
//! credentials are short-lived, so nothing is cached). Every other login
//! method goes through the provider cache.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use llmrelay_config::AppConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::credentials::{CredentialProvider, LoginMethod};
use crate::notify::{Notifier, PromptDispatcher, PromptGuard};
use crate::provider::{
    DirectApiSettings, ModelClient, ProviderCacheState, ProviderHandle, http_client,
};
use crate::region::regional_prefix;
use crate::relay::{AuthenticatedFetch, RelayError, RelaySettings};
use crate::session::SessionEventSink;

/// The models callers ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalModel {
    /// Small, fast model.
    Haiku,
    /// Large, capable model.
    Sonnet,
}

impl LogicalModel {
    pub const ALL: [LogicalModel; 2] = [Self::Haiku, Self::Sonnet];

    /// Model id on the Anthropic-native backends.
    pub fn native_id(self) -> &'static str {
        match self {
            Self::Haiku => "claude-haiku-4-5",
            Self::Sonnet => "claude-sonnet-4-6",
        }
    }
}

impl fmt::Display for LogicalModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Haiku => "haiku",
            Self::Sonnet => "sonnet",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown model: {0} (expected haiku or sonnet)")]
pub struct ParseModelError(String);

impl FromStr for LogicalModel {
    type Err = ParseModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "haiku" | "small" | "claude-haiku-4-5" => Ok(Self::Haiku),
            "sonnet" | "large" | "claude-sonnet-4-6" => Ok(Self::Sonnet),
            _ => Err(ParseModelError(s.to_string())),
        }
    }
}

/// Bedrock endpoint override and native → Bedrock model id mapping.
#[derive(Debug, Clone, Default)]
pub struct BedrockSettings {
    pub endpoint: Option<String>,
    pub models: HashMap<String, String>,
}

impl BedrockSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            endpoint: config.backend.bedrock_endpoint.clone(),
            models: config.models.bedrock.clone(),
        }
    }

    /// `<prefix>.<mapped id>` for the given region.
    pub fn model_id(&self, model: LogicalModel, region: &str) -> Result<String, RelayError> {
        let mapped = self.models.get(model.native_id()).ok_or_else(|| {
            RelayError::Configuration(format!(
                "no Bedrock model mapping for {}",
                model.native_id()
            ))
        })?;
        Ok(format!("{}.{mapped}", regional_prefix(region)))
    }
}

pub struct ModelResolver {
    credentials: Arc<dyn CredentialProvider>,
    cache: Arc<ProviderCacheState>,
    client: Client,
    bedrock: BedrockSettings,
}

impl ModelResolver {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        cache: Arc<ProviderCacheState>,
        client: Client,
        bedrock: BedrockSettings,
    ) -> Self {
        Self {
            credentials,
            cache,
            client,
            bedrock,
        }
    }

    /// Wire up a resolver, its cache and its authenticated fetch from config.
    ///
    /// Each call creates an independent prompt guard and cache.
    pub fn from_config(
        config: &AppConfig,
        credentials: Arc<dyn CredentialProvider>,
        events: Arc<dyn SessionEventSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, RelayError> {
        let client = http_client(&config.relay)?;
        let prompts = PromptDispatcher::new(PromptGuard::new(), notifier, Arc::clone(&events));
        let fetch = Arc::new(AuthenticatedFetch::new(
            client.clone(),
            RelaySettings::from_config(config)?,
            Arc::clone(&credentials),
            events,
            prompts,
        ));
        let cache = Arc::new(ProviderCacheState::new(
            Arc::clone(&credentials),
            fetch,
            client.clone(),
            DirectApiSettings::from_config(config),
        ));
        Ok(Self::new(
            credentials,
            cache,
            client,
            BedrockSettings::from_config(config),
        ))
    }

    pub fn cache(&self) -> &Arc<ProviderCacheState> {
        &self.cache
    }

    /// A client for `model` on the backend of the active login method.
    pub async fn model_client(&self, model: LogicalModel) -> Result<ModelClient, RelayError> {
        let login_method = self.credentials.login_method().await?;
        if login_method == LoginMethod::CloudIam {
            let credentials = self.credentials.cloud_credentials().await?.ok_or_else(|| {
                RelayError::CredentialLookup("unable to get cloud credentials".to_string())
            })?;
            let model_id = self.bedrock.model_id(model, &credentials.region)?;
            let handle = Arc::new(ProviderHandle::bedrock(
                self.client.clone(),
                self.bedrock.endpoint.as_deref(),
                credentials,
            ));
            debug!(%model, %model_id, endpoint = handle.base_url(), "resolved Bedrock model");
            return Ok(handle.model(model_id));
        }

        let handle = self.cache.get_handle().await?;
        debug!(%model, %login_method, "resolved cached provider model");
        Ok(handle.model(model.native_id()))
    }

    /// Provider options that mark a message as a prompt-cache breakpoint.
    pub async fn cache_control(&self) -> Result<Value, RelayError> {
        let provider = match self.credentials.login_method().await? {
            LoginMethod::CloudIam => "bedrock",
            LoginMethod::EnterpriseProxy | LoginMethod::DirectApiKey => "anthropic",
        };
        Ok(json!({ provider: { "cacheControl": { "type": "ephemeral" } } }))
    }
}
