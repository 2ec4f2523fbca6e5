//! Credential provider façade.
//!
//! The host application owns the credential store and the token-refresh
//! service; the relay reads through [`CredentialProvider`] on every call so a
//! login-method switch or token rotation is picked up without a restart.
//! [`EnvCredentialProvider`] is the bundled implementation used by the CLI.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use llmrelay_config::AppConfig;
use llmrelay_macros::{Redact, SecureZeroize};
use serde::{Deserialize, Serialize};

use crate::BoxFuture;
use crate::secrets::SecretValue;

/// How the user authenticated, which decides backend and credential source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginMethod {
    /// Enterprise proxy with a refreshable bearer token.
    EnterpriseProxy,
    /// Direct Anthropic API with a user-supplied API key.
    DirectApiKey,
    /// AWS Bedrock with short-lived STS credentials.
    CloudIam,
}

impl LoginMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EnterpriseProxy => "enterprise_proxy",
            Self::DirectApiKey => "direct_api_key",
            Self::CloudIam => "cloud_iam",
        }
    }
}

impl fmt::Display for LoginMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown login method: {0}")]
pub struct ParseLoginMethodError(String);

impl FromStr for LoginMethod {
    type Err = ParseLoginMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enterprise_proxy" => Ok(Self::EnterpriseProxy),
            "direct_api_key" => Ok(Self::DirectApiKey),
            "cloud_iam" => Ok(Self::CloudIam),
            other => Err(ParseLoginMethodError(other.to_string())),
        }
    }
}

/// Errors surfaced by a credential provider.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The stored session token has expired; the user must sign in again.
    #[error("token expired")]
    TokenExpired,

    #[error("credential unavailable: {0}")]
    Unavailable(String),

    #[error("credential store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Short-lived cloud session credentials used to sign Bedrock requests.
///
/// Secrets are redacted in `Debug` and cleared on drop.
#[derive(Clone, Redact, SecureZeroize)]
pub struct CloudCredentials {
    #[no_zeroize]
    pub region: String,
    pub access_key_id: String,
    #[redact]
    pub secret_access_key: String,
    #[redact]
    pub session_token: Option<String>,
}

impl CloudCredentials {
    pub fn new(
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            region: region.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }
}

/// Read access to the host's credential store.
///
/// Every method is consulted per relay call; implementations should not
/// cache on the relay's behalf.
pub trait CredentialProvider: Send + Sync {
    /// Current access token, if the user has one.
    fn access_token(&self) -> BoxFuture<'_, Result<Option<SecretValue>, CredentialError>>;

    /// Force a token refresh and return the new access token.
    fn refreshed_access_token(&self) -> BoxFuture<'_, Result<SecretValue, CredentialError>>;

    /// The active login method.
    fn login_method(&self) -> BoxFuture<'_, Result<LoginMethod, CredentialError>>;

    /// Fresh cloud credentials, or `None` when none are available.
    fn cloud_credentials(&self)
    -> BoxFuture<'_, Result<Option<CloudCredentials>, CredentialError>>;

    /// Base URL of the enterprise proxy, when configured.
    fn backend_base_url(&self) -> Option<String>;
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Credential provider backed by environment variables.
///
/// Variable names come from the `[credentials]` config section. Values are
/// re-read on every call, so an external helper that rewrites the refresh
/// variable (or a wrapper script that exports fresh STS credentials) is picked
/// up immediately.
pub struct EnvCredentialProvider {
    login_method: LoginMethod,
    token_env: String,
    refresh_token_env: String,
    aws_region_env: String,
    aws_access_key_id_env: String,
    aws_secret_access_key_env: String,
    aws_session_token_env: String,
    proxy_base_url: Option<String>,
    lookup: EnvLookup,
}

impl EnvCredentialProvider {
    /// Build a provider that reads the process environment.
    pub fn from_config(config: &AppConfig) -> Result<Self, ParseLoginMethodError> {
        Self::with_lookup(config, |name| std::env::var(name).ok())
    }

    /// Build a provider with a custom variable lookup.
    pub fn with_lookup(
        config: &AppConfig,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Result<Self, ParseLoginMethodError> {
        let creds = &config.credentials;
        Ok(Self {
            login_method: creds.login_method.parse()?,
            token_env: creds.token_env.clone(),
            refresh_token_env: creds.refresh_token_env.clone(),
            aws_region_env: creds.aws_region_env.clone(),
            aws_access_key_id_env: creds.aws_access_key_id_env.clone(),
            aws_secret_access_key_env: creds.aws_secret_access_key_env.clone(),
            aws_session_token_env: creds.aws_session_token_env.clone(),
            proxy_base_url: config.backend.proxy_base_url.clone(),
            lookup: Arc::new(lookup),
        })
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.trim().is_empty())
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn access_token(&self) -> BoxFuture<'_, Result<Option<SecretValue>, CredentialError>> {
        Box::pin(async move { Ok(self.var(&self.token_env).map(SecretValue::new)) })
    }

    fn refreshed_access_token(&self) -> BoxFuture<'_, Result<SecretValue, CredentialError>> {
        Box::pin(async move {
            self.var(&self.refresh_token_env)
                .map(SecretValue::new)
                .ok_or(CredentialError::TokenExpired)
        })
    }

    fn login_method(&self) -> BoxFuture<'_, Result<LoginMethod, CredentialError>> {
        Box::pin(async move { Ok(self.login_method) })
    }

    fn cloud_credentials(
        &self,
    ) -> BoxFuture<'_, Result<Option<CloudCredentials>, CredentialError>> {
        Box::pin(async move {
            let (Some(region), Some(key_id), Some(secret)) = (
                self.var(&self.aws_region_env),
                self.var(&self.aws_access_key_id_env),
                self.var(&self.aws_secret_access_key_env),
            ) else {
                return Ok(None);
            };
            Ok(Some(CloudCredentials::new(
                region,
                key_id,
                secret,
                self.var(&self.aws_session_token_env),
            )))
        })
    }

    fn backend_base_url(&self) -> Option<String> {
        self.proxy_base_url.clone()
    }
}
