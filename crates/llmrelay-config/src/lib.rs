#![deny(unsafe_code)]

//! Configuration loading and validation for llmrelay.
//!
//! Loads TOML configuration files and validates them before the relay is
//! constructed. [`AppConfig`] is the central configuration structure; the
//! relay reads backend endpoints, outgoing header tags, the Bedrock model-id
//! mapping, and the environment variable names used by the bundled
//! credential provider from it.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Login methods accepted by `credentials.login_method`.
pub const LOGIN_METHODS: [&str; 3] = ["enterprise_proxy", "direct_api_key", "cloud_iam"];

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend endpoints.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Headers and transport settings for relayed requests.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Model identifier mappings.
    #[serde(default)]
    pub models: ModelsConfig,

    /// Where the bundled credential provider finds its material.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend endpoint configuration.
///
/// ## TOML Example
///
/// ```toml
/// [backend]
/// proxy_base_url = "https://copilot.example.com/llm/v1"
/// anthropic_base_url = "https://api.anthropic.com/v1"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the enterprise proxy. Required when the enterprise login
    /// method is active; checked when the provider handle is built.
    #[serde(default)]
    pub proxy_base_url: Option<String>,

    /// Base URL of the direct Anthropic API.
    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,

    /// Value of the `anthropic-version` header sent with direct API-key calls.
    #[serde(default = "default_anthropic_version")]
    pub anthropic_version: String,

    /// Overrides `https://bedrock-runtime.<region>.amazonaws.com`.
    #[serde(default)]
    pub bedrock_endpoint: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            proxy_base_url: None,
            anthropic_base_url: default_anthropic_base_url(),
            anthropic_version: default_anthropic_version(),
            bedrock_endpoint: None,
        }
    }
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com/v1".to_string()
}

fn default_anthropic_version() -> String {
    "2023-06-01".to_string()
}

/// Settings applied to every relayed request.
///
/// ## TOML Example
///
/// ```toml
/// [relay]
/// user_agent = "MyEditor-Plugin"
/// product = "mi"
/// usage_context = "copilot"
///
/// [relay.metadata]
/// isCloudEditor = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Client identifier sent as `User-Agent`.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Product tag sent as `x-product`.
    #[serde(default = "default_product")]
    pub product: String,

    /// Usage tag sent as `x-usage-context`.
    #[serde(default = "default_usage_context")]
    pub usage_context: String,

    /// Free-form metadata, serialized as JSON into `x-metadata`.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// Whole-request timeout for the HTTP client. Unset means no timeout.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            product: default_product(),
            usage_context: default_usage_context(),
            metadata: BTreeMap::new(),
            request_timeout_secs: None,
        }
    }
}

fn default_user_agent() -> String {
    format!("llmrelay/{}", env!("CARGO_PKG_VERSION"))
}

fn default_product() -> String {
    "llmrelay".to_string()
}

fn default_usage_context() -> String {
    "default".to_string()
}

/// Model identifier mappings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Native model id → Bedrock model id (without the regional prefix).
    #[serde(default = "default_bedrock_models")]
    pub bedrock: HashMap<String, String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            bedrock: default_bedrock_models(),
        }
    }
}

fn default_bedrock_models() -> HashMap<String, String> {
    HashMap::from([
        (
            "claude-haiku-4-5".to_string(),
            "anthropic.claude-3-5-haiku-20241022-v1:0".to_string(),
        ),
        (
            "claude-sonnet-4-6".to_string(),
            "anthropic.claude-sonnet-4-20250514-v1:0".to_string(),
        ),
    ])
}

/// Environment variable names read by the bundled credential provider.
///
/// Hosts that embed the relay usually supply their own provider; these
/// settings only matter for the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Active login method: one of [`LOGIN_METHODS`].
    #[serde(default = "default_login_method")]
    pub login_method: String,

    /// Variable holding the access token (enterprise) or API key (direct).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Variable re-read when the enterprise token must be refreshed.
    #[serde(default = "default_refresh_token_env")]
    pub refresh_token_env: String,

    #[serde(default = "default_aws_region_env")]
    pub aws_region_env: String,

    #[serde(default = "default_aws_access_key_id_env")]
    pub aws_access_key_id_env: String,

    #[serde(default = "default_aws_secret_access_key_env")]
    pub aws_secret_access_key_env: String,

    #[serde(default = "default_aws_session_token_env")]
    pub aws_session_token_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            login_method: default_login_method(),
            token_env: default_token_env(),
            refresh_token_env: default_refresh_token_env(),
            aws_region_env: default_aws_region_env(),
            aws_access_key_id_env: default_aws_access_key_id_env(),
            aws_secret_access_key_env: default_aws_secret_access_key_env(),
            aws_session_token_env: default_aws_session_token_env(),
        }
    }
}

fn default_login_method() -> String {
    "direct_api_key".to_string()
}

fn default_token_env() -> String {
    "LLMRELAY_ACCESS_TOKEN".to_string()
}

fn default_refresh_token_env() -> String {
    "LLMRELAY_REFRESHED_TOKEN".to_string()
}

fn default_aws_region_env() -> String {
    "AWS_REGION".to_string()
}

fn default_aws_access_key_id_env() -> String {
    "AWS_ACCESS_KEY_ID".to_string()
}

fn default_aws_secret_access_key_env() -> String {
    "AWS_SECRET_ACCESS_KEY".to_string()
}

fn default_aws_session_token_env() -> String {
    "AWS_SESSION_TOKEN".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref url) = self.backend.proxy_base_url {
            validate_url("backend.proxy_base_url", url)?;
        }
        validate_url("backend.anthropic_base_url", &self.backend.anthropic_base_url)?;
        if let Some(ref url) = self.backend.bedrock_endpoint {
            validate_url("backend.bedrock_endpoint", url)?;
        }
        if self.backend.anthropic_version.is_empty() {
            return Err(ConfigError::Validation(
                "backend.anthropic_version must not be empty".to_string(),
            ));
        }

        if self.relay.user_agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "relay.user_agent must not be empty".to_string(),
            ));
        }
        if self.relay.request_timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "relay.request_timeout_secs must be at least 1 when set".to_string(),
            ));
        }

        for (model, mapped) in &self.models.bedrock {
            if mapped.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "models.bedrock.{model} must not be empty"
                )));
            }
        }

        let creds = &self.credentials;
        if !LOGIN_METHODS.contains(&creds.login_method.as_str()) {
            return Err(ConfigError::Validation(format!(
                "credentials.login_method must be one of {:?}, got {:?}",
                LOGIN_METHODS, creds.login_method
            )));
        }
        let env_names = [
            ("token_env", &creds.token_env),
            ("refresh_token_env", &creds.refresh_token_env),
            ("aws_region_env", &creds.aws_region_env),
            ("aws_access_key_id_env", &creds.aws_access_key_id_env),
            ("aws_secret_access_key_env", &creds.aws_secret_access_key_env),
            ("aws_session_token_env", &creds.aws_session_token_env),
        ];
        for (field, value) in env_names {
            if value.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "credentials.{field} must not be empty"
                )));
            }
        }

        Ok(())
    }

    /// Serialize the `[relay.metadata]` table into the `x-metadata` header value.
    pub fn metadata_header(&self) -> String {
        serde_json::to_string(&self.relay.metadata).unwrap_or_else(|_| "{}".to_string())
    }
}

fn validate_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if url.is_empty() {
        return Err(ConfigError::Validation(format!("{field} must not be empty")));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://, got {url:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.backend.anthropic_base_url, "https://api.anthropic.com/v1");
        assert!(config.backend.proxy_base_url.is_none());
        assert!(config.relay.user_agent.starts_with("llmrelay/"));
        assert_eq!(config.credentials.login_method, "direct_api_key");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.models.bedrock.len(), 2);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.backend.anthropic_version, "2023-06-01");
        assert_eq!(
            config.models.bedrock.get("claude-haiku-4-5").unwrap(),
            "anthropic.claude-3-5-haiku-20241022-v1:0"
        );
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [backend]
            proxy_base_url = "https://proxy.example.com/llm/v1"
            bedrock_endpoint = "http://127.0.0.1:4566"

            [relay]
            user_agent = "Editor-Plugin"
            product = "mi"
            usage_context = "copilot"
            request_timeout_secs = 30

            [relay.metadata]
            isCloudEditor = true

            [models.bedrock]
            claude-haiku-4-5 = "anthropic.custom-haiku"

            [credentials]
            login_method = "enterprise_proxy"
            token_env = "MY_TOKEN"

            [logging]
            level = "debug"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(
            config.backend.proxy_base_url.as_deref(),
            Some("https://proxy.example.com/llm/v1")
        );
        assert_eq!(config.relay.user_agent, "Editor-Plugin");
        assert_eq!(config.relay.product, "mi");
        assert_eq!(config.relay.request_timeout_secs, Some(30));
        assert_eq!(config.models.bedrock.len(), 1);
        assert_eq!(config.credentials.login_method, "enterprise_proxy");
        assert_eq!(config.credentials.token_env, "MY_TOKEN");
        assert_eq!(config.credentials.refresh_token_env, "LLMRELAY_REFRESHED_TOKEN");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.metadata_header(), r#"{"isCloudEditor":true}"#);
    }

    #[test]
    fn test_metadata_header_defaults_to_empty_object() {
        assert_eq!(AppConfig::default().metadata_header(), "{}");
    }

    #[test]
    fn test_validation_rejects_relative_proxy_url() {
        let toml = r#"
            [backend]
            proxy_base_url = "proxy.example.com"
        "#;
        let err = AppConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("backend.proxy_base_url"));
    }

    #[test]
    fn test_validation_rejects_empty_anthropic_url() {
        let toml = r#"
            [backend]
            anthropic_base_url = ""
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_login_method() {
        let toml = r#"
            [credentials]
            login_method = "oauth"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_empty_env_name() {
        let toml = r#"
            [credentials]
            aws_region_env = ""
        "#;
        let err = AppConfig::parse(toml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation error: credentials.aws_region_env must not be empty"
        );
    }

    #[test]
    fn test_validation_rejects_empty_bedrock_mapping() {
        let toml = r#"
            [models.bedrock]
            claude-sonnet-4-6 = " "
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let toml = r#"
            [relay]
            request_timeout_secs = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_blank_user_agent() {
        let toml = r#"
            [relay]
            user_agent = "  "
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    // ── Async file-based loading ──────────────────────────────────────

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("llmrelay.toml");
        tokio::fs::write(
            &path,
            b"[backend]\nproxy_base_url = \"http://localhost:8080/v1\"\n",
        )
        .await
        .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(
            config.backend.proxy_base_url.as_deref(),
            Some("http://localhost:8080/v1")
        );
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = AppConfig::load(Path::new("/nonexistent/file.toml")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[tokio::test]
    async fn test_load_invalid_toml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        tokio::fs::write(&path, b"not valid toml [[[").await.unwrap();

        let result = AppConfig::load(&path).await;
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }
}
