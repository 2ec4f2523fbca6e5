//! Configuration builders for tests.

use std::path::{Path, PathBuf};

use llmrelay_config::AppConfig;
use tempfile::TempDir;

/// Fluent builder for [`AppConfig`] in tests.
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .proxy_base_url(&server.base_url())
///     .metadata("workspace", "ws-1")
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn proxy_base_url(mut self, url: &str) -> Self {
        self.config.backend.proxy_base_url = Some(url.to_string());
        self
    }

    pub fn anthropic_base_url(mut self, url: &str) -> Self {
        self.config.backend.anthropic_base_url = url.to_string();
        self
    }

    pub fn bedrock_endpoint(mut self, url: &str) -> Self {
        self.config.backend.bedrock_endpoint = Some(url.to_string());
        self
    }

    pub fn bedrock_model(mut self, native_id: &str, bedrock_id: &str) -> Self {
        self.config
            .models
            .bedrock
            .insert(native_id.to_string(), bedrock_id.to_string());
        self
    }

    pub fn without_bedrock_models(mut self) -> Self {
        self.config.models.bedrock.clear();
        self
    }

    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.config.relay.user_agent = user_agent.to_string();
        self
    }

    pub fn product(mut self, product: &str) -> Self {
        self.config.relay.product = product.to_string();
        self
    }

    pub fn metadata(mut self, key: &str, value: &str) -> Self {
        self.config
            .relay
            .metadata
            .insert(key.to_string(), value.into());
        self
    }

    pub fn login_method(mut self, method: &str) -> Self {
        self.config.credentials.login_method = method.to_string();
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A config file in a temp directory, deleted on drop.
pub struct TestConfigFile {
    path: PathBuf,
    _dir: TempDir,
}

impl TestConfigFile {
    pub async fn with_toml(content: &str) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let path = dir.path().join("llmrelay.toml");
        tokio::fs::write(&path, content)
            .await
            .expect("failed to write test config");
        Self { path, _dir: dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> AppConfig {
        AppConfig::load(&self.path)
            .await
            .expect("failed to load test config")
    }
}
