//! Provider cache and model resolution.

use std::sync::Arc;

use httpmock::prelude::*;
use llmrelay_core::{CloudCredentials, LogicalModel, LoginMethod, RelayError};
use llmrelay_test_utils::{FakeCredentials, TestConfigBuilder, TestConfigFile, TestRelay};
use pretty_assertions::assert_eq;
use serde_json::json;

fn cloud_credentials(region: &str) -> CloudCredentials {
    CloudCredentials::new(region, "AKIDEXAMPLE", "secret", Some("session".to_string()))
}

#[tokio::test]
async fn enterprise_handle_is_cached() {
    let config = TestConfigBuilder::new().build();
    let credentials = FakeCredentials::new(LoginMethod::EnterpriseProxy)
        .with_base_url("https://proxy.example.com/llm");
    let relay = TestRelay::new(&config, credentials);
    let cache = relay.resolver.cache();

    let a = cache.get_handle().await.unwrap();
    let b = cache.get_handle().await.unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.login_method(), LoginMethod::EnterpriseProxy);
    assert_eq!(a.base_url(), "https://proxy.example.com/llm");
    assert_eq!(cache.cached_method().await, Some(LoginMethod::EnterpriseProxy));
}

#[tokio::test]
async fn login_method_change_rebuilds_handle() {
    let config = TestConfigBuilder::new().build();
    let credentials = FakeCredentials::new(LoginMethod::EnterpriseProxy)
        .with_base_url("https://proxy.example.com")
        .with_access_token("sk-ant-key");
    let relay = TestRelay::new(&config, credentials);
    let cache = relay.resolver.cache();

    let enterprise = cache.get_handle().await.unwrap();
    relay.credentials.set_login_method(LoginMethod::DirectApiKey);
    let direct = cache.get_handle().await.unwrap();

    assert!(!Arc::ptr_eq(&enterprise, &direct));
    assert_eq!(direct.login_method(), LoginMethod::DirectApiKey);
    assert_eq!(direct.base_url(), "https://api.anthropic.com/v1");
    assert_eq!(cache.cached_method().await, Some(LoginMethod::DirectApiKey));

    relay.credentials.set_login_method(LoginMethod::EnterpriseProxy);
    let enterprise_again = cache.get_handle().await.unwrap();
    assert!(!Arc::ptr_eq(&enterprise, &enterprise_again));
}

#[tokio::test]
async fn invalidate_clears_cache() {
    let config = TestConfigBuilder::new().build();
    let credentials = FakeCredentials::new(LoginMethod::DirectApiKey).with_access_token("sk");
    let relay = TestRelay::new(&config, credentials);
    let cache = relay.resolver.cache();

    let first = cache.get_handle().await.unwrap();
    cache.invalidate().await;
    assert_eq!(cache.cached_method().await, None);

    let second = cache.get_handle().await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn enterprise_without_base_url_is_configuration_error() {
    let config = TestConfigBuilder::new().build();
    let relay = TestRelay::new(&config, FakeCredentials::new(LoginMethod::EnterpriseProxy));

    let err = relay.resolver.cache().get_handle().await.unwrap_err();
    assert!(matches!(err, RelayError::Configuration(_)), "{err}");

    let err = relay
        .resolver
        .model_client(LogicalModel::Haiku)
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Configuration(_)), "{err}");
}

#[tokio::test]
async fn direct_api_key_without_key_fails() {
    let config = TestConfigBuilder::new().build();
    let relay = TestRelay::new(&config, FakeCredentials::new(LoginMethod::DirectApiKey));

    let err = relay.resolver.cache().get_handle().await.unwrap_err();
    assert_eq!(err.to_string(), "authentication failed: unable to get API key");
    assert_eq!(relay.resolver.cache().cached_method().await, None);
}

#[tokio::test]
async fn cloud_iam_cache_entry_is_a_placeholder() {
    let config = TestConfigBuilder::new().build();
    let relay = TestRelay::new(&config, FakeCredentials::new(LoginMethod::CloudIam));

    let handle = relay.resolver.cache().get_handle().await.unwrap();
    assert!(handle.is_placeholder());
    assert!(handle.model("anything").send(json!({})).await.is_err());
}

#[tokio::test]
async fn cloud_iam_handles_are_never_reused() {
    let config = TestConfigBuilder::new().build();
    let credentials = FakeCredentials::new(LoginMethod::CloudIam)
        .with_cloud_credentials(cloud_credentials("eu-west-1"));
    let relay = TestRelay::new(&config, credentials);

    let a = relay.resolver.model_client(LogicalModel::Haiku).await.unwrap();
    let b = relay.resolver.model_client(LogicalModel::Haiku).await.unwrap();

    assert!(!Arc::ptr_eq(a.handle(), b.handle()));
    assert_eq!(relay.credentials.cloud_calls(), 2);
    assert_eq!(a.model_id(), "eu.anthropic.claude-3-5-haiku-20241022-v1:0");
    assert_eq!(
        a.handle().base_url(),
        "https://bedrock-runtime.eu-west-1.amazonaws.com"
    );
    assert_eq!(relay.resolver.cache().cached_method().await, None);
}

#[tokio::test]
async fn cloud_iam_unknown_region_uses_us_prefix() {
    let config = TestConfigBuilder::new().build();
    let credentials = FakeCredentials::new(LoginMethod::CloudIam)
        .with_cloud_credentials(cloud_credentials("il-central-1"));
    let relay = TestRelay::new(&config, credentials);

    let client = relay.resolver.model_client(LogicalModel::Sonnet).await.unwrap();
    assert_eq!(client.model_id(), "us.anthropic.claude-sonnet-4-20250514-v1:0");
}

#[tokio::test]
async fn cloud_iam_without_credentials_fails() {
    let config = TestConfigBuilder::new().build();
    let relay = TestRelay::new(&config, FakeCredentials::new(LoginMethod::CloudIam));

    let err = relay
        .resolver
        .model_client(LogicalModel::Haiku)
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::CredentialLookup(_)), "{err}");
}

#[tokio::test]
async fn cloud_iam_missing_mapping_fails() {
    let config = TestConfigBuilder::new()
        .without_bedrock_models()
        .bedrock_model("claude-sonnet-4-6", "anthropic.claude-sonnet-4-20250514-v1:0")
        .build();
    let credentials = FakeCredentials::new(LoginMethod::CloudIam)
        .with_cloud_credentials(cloud_credentials("us-east-1"));
    let relay = TestRelay::new(&config, credentials);

    let err = relay
        .resolver
        .model_client(LogicalModel::Haiku)
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Configuration(_)), "{err}");
    assert!(relay.resolver.model_client(LogicalModel::Sonnet).await.is_ok());
}

#[tokio::test]
async fn cached_backends_use_native_ids() {
    let config = TestConfigBuilder::new().build();
    let credentials = FakeCredentials::new(LoginMethod::EnterpriseProxy)
        .with_base_url("https://proxy.example.com");
    let relay = TestRelay::new(&config, credentials);

    let haiku = relay.resolver.model_client(LogicalModel::Haiku).await.unwrap();
    let sonnet = relay.resolver.model_client(LogicalModel::Sonnet).await.unwrap();

    assert_eq!(haiku.model_id(), "claude-haiku-4-5");
    assert_eq!(sonnet.model_id(), "claude-sonnet-4-6");
    assert!(Arc::ptr_eq(haiku.handle(), sonnet.handle()));
}

#[tokio::test]
async fn cache_control_per_backend() {
    let config = TestConfigBuilder::new().build();
    let relay = TestRelay::new(&config, FakeCredentials::new(LoginMethod::CloudIam));

    assert_eq!(
        relay.resolver.cache_control().await.unwrap(),
        json!({"bedrock": {"cacheControl": {"type": "ephemeral"}}})
    );

    relay.credentials.set_login_method(LoginMethod::DirectApiKey);
    assert_eq!(
        relay.resolver.cache_control().await.unwrap(),
        json!({"anthropic": {"cacheControl": {"type": "ephemeral"}}})
    );
}

#[tokio::test]
async fn enterprise_model_client_sends_through_relay() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/messages")
            .header("authorization", "Bearer tok")
            .header_exists("x-usage-context")
            .body_includes(r#""model":"claude-sonnet-4-6""#);
        then.status(200).json_body(json!({"content": [{"type": "text", "text": "hi"}]}));
    });

    let config = TestConfigBuilder::new().build();
    let credentials = FakeCredentials::new(LoginMethod::EnterpriseProxy)
        .with_access_token("tok")
        .with_base_url(&server.base_url());
    let relay = TestRelay::new(&config, credentials);

    let client = relay.resolver.model_client(LogicalModel::Sonnet).await.unwrap();
    let body = client
        .complete(json!({"max_tokens": 16, "messages": [{"role": "user", "content": "hello"}]}))
        .await
        .unwrap();

    assert_eq!(body["content"][0]["text"], "hi");
    mock.assert_calls(1);
}

#[tokio::test]
async fn direct_model_client_sends_api_key() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/messages")
            .header("x-api-key", "sk-ant-key")
            .header("anthropic-version", "2023-06-01")
            .header_missing("authorization")
            .body_includes(r#""model":"claude-haiku-4-5""#);
        then.status(200).json_body(json!({"id": "msg"}));
    });

    let config = TestConfigBuilder::new()
        .anthropic_base_url(&format!("{}/v1", server.base_url()))
        .build();
    let credentials = FakeCredentials::new(LoginMethod::DirectApiKey).with_access_token("sk-ant-key");
    let relay = TestRelay::new(&config, credentials);

    let client = relay.resolver.model_client(LogicalModel::Haiku).await.unwrap();
    client.complete(json!({"max_tokens": 8})).await.unwrap();
    mock.assert_calls(1);
}

#[tokio::test]
async fn bedrock_model_client_signs_requests() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .header_exists("authorization")
            .header_exists("x-amz-date")
            .header("x-amz-security-token", "session")
            .body_includes(r#""anthropic_version":"bedrock-2023-05-31""#);
        then.status(200).json_body(json!({"id": "msg"}));
    });

    let config = TestConfigBuilder::new()
        .bedrock_endpoint(&server.base_url())
        .build();
    let credentials = FakeCredentials::new(LoginMethod::CloudIam)
        .with_cloud_credentials(cloud_credentials("eu-west-1"));
    let relay = TestRelay::new(&config, credentials);

    let client = relay.resolver.model_client(LogicalModel::Haiku).await.unwrap();
    assert!(client.endpoint().ends_with("v1%3A0/invoke"));
    client.complete(json!({"max_tokens": 8})).await.unwrap();
    mock.assert_calls(1);
}

#[tokio::test]
async fn direct_api_key_errors_are_not_reclassified() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST);
        then.status(401);
    });

    let config = TestConfigBuilder::new()
        .anthropic_base_url(&server.base_url())
        .build();
    let credentials = FakeCredentials::new(LoginMethod::DirectApiKey).with_access_token("sk");
    let relay = TestRelay::new(&config, credentials);

    let client = relay.resolver.model_client(LogicalModel::Haiku).await.unwrap();
    let err = client.complete(json!({})).await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert!(relay.events.events().is_empty());
}

#[tokio::test]
async fn resolver_from_config_file() {
    let file = TestConfigFile::with_toml(
        r#"
[backend]
proxy_base_url = "https://proxy.example.com"

[models.bedrock]
"claude-haiku-4-5" = "anthropic.custom-haiku"
"#,
    )
    .await;
    let config = file.load().await;
    let credentials = FakeCredentials::new(LoginMethod::CloudIam)
        .with_cloud_credentials(cloud_credentials("ap-northeast-1"));
    let relay = TestRelay::new(&config, credentials);

    let client = relay.resolver.model_client(LogicalModel::Haiku).await.unwrap();
    assert_eq!(client.model_id(), "ap.anthropic.custom-haiku");
}
