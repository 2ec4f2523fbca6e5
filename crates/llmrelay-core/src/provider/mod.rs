//! Provider handles and model clients.
//!
//! A [`ProviderHandle`] is a backend plus the way auth material reaches it:
//!
//! | Login method      | Transport                                   |
//! |-------------------|---------------------------------------------|
//! | `EnterpriseProxy` | [`AuthenticatedFetch`] (bearer + refresh)   |
//! | `DirectApiKey`    | `x-api-key` header                          |
//! | `CloudIam`        | SigV4-signed Bedrock runtime calls          |
//!
//! Binding a handle to a concrete model id yields a [`ModelClient`].

pub mod cache;
pub mod sigv4;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use llmrelay_config::RelayConfig;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Url};
use serde_json::Value;
use tracing::debug;

use crate::credentials::{CloudCredentials, LoginMethod};
use crate::relay::{AuthenticatedFetch, RelayError, RelayRequest, RelayResponse};
use crate::secrets::SecretValue;

pub use cache::{DirectApiSettings, ProviderCacheState};
pub use sigv4::SigV4Signer;

/// `anthropic_version` Bedrock expects in the request body.
pub const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");
const ANTHROPIC_VERSION: HeaderName = HeaderName::from_static("anthropic-version");

/// Build the shared HTTP client from the `[relay]` section.
pub fn http_client(config: &RelayConfig) -> Result<Client, RelayError> {
    let mut builder = Client::builder();
    if let Some(secs) = config.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder.build()?)
}

/// Bedrock runtime endpoint for a region, unless overridden.
pub fn bedrock_endpoint(region: &str, endpoint_override: Option<&str>) -> String {
    match endpoint_override {
        Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
        None => format!("https://bedrock-runtime.{region}.amazonaws.com"),
    }
}

enum Transport {
    Relay(Arc<AuthenticatedFetch>),
    ApiKey {
        client: Client,
        api_key: SecretValue,
        version: String,
    },
    SigV4 {
        client: Client,
        signer: SigV4Signer,
    },
    Inert,
}

impl Transport {
    fn kind(&self) -> &'static str {
        match self {
            Self::Relay(_) => "relay",
            Self::ApiKey { .. } => "api_key",
            Self::SigV4 { .. } => "sigv4",
            Self::Inert => "inert",
        }
    }
}

/// A configured backend for one login method.
pub struct ProviderHandle {
    login_method: LoginMethod,
    base_url: String,
    transport: Transport,
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("login_method", &self.login_method)
            .field("base_url", &self.base_url)
            .field("transport", &self.transport.kind())
            .finish()
    }
}

impl ProviderHandle {
    /// Enterprise proxy handle; every call goes through `fetch`.
    pub fn relay(base_url: impl Into<String>, fetch: Arc<AuthenticatedFetch>) -> Self {
        Self {
            login_method: LoginMethod::EnterpriseProxy,
            base_url: trim_base(base_url.into()),
            transport: Transport::Relay(fetch),
        }
    }

    /// Direct Anthropic API handle carrying the user's key.
    pub fn api_key(
        client: Client,
        base_url: impl Into<String>,
        api_key: SecretValue,
        version: impl Into<String>,
    ) -> Self {
        Self {
            login_method: LoginMethod::DirectApiKey,
            base_url: trim_base(base_url.into()),
            transport: Transport::ApiKey {
                client,
                api_key,
                version: version.into(),
            },
        }
    }

    /// Bedrock runtime handle signing with `credentials`.
    pub fn bedrock(
        client: Client,
        endpoint_override: Option<&str>,
        credentials: CloudCredentials,
    ) -> Self {
        let base_url = bedrock_endpoint(&credentials.region, endpoint_override);
        Self {
            login_method: LoginMethod::CloudIam,
            base_url,
            transport: Transport::SigV4 {
                client,
                signer: SigV4Signer::bedrock(credentials),
            },
        }
    }

    /// Handle that records a login method but cannot send.
    pub fn placeholder(login_method: LoginMethod) -> Self {
        Self {
            login_method,
            base_url: String::new(),
            transport: Transport::Inert,
        }
    }

    pub fn login_method(&self) -> LoginMethod {
        self.login_method
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.transport, Transport::Inert)
    }

    pub fn model(self: &Arc<Self>, model_id: impl Into<String>) -> ModelClient {
        ModelClient {
            handle: Arc::clone(self),
            model_id: model_id.into(),
        }
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// A provider handle bound to a concrete model id.
#[derive(Debug, Clone)]
pub struct ModelClient {
    handle: Arc<ProviderHandle>,
    model_id: String,
}

impl ModelClient {
    pub fn handle(&self) -> &Arc<ProviderHandle> {
        &self.handle
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// URL requests for this model are sent to.
    pub fn endpoint(&self) -> String {
        match self.handle.transport {
            Transport::SigV4 { .. } => format!(
                "{}/model/{}/invoke",
                self.handle.base_url,
                sigv4::uri_encode(&self.model_id)
            ),
            _ => format!("{}/messages", self.handle.base_url),
        }
    }

    /// Body as sent on the wire: the model id for Messages APIs, the
    /// Bedrock `anthropic_version` for the runtime (which takes the model
    /// from the path).
    fn wire_body(&self, mut body: Value) -> Value {
        if let Some(object) = body.as_object_mut() {
            match self.handle.transport {
                Transport::SigV4 { .. } => {
                    object.remove("model");
                    object
                        .entry("anthropic_version")
                        .or_insert_with(|| Value::String(BEDROCK_ANTHROPIC_VERSION.to_string()));
                }
                _ => {
                    object.insert("model".to_string(), Value::String(self.model_id.clone()));
                }
            }
        }
        body
    }

    /// POST an opaque JSON payload to the model. The response is returned
    /// as-is; only the enterprise transport interprets auth and quota
    /// statuses.
    pub async fn send(&self, body: Value) -> Result<RelayResponse, RelayError> {
        let endpoint = self.endpoint();
        let body = self.wire_body(body);
        debug!(
            login_method = %self.handle.login_method,
            model = %self.model_id,
            %endpoint,
            "sending model request"
        );

        match &self.handle.transport {
            Transport::Relay(fetch) => fetch.fetch(RelayRequest::post_json(endpoint, &body)?).await,
            Transport::ApiKey {
                client,
                api_key,
                version,
            } => {
                let mut key = HeaderValue::from_str(api_key.expose()).map_err(|_| {
                    RelayError::Configuration("API key is not a valid header value".to_string())
                })?;
                key.set_sensitive(true);
                let version = HeaderValue::from_str(version).map_err(|_| {
                    RelayError::Configuration("backend.anthropic_version is not valid".to_string())
                })?;
                Ok(client
                    .post(endpoint)
                    .header(X_API_KEY, key)
                    .header(ANTHROPIC_VERSION, version)
                    .header(CONTENT_TYPE, "application/json")
                    .body(serde_json::to_vec(&body)?)
                    .send()
                    .await?)
            }
            Transport::SigV4 { client, signer } => {
                let url = Url::parse(&endpoint)
                    .map_err(|e| RelayError::Signing(format!("invalid endpoint {endpoint}: {e}")))?;
                let payload = serde_json::to_vec(&body)?;
                let mut headers = HeaderMap::new();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
                let auth = signer.sign(&Method::POST, &url, &headers, &payload)?;
                headers.extend(auth);
                Ok(client.post(url).headers(headers).body(payload).send().await?)
            }
            Transport::Inert => Err(RelayError::Configuration(format!(
                "{} placeholder handle cannot send requests",
                self.handle.login_method
            ))),
        }
    }

    /// Send and decode a successful JSON response. Non-success statuses
    /// become [`RelayError::Transport`].
    pub async fn complete(&self, body: Value) -> Result<Value, RelayError> {
        let response = self.send(body).await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn bedrock_handle() -> Arc<ProviderHandle> {
        let creds = CloudCredentials::new("eu-west-1", "AKID", "secret", None);
        Arc::new(ProviderHandle::bedrock(Client::new(), None, creds))
    }

    #[test]
    fn test_bedrock_endpoint() {
        assert_eq!(
            bedrock_endpoint("eu-west-1", None),
            "https://bedrock-runtime.eu-west-1.amazonaws.com"
        );
        assert_eq!(
            bedrock_endpoint("eu-west-1", Some("http://localhost:9000/")),
            "http://localhost:9000"
        );
    }

    #[test]
    fn test_bedrock_model_endpoint_encodes_id() {
        let client = bedrock_handle().model("eu.anthropic.claude-3-5-haiku-20241022-v1:0");
        assert_eq!(
            client.endpoint(),
            "https://bedrock-runtime.eu-west-1.amazonaws.com/model/eu.anthropic.claude-3-5-haiku-20241022-v1%3A0/invoke"
        );
    }

    #[test]
    fn test_api_key_endpoint_and_body() {
        let handle = Arc::new(ProviderHandle::api_key(
            Client::new(),
            "https://api.anthropic.com/v1/",
            SecretValue::new("sk"),
            "2023-06-01",
        ));
        let client = handle.model("claude-haiku-4-5");
        assert_eq!(client.endpoint(), "https://api.anthropic.com/v1/messages");

        let body = client.wire_body(json!({"max_tokens": 16, "model": "other"}));
        assert_eq!(body, json!({"max_tokens": 16, "model": "claude-haiku-4-5"}));
    }

    #[test]
    fn test_bedrock_body_drops_model() {
        let client = bedrock_handle().model("us.anthropic.x");
        let body = client.wire_body(json!({"model": "claude-haiku-4-5", "max_tokens": 8}));
        assert_eq!(
            body,
            json!({"max_tokens": 8, "anthropic_version": "bedrock-2023-05-31"})
        );
    }

    #[test]
    fn test_debug_hides_credentials() {
        let handle = ProviderHandle::api_key(
            Client::new(),
            "https://api.anthropic.com/v1",
            SecretValue::new("sk-very-secret"),
            "2023-06-01",
        );
        let debug = format!("{handle:?}");
        assert!(debug.contains("api_key"));
        assert!(!debug.contains("sk-very-secret"));
    }

    #[tokio::test]
    async fn test_placeholder_cannot_send() {
        let handle = Arc::new(ProviderHandle::placeholder(LoginMethod::CloudIam));
        assert!(handle.is_placeholder());
        let err = handle.model("m").send(json!({})).await.unwrap_err();
        assert!(matches!(err, RelayError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unencodable_api_key_is_a_configuration_error() {
        let handle = Arc::new(ProviderHandle::api_key(
            Client::new(),
            "http://127.0.0.1:9",
            SecretValue::new("sk\nbroken"),
            "2023-06-01",
        ));
        let err = handle.model("claude-haiku-4-5").send(json!({})).await.unwrap_err();
        assert!(matches!(err, RelayError::Configuration(_)), "{err}");
    }

    #[test]
    fn test_http_client_with_timeout() {
        let config = RelayConfig {
            request_timeout_secs: Some(5),
            ..RelayConfig::default()
        };
        assert!(http_client(&config).is_ok());
    }
}
