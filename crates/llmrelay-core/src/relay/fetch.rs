use std::sync::Arc;

use llmrelay_config::AppConfig;
use reqwest::header::{
    AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue, USER_AGENT,
};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::{RelayError, RelayRequest, RelayResponse, cache_breakpoints};
use crate::credentials::{CredentialError, CredentialProvider, LoginMethod};
use crate::notify::PromptDispatcher;
use crate::secrets::SecretValue;
use crate::session::{SessionEvent, SessionEventSink};

const X_PRODUCT: HeaderName = HeaderName::from_static("x-product");
const X_USAGE_CONTEXT: HeaderName = HeaderName::from_static("x-usage-context");
const X_METADATA: HeaderName = HeaderName::from_static("x-metadata");

/// Identification headers attached to every relayed request.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    user_agent: HeaderValue,
    product: HeaderValue,
    usage_context: HeaderValue,
    metadata: HeaderValue,
}

impl RelaySettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, RelayError> {
        Ok(Self {
            user_agent: header_value("relay.user_agent", &config.relay.user_agent)?,
            product: header_value("relay.product", &config.relay.product)?,
            usage_context: header_value("relay.usage_context", &config.relay.usage_context)?,
            metadata: header_value("relay.metadata", &config.metadata_header())?,
        })
    }

    fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, self.user_agent.clone());
        headers.insert(X_PRODUCT, self.product.clone());
        headers.insert(X_USAGE_CONTEXT, self.usage_context.clone());
        headers.insert(X_METADATA, self.metadata.clone());
    }
}

fn header_value(field: &str, value: &str) -> Result<HeaderValue, RelayError> {
    HeaderValue::from_str(value)
        .map_err(|_| RelayError::Configuration(format!("{field} is not a valid header value")))
}

fn set_bearer(headers: &mut HeaderMap, token: &SecretValue) -> Result<(), InvalidHeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    Ok(())
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// The authenticated fetch used by enterprise-proxy provider handles.
pub struct AuthenticatedFetch {
    client: Client,
    settings: RelaySettings,
    credentials: Arc<dyn CredentialProvider>,
    events: Arc<dyn SessionEventSink>,
    prompts: PromptDispatcher,
}

impl AuthenticatedFetch {
    pub fn new(
        client: Client,
        settings: RelaySettings,
        credentials: Arc<dyn CredentialProvider>,
        events: Arc<dyn SessionEventSink>,
        prompts: PromptDispatcher,
    ) -> Self {
        Self {
            client,
            settings,
            credentials,
            events,
            prompts,
        }
    }

    pub fn prompts(&self) -> &PromptDispatcher {
        &self.prompts
    }

    /// Send `request` with relay headers and credentials attached.
    ///
    /// Enterprise-proxy 401/403 responses trigger exactly one token refresh
    /// and resend. A 429 always fails with
    /// [`RelayError::UsageQuotaExceeded`]. Every other response is returned
    /// unchanged, whatever its status.
    pub async fn fetch(&self, mut request: RelayRequest) -> Result<RelayResponse, RelayError> {
        let token = self.lookup(self.credentials.access_token().await)?;
        let login_method = self.lookup(self.credentials.login_method().await)?;

        self.settings.apply(&mut request.headers);
        if login_method == LoginMethod::EnterpriseProxy
            && let Some(token) = &token
            && set_bearer(&mut request.headers, token).is_err()
        {
            return Err(self.end_enterprise_session("malformed access token".to_string()));
        }

        let messages_call = request.is_messages_call();
        if messages_call {
            log_cache_breakpoints(&request);
        }

        let response = self.send(&request).await?;
        let status = response.status();
        if messages_call && !status.is_success() {
            error!(status = status.as_u16(), url = %request.url, "messages call failed");
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(self.quota_exceeded(response).await);
        }

        if is_auth_failure(status) {
            info!(status = status.as_u16(), %login_method, "authentication rejected");
            return match login_method {
                LoginMethod::EnterpriseProxy => self.refresh_and_retry(request).await,
                LoginMethod::DirectApiKey => {
                    Err(self.silent_logout("API key is invalid or expired"))
                }
                LoginMethod::CloudIam => {
                    Err(self.silent_logout("cloud credentials are invalid or expired"))
                }
            };
        }

        Ok(response)
    }

    async fn send(&self, request: &RelayRequest) -> Result<RelayResponse, RelayError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        Ok(builder.send().await?)
    }

    /// Refresh the token and resend once. Any failure on this path ends the
    /// session the same way.
    async fn refresh_and_retry(
        &self,
        mut request: RelayRequest,
    ) -> Result<RelayResponse, RelayError> {
        info!("refreshing access token and retrying once");
        match self.resend_with_fresh_token(&mut request).await {
            Ok(response) if !is_auth_failure(response.status()) => {
                debug!(status = response.status().as_u16(), "retry after refresh succeeded");
                Ok(response)
            }
            Ok(response) => Err(self.end_enterprise_session(format!(
                "rejected after token refresh (HTTP {})",
                response.status().as_u16()
            ))),
            Err(reason) => Err(self.end_enterprise_session(reason)),
        }
    }

    async fn resend_with_fresh_token(
        &self,
        request: &mut RelayRequest,
    ) -> Result<RelayResponse, String> {
        let token = self
            .credentials
            .refreshed_access_token()
            .await
            .map_err(|e| format!("token refresh failed: {e}"))?;
        set_bearer(&mut request.headers, &token)
            .map_err(|_| "malformed refreshed access token".to_string())?;
        self.send(request)
            .await
            .map_err(|e| format!("retry failed: {e}"))
    }

    fn end_enterprise_session(&self, reason: String) -> RelayError {
        warn!(%reason, "enterprise session ended");
        self.events.send_event(SessionEvent::SilentLogout);
        // Detached: the prompt permit lives in the spawned task.
        let _ = self.prompts.relogin();
        RelayError::AuthenticationFailed(reason)
    }

    fn silent_logout(&self, reason: &str) -> RelayError {
        warn!(reason, "silent logout");
        self.events.send_event(SessionEvent::SilentLogout);
        RelayError::AuthenticationFailed(reason.to_string())
    }

    async fn quota_exceeded(&self, response: RelayResponse) -> RelayError {
        info!("usage quota exceeded (429)");
        let detail = match response.json::<Value>().await {
            Ok(body) => match body.get("detail") {
                Some(Value::String(detail)) => detail.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            },
            Err(e) => {
                error!(error = %e, "failed to parse 429 response body");
                String::new()
            }
        };
        self.events.send_event(SessionEvent::UsageExceeded);
        self.prompts.usage_exceeded(&detail);
        RelayError::UsageQuotaExceeded {
            status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            detail,
        }
    }

    /// Map a credential failure. An expired token ends the session.
    fn lookup<T>(&self, result: Result<T, CredentialError>) -> Result<T, RelayError> {
        match result {
            Ok(value) => Ok(value),
            Err(CredentialError::TokenExpired) => Err(self.silent_logout("token expired")),
            Err(e) => Err(RelayError::CredentialLookup(e.to_string())),
        }
    }
}

fn log_cache_breakpoints(request: &RelayRequest) {
    let Some(body) = &request.body else {
        return;
    };
    if let Some((count, marks)) = cache_breakpoints(body) {
        debug!(
            messages = count,
            breakpoints = ?marks,
            "prompt cache breakpoints"
        );
    }
}
