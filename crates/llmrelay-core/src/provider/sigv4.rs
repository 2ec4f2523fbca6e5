//! AWS Signature Version 4 request signing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use sha2::{Digest, Sha256};

use crate::credentials::CloudCredentials;
use crate::relay::RelayError;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const BEDROCK_SERVICE: &str = "bedrock";
const X_AMZ_DATE: &str = "x-amz-date";
const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

/// Signs requests with one set of cloud credentials.
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    credentials: CloudCredentials,
    service: &'static str,
}

impl SigV4Signer {
    /// Signer for the Bedrock runtime.
    pub fn bedrock(credentials: CloudCredentials) -> Self {
        Self {
            credentials,
            service: BEDROCK_SERVICE,
        }
    }

    pub fn region(&self) -> &str {
        &self.credentials.region
    }

    /// Sign with the current time. See [`SigV4Signer::sign_at`].
    pub fn sign(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<HeaderMap, RelayError> {
        self.sign_at(method, url, headers, body, Utc::now())
    }

    /// Compute the auth headers for a request.
    ///
    /// `headers` are included in the signature along with `host`. The returned
    /// map holds `authorization`, `x-amz-date` and, for session credentials,
    /// `x-amz-security-token`; the caller sends them alongside `headers`.
    pub fn sign_at(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<HeaderMap, RelayError> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let host = url
            .host_str()
            .ok_or_else(|| RelayError::Signing(format!("url has no host: {url}")))?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let mut signed: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in headers {
            let value = value
                .to_str()
                .map_err(|_| RelayError::Signing(format!("header {name} is not visible ASCII")))?
                .trim();
            signed
                .entry(name.as_str().to_string())
                .and_modify(|v| {
                    v.push(',');
                    v.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
        signed.insert("host".to_string(), host);
        signed.insert(X_AMZ_DATE.to_string(), amz_date.clone());
        if let Some(token) = &self.credentials.session_token {
            signed.insert(X_AMZ_SECURITY_TOKEN.to_string(), token.clone());
        }

        let canonical_headers: String = signed
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();
        let signed_headers = signed.keys().cloned().collect::<Vec<_>>().join(";");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method.as_str(),
            canonical_uri(url),
            canonical_query(url),
            canonical_headers,
            signed_headers,
            hex(&Sha256::digest(body)),
        );

        let scope = format!(
            "{date}/{}/{}/aws4_request",
            self.credentials.region, self.service
        );
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex(&Sha256::digest(canonical_request.as_bytes()))
        );

        let key = signing_key(
            &self.credentials.secret_access_key,
            &date,
            &self.credentials.region,
            self.service,
        )?;
        let signature = hex(&hmac(&key, string_to_sign.as_bytes())?);

        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.credentials.access_key_id
        );

        let mut out = HeaderMap::new();
        let mut auth_value = signing_header(&authorization)?;
        auth_value.set_sensitive(true);
        out.insert(AUTHORIZATION, auth_value);
        out.insert(HeaderName::from_static(X_AMZ_DATE), signing_header(&amz_date)?);
        if let Some(token) = &self.credentials.session_token {
            let mut token_value = signing_header(token)?;
            token_value.set_sensitive(true);
            out.insert(HeaderName::from_static(X_AMZ_SECURITY_TOKEN), token_value);
        }
        Ok(out)
    }
}

fn signing_header(value: &str) -> Result<HeaderValue, RelayError> {
    HeaderValue::from_str(value)
        .map_err(|_| RelayError::Signing("signed header value is not valid".to_string()))
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, RelayError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| RelayError::Signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>, RelayError> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Percent-encode everything except the RFC 3986 unreserved set.
pub fn uri_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Each path segment encoded once more. Non-S3 services sign the
/// double-encoded form of an already-encoded path.
fn canonical_uri(url: &Url) -> String {
    let path = url.path();
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }
    path.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k), uri_encode(&v)))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}
