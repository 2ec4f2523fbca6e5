//! Tests for the llmrelay-macros derives.
//!
//! These live here because a proc-macro crate can't use its own macros in
//! integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use llmrelay_core::CloudCredentials;
use llmrelay_macros::{Redact, SecureZeroize};
use zeroize::Zeroize;

// ── Redact ────────────────────────────────────────────────────────

#[derive(Redact)]
struct ProxyLogin {
    pub username: String,
    #[redact]
    pub password: String,
    #[redact]
    pub refresh_token: Option<String>,
}

#[test]
fn test_redact_debug_output() {
    let login = ProxyLogin {
        username: "alice".to_string(),
        password: "s3cret".to_string(),
        refresh_token: Some("rt_abc123".to_string()),
    };

    let debug = format!("{login:?}");
    assert!(debug.contains("alice"), "username should be visible");
    assert!(!debug.contains("s3cret"));
    assert!(!debug.contains("rt_abc123"));
    assert!(debug.contains(r#"refresh_token: Some("[REDACTED]")"#));
}

#[test]
fn test_redact_keeps_none_visible() {
    let login = ProxyLogin {
        username: "bob".to_string(),
        password: "pw".to_string(),
        refresh_token: None,
    };
    let debug = format!("{login:?}");
    assert!(debug.contains("refresh_token: None"));
}

#[test]
fn test_cloud_credentials_debug() {
    let creds = CloudCredentials::new(
        "us-east-1",
        "AKIDEXAMPLE",
        "wJalrXUtnFEMI/K7MDENG",
        Some("FwoGZXIvYXdzEXAMPLE".to_string()),
    );
    let debug = format!("{creds:?}");
    assert!(debug.starts_with("CloudCredentials"));
    assert!(debug.contains("AKIDEXAMPLE"));
    assert!(!debug.contains("wJalrXUtnFEMI"));
    assert!(!debug.contains("FwoGZXIvYXdzEXAMPLE"));
}

// ── SecureZeroize ─────────────────────────────────────────────────

/// Records whether it was zeroized.
#[derive(Default)]
struct Probe(Arc<AtomicBool>);

impl Zeroize for Probe {
    fn zeroize(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[derive(SecureZeroize)]
struct SessionSecret {
    pub token: Probe,
    #[no_zeroize]
    pub label: Probe,
}

#[test]
fn test_secure_zeroize_on_drop() {
    let token = Arc::new(AtomicBool::new(false));
    let label = Arc::new(AtomicBool::new(false));
    let secret = SessionSecret {
        token: Probe(Arc::clone(&token)),
        label: Probe(Arc::clone(&label)),
    };

    drop(secret);

    assert!(token.load(Ordering::SeqCst), "token should be zeroized");
    assert!(!label.load(Ordering::SeqCst), "#[no_zeroize] field must be kept");
}

#[test]
fn test_cloud_credentials_clone_survives_drop() {
    let creds = CloudCredentials::new("eu-west-1", "AKID", "secret", None);
    let copy = creds.clone();
    drop(creds);
    assert_eq!(copy.secret_access_key, "secret");
    assert_eq!(copy.region, "eu-west-1");
}
