#![deny(unsafe_code)]

//! Shared test utilities for the llmrelay workspace.
//!
//! Fakes for the host-side collaborators (credential store, session state
//! machine, notification UI), a config builder, and a harness that wires them
//! into a real [`ModelResolver`](llmrelay_core::ModelResolver).
//!
//! ```toml
//! [dev-dependencies]
//! llmrelay-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod fakes;
pub mod harness;
pub mod tracing_setup;

pub use config::{TestConfigBuilder, TestConfigFile};
pub use fakes::{
    FakeCredentials, FakeFailure, NotifierResponse, RecordingSink, ScriptedNotifier, ShownWarning,
};
pub use harness::TestRelay;
pub use tracing_setup::init_test_tracing;
