#![deny(unsafe_code)]

//! llmrelay core: an authenticated relay between a host application and its
//! LLM backends.
//!
//! The relay picks a backend and credential source from the active login
//! method, injects auth material, recovers from expired enterprise tokens with
//! a single refresh-and-retry, reports quota exhaustion to the host's session
//! state machine, and caches provider handles across calls.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future, the return type of async trait
/// methods that must stay object safe (`Arc<dyn CredentialProvider>`,
/// `Arc<dyn Notifier>`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Credential provider façade, login methods and cloud credentials.
pub mod credentials;
/// Re-login and quota prompts with in-flight de-duplication.
pub mod notify;
/// Provider handles, model clients, SigV4 signing and the handle cache.
pub mod provider;
/// AWS region → Bedrock inference-profile prefix.
pub mod region;
/// Authenticated fetch, relay errors and request types.
pub mod relay;
/// Logical model resolution.
pub mod resolver;
/// Redacted, zeroize-on-drop secret strings.
pub mod secrets;
/// Session events for the host's state machine.
pub mod session;

pub use credentials::{
    CloudCredentials, CredentialError, CredentialProvider, EnvCredentialProvider, LoginMethod,
};
pub use notify::{Notifier, NotifyError, PromptDispatcher, PromptGuard, PromptPermit};
pub use provider::{ModelClient, ProviderCacheState, ProviderHandle};
pub use region::regional_prefix;
pub use relay::{AuthenticatedFetch, RelayError, RelayRequest, RelayResponse};
pub use resolver::{LogicalModel, ModelResolver};
pub use secrets::SecretValue;
pub use session::{SessionEvent, SessionEventSink};
