//! Unified facade over the quill workspace crates.
//!
//! Applications usually depend on this crate alone. It re-exports the core
//! crates, reads configuration from the environment and wires a provider,
//! a store and observability hooks into a ready [`ChatGateway`].
//!
//! ```rust
//! use quill::{ChatProvider, QuillConfig, build_runtime};
//!
//! let runtime = build_runtime(&QuillConfig::mock()).expect("mock runtime builds");
//! assert_eq!(runtime.provider.default_model(), "mock-model");
//! ```

mod error;

pub mod config;
pub mod prelude;
pub mod providers;
pub mod runtime;
pub mod util;

pub use qchat;
pub use qcommon;
pub use qmemory;
pub use qobserve;
pub use qprovider;

pub use qchat::{
    Admission, AdmissionControl, AllowAll, ChatError, ChatErrorKind, ChatEvent, ChatEventStream,
    ChatGateway, ChatRuntimeHooks, ChatService, ChatServiceBuilder, ChatTurnOutcome,
    ChatTurnPayload, ChatTurnRequest, ChatTurnResponse, ConversationSession, ConversationStore,
    ConversationTurn, CurrentUser, ErrorResponse, FixedWindowAdmission, GatewayReply,
    InMemoryConversationStore, SessionConfig, SessionManager, SessionSummary, render_sse,
};
pub use qcommon::{BoxFuture, Clock, CompletionOptions, OwnerId, SessionId, SystemClock, TurnId};
pub use qmemory::{MemoryBackendConfig, MemoryError, PostgresMemoryBackendConfig};
pub use qobserve::LogFormat;
pub use qprovider::{
    BackendFailure, CanonicalError, CanonicalErrorKind, ChatMessage, ChatProvider,
    CompletionStream, ProviderId, Role, SecretString,
};

pub use config::{
    AdmissionSettings, ApiProviderSettings, MockProviderSettings, ProviderSettings, QuillConfig,
};
pub use error::{ConfigError, ConfigErrorKind, RuntimeError, RuntimeErrorKind};
pub use providers::{build_mock_provider, build_provider};
pub use runtime::{
    RuntimeBundle, admission_control, build_runtime, build_runtime_from_env, build_runtime_with,
    default_hooks, init_logging,
};
pub use util::{parse_provider_id, question, streaming_question, user};
