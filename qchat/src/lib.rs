//! Conversation orchestration over chat providers.
//!
//! Groups turns into sessions by owner and inactivity, replays history to the
//! provider, and streams answers as [`ChatEvent`]s.
//!
//! ```rust
//! use std::sync::Arc;
//! use qchat::{ChatService, InMemoryConversationStore};
//! use qprovider::ChatProvider;
//! use qprovider::adapters::mock::MockProvider;
//!
//! let service = ChatService::builder(Arc::new(MockProvider::instant()))
//!     .store(Arc::new(InMemoryConversationStore::new()))
//!     .build();
//! assert_eq!(service.provider().default_model(), "mock-model");
//! ```

mod error;
mod gateway;
mod hooks;
mod service;
mod session;
mod store;
mod types;
mod wire;

pub mod prelude {
    pub use crate::{
        Admission, AdmissionControl, AllowAll, ChatError, ChatErrorKind, ChatEvent,
        ChatEventStream, ChatGateway, ChatRuntimeHooks, ChatService, ChatServiceBuilder,
        ChatTurnOutcome, ChatTurnPayload, ChatTurnRequest, ChatTurnResponse, ConversationSession,
        ConversationStore, ConversationTurn, CurrentUser, ErrorResponse, FixedWindowAdmission,
        InMemoryConversationStore, NoopChatRuntimeHooks, SessionConfig, SessionManager,
    };
    pub use qcommon::{OwnerId, SessionId, TurnId};
}

pub use error::{ChatError, ChatErrorKind};
pub use gateway::{
    Admission, AdmissionControl, AllowAll, ChatGateway, CurrentUser, FixedWindowAdmission,
    GatewayReply, SseStream,
};
pub use hooks::{ChatRuntimeHooks, NoopChatRuntimeHooks, TurnInfo};
pub use service::{ChatService, ChatServiceBuilder};
pub use session::{SessionConfig, SessionManager};
pub use store::{ChatFuture, ConversationStore, InMemoryConversationStore};
pub use types::{
    ChatEvent, ChatEventStream, ChatTurnOutcome, ChatTurnRequest, ConversationSession,
    ConversationTurn,
};
pub use wire::{
    ChatTurnPayload, ChatTurnResponse, ErrorBody, ErrorResponse, SessionSummary, event_data,
    render_sse, status_for,
};
pub use qcommon::{OwnerId, SessionId, TurnId};
