//! Common imports for most quill applications.

pub use crate::{
    build_provider, build_runtime, build_runtime_from_env, build_runtime_with, init_logging,
    parse_provider_id, question, streaming_question, user,
};
pub use crate::{
    ChatError, ChatEvent, ChatEventStream, ChatGateway, ChatMessage, ChatProvider, ChatService,
    ChatTurnPayload, ChatTurnRequest, ChatTurnResponse, ConversationStore, CurrentUser,
    ErrorResponse, GatewayReply, MemoryBackendConfig, OwnerId, ProviderId, ProviderSettings,
    QuillConfig, RuntimeBundle, RuntimeError, SessionId,
};
