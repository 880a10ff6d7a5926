mod provider;
mod serde_api;
mod transport;
mod types;

pub use provider::AnthropicProvider;
pub use transport::{AnthropicChunkStream, AnthropicHttpTransport, AnthropicTransport};
pub use types::{
    AnthropicMessage, AnthropicRequest, AnthropicResponse, AnthropicRole, AnthropicStreamChunk,
};
