//! Runtime hook contracts for observing chat turns.
//!
//! ```rust
//! use qchat::{ChatRuntimeHooks, NoopChatRuntimeHooks};
//!
//! fn accepts_hooks(_hooks: &dyn ChatRuntimeHooks) {}
//!
//! let hooks = NoopChatRuntimeHooks;
//! accepts_hooks(&hooks);
//! ```

use std::time::Duration;

use qcommon::{OwnerId, SessionId};
use qprovider::ProviderId;

use crate::{ChatError, ConversationTurn};

/// What a hook knows about the turn it is observing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnInfo {
    pub owner_id: OwnerId,
    /// `None` until the session has been resolved.
    pub session_id: Option<SessionId>,
    pub provider: ProviderId,
    pub model: Option<String>,
    pub streaming: bool,
    pub history_len: usize,
}

impl TurnInfo {
    /// Requested model, or `"default"` when the provider's default applies.
    pub fn model_label(&self) -> &str {
        self.model.as_deref().unwrap_or("default")
    }
}

pub trait ChatRuntimeHooks: Send + Sync {
    fn on_turn_start(&self, _turn: &TurnInfo) {}

    fn on_turn_success(&self, _turn: &TurnInfo, _stored: &ConversationTurn, _elapsed: Duration) {}

    fn on_turn_failure(&self, _turn: &TurnInfo, _error: &ChatError, _elapsed: Duration) {}

    /// The consumer dropped a stream before `done` or `error`.
    fn on_stream_cancelled(&self, _turn: &TurnInfo, _fragments: usize, _elapsed: Duration) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChatRuntimeHooks;

impl ChatRuntimeHooks for NoopChatRuntimeHooks {}
