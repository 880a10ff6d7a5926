//! Tracing-based observability hooks for chat turns.
//!
//! ```rust
//! use qchat::ChatRuntimeHooks;
//! use qobserve::TracingChatHooks;
//!
//! fn accepts_chat_hooks(_hooks: &dyn ChatRuntimeHooks) {}
//!
//! let hooks = TracingChatHooks;
//! accepts_chat_hooks(&hooks);
//! ```

use std::time::Duration;

use qchat::{ChatError, ChatRuntimeHooks, ConversationTurn, TurnInfo};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingChatHooks;

fn session_label(turn: &TurnInfo) -> &str {
    turn.session_id
        .as_ref()
        .map(|id| id.as_str())
        .unwrap_or("unresolved")
}

impl ChatRuntimeHooks for TracingChatHooks {
    fn on_turn_start(&self, turn: &TurnInfo) {
        tracing::info!(
            phase = "chat",
            event = "turn_start",
            owner_id = %turn.owner_id,
            session_id = session_label(turn),
            provider = %turn.provider,
            model = turn.model_label(),
            streaming = turn.streaming,
            history_len = turn.history_len
        );
    }

    fn on_turn_success(&self, turn: &TurnInfo, stored: &ConversationTurn, elapsed: Duration) {
        tracing::info!(
            phase = "chat",
            event = "turn_success",
            owner_id = %turn.owner_id,
            session_id = %stored.session_id,
            turn_id = %stored.id,
            provider = %turn.provider,
            model = turn.model_label(),
            streaming = turn.streaming,
            answer_chars = stored.answer.chars().count(),
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_turn_failure(&self, turn: &TurnInfo, error: &ChatError, elapsed: Duration) {
        let provider_detail = error
            .provider_error
            .as_ref()
            .and_then(|canonical| canonical.original_detail.as_deref());
        tracing::error!(
            phase = "chat",
            event = "turn_failure",
            owner_id = %turn.owner_id,
            session_id = session_label(turn),
            provider = %turn.provider,
            model = turn.model_label(),
            streaming = turn.streaming,
            elapsed_ms = elapsed.as_millis() as u64,
            error_kind = error.kind.as_str(),
            retryable = error.is_retryable(),
            provider_detail,
            error = %error
        );
    }

    fn on_stream_cancelled(&self, turn: &TurnInfo, fragments: usize, elapsed: Duration) {
        tracing::warn!(
            phase = "chat",
            event = "stream_cancelled",
            owner_id = %turn.owner_id,
            session_id = session_label(turn),
            provider = %turn.provider,
            fragments,
            elapsed_ms = elapsed.as_millis() as u64
        );
    }
}
