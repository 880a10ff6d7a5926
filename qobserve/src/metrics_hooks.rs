//! Metrics-based observability hooks for chat turns.

use std::time::Duration;

use qchat::{ChatError, ChatRuntimeHooks, ConversationTurn, TurnInfo};

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsChatHooks;

fn streaming_label(turn: &TurnInfo) -> &'static str {
    if turn.streaming { "true" } else { "false" }
}

impl ChatRuntimeHooks for MetricsChatHooks {
    fn on_turn_start(&self, turn: &TurnInfo) {
        metrics::counter!(
            "quill_chat_turn_start_total",
            "provider" => turn.provider.to_string(),
            "streaming" => streaming_label(turn)
        )
        .increment(1);
        metrics::histogram!(
            "quill_chat_history_messages",
            "provider" => turn.provider.to_string()
        )
        .record(turn.history_len as f64);
    }

    fn on_turn_success(&self, turn: &TurnInfo, _stored: &ConversationTurn, elapsed: Duration) {
        metrics::counter!(
            "quill_chat_turn_success_total",
            "provider" => turn.provider.to_string(),
            "streaming" => streaming_label(turn)
        )
        .increment(1);
        metrics::histogram!(
            "quill_chat_turn_duration_seconds",
            "provider" => turn.provider.to_string(),
            "streaming" => streaming_label(turn),
            "outcome" => "success"
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_turn_failure(&self, turn: &TurnInfo, error: &ChatError, elapsed: Duration) {
        let kind = error
            .provider_error
            .as_ref()
            .map(|canonical| canonical.kind.as_str())
            .unwrap_or(error.kind.as_str());

        metrics::counter!(
            "quill_chat_turn_failure_total",
            "provider" => turn.provider.to_string(),
            "streaming" => streaming_label(turn),
            "kind" => kind
        )
        .increment(1);
        metrics::histogram!(
            "quill_chat_turn_duration_seconds",
            "provider" => turn.provider.to_string(),
            "streaming" => streaming_label(turn),
            "outcome" => "failure"
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_stream_cancelled(&self, turn: &TurnInfo, _fragments: usize, _elapsed: Duration) {
        metrics::counter!(
            "quill_chat_stream_cancelled_total",
            "provider" => turn.provider.to_string()
        )
        .increment(1);
    }
}
