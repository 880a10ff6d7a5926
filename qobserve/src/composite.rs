use std::sync::Arc;
use std::time::Duration;

use qchat::{ChatError, ChatRuntimeHooks, ConversationTurn, TurnInfo};

/// Fans every callback out to a list of hooks, in insertion order.
#[derive(Clone, Default)]
pub struct CompositeChatHooks {
    hooks: Vec<Arc<dyn ChatRuntimeHooks>>,
}

impl CompositeChatHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hooks: Arc<dyn ChatRuntimeHooks>) -> Self {
        self.hooks.push(hooks);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl ChatRuntimeHooks for CompositeChatHooks {
    fn on_turn_start(&self, turn: &TurnInfo) {
        for hooks in &self.hooks {
            hooks.on_turn_start(turn);
        }
    }

    fn on_turn_success(&self, turn: &TurnInfo, stored: &ConversationTurn, elapsed: Duration) {
        for hooks in &self.hooks {
            hooks.on_turn_success(turn, stored, elapsed);
        }
    }

    fn on_turn_failure(&self, turn: &TurnInfo, error: &ChatError, elapsed: Duration) {
        for hooks in &self.hooks {
            hooks.on_turn_failure(turn, error, elapsed);
        }
    }

    fn on_stream_cancelled(&self, turn: &TurnInfo, fragments: usize, elapsed: Duration) {
        for hooks in &self.hooks {
            hooks.on_stream_cancelled(turn, fragments, elapsed);
        }
    }
}
