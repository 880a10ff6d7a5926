use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use qchat::{ChatError, ChatRuntimeHooks, ConversationTurn, TurnInfo};

/// Swallows panics raised by the wrapped hooks so observers never take down a turn.
pub struct SafeChatHooks<H> {
    inner: H,
}

impl<H> SafeChatHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H> ChatRuntimeHooks for SafeChatHooks<H>
where
    H: ChatRuntimeHooks,
{
    fn on_turn_start(&self, turn: &TurnInfo) {
        let _ = catch_unwind(AssertUnwindSafe(|| self.inner.on_turn_start(turn)));
    }

    fn on_turn_success(&self, turn: &TurnInfo, stored: &ConversationTurn, elapsed: Duration) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_turn_success(turn, stored, elapsed)
        }));
    }

    fn on_turn_failure(&self, turn: &TurnInfo, error: &ChatError, elapsed: Duration) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_turn_failure(turn, error, elapsed)
        }));
    }

    fn on_stream_cancelled(&self, turn: &TurnInfo, fragments: usize, elapsed: Duration) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_stream_cancelled(turn, fragments, elapsed)
        }));
    }
}
