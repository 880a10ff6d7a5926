//! Chat service for non-streaming and streaming turn orchestration.
//!
//! A streamed turn moves through `START -> STREAMING -> DONE | FAILED`:
//! the session is resolved and announced, fragments are forwarded as they
//! arrive, and only a fully received answer is persisted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_stream::stream;
use futures_util::StreamExt;
use qprovider::{ChatProvider, CompletionStream};

use crate::{
    ChatError, ChatEvent, ChatEventStream, ChatRuntimeHooks, ChatTurnOutcome, ChatTurnRequest,
    ConversationStore, ConversationTurn, InMemoryConversationStore, NoopChatRuntimeHooks,
    SessionManager, TurnInfo,
};

#[derive(Clone)]
pub struct ChatService {
    provider: Arc<dyn ChatProvider>,
    sessions: SessionManager,
    hooks: Arc<dyn ChatRuntimeHooks>,
}

pub struct ChatServiceBuilder {
    provider: Arc<dyn ChatProvider>,
    sessions: Option<SessionManager>,
    hooks: Arc<dyn ChatRuntimeHooks>,
}

impl ChatServiceBuilder {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            provider,
            sessions: None,
            hooks: Arc::new(NoopChatRuntimeHooks),
        }
    }

    /// Uses `store` behind a session manager with default settings.
    pub fn store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.sessions = Some(SessionManager::new(store));
        self
    }

    pub fn sessions(mut self, sessions: SessionManager) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn ChatRuntimeHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn build(self) -> ChatService {
        let sessions = self
            .sessions
            .unwrap_or_else(|| SessionManager::new(Arc::new(InMemoryConversationStore::new())));

        ChatService {
            provider: self.provider,
            sessions,
            hooks: self.hooks,
        }
    }
}

impl ChatService {
    pub fn new(provider: Arc<dyn ChatProvider>, sessions: SessionManager) -> Self {
        Self::builder(provider).sessions(sessions).build()
    }

    pub fn builder(provider: Arc<dyn ChatProvider>) -> ChatServiceBuilder {
        ChatServiceBuilder::new(provider)
    }

    pub fn provider(&self) -> &Arc<dyn ChatProvider> {
        &self.provider
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub async fn run_turn(&self, request: ChatTurnRequest) -> Result<ChatTurnOutcome, ChatError> {
        let started = Instant::now();
        let mut info = self.turn_info(&request, false);

        let result = self.execute_turn(request, &mut info).await;
        match &result {
            Ok(outcome) => self.report_success(&info, &outcome.turn, started.elapsed()),
            Err(error) => self.report_failure(&info, error, started.elapsed()),
        }

        result
    }

    async fn execute_turn(
        &self,
        request: ChatTurnRequest,
        info: &mut TurnInfo,
    ) -> Result<ChatTurnOutcome, ChatError> {
        let ChatTurnRequest {
            owner_id,
            question,
            options,
        } = request;
        validate_question(&question)?;

        let session = self.sessions.resolve_session(&owner_id).await?;
        info.session_id = Some(session.id.clone());

        let history = self.sessions.build_history(&session.id, &question).await?;
        self.report_start(info, history.len());

        let result = self.provider.complete(history, options).await?;
        let turn = self
            .sessions
            .append_turn(&session.id, question, result.content)
            .await?;

        Ok(ChatTurnOutcome {
            turn,
            session_id: session.id,
        })
    }

    /// Streams one turn as chat events.
    ///
    /// Failures surface as a final [`ChatEvent::Error`]; the stream itself
    /// never errors. Dropping it before the terminal event cancels the
    /// provider stream and reports the cancellation to the hooks.
    pub fn stream_turn(&self, request: ChatTurnRequest) -> ChatEventStream {
        let service = self.clone();

        Box::pin(stream! {
            let started = Instant::now();
            let mut info = service.turn_info(&request, true);
            let ChatTurnRequest { owner_id, question, options } = request;

            if let Err(error) = validate_question(&question) {
                yield service.fail(&info, error, started);
                return;
            }

            let session = match service.sessions.resolve_session(&owner_id).await {
                Ok(session) => session,
                Err(error) => {
                    yield service.fail(&info, error, started);
                    return;
                }
            };
            info.session_id = Some(session.id.clone());
            yield ChatEvent::Session { session_id: session.id.clone() };

            let history = match service.sessions.build_history(&session.id, &question).await {
                Ok(history) => history,
                Err(error) => {
                    yield service.fail(&info, error, started);
                    return;
                }
            };
            service.report_start(&mut info, history.len());

            let upstream = match service.provider.complete_stream(history, options).await {
                Ok(upstream) => upstream,
                Err(error) => {
                    yield service.fail(&info, ChatError::from(error), started);
                    return;
                }
            };

            let mut guard = StreamGuard::new(upstream, service.hooks.clone(), info.clone(), started);
            let mut answer = String::new();
            let mut failure = None;

            while let Some(item) = guard.upstream.next().await {
                match item {
                    Ok(fragment) => {
                        answer.push_str(&fragment);
                        guard.fragments += 1;
                        yield ChatEvent::Message { fragment };
                    }
                    Err(error) => {
                        failure = Some(ChatError::from(error));
                        break;
                    }
                }
            }

            if let Some(error) = failure {
                guard.disarm();
                tracing::debug!(
                    phase = "chat",
                    event = "partial_answer_discarded",
                    session_id = %session.id,
                    fragments = guard.fragments,
                    discarded_chars = answer.chars().count() as u64
                );
                yield service.fail(&info, error, started);
                return;
            }

            match service.sessions.append_turn(&session.id, question, answer).await {
                Ok(turn) => {
                    guard.disarm();
                    service.report_success(&info, &turn, started.elapsed());
                    yield ChatEvent::Done { turn_id: turn.id, session_id: session.id };
                }
                Err(error) => {
                    guard.disarm();
                    yield service.fail(&info, error, started);
                }
            }
        })
    }

    fn turn_info(&self, request: &ChatTurnRequest, streaming: bool) -> TurnInfo {
        TurnInfo {
            owner_id: request.owner_id.clone(),
            session_id: None,
            provider: self.provider.id(),
            model: request.options.model_override().map(str::to_string),
            streaming,
            history_len: 0,
        }
    }

    fn report_start(&self, info: &mut TurnInfo, history_len: usize) {
        info.history_len = history_len;
        self.hooks.on_turn_start(info);
    }

    fn report_success(&self, info: &TurnInfo, turn: &ConversationTurn, elapsed: Duration) {
        self.hooks.on_turn_success(info, turn, elapsed);
    }

    fn report_failure(&self, info: &TurnInfo, error: &ChatError, elapsed: Duration) {
        self.hooks.on_turn_failure(info, error, elapsed);
    }

    fn fail(&self, info: &TurnInfo, error: ChatError, started: Instant) -> ChatEvent {
        self.report_failure(info, &error, started.elapsed());
        ChatEvent::Error(error)
    }
}

fn validate_question(question: &str) -> Result<(), ChatError> {
    if question.trim().is_empty() {
        return Err(ChatError::invalid_request("question must not be empty"));
    }
    Ok(())
}

/// Owns the provider stream while fragments are forwarded. Dropped while
/// armed, it cancels the upstream and reports the cancellation.
struct StreamGuard<'a> {
    upstream: CompletionStream<'a>,
    hooks: Arc<dyn ChatRuntimeHooks>,
    info: TurnInfo,
    started: Instant,
    fragments: usize,
    armed: bool,
}

impl<'a> StreamGuard<'a> {
    fn new(
        upstream: CompletionStream<'a>,
        hooks: Arc<dyn ChatRuntimeHooks>,
        info: TurnInfo,
        started: Instant,
    ) -> Self {
        Self {
            upstream,
            hooks,
            info,
            started,
            fragments: 0,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StreamGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        self.upstream.cancel();
        let elapsed = self.started.elapsed();
        tracing::debug!(
            phase = "chat",
            event = "upstream_cancelled",
            session_id = self.info.session_id.as_ref().map(|id| id.as_str()),
            provider = %self.info.provider,
            fragments = self.fragments as u64,
            elapsed_ms = elapsed.as_millis() as u64
        );
        self.hooks
            .on_stream_cancelled(&self.info, self.fragments, elapsed);
    }
}
