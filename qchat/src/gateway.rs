//! Transport boundary: admission, request validation and error rendering in
//! front of [`ChatService`].

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use futures_core::Stream;
use futures_util::StreamExt;
use qcommon::{Clock, OwnerId, SessionId, SystemClock};

use crate::store::ChatFuture;
use crate::wire::render_sse;
use crate::{
    ChatError, ChatService, ChatTurnPayload, ChatTurnResponse, ErrorResponse, SessionSummary,
};

/// Authenticated caller as produced by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: OwnerId,
    pub role: String,
}

impl CurrentUser {
    pub fn new(id: impl Into<OwnerId>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Deny { retry_after: Duration },
}

pub trait AdmissionControl: Send + Sync {
    fn check_admission<'a>(&'a self, owner_id: &'a OwnerId) -> ChatFuture<'a, Admission>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AdmissionControl for AllowAll {
    fn check_admission<'a>(&'a self, _owner_id: &'a OwnerId) -> ChatFuture<'a, Admission> {
        Box::pin(async { Admission::Allow })
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: SystemTime,
    count: u32,
}

/// Per-owner fixed-window request limiter.
#[derive(Debug)]
pub struct FixedWindowAdmission {
    limit: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<OwnerId, Window>>,
}

impl FixedWindowAdmission {
    pub const DEFAULT_LIMIT: u32 = 30;
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
    /// Tracked owners above which expired windows are swept on admit.
    pub const PRUNE_THRESHOLD: usize = 1024;

    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            clock: Arc::new(SystemClock),
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn admit(&self, owner_id: &OwnerId) -> Admission {
        let now = self.clock.now();
        let Ok(mut windows) = self.windows.lock() else {
            tracing::error!(phase = "gateway", event = "admission_lock_poisoned");
            return Admission::Allow;
        };

        if windows.len() > Self::PRUNE_THRESHOLD {
            windows.retain(|_, window| {
                now.duration_since(window.started_at).unwrap_or_default() < self.window
            });
        }

        let entry = windows.entry(owner_id.clone()).or_insert(Window {
            started_at: now,
            count: 0,
        });

        let elapsed = now.duration_since(entry.started_at).unwrap_or_default();
        if elapsed >= self.window {
            *entry = Window {
                started_at: now,
                count: 0,
            };
        }

        if entry.count >= self.limit {
            let retry_after = self.window.saturating_sub(elapsed.min(self.window));
            return Admission::Deny { retry_after };
        }

        entry.count += 1;
        Admission::Allow
    }

    /// Owners currently holding a window, expired or not.
    pub fn tracked_owners(&self) -> usize {
        self.windows.lock().map(|windows| windows.len()).unwrap_or_default()
    }
}

impl Default for FixedWindowAdmission {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT, Self::DEFAULT_WINDOW)
    }
}

impl AdmissionControl for FixedWindowAdmission {
    fn check_admission<'a>(&'a self, owner_id: &'a OwnerId) -> ChatFuture<'a, Admission> {
        Box::pin(async move { self.admit(owner_id) })
    }
}

pub type SseStream = Pin<Box<dyn Stream<Item = String> + Send + 'static>>;

pub enum GatewayReply {
    Complete(ChatTurnResponse),
    Stream(SseStream),
}

impl std::fmt::Debug for GatewayReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete(response) => f.debug_tuple("Complete").field(response).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

#[derive(Clone)]
pub struct ChatGateway {
    service: ChatService,
    admission: Arc<dyn AdmissionControl>,
    allowed_models: Vec<String>,
}

impl ChatGateway {
    pub fn new(service: ChatService) -> Self {
        Self {
            service,
            admission: Arc::new(AllowAll),
            allowed_models: Vec::new(),
        }
    }

    pub fn with_admission(mut self, admission: Arc<dyn AdmissionControl>) -> Self {
        self.admission = admission;
        self
    }

    /// Restricts inbound `model` values. Empty means any model.
    pub fn with_allowed_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn service(&self) -> &ChatService {
        &self.service
    }

    /// Dispatches on the payload's `streaming` flag.
    pub async fn handle(
        &self,
        user: &CurrentUser,
        payload: ChatTurnPayload,
    ) -> Result<GatewayReply, ErrorResponse> {
        if payload.streaming {
            self.handle_stream(user, payload)
                .await
                .map(GatewayReply::Stream)
        } else {
            self.handle_turn(user, payload)
                .await
                .map(GatewayReply::Complete)
        }
    }

    pub async fn handle_turn(
        &self,
        user: &CurrentUser,
        payload: ChatTurnPayload,
    ) -> Result<ChatTurnResponse, ErrorResponse> {
        self.admit(user, &payload).await?;

        let outcome = self
            .service
            .run_turn(payload.into_request(user.id.clone()))
            .await
            .map_err(ErrorResponse::from)?;

        Ok(ChatTurnResponse::from(&outcome))
    }

    /// Rejections before the stream starts come back as an error response;
    /// later failures arrive as an `error` frame.
    pub async fn handle_stream(
        &self,
        user: &CurrentUser,
        payload: ChatTurnPayload,
    ) -> Result<SseStream, ErrorResponse> {
        self.admit(user, &payload).await?;

        let events = self
            .service
            .stream_turn(payload.into_request(user.id.clone()));
        Ok(Box::pin(events.map(|event| render_sse(&event))))
    }

    pub async fn session_turns(
        &self,
        user: &CurrentUser,
        session_id: &SessionId,
    ) -> Result<Vec<ChatTurnResponse>, ErrorResponse> {
        let turns = self
            .service
            .sessions()
            .session_turns(&user.id, session_id)
            .await
            .map_err(ErrorResponse::from)?;

        Ok(turns.iter().map(ChatTurnResponse::from).collect())
    }

    pub async fn sessions(&self, user: &CurrentUser) -> Result<Vec<SessionSummary>, ErrorResponse> {
        let sessions = self
            .service
            .sessions()
            .sessions_for_owner(&user.id)
            .await
            .map_err(ErrorResponse::from)?;

        Ok(sessions.iter().map(SessionSummary::from).collect())
    }

    pub async fn delete_session(
        &self,
        user: &CurrentUser,
        session_id: &SessionId,
    ) -> Result<(), ErrorResponse> {
        self.service
            .sessions()
            .delete_session(&user.id, session_id)
            .await
            .map_err(ErrorResponse::from)
    }

    async fn admit(&self, user: &CurrentUser, payload: &ChatTurnPayload) -> Result<(), ErrorResponse> {
        if let Admission::Deny { retry_after } = self.admission.check_admission(&user.id).await {
            tracing::warn!(
                phase = "gateway",
                event = "admission_denied",
                owner_id = %user.id,
                retry_after_ms = retry_after.as_millis() as u64
            );
            return Err(ErrorResponse::from(ChatError::admission_denied(format!(
                "too many requests; retry in {}s",
                retry_after.as_secs().max(1)
            ))));
        }

        self.check_model(payload).map_err(ErrorResponse::from)
    }

    fn check_model(&self, payload: &ChatTurnPayload) -> Result<(), ChatError> {
        let Some(model) = payload
            .model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
        else {
            return Ok(());
        };

        if self.allowed_models.is_empty() || self.allowed_models.iter().any(|m| m == model) {
            return Ok(());
        }

        Err(ChatError::invalid_request(format!(
            "model must be one of: {}",
            self.allowed_models.join(", ")
        )))
    }
}
