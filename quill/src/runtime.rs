//! Runtime wiring: provider, store, hooks, service and gateway.

use std::sync::Arc;

use qchat::{
    AdmissionControl, AllowAll, ChatGateway, ChatRuntimeHooks, ChatService, ConversationStore,
    FixedWindowAdmission, SessionConfig, SessionManager,
};
use qmemory::create_conversation_store;
use qobserve::{CompositeChatHooks, MetricsChatHooks, SafeChatHooks, TracingChatHooks};
use qprovider::ChatProvider;

use crate::config::{AdmissionSettings, QuillConfig};
use crate::error::RuntimeError;
use crate::providers::build_provider;

#[derive(Clone)]
pub struct RuntimeBundle {
    pub provider: Arc<dyn ChatProvider>,
    pub store: Arc<dyn ConversationStore>,
    pub service: ChatService,
    pub gateway: ChatGateway,
}

/// Tracing and metrics hooks, each isolated from the other's panics.
pub fn default_hooks() -> Arc<dyn ChatRuntimeHooks> {
    Arc::new(
        CompositeChatHooks::new()
            .with(Arc::new(SafeChatHooks::new(TracingChatHooks)))
            .with(Arc::new(SafeChatHooks::new(MetricsChatHooks))),
    )
}

pub fn admission_control(settings: &AdmissionSettings) -> Arc<dyn AdmissionControl> {
    if settings.limit == 0 {
        return Arc::new(AllowAll);
    }
    Arc::new(FixedWindowAdmission::new(settings.limit, settings.window))
}

pub fn build_runtime(config: &QuillConfig) -> Result<RuntimeBundle, RuntimeError> {
    let provider = build_provider(&config.provider, config.request_timeout)?;
    let store = create_conversation_store(config.storage.clone())?;
    Ok(build_runtime_with(config, provider, store))
}

/// Reads [`QuillConfig`] from the environment and builds the runtime.
pub fn build_runtime_from_env() -> Result<RuntimeBundle, RuntimeError> {
    let config = QuillConfig::from_env()?;
    build_runtime(&config)
}

/// Builds the runtime around an already constructed provider and store.
pub fn build_runtime_with(
    config: &QuillConfig,
    provider: Arc<dyn ChatProvider>,
    store: Arc<dyn ConversationStore>,
) -> RuntimeBundle {
    let sessions = SessionManager::new(Arc::clone(&store)).with_config(
        SessionConfig::default().with_inactivity_window(config.session_timeout),
    );
    let service = ChatService::builder(Arc::clone(&provider))
        .sessions(sessions)
        .hooks(default_hooks())
        .build();
    let gateway = ChatGateway::new(service.clone())
        .with_admission(admission_control(&config.admission))
        .with_allowed_models(config.allowed_models.iter().cloned());

    tracing::info!(
        phase = "runtime",
        event = "runtime_ready",
        provider = %provider.id(),
        model = provider.default_model(),
        session_timeout_secs = config.session_timeout.as_secs(),
        admission_limit = config.admission.limit,
        allowed_models = config.allowed_models.len()
    );

    RuntimeBundle {
        provider,
        store,
        service,
        gateway,
    }
}

/// Installs the global log subscriber in the configured format.
pub fn init_logging(config: &QuillConfig) -> Result<(), RuntimeError> {
    qobserve::init_tracing(config.log_format)?;
    Ok(())
}
