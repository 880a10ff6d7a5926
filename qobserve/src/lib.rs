//! Production-friendly observability hooks for chat turns, plus log setup.
//!
//! ```rust
//! use qobserve::{MetricsChatHooks, SafeChatHooks, TracingChatHooks};
//!
//! let _hooks = SafeChatHooks::new(TracingChatHooks);
//! let _metrics = MetricsChatHooks;
//! ```

mod composite;
mod metrics_hooks;
mod safe_hooks;
mod subscriber;
mod tracing_hooks;

pub use composite::CompositeChatHooks;
pub use metrics_hooks::MetricsChatHooks;
pub use safe_hooks::SafeChatHooks;
pub use subscriber::{LogFormat, SubscriberError, init_tracing};
pub use tracing_hooks::TracingChatHooks;

pub mod prelude {
    pub use crate::{
        CompositeChatHooks, LogFormat, MetricsChatHooks, SafeChatHooks, TracingChatHooks,
        init_tracing,
    };
}
