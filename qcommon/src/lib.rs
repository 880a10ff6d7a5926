//! Shared utilities and strongly-typed common values for workspace crates.
//!
//! ```rust
//! use qcommon::{CompletionOptions, OwnerId, SessionId};
//!
//! let session = SessionId::from("session-1");
//! let owner = OwnerId::new("user-1");
//!
//! let options = CompletionOptions::default().with_model("gpt-4o").with_temperature(0.3);
//! assert_eq!(session.as_str(), "session-1");
//! assert_eq!(owner.to_string(), "user-1");
//! assert_eq!(options.model.as_deref(), Some("gpt-4o"));
//! ```

pub mod future {
    //! Shared async future aliases.
    //!
    //! ```rust
    //! use qcommon::BoxFuture;
    //!
    //! fn str_len<'a>(value: &'a str) -> BoxFuture<'a, usize> {
    //!     Box::pin(async move { value.len() })
    //! }
    //!
    //! let _future = str_len("hello");
    //! ```

    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}

pub mod context {
    //! Cross-crate identifier newtypes.
    //!
    //! ```rust
    //! use qcommon::{OwnerId, SessionId, TurnId};
    //!
    //! let session = SessionId::new("session-42");
    //! let turn = TurnId::from("turn-7");
    //! let generated = SessionId::generate();
    //!
    //! assert_eq!(session.to_string(), "session-42");
    //! assert_eq!(turn.as_str(), "turn-7");
    //! assert_ne!(generated, SessionId::generate());
    //! assert_eq!(OwnerId::from("u-1").as_str(), "u-1");
    //! ```

    use std::fmt::{Display, Formatter};

    macro_rules! string_id {
        ($(#[$meta:meta])* $name:ident) => {
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(String);

            impl $name {
                pub fn new(value: impl Into<String>) -> Self {
                    Self(value.into())
                }

                pub fn as_str(&self) -> &str {
                    self.0.as_str()
                }
            }

            impl Display for $name {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<String> for $name {
                fn from(value: String) -> Self {
                    Self(value)
                }
            }

            impl From<&str> for $name {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }
        };
    }

    string_id!(
        /// Identifies one conversation session.
        SessionId
    );
    string_id!(
        /// Identifies one persisted question/answer turn.
        TurnId
    );
    string_id!(
        /// Authenticated user that owns sessions.
        OwnerId
    );

    impl SessionId {
        pub fn generate() -> Self {
            Self(uuid::Uuid::new_v4().to_string())
        }
    }

    impl TurnId {
        pub fn generate() -> Self {
            Self(uuid::Uuid::new_v4().to_string())
        }
    }
}

pub mod model {
    //! Per-call completion overrides shared by request types.
    //!
    //! ```rust
    //! use qcommon::CompletionOptions;
    //!
    //! let options = CompletionOptions::default()
    //!     .with_temperature(0.2)
    //!     .with_max_output_tokens(128);
    //!
    //! assert_eq!(options.model, None);
    //! assert_eq!(options.temperature, Some(0.2));
    //! assert_eq!(options.max_output_tokens, Some(128));
    //! ```

    /// Unset fields fall back to the provider's defaults.
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct CompletionOptions {
        pub model: Option<String>,
        pub temperature: Option<f32>,
        pub max_output_tokens: Option<u32>,
    }

    impl CompletionOptions {
        pub fn with_model(mut self, model: impl Into<String>) -> Self {
            self.model = Some(model.into());
            self
        }

        pub fn with_temperature(mut self, temperature: f32) -> Self {
            self.temperature = Some(temperature);
            self
        }

        pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
            self.max_output_tokens = Some(max_output_tokens);
            self
        }

        /// Returns the model override, ignoring blank values.
        pub fn model_override(&self) -> Option<&str> {
            self.model
                .as_deref()
                .map(str::trim)
                .filter(|model| !model.is_empty())
        }
    }
}

pub mod clock {
    //! Injectable wall clock used for session windows and turn timestamps.
    //!
    //! ```rust
    //! use std::time::{Duration, UNIX_EPOCH};
    //! use qcommon::{Clock, ManualClock};
    //!
    //! let clock = ManualClock::new(UNIX_EPOCH + Duration::from_secs(100));
    //! clock.advance(Duration::from_secs(5));
    //! assert_eq!(clock.now(), UNIX_EPOCH + Duration::from_secs(105));
    //! ```

    use std::sync::{Mutex, PoisonError};
    use std::time::{Duration, SystemTime};

    pub trait Clock: Send + Sync + std::fmt::Debug {
        fn now(&self) -> SystemTime;
    }

    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> SystemTime {
            SystemTime::now()
        }
    }

    /// Clock that only moves when told to.
    #[derive(Debug)]
    pub struct ManualClock {
        now: Mutex<SystemTime>,
    }

    impl ManualClock {
        pub fn new(start: SystemTime) -> Self {
            Self {
                now: Mutex::new(start),
            }
        }

        pub fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
            *now += by;
        }

        pub fn set(&self, value: SystemTime) {
            *self.now.lock().unwrap_or_else(PoisonError::into_inner) = value;
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new(SystemTime::now())
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> SystemTime {
            *self.now.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }
}

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{OwnerId, SessionId, TurnId};
pub use future::BoxFuture;
pub use model::CompletionOptions;
