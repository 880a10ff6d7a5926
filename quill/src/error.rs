use std::error::Error;
use std::fmt::{Display, Formatter};

use qmemory::MemoryError;
use qobserve::SubscriberError;
use qprovider::CanonicalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigErrorKind {
    Missing,
    Invalid,
}

/// A setting that is absent when required, or present but unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub kind: ConfigErrorKind,
    pub variable: &'static str,
    pub message: String,
}

impl ConfigError {
    pub fn missing(variable: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: ConfigErrorKind::Missing,
            variable,
            message: message.into(),
        }
    }

    pub fn invalid(variable: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: ConfigErrorKind::Invalid,
            variable,
            message: message.into(),
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}: {}", self.kind, self.variable, self.message)
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeErrorKind {
    Config,
    Provider,
    Storage,
    Logging,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for RuntimeError {}

impl From<ConfigError> for RuntimeError {
    fn from(error: ConfigError) -> Self {
        Self::new(RuntimeErrorKind::Config, error.to_string())
    }
}

impl From<CanonicalError> for RuntimeError {
    fn from(error: CanonicalError) -> Self {
        let message = match error.original_detail.as_deref() {
            Some(detail) => format!("{}: {detail}", error.kind.as_str()),
            None => error.kind.as_str().to_string(),
        };
        Self::new(RuntimeErrorKind::Provider, message)
    }
}

impl From<MemoryError> for RuntimeError {
    fn from(error: MemoryError) -> Self {
        Self::new(RuntimeErrorKind::Storage, error.to_string())
    }
}

impl From<SubscriberError> for RuntimeError {
    fn from(error: SubscriberError) -> Self {
        Self::new(RuntimeErrorKind::Logging, error.message)
    }
}
