use thiserror::Error;

use crate::domain::{Phase, Status};

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Errors raised synchronously by the registration API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("there is already an app registered with name {name}")]
    DuplicateRegistration { name: String },

    #[error("the configuration accepts only: {valid}. Invalid keys: {}", invalid.join(", "))]
    UnknownConfigKey { valid: String, invalid: Vec<String> },

    #[error("no application named '{name}' has been registered")]
    NotRegistered { name: String },
}

impl RegistrationError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }
}

/// Errors produced while driving an application through its lifecycle.
///
/// Every variant names the application and the status it was moved to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("application '{app}' died in status {status}: loading function did not return a future")]
    NotAPromise { app: String, status: Status },

    #[error("application '{app}' died in status {status}: module {reason}")]
    ModuleShapeInvalid {
        app: String,
        status: Status,
        reason: String,
    },

    #[error("application '{app}' died in status {status}: load failed: {message}")]
    LoadFailed {
        app: String,
        status: Status,
        message: String,
    },

    #[error("application '{app}' died in status {status}: {phase} rejected: {message}")]
    LifecycleRejected {
        app: String,
        phase: Phase,
        status: Status,
        message: String,
    },

    #[error("application '{app}' died in status {status}: {phase} did not resolve or reject within {millis} ms")]
    Timeout {
        app: String,
        phase: Phase,
        status: Status,
        millis: u64,
        /// The call was left running in the background.
        dangling: bool,
    },
}

impl LifecycleError {
    /// Name of the application the error belongs to.
    pub fn app(&self) -> &str {
        match self {
            Self::NotAPromise { app, .. }
            | Self::ModuleShapeInvalid { app, .. }
            | Self::LoadFailed { app, .. }
            | Self::LifecycleRejected { app, .. }
            | Self::Timeout { app, .. } => app,
        }
    }

    /// Status the application was moved to because of this error.
    pub fn status(&self) -> Status {
        match self {
            Self::NotAPromise { status, .. }
            | Self::ModuleShapeInvalid { status, .. }
            | Self::LoadFailed { status, .. }
            | Self::LifecycleRejected { status, .. }
            | Self::Timeout { status, .. } => *status,
        }
    }

    /// Re-tag the error with the status the application ends up in.
    #[must_use]
    pub(crate) fn with_status(mut self, new_status: Status) -> Self {
        match &mut self {
            Self::NotAPromise { status, .. }
            | Self::ModuleShapeInvalid { status, .. }
            | Self::LoadFailed { status, .. }
            | Self::LifecycleRejected { status, .. }
            | Self::Timeout { status, .. } => *status = new_status,
        }
        self
    }

    /// True for failures the reconciler may retry after back-off.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LoadFailed { .. })
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
