//! Error types for switchboard.
//!
//! All errors are strongly typed using thiserror. Configuration and cache
//! errors are fatal for the current request: a routing table that cannot be
//! built or read is never used partially. Failures inside a listener are not
//! represented here; the dispatcher folds them into the event status.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors raised while loading declarations or resolving handlers.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ConfigError {
    #[error("The {field} attribute is required in the {atom} atom: {context}")]
    MissingField {
        atom: &'static str,
        field: &'static str,
        context: String,
    },

    #[error("Invalid origin value {value:?}. Valid values are: internal, remote, cli, custom, *")]
    InvalidOrigin {
        value: String,
    },

    #[error("Invalid event pattern {pattern:?}: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: String,
    },

    #[error("The right attribute must be a string or false: {context}")]
    InvalidRight {
        context: String,
    },

    #[error("Invalid manifest fragment {path}: {reason}")]
    MalformedFragment {
        path: String,
        reason: String,
    },

    #[error("Cannot read manifest location {}: {source}", path.display())]
    UnreadableFragment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("In manifest fragment {path}: {source}")]
    InFragment {
        path: String,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("Handler class {class} is not registered")]
    UnknownHandler {
        class: String,
    },

    #[error("Handler class {class} is already registered")]
    DuplicateHandler {
        class: String,
    },

    #[error("Service class {class} does not implement the Service capability")]
    NotAService {
        class: String,
    },

    #[error("Service '{name}' (a listener for system:service:{name}) not found")]
    ServiceNotDeclared {
        name: String,
    },

    #[error("Invalid manifest configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Errors reading or writing the manifest cache artifacts.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum CacheError {
    #[error("Cannot access cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid cache file {path}: {reason}")]
    Corrupt {
        path: PathBuf,
        reason: String,
    },
}

/// Errors raised by the dispatcher itself, never by a listener.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum DispatchError {
    #[error("Event {event_type} cannot be dispatched with the wildcard origin")]
    WildcardOrigin {
        event_type: String,
    },

    #[error("Service '{name}' failed to initialize: {message}")]
    ServiceInitFailed {
        name: String,
        message: String,
    },
}

/// Top-level error type for switchboard.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum SwitchboardError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl ConfigError {
    /// Attaches the fragment a declaration came from.
    #[must_use]
    pub fn in_fragment(self, path: impl Into<String>) -> Self {
        Self::InFragment {
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through fragment context.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::InFragment { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl SwitchboardError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a cache error.
    #[must_use]
    pub const fn is_cache(&self) -> bool {
        matches!(self, Self::Cache(_))
    }

    /// Returns true if this is a dispatch error.
    #[must_use]
    pub const fn is_dispatch(&self) -> bool {
        matches!(self, Self::Dispatch(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for switchboard operations.
pub type SwitchboardResult<T> = Result<T, SwitchboardError>;

/// Error type returned by listener methods.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by listener methods.
pub type HandlerResult = Result<(), HandlerError>;

pub(crate) fn poisoned(context: &'static str) -> SwitchboardError {
    SwitchboardError::internal(format!("poisoned lock: {context}"))
}
