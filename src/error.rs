//! Error types for the provisioning pipeline

use crate::provision::Stage;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while laying out, rendering or provisioning a menu
#[derive(Error, Debug)]
pub enum Error {
    /// The menu has zero or more than six actions
    #[error("Invalid action count {0}: a rich menu needs between 1 and 6 actions")]
    InvalidActionCount(usize),

    /// No markup template is registered for this action count
    #[error("No template registered for {0} actions")]
    TemplateNotFound(usize),

    /// The template's placeholders do not line up with the supplied labels
    #[error("Template has {found} placeholders but {expected} labels were supplied")]
    PlaceholderCountMismatch { expected: usize, found: usize },

    /// Settle or capture did not finish within the bounded interval
    #[error("Rendering timed out after {0}ms")]
    RenderTimeout(u64),

    /// The rendering subprocess could not be started
    #[error("Render engine unavailable: {0}")]
    RenderEngineUnavailable(String),

    /// Failed to render content
    #[error("Rendering failed: {0}")]
    Render(String),

    /// A remote call failed while a provisioning stage was running
    #[error("{stage} failed: {source}")]
    RemoteApi {
        stage: Stage,
        #[source]
        source: RemoteError,
    },

    /// A remote call outside the provisioning stages failed
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Releasing the rendering session failed
    #[error("Resource cleanup failed: {0}")]
    ResourceCleanup(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Internal consistency failures of the fixed layout/template tables.
    pub fn is_defect(&self) -> bool {
        matches!(self, Error::TemplateNotFound(_) | Error::PlaceholderCountMismatch { .. })
    }

    /// Failures an outer caller may reasonably retry. Nothing in this crate
    /// retries on its own.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::RenderTimeout(_) => true,
            Error::RemoteApi { source, .. } | Error::Remote(source) => source.is_transient(),
            _ => false,
        }
    }
}

/// Classification of a failed remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// The HTTP client gave up waiting for the remote system
    Timeout,
    /// The remote system answered with a non-success status
    Status(u16),
    /// Connection-level failure (DNS, TLS, reset)
    Transport,
    /// The response could not be decoded
    InvalidResponse,
}

/// A remote API failure. `message` is the remote system's own text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == RemoteErrorKind::Timeout
    }

    pub fn is_transient(&self) -> bool {
        match self.kind {
            RemoteErrorKind::Timeout | RemoteErrorKind::Transport => true,
            RemoteErrorKind::Status(code) => code == 429 || code >= 500,
            RemoteErrorKind::InvalidResponse => false,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            RemoteErrorKind::Timeout
        } else if err.is_decode() {
            RemoteErrorKind::InvalidResponse
        } else if let Some(status) = err.status() {
            RemoteErrorKind::Status(status.as_u16())
        } else {
            RemoteErrorKind::Transport
        };
        RemoteError::new(kind, err.to_string())
    }
}
