// src/infra/errors.rs — Error types for slotwatch

use thiserror::Error;

/// A payload (or one slot object inside it) could not be normalized.
///
/// Recoverable at listing granularity: the cycle logs it and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason} (at: {offending_fragment})")]
pub struct ParseError {
    pub reason: String,
    /// Compact JSON of the value that failed, truncated for logs.
    pub offending_fragment: String,
}

impl ParseError {
    pub fn new(reason: impl Into<String>, fragment: &serde_json::Value) -> Self {
        let rendered = fragment.to_string();
        Self {
            reason: reason.into(),
            offending_fragment: crate::util::truncate_str(&rendered, 200).to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("CSRF token not found on the login page")]
    TokenNotFound,

    #[error("Login rejected: the response is still the login page")]
    CredentialsRejected,

    #[error("Network failure during login: {0}")]
    NetworkFailure(String),

    #[error("Captcha challenge detected; backing off")]
    CaptchaDetected,

    #[error("A freshly established session was rejected by the API")]
    SessionRejected,
}

impl AuthError {
    /// Fatal errors abort the current cycle. Only network failures may be
    /// retried by the caller.
    pub fn is_fatal(&self) -> bool {
        !self.is_retriable()
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, AuthError::NetworkFailure(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Session is no longer authenticated")]
    LoginRequired,

    #[error("Captcha challenge detected while fetching")]
    CaptchaDetected,

    #[error("Response is not valid JSON: {0}")]
    InvalidPayload(String),
}

impl FetchError {
    /// Transport failures, throttling and server errors are worth retrying.
    pub fn is_retriable(&self) -> bool {
        match self {
            FetchError::Network { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("Failed to build notification: {0}")]
    Build(String),

    #[error("Delivery failed: {0}")]
    Transport(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Error surfaced by the authenticated fetch path: either the session is
/// unusable (fatal for the cycle) or this one listing failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// A cycle was abandoned before visiting every listing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
    #[error("Cycle aborted: {0}")]
    Auth(#[from] AuthError),
}

impl CycleError {
    pub fn is_captcha(&self) -> bool {
        matches!(self, CycleError::Auth(AuthError::CaptchaDetected))
    }
}
