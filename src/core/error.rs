//! Error taxonomy shared by the engine, the throttle subsystem and the pipeline

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BotError {
    /// The provider rejected the credential in use
    #[error("unauthorized: {0}")]
    Auth(String),

    /// The provider asked us to back off
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Nothing matched the query
    #[error("not found: {0}")]
    NotFound(String),

    /// Network or format hiccup; the operation may be retried
    #[error("transient failure: {0}")]
    Transient(String),

    /// A programming invariant was violated
    #[error("fatal: {0}")]
    Fatal(String),
}

impl BotError {
    /// Errors recovered inside a window transition by rendering locally
    pub fn is_local(&self) -> bool {
        matches!(self, BotError::NotFound(_) | BotError::Transient(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BotError::Auth(_) => "auth",
            BotError::RateLimited(_) => "rate_limited",
            BotError::NotFound(_) => "not_found",
            BotError::Transient(_) => "transient",
            BotError::Fatal(_) => "fatal",
        }
    }
}

/// Failures reported by the messaging transport
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The message to edit or delete no longer exists (or cannot be edited)
    #[error("message gone: {0}")]
    MessageGone(String),

    /// Edit was a no-op because the content is unchanged
    #[error("message not modified")]
    NotModified,

    /// The user blocked the bot or the chat is unreachable
    #[error("chat unreachable: {0}")]
    Blocked(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl From<TransportError> for BotError {
    fn from(err: TransportError) -> Self {
        BotError::Transient(err.to_string())
    }
}

/// Failures reported by the ledger provider
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("too many requests: {0}")]
    TooManyRequests(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The provider refused the identifier itself (malformed address, hash, name)
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Classify an HTTP status returned by the provider
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => ProviderError::Unauthorized(body),
            429 => ProviderError::TooManyRequests(body),
            404 => ProviderError::NotFound(body),
            400 | 422 => ProviderError::BadRequest(body),
            _ => ProviderError::Request(format!("status {status}: {body}")),
        }
    }
}

impl From<ProviderError> for BotError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unauthorized(msg) => BotError::Auth(msg),
            ProviderError::TooManyRequests(msg) => BotError::RateLimited(msg),
            ProviderError::NotFound(msg) | ProviderError::BadRequest(msg) => BotError::NotFound(msg),
            ProviderError::Request(msg) | ProviderError::Decode(msg) => BotError::Transient(msg),
        }
    }
}

pub type BotResult<T> = Result<T, BotError>;
