use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Every browser launch candidate failed.
    #[error("no usable browser session: {reason}")]
    SessionUnavailable { reason: String },

    #[error("navigation to {url} timed out after {timeout_secs}s")]
    NavigationTimeout { url: String, timeout_secs: u64 },

    #[error("navigation to {url} failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    /// The HTTP-only fallback could not reach the page either.
    #[error("HTTP fallback failed: {0}")]
    FallbackFailed(#[source] Box<EngineError>),

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("search query is empty")]
    EmptyQuery,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },
}
