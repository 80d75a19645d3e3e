use std::hash::Hash;

use http::StatusCode;
use thiserror::Error;

/// Possible errors when interacting with `kaart`
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// No API key was configured. The key is taken from the explicit builder
    /// option first and from the environment second.
    #[error("API key not specified. Pass it to the builder or set the `KAART_API_KEY` env var.")]
    MissingApiKey,

    /// Network error while talking to the search endpoint
    #[error("Network error while trying to reach the search endpoint")]
    NetworkRequest(#[source] reqwest::Error),

    /// Error while reading the response body
    #[error("Error reading response body")]
    ReadResponseBody(#[source] reqwest::Error),

    /// The endpoint answered with a status code outside the success range
    /// (and it was not a rate-limit signal)
    #[error("Search endpoint rejected the request: {0}")]
    RejectedStatusCode(StatusCode),

    /// The endpoint signalled that the request volume was exceeded (HTTP 429).
    ///
    /// This is primarily an internal control signal. Callers only see it when
    /// the delayed retry wave hit the limit again; there is never a second
    /// automatic wave.
    #[error("Rate limited by the search endpoint (HTTP 429)")]
    RateLimited,

    /// The response body did not match the documented search response shape
    #[error("Response body did not match the search response schema")]
    InvalidResponseBody(#[source] serde_json::Error),

    /// The configured base URL cannot be parsed
    #[error("Invalid endpoint URL")]
    InvalidUrl(#[from] url::ParseError),

    /// The retry delay must be a positive duration
    #[error("Retry delay must be greater than zero")]
    ZeroRetryDelay,

    /// The client was disposed while the request was still queued for retry
    #[error("Client was disposed while the request was queued")]
    Disposed,
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NetworkRequest(e1), Self::NetworkRequest(e2))
            | (Self::ReadResponseBody(e1), Self::ReadResponseBody(e2)) => {
                e1.to_string() == e2.to_string()
            }
            (Self::RejectedStatusCode(c1), Self::RejectedStatusCode(c2)) => c1 == c2,
            (Self::InvalidResponseBody(e1), Self::InvalidResponseBody(e2)) => {
                e1.to_string() == e2.to_string()
            }
            (Self::InvalidUrl(e1), Self::InvalidUrl(e2)) => e1 == e2,
            (Self::MissingApiKey, Self::MissingApiKey)
            | (Self::RateLimited, Self::RateLimited)
            | (Self::ZeroRetryDelay, Self::ZeroRetryDelay)
            | (Self::Disposed, Self::Disposed) => true,
            _ => false,
        }
    }
}

impl Eq for ErrorKind {}

impl Hash for ErrorKind {
    fn hash<H>(&self, state: &mut H)
    where
        H: std::hash::Hasher,
    {
        match self {
            Self::NetworkRequest(e) | Self::ReadResponseBody(e) => e.to_string().hash(state),
            Self::RejectedStatusCode(c) => c.hash(state),
            Self::InvalidResponseBody(e) => e.to_string().hash(state),
            Self::InvalidUrl(e) => e.to_string().hash(state),
            Self::MissingApiKey | Self::RateLimited | Self::ZeroRetryDelay | Self::Disposed => {
                std::mem::discriminant(self).hash(state);
            }
        }
    }
}

impl ErrorKind {
    /// Returns `true` if this error is the rate-limit control signal
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}
