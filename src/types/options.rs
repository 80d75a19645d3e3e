use std::time::Duration;

/// Per-call options forwarded to the transport.
///
/// Cancellation is modeled by dropping the future returned from a lookup:
/// a queued request whose caller stopped waiting is skipped over during the
/// drain without affecting its siblings or the shared timer.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Response timeout for this call, overriding the client-wide default
    pub timeout: Option<Duration>,
}

impl CallOptions {
    /// Options with a response timeout for this one call
    #[must_use]
    pub const fn timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}
