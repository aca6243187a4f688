// crates/client/src/error.rs
use thiserror::Error;

/// Errors from the remote job service client.
///
/// The taxonomy drives polling behavior: auth errors trigger one refresh
/// attempt, server errors are fatal for that job's polling, network
/// errors count toward the consecutive-failure backoff.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No stored credential. Checked before any remote call; never retried.
    #[error("not authenticated: no credential available")]
    NotAuthenticated,

    /// The service rejected the credential (401-equivalent).
    #[error("authentication expired")]
    AuthExpired,

    /// 5xx-equivalent response. Implies backend misconfiguration, not a
    /// retryable condition.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Transport-level failure. Transient; the tick is skipped and
    /// backoff applies.
    #[error("network error: {0}")]
    Network(String),

    /// The response parsed but is missing a required field (job id,
    /// shard key) or is not valid JSON at all.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The realtime protocol is not available for this job. Enhanced job
    /// types never fall back to legacy polling; this is a hard error.
    #[error("realtime progress not available for this job")]
    EnhancedUnavailable,
}

impl ClientError {
    /// Errors that stop polling and require user sign-in.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::NotAuthenticated | Self::AuthExpired)
    }

    /// Errors that are fatal for a job's polling and surface as a
    /// configuration-error notification.
    pub fn is_fatal_config(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::EnhancedUnavailable)
    }

    /// Classify an HTTP status code that was not a success.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => Self::AuthExpired,
            s if s >= 500 => Self::Server { status: s, message },
            s => Self::Network(format!("unexpected status {s}: {message}")),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}
