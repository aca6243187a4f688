// crates/tracker/src/error.rs
use thiserror::Error;

use respond_client::ClientError;
use respond_store::StoreError;

/// Errors surfaced to callers of explicit tracker operations (start,
/// cancel, restore). Poll-tick failures never reach this type; they are
/// contained inside the tick and reflected as events/backoff instead.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The start response carried no job id.
    #[error("start response missing job id")]
    MissingJobId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_convert() {
        let err: TrackerError = ClientError::NotAuthenticated.into();
        assert!(matches!(err, TrackerError::Client(_)));
        assert!(err.to_string().contains("not authenticated"));
    }
}
