// crates/client/src/credentials.rs
//! Credential access contract.
//!
//! Token storage mechanics live in the application shell; the trackers
//! only care about the observable contract — presence, expiry, refresh.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::ClientError;

/// Access to the bearer credential for the signed-in principal.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// The current bearer token, if one is stored.
    fn token(&self) -> Option<String>;

    /// Expiry of the current token (epoch ms), if known.
    fn expires_at(&self) -> Option<i64>;

    /// Exchange the current credential for a renewed one. Idempotent;
    /// safe to call when the token is still valid.
    async fn refresh(&self) -> Result<(), ClientError>;

    /// Whether a credential is present at all.
    fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }
}

/// Fixed-token provider for tests and non-interactive consumers.
/// `refresh` rotates to the configured refresh token, or fails when none
/// was configured.
pub struct StaticCredentials {
    token: RwLock<Option<String>>,
    refreshed: Option<String>,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
            refreshed: None,
        }
    }

    /// Provider holding no credential at all.
    pub fn signed_out() -> Self {
        Self {
            token: RwLock::new(None),
            refreshed: None,
        }
    }

    /// Provider whose `refresh` succeeds by swapping in `renewed`.
    pub fn with_refresh(token: impl Into<String>, renewed: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
            refreshed: Some(renewed.into()),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|g| g.clone())
    }

    fn expires_at(&self) -> Option<i64> {
        None
    }

    async fn refresh(&self) -> Result<(), ClientError> {
        match &self.refreshed {
            Some(renewed) => {
                if let Ok(mut guard) = self.token.write() {
                    *guard = Some(renewed.clone());
                }
                Ok(())
            }
            None => Err(ClientError::AuthExpired),
        }
    }
}
