//! Bearer token sources for authenticated calls.

use crate::error::{ApiError, Result};
use async_trait::async_trait;

/// Supplies the bearer token attached to authenticated requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Get a currently valid access token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Token`] if no token can be produced.
    async fn token(&self) -> Result<String>;
}

/// Token read once from the config file.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<String> {
        if self.token.trim().is_empty() {
            return Err(ApiError::Token {
                reason: "configured token is empty".into(),
            });
        }
        Ok(self.token.clone())
    }
}
