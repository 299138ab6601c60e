//! Error types for the object pool

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Error type accepted from factories and clear operations
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Shared form of [`BoxError`], so that [`PoolError`] stays `Clone`
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Invalid pool configuration: {0}")]
    Configuration(String),

    #[error("Failed to create pooled object: {0}")]
    Factory(#[source] SharedError),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Failed to prepare object for reuse: {0}")]
    Reclaim(#[source] SharedError),
}

impl PoolError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn factory(err: impl Into<BoxError>) -> Self {
        Self::Factory(Arc::from(err.into()))
    }

    pub(crate) fn reclaim(err: impl Into<BoxError>) -> Self {
        Self::Reclaim(Arc::from(err.into()))
    }

    /// Whether the wait for an object ended without one, either because the
    /// timeout elapsed or because it was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Cancelled)
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
