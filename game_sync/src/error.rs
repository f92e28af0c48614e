//! Error types for game_sync

use std::path::PathBuf;
use std::time::Duration;

use steam_common::ProviderError;
use thiserror::Error;

/// Unified error type for game_sync operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// Store did not become ready within the startup grace period
    #[error("Store at {} not reachable after {:?}: {}", .path.display(), .waited, .source)]
    Connectivity {
        path: PathBuf,
        waited: Duration,
        source: rusqlite::Error,
    },
    /// Uniqueness violation (item name, external id, featured entry)
    #[error("Already exists: {0}")]
    Conflict(String),
    /// Referenced row does not exist
    #[error("Not found: {0}")]
    NotFound(String),
    /// External provider call failed or returned malformed data
    #[error("Provider error ({context}): {source}")]
    Provider {
        context: String,
        source: ProviderError,
    },
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    /// Wrap a provider failure with the request it belonged to
    pub fn provider(context: impl Into<String>, source: ProviderError) -> Self {
        SyncError::Provider {
            context: context.into(),
            source,
        }
    }
}

/// Result alias for game_sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
