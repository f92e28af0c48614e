//! Sync configuration
//!
//! Everything a component needs is passed in explicitly through these
//! values; nothing is read from globals.

use crate::error::{Result, SyncError};
use serde::Serialize;

/// Largest page the batch price endpoint serves in one call
pub const MAX_PAGE_SIZE: usize = 250;

/// Default page size for price refreshes
pub const DEFAULT_PAGE_SIZE: usize = MAX_PAGE_SIZE;

/// Identity of the external provider rows are linked to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderIdentity {
    pub id: i64,
    pub name: String,
}

impl ProviderIdentity {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn steam() -> Self {
        Self::new(1, "steam")
    }
}

/// Validated settings for a sync pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncConfig {
    pub provider: ProviderIdentity,
    /// Lowercase two-letter country code (also selects the currency)
    pub country_code: String,
    /// Links refreshed per provider price call
    pub page_size: usize,
    /// Price pages processed per pass
    pub pages_per_run: usize,
}

impl SyncConfig {
    pub fn new(
        provider: ProviderIdentity,
        country_code: &str,
        page_size: usize,
        pages_per_run: usize,
    ) -> Result<Self> {
        let country_code = country_code.trim();
        if country_code.len() != 2 || !country_code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(SyncError::InvalidConfig(format!(
                "country code must be two letters, got {:?}",
                country_code
            )));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(SyncError::InvalidConfig(format!(
                "page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, page_size
            )));
        }
        if pages_per_run == 0 {
            return Err(SyncError::InvalidConfig(
                "pages per run must be at least 1".to_string(),
            ));
        }
        if provider.name.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "provider name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            provider,
            country_code: country_code.to_ascii_lowercase(),
            page_size,
            pages_per_run,
        })
    }
}
