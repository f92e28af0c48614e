//! Steam Common - shared storefront types
//!
//! Provider-facing record types, the provider error type and a blocking
//! HTTP client for the Steam storefront endpoints used by `game_sync`.

pub mod client;
pub mod error;
pub mod types;

pub use client::SteamClient;
pub use error::{ProviderError, ProviderResult};
pub use types::{CatalogItem, PriceRecord, RankedItem};
