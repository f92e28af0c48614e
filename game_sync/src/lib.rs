//! Game Sync - storefront catalog & price reconciliation
//!
//! Reconciles a provider's catalog and prices into SQLite and keeps a
//! derived "featured" snapshot in step with the provider's ranking.

pub mod config;
pub mod database;
pub mod error;
pub mod featured;
pub mod prices;
pub mod provider;
pub mod reconcile;
pub mod sync;

pub use config::{ProviderIdentity, SyncConfig, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use database::{FeaturedEntry, LinkOutcome, PendingLink, Store, StoredPrice};
pub use error::{Result, SyncError};
pub use featured::{FeaturedRefresher, FeaturedReport};
pub use prices::{BatchReport, PriceBatchUpdater, PriceUnits, PriceUpdate};
pub use provider::CatalogProvider;
pub use reconcile::{CatalogReconciler, ReconcileReport};
pub use sync::{run_pass, PassOptions, PassReport};
