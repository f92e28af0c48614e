//! Batched price refresh
//!
//! Each run takes one page of links (least recently refreshed first), asks
//! the provider for all of their prices in a single call and writes the
//! results back. Draining a backlog larger than one page is up to the
//! caller, which simply runs again. Pages taken through one updater skip
//! links it already refreshed.

use crate::config::{ProviderIdentity, SyncConfig};
use crate::database::{now_stamp, Store};
use crate::error::{Result, SyncError};
use crate::provider::CatalogProvider;
use serde::Serialize;
use steam_common::{PriceRecord, ProviderError};

/// Unit convention of a provider price record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceUnits {
    /// Cents, kopecks, ...: divided by 100 before storage
    MinorUnits,
    /// Stored as reported
    DisplayUnits,
}

/// Price fields as written to a link
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdate {
    pub initial: f64,
    pub final_price: f64,
    pub discount: i64,
    pub is_free: bool,
    pub currency: String,
}

impl PriceUpdate {
    pub fn from_record(record: &PriceRecord, units: PriceUnits) -> Self {
        let (initial, final_price) = match units {
            PriceUnits::MinorUnits => (record.initial / 100.0, record.final_price / 100.0),
            PriceUnits::DisplayUnits => (record.initial, record.final_price),
        };

        Self {
            initial,
            final_price,
            discount: record.discount_percent,
            // Free is decided on the raw initial price, whatever the discount
            is_free: record.initial == 0.0,
            currency: record.currency.clone(),
        }
    }
}

/// Counters from one price page
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Links sent to the provider
    pub requested: usize,
    /// Links that received a price
    pub priced: usize,
    /// Links the provider had no price for
    pub unpriced: usize,
}

pub struct PriceBatchUpdater<'a, P> {
    store: &'a Store,
    source: &'a P,
    provider: ProviderIdentity,
    country_code: String,
    page_size: usize,
    /// Links stamped at or after this were refreshed by this updater
    started_at: String,
}

impl<'a, P: CatalogProvider> PriceBatchUpdater<'a, P> {
    pub fn new(store: &'a Store, source: &'a P, config: &SyncConfig) -> Self {
        Self {
            store,
            source,
            provider: config.provider.clone(),
            country_code: config.country_code.clone(),
            page_size: config.page_size,
            started_at: now_stamp(),
        }
    }

    /// Refresh one page of links
    pub fn run_page(&self) -> Result<BatchReport> {
        let page = self
            .store
            .page_links(self.provider.id, self.page_size, &self.started_at)?;
        let mut report = BatchReport {
            requested: page.len(),
            ..Default::default()
        };
        if page.is_empty() {
            log::info!("No links to refresh for {}", self.provider.name);
            return Ok(report);
        }

        let external_ids: Vec<String> = page.iter().map(|l| l.external_id.clone()).collect();
        let context = format!(
            "prices for {} ids {}..{} (cc={})",
            external_ids.len(),
            external_ids[0],
            external_ids[external_ids.len() - 1],
            self.country_code
        );

        let prices = self
            .source
            .get_prices(&external_ids, &self.country_code)
            .map_err(|e| SyncError::provider(context.clone(), e))?;

        if prices.len() != page.len() {
            return Err(SyncError::provider(
                context,
                ProviderError::Malformed(format!(
                    "expected {} results, got {}",
                    page.len(),
                    prices.len()
                )),
            ));
        }

        for (link, price) in page.iter().zip(prices) {
            match price {
                Some(record) => {
                    let update = PriceUpdate::from_record(&record, PriceUnits::MinorUnits);
                    self.store
                        .apply_price(link.item_id, self.provider.id, &update)?;
                    report.priced += 1;
                }
                None => {
                    log::debug!("No price available for {}", link.external_id);
                    self.store.mark_refreshed(link.item_id, self.provider.id)?;
                    report.unpriced += 1;
                }
            }
        }

        log::info!(
            "Price page done: {} requested, {} priced, {} without price",
            report.requested,
            report.priced,
            report.unpriced
        );
        Ok(report)
    }
}
