//! The external catalog provider as seen by the sync components

use steam_common::{CatalogItem, PriceRecord, ProviderResult, RankedItem, SteamClient};

/// Source of catalog, price and featured data
pub trait CatalogProvider {
    /// Every item the provider lists
    fn list_all_items(&self) -> ProviderResult<Vec<CatalogItem>>;

    /// Prices for a batch of ids, aligned with `external_ids`.
    /// `None` means the provider has no price for that id.
    fn get_prices(
        &self,
        external_ids: &[String],
        country_code: &str,
    ) -> ProviderResult<Vec<Option<PriceRecord>>>;

    /// The current ranked featured list
    fn get_featured(&self, country_code: &str) -> ProviderResult<Vec<RankedItem>>;
}

impl CatalogProvider for SteamClient {
    fn list_all_items(&self) -> ProviderResult<Vec<CatalogItem>> {
        self.fetch_app_list()
    }

    fn get_prices(
        &self,
        external_ids: &[String],
        country_code: &str,
    ) -> ProviderResult<Vec<Option<PriceRecord>>> {
        self.fetch_prices(external_ids, country_code)
    }

    fn get_featured(&self, country_code: &str) -> ProviderResult<Vec<RankedItem>> {
        self.fetch_featured(country_code)
    }
}
