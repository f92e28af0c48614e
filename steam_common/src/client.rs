//! Blocking client for the Steam storefront
//!
//! Covers the three endpoints the sync engine consumes: the full app list,
//! batched price overviews and the featured specials list.

use crate::error::{ProviderError, ProviderResult};
use crate::types::{CatalogItem, PriceRecord, RankedItem};
use serde::Deserialize;
use std::collections::HashMap;

const DEFAULT_API_BASE: &str = "https://api.steampowered.com";
const DEFAULT_STORE_BASE: &str = "https://store.steampowered.com";
const USER_AGENT: &str = "game_sync/1.0";

/// `ISteamApps/GetAppList/v2` response
#[derive(Debug, Deserialize)]
struct AppListFile {
    applist: AppList,
}

#[derive(Debug, Deserialize)]
struct AppList {
    apps: Vec<AppEntry>,
}

#[derive(Debug, Deserialize)]
struct AppEntry {
    appid: u64,
    name: String,
}

/// One value of the `appdetails` response map.
///
/// `data` is an object when the filter matched and an empty array when the
/// app has no price overview (free apps, unreleased apps).
#[derive(Debug, Deserialize)]
struct AppDetails {
    success: bool,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FeaturedFile {
    specials: FeaturedCategory,
}

#[derive(Debug, Deserialize)]
struct FeaturedCategory {
    #[serde(default)]
    items: Vec<FeaturedApp>,
}

#[derive(Debug, Deserialize)]
struct FeaturedApp {
    id: u64,
    #[serde(default)]
    discount_percent: i64,
    original_price: Option<f64>,
    final_price: f64,
    currency: String,
}

impl FeaturedApp {
    fn into_ranked(self) -> RankedItem {
        // Undiscounted entries report no original price
        let initial = self.original_price.unwrap_or(self.final_price);
        RankedItem {
            external_id: self.id.to_string(),
            price: PriceRecord {
                currency: self.currency,
                initial,
                final_price: self.final_price,
                discount_percent: self.discount_percent,
            },
        }
    }
}

/// Steam storefront client
pub struct SteamClient {
    client: reqwest::blocking::Client,
    api_base: String,
    store_base: String,
}

impl SteamClient {
    pub fn new() -> Self {
        Self::with_base_urls(DEFAULT_API_BASE, DEFAULT_STORE_BASE)
    }

    /// Points the client at other hosts (for testing with mock servers).
    pub fn with_base_urls(api_base: &str, store_base: &str) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            store_base: store_base.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the full catalog of apps
    pub fn fetch_app_list(&self) -> ProviderResult<Vec<CatalogItem>> {
        let url = format!("{}/ISteamApps/GetAppList/v2/", self.api_base);
        log::info!("Fetching app list from: {}", url);

        let body = self.get_text(&url, &[])?;
        let file: AppListFile = serde_json::from_str(&body)?;

        let items: Vec<CatalogItem> = file
            .applist
            .apps
            .into_iter()
            .map(|app| CatalogItem::new(app.appid.to_string(), app.name))
            .collect();

        log::info!("Fetched {} apps", items.len());
        Ok(items)
    }

    /// Fetch price overviews for a batch of app ids in one request.
    ///
    /// The result is aligned with `app_ids`; `None` means the provider has
    /// no price for that id.
    pub fn fetch_prices(
        &self,
        app_ids: &[String],
        country_code: &str,
    ) -> ProviderResult<Vec<Option<PriceRecord>>> {
        if app_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/appdetails", self.store_base);
        let joined = app_ids.join(",");
        log::debug!(
            "Fetching prices for {} apps (cc={}) from: {}",
            app_ids.len(),
            country_code,
            url
        );

        let body = self.get_text(
            &url,
            &[
                ("appids", joined.as_str()),
                ("cc", country_code),
                ("filters", "price_overview"),
            ],
        )?;

        // The endpoint answers `null` when none of the ids are known
        let mut details: HashMap<String, AppDetails> =
            serde_json::from_str::<Option<_>>(&body)?.unwrap_or_default();

        app_ids
            .iter()
            .map(|id| match details.remove(id) {
                Some(entry) => price_from_details(id, entry),
                None => Ok(None),
            })
            .collect()
    }

    /// Fetch the ranked specials list for a country
    pub fn fetch_featured(&self, country_code: &str) -> ProviderResult<Vec<RankedItem>> {
        let url = format!("{}/api/featuredcategories", self.store_base);
        log::info!("Fetching featured specials (cc={}) from: {}", country_code, url);

        let body = self.get_text(&url, &[("cc", country_code)])?;
        let file: FeaturedFile = serde_json::from_str(&body)?;

        let ranked: Vec<RankedItem> = file
            .specials
            .items
            .into_iter()
            .map(FeaturedApp::into_ranked)
            .collect();

        log::info!("Fetched {} featured entries", ranked.len());
        Ok(ranked)
    }

    fn get_text(&self, url: &str, query: &[(&str, &str)]) -> ProviderResult<String> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header("User-Agent", USER_AGENT)
            .send()?;

        if !response.status().is_success() {
            return Err(ProviderError::HttpStatus(response.status()));
        }

        Ok(response.text()?)
    }
}

impl Default for SteamClient {
    fn default() -> Self {
        Self::new()
    }
}

fn price_from_details(id: &str, entry: AppDetails) -> ProviderResult<Option<PriceRecord>> {
    if !entry.success {
        return Ok(None);
    }

    let overview = match entry.data {
        Some(serde_json::Value::Object(mut data)) => data.remove("price_overview"),
        _ => None,
    };

    match overview {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ProviderError::Malformed(format!("price_overview for app {}: {}", id, e))),
        None => Ok(None),
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
