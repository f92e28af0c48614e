//! Featured snapshot refresh

use crate::config::{ProviderIdentity, SyncConfig};
use crate::database::{FeaturedEntry, Store};
use crate::error::{Result, SyncError};
use crate::prices::{PriceUnits, PriceUpdate};
use crate::provider::CatalogProvider;
use serde::Serialize;

/// Counters from one featured refresh
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FeaturedReport {
    /// Entries in the provider ranking
    pub ranked: usize,
    /// Entries with no local link
    pub unresolved: usize,
    /// Rows in the new snapshot
    pub featured: usize,
}

/// Rebuilds the featured table from the provider's ranking and refreshes
/// the prices of the ranked items on the way.
pub struct FeaturedRefresher<'a, P> {
    store: &'a Store,
    source: &'a P,
    provider: ProviderIdentity,
    country_code: String,
}

impl<'a, P: CatalogProvider> FeaturedRefresher<'a, P> {
    pub fn new(store: &'a Store, source: &'a P, config: &SyncConfig) -> Self {
        Self {
            store,
            source,
            provider: config.provider.clone(),
            country_code: config.country_code.clone(),
        }
    }

    pub fn refresh(&self) -> Result<FeaturedReport> {
        let ranked = self
            .source
            .get_featured(&self.country_code)
            .map_err(|e| {
                SyncError::provider(format!("featured list (cc={})", self.country_code), e)
            })?;

        let mut report = FeaturedReport {
            ranked: ranked.len(),
            ..Default::default()
        };
        let mut entries = Vec::with_capacity(ranked.len());

        for entry in &ranked {
            let Some(item_id) = self
                .store
                .resolve_external_id(&entry.external_id, self.provider.id)?
            else {
                log::warn!(
                    "Featured entry {} has no local link, skipping",
                    entry.external_id
                );
                report.unresolved += 1;
                continue;
            };

            // Featured prices are stored as reported (no minor-unit division)
            let update = PriceUpdate::from_record(&entry.price, PriceUnits::DisplayUnits);
            self.store.apply_price(item_id, self.provider.id, &update)?;

            entries.push(FeaturedEntry {
                item_id,
                provider_id: self.provider.id,
            });
        }

        report.featured = self.store.replace_featured(&entries)?;
        log::info!(
            "Featured refresh done: {} ranked, {} unresolved, {} featured",
            report.ranked,
            report.unresolved,
            report.featured
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fake::{record, FakeProvider};
    use steam_common::RankedItem;

    fn config() -> SyncConfig {
        SyncConfig::new(ProviderIdentity::steam(), "ua", 250, 1).unwrap()
    }

    fn seeded_store(items: &[(&str, &str)]) -> Store {
        let store = Store::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store.ensure_provider(1, "steam").unwrap();
        for (external_id, name) in items {
            let id = store.upsert_item(name).unwrap();
            store.link_item_to_provider(id, 1, external_id).unwrap();
        }
        store
    }

    fn ranked(external_id: &str, initial: f64, final_price: f64, discount: i64) -> RankedItem {
        RankedItem {
            external_id: external_id.to_string(),
            price: record(initial, final_price, discount),
        }
    }

    fn featured_ids(store: &Store) -> Vec<i64> {
        store
            .list_featured()
            .unwrap()
            .into_iter()
            .map(|e| e.item_id)
            .collect()
    }

    fn item_id(store: &Store, external_id: &str) -> i64 {
        store.resolve_external_id(external_id, 1).unwrap().unwrap()
    }

    #[test]
    fn refresh_publishes_resolved_ranking() {
        let store = seeded_store(&[("1", "A"), ("2", "B")]);
        let provider = FakeProvider {
            featured: vec![ranked("2", 300.0, 150.0, 50), ranked("1", 100.0, 100.0, 0)],
            ..Default::default()
        };

        let report = FeaturedRefresher::new(&store, &provider, &config())
            .refresh()
            .unwrap();

        assert_eq!(report.featured, 2);
        assert_eq!(
            featured_ids(&store),
            vec![item_id(&store, "2"), item_id(&store, "1")]
        );
    }

    #[test]
    fn refresh_stores_prices_without_unit_division() {
        let store = seeded_store(&[("42", "Game A")]);
        let provider = FakeProvider {
            featured: vec![ranked("42", 500.0, 250.0, 50)],
            ..Default::default()
        };

        FeaturedRefresher::new(&store, &provider, &config())
            .refresh()
            .unwrap();

        let stored = store.get_price(item_id(&store, "42"), 1).unwrap();
        assert!((stored.initial.unwrap() - 500.0).abs() < 0.001);
        assert!((stored.final_price.unwrap() - 250.0).abs() < 0.001);
        assert_eq!(stored.discount, 50);
    }

    #[test]
    fn refresh_skips_unresolved_entries() {
        let store = seeded_store(&[("1", "A")]);
        let provider = FakeProvider {
            featured: vec![ranked("999", 1.0, 1.0, 0), ranked("1", 1.0, 1.0, 0)],
            ..Default::default()
        };

        let report = FeaturedRefresher::new(&store, &provider, &config())
            .refresh()
            .unwrap();

        assert_eq!(report.ranked, 2);
        assert_eq!(report.unresolved, 1);
        assert_eq!(featured_ids(&store), vec![item_id(&store, "1")]);
    }

    #[test]
    fn refresh_drops_entries_missing_from_new_ranking() {
        let store = seeded_store(&[("1", "A"), ("2", "B"), ("3", "C")]);
        let first = FakeProvider {
            featured: vec![ranked("1", 1.0, 1.0, 0), ranked("2", 1.0, 1.0, 0)],
            ..Default::default()
        };
        FeaturedRefresher::new(&store, &first, &config())
            .refresh()
            .unwrap();

        let second = FakeProvider {
            featured: vec![ranked("3", 1.0, 1.0, 0), ranked("2", 1.0, 1.0, 0)],
            ..Default::default()
        };
        FeaturedRefresher::new(&store, &second, &config())
            .refresh()
            .unwrap();

        assert_eq!(
            featured_ids(&store),
            vec![item_id(&store, "3"), item_id(&store, "2")]
        );
    }

    #[test]
    fn refresh_with_duplicate_ranking_entries() {
        let store = seeded_store(&[("1", "A")]);
        let provider = FakeProvider {
            featured: vec![ranked("1", 1.0, 1.0, 0), ranked("1", 1.0, 1.0, 0)],
            ..Default::default()
        };

        let report = FeaturedRefresher::new(&store, &provider, &config())
            .refresh()
            .unwrap();
        assert_eq!(report.featured, 1);
    }

    #[test]
    fn refresh_provider_failure_keeps_previous_snapshot() {
        let store = seeded_store(&[("1", "A")]);
        let good = FakeProvider {
            featured: vec![ranked("1", 1.0, 1.0, 0)],
            ..Default::default()
        };
        FeaturedRefresher::new(&store, &good, &config())
            .refresh()
            .unwrap();

        let failing = FakeProvider {
            fail: true,
            ..Default::default()
        };
        let result = FeaturedRefresher::new(&store, &failing, &config()).refresh();

        assert!(matches!(result, Err(SyncError::Provider { .. })));
        assert_eq!(featured_ids(&store), vec![item_id(&store, "1")]);
    }
}
