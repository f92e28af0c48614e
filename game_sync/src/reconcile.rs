//! Catalog reconciliation
//!
//! Maps every external catalog entry to a local item (by name) and links it
//! to its provider-specific id. Re-running over a populated store is safe:
//! existing items and links are reused, not duplicated.

use crate::config::ProviderIdentity;
use crate::database::{LinkOutcome, Store};
use crate::error::{Result, SyncError};
use crate::provider::CatalogProvider;
use serde::Serialize;
use steam_common::CatalogItem;

/// Records committed per transaction. A failure loses at most the current
/// chunk; earlier chunks stay committed.
const COMMIT_CHUNK: usize = 1000;

/// Counters from one reconciliation run
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// External records processed
    pub seen: usize,
    /// New links created
    pub linked: usize,
    /// Records whose link already existed
    pub already_linked: usize,
    /// Records without a usable name
    pub skipped: usize,
}

pub struct CatalogReconciler<'a> {
    store: &'a Store,
    provider: ProviderIdentity,
}

impl<'a> CatalogReconciler<'a> {
    pub fn new(store: &'a Store, provider: ProviderIdentity) -> Self {
        Self { store, provider }
    }

    /// Fetch the provider's full catalog and reconcile it
    pub fn sync<P: CatalogProvider>(&self, source: &P) -> Result<ReconcileReport> {
        let items = source
            .list_all_items()
            .map_err(|e| SyncError::provider("listing full catalog", e))?;
        log::info!("Reconciling {} catalog entries", items.len());
        self.reconcile(&items)
    }

    /// Reconcile `items` in list order
    pub fn reconcile(&self, items: &[CatalogItem]) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for chunk in items.chunks(COMMIT_CHUNK) {
            let tx = self.store.begin()?;
            for item in chunk {
                self.reconcile_one(item, &mut report).inspect_err(|e| {
                    log::error!(
                        "Reconciliation stopped at {} ({:?}): {}",
                        item.external_id,
                        item.name,
                        e
                    )
                })?;
            }
            tx.commit()?;
        }

        log::info!(
            "Reconciled {} entries: {} linked, {} already linked, {} skipped",
            report.seen,
            report.linked,
            report.already_linked,
            report.skipped
        );
        Ok(report)
    }

    fn reconcile_one(&self, item: &CatalogItem, report: &mut ReconcileReport) -> Result<()> {
        report.seen += 1;

        let name = item.name.trim();
        if name.is_empty() {
            log::debug!("Skipping {}: empty name", item.external_id);
            report.skipped += 1;
            return Ok(());
        }

        let item_id = self.store.upsert_item(name)?;
        match self
            .store
            .link_item_to_provider(item_id, self.provider.id, &item.external_id)?
        {
            LinkOutcome::Created => report.linked += 1,
            LinkOutcome::AlreadyLinked => report.already_linked += 1,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fake::FakeProvider;

    fn test_store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store.ensure_provider(1, "steam").unwrap();
        store
    }

    fn catalog() -> Vec<CatalogItem> {
        vec![
            CatalogItem::new("10", "Counter-Strike"),
            CatalogItem::new("42", "Game A"),
            CatalogItem::new("70", "Half-Life"),
        ]
    }

    #[test]
    fn reconcile_single_record() {
        let store = test_store();
        let reconciler = CatalogReconciler::new(&store, ProviderIdentity::steam());

        let report = reconciler
            .reconcile(&[CatalogItem::new("42", "Game A")])
            .unwrap();

        assert_eq!(report.linked, 1);
        assert_eq!(store.item_count().unwrap(), 1);
        assert_eq!(store.link_count().unwrap(), 1);

        let item_id = store.resolve_external_id("42", 1).unwrap().unwrap();
        assert_eq!(store.get_item_name(item_id).unwrap(), "Game A");
        let price = store.get_price(item_id, 1).unwrap();
        assert!(price.initial.is_none());
        assert!(price.final_price.is_none());
    }

    #[test]
    fn reconcile_twice_is_idempotent() {
        let store = test_store();
        let reconciler = CatalogReconciler::new(&store, ProviderIdentity::steam());

        reconciler.reconcile(&catalog()).unwrap();
        let first = (store.item_count().unwrap(), store.link_count().unwrap());

        let report = reconciler.reconcile(&catalog()).unwrap();
        let second = (store.item_count().unwrap(), store.link_count().unwrap());

        assert_eq!(first, (3, 3));
        assert_eq!(first, second);
        assert_eq!(report.linked, 0);
        assert_eq!(report.already_linked, 3);
    }

    #[test]
    fn reconcile_reuses_item_for_duplicate_names() {
        let store = test_store();
        let reconciler = CatalogReconciler::new(&store, ProviderIdentity::steam());

        let report = reconciler
            .reconcile(&[
                CatalogItem::new("1", "Soundtrack"),
                CatalogItem::new("2", "Soundtrack"),
            ])
            .unwrap();

        // One item; the (item, provider) link is taken by the first record
        assert_eq!(store.item_count().unwrap(), 1);
        assert_eq!(store.link_count().unwrap(), 1);
        assert_eq!(report.linked, 1);
        assert_eq!(report.already_linked, 1);
        assert!(store.resolve_external_id("1", 1).unwrap().is_some());
        assert!(store.resolve_external_id("2", 1).unwrap().is_none());
    }

    #[test]
    fn reconcile_skips_blank_names() {
        let store = test_store();
        let reconciler = CatalogReconciler::new(&store, ProviderIdentity::steam());

        let report = reconciler
            .reconcile(&[CatalogItem::new("1", "  "), CatalogItem::new("2", "Game B")])
            .unwrap();

        assert_eq!(report.seen, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(store.item_count().unwrap(), 1);
    }

    #[test]
    fn reconcile_spans_commit_chunks() {
        let store = test_store();
        let reconciler = CatalogReconciler::new(&store, ProviderIdentity::steam());

        let items: Vec<CatalogItem> = (0..COMMIT_CHUNK + 5)
            .map(|n| CatalogItem::new(n.to_string(), format!("Game {}", n)))
            .collect();
        let report = reconciler.reconcile(&items).unwrap();

        assert_eq!(report.linked, COMMIT_CHUNK + 5);
        assert_eq!(store.link_count().unwrap(), (COMMIT_CHUNK + 5) as i64);
    }

    #[test]
    fn reconcile_failure_keeps_earlier_chunks_committed() {
        let store = test_store();
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_broken BEFORE INSERT ON item
                 WHEN NEW.name = 'Broken'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();
        let mut items: Vec<CatalogItem> = (0..COMMIT_CHUNK + 3)
            .map(|i| CatalogItem::new(i.to_string(), format!("Game {i}")))
            .collect();
        items[COMMIT_CHUNK + 1].name = "Broken".to_string();

        let reconciler = CatalogReconciler::new(&store, ProviderIdentity::steam());
        let result = reconciler.reconcile(&items);

        assert!(matches!(result, Err(SyncError::Database(_))));
        // First chunk survives, the failing one is rolled back
        assert_eq!(store.item_count().unwrap(), COMMIT_CHUNK as i64);
        assert_eq!(store.link_count().unwrap(), COMMIT_CHUNK as i64);
        assert!(store.resolve_external_id("0", 1).unwrap().is_some());
        assert!(store
            .resolve_external_id(&(COMMIT_CHUNK - 1).to_string(), 1)
            .unwrap()
            .is_some());
        assert!(store
            .resolve_external_id(&COMMIT_CHUNK.to_string(), 1)
            .unwrap()
            .is_none());
    }

    #[test]
    fn reconcile_unknown_provider_rolls_back_chunk() {
        let store = test_store();
        let reconciler = CatalogReconciler::new(&store, ProviderIdentity::new(9, "missing"));

        let result = reconciler.reconcile(&catalog());

        assert!(matches!(result, Err(SyncError::Database(_))));
        assert_eq!(store.item_count().unwrap(), 0);
    }

    #[test]
    fn sync_pulls_catalog_from_provider() {
        let store = test_store();
        let provider = FakeProvider {
            items: catalog(),
            ..Default::default()
        };

        let report = CatalogReconciler::new(&store, ProviderIdentity::steam())
            .sync(&provider)
            .unwrap();
        assert_eq!(report.seen, 3);
        assert_eq!(store.link_count().unwrap(), 3);
    }

    #[test]
    fn sync_surfaces_provider_failure() {
        let store = test_store();
        let provider = FakeProvider {
            fail: true,
            ..Default::default()
        };

        let result = CatalogReconciler::new(&store, ProviderIdentity::steam()).sync(&provider);
        assert!(matches!(result, Err(SyncError::Provider { .. })));
    }
}
