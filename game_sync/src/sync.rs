//! One full sync pass: catalog, price pages, featured snapshot

use crate::config::SyncConfig;
use crate::database::Store;
use crate::error::Result;
use crate::featured::{FeaturedRefresher, FeaturedReport};
use crate::prices::{BatchReport, PriceBatchUpdater};
use crate::provider::CatalogProvider;
use crate::reconcile::{CatalogReconciler, ReconcileReport};
use serde::Serialize;

/// Which phases a pass runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassOptions {
    pub reconcile_catalog: bool,
    pub refresh_featured: bool,
}

impl Default for PassOptions {
    fn default() -> Self {
        Self {
            reconcile_catalog: true,
            refresh_featured: true,
        }
    }
}

/// Summary of a pass
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub catalog: Option<ReconcileReport>,
    pub price_pages: Vec<BatchReport>,
    pub featured: Option<FeaturedReport>,
}

/// Run one pass. The first failing phase ends the pass; whatever earlier
/// phases wrote stays committed.
pub fn run_pass<P: CatalogProvider>(
    store: &Store,
    source: &P,
    config: &SyncConfig,
    options: PassOptions,
) -> Result<PassReport> {
    let mut report = PassReport::default();

    store.ensure_provider(config.provider.id, &config.provider.name)?;

    if options.reconcile_catalog {
        let reconciler = CatalogReconciler::new(store, config.provider.clone());
        report.catalog = Some(reconciler.sync(source)?);
    }

    let updater = PriceBatchUpdater::new(store, source, config);
    for page in 0..config.pages_per_run {
        let batch = updater.run_page()?;
        // A short page means nothing stale is left for this pass
        let exhausted = batch.requested < config.page_size;
        report.price_pages.push(batch);
        if exhausted {
            log::debug!("Price backlog drained after {} page(s)", page + 1);
            break;
        }
    }

    if options.refresh_featured {
        let refresher = FeaturedRefresher::new(store, source, config);
        report.featured = Some(refresher.refresh()?);
    }

    Ok(report)
}
