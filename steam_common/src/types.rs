//! Provider records as handed to the sync engine

use serde::{Deserialize, Serialize};

/// One entry of the provider's full catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub external_id: String,
    pub name: String,
}

impl CatalogItem {
    pub fn new(external_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            name: name.into(),
        }
    }
}

/// Raw price data exactly as the provider reported it.
///
/// Units depend on the endpoint that produced the record: the batch price
/// endpoint reports minor currency units, the featured list does not get
/// converted before storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub currency: String,
    pub initial: f64,
    #[serde(rename = "final")]
    pub final_price: f64,
    pub discount_percent: i64,
}

/// One position of the provider's ranked featured list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedItem {
    pub external_id: String,
    pub price: PriceRecord,
}
