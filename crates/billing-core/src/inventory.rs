//! Inventory: catalog entries and verified purchases keyed by product id.
//!
//! Only [`crate::verification::reconcile`] can add purchases, so every
//! [`Purchase`] reachable through an `Inventory` has passed signature
//! verification.

use std::collections::HashMap;

use crate::purchase::Purchase;
use crate::sku::SkuDetails;

/// Product-id keyed view over catalog entries and owned purchases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    sku_map: HashMap<String, SkuDetails>,
    purchase_map: HashMap<String, Purchase>,
}

impl Inventory {
    /// Create an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog entry for a product id.
    pub fn sku_details(&self, sku: &str) -> Option<&SkuDetails> {
        self.sku_map.get(sku)
    }

    /// Verified purchase for a product id.
    pub fn purchase(&self, sku: &str) -> Option<&Purchase> {
        self.purchase_map.get(sku)
    }

    pub fn has_details(&self, sku: &str) -> bool {
        self.sku_map.contains_key(sku)
    }

    pub fn has_purchase(&self, sku: &str) -> bool {
        self.purchase_map.contains_key(sku)
    }

    /// All catalog entries, in no particular order.
    pub fn all_sku_details(&self) -> impl Iterator<Item = &SkuDetails> {
        self.sku_map.values()
    }

    /// All verified purchases, in no particular order.
    pub fn all_purchases(&self) -> impl Iterator<Item = &Purchase> {
        self.purchase_map.values()
    }

    /// Product ids with a verified purchase.
    pub fn owned_skus(&self) -> Vec<&str> {
        self.purchase_map.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sku_map.is_empty() && self.purchase_map.is_empty()
    }

    /// Insert or overwrite a catalog entry.
    pub fn add_sku_details(&mut self, details: SkuDetails) {
        self.sku_map.insert(details.sku.clone(), details);
    }

    /// Insert or overwrite a purchase. Callers must have verified it.
    pub(crate) fn add_purchase(&mut self, purchase: Purchase) {
        self.purchase_map.insert(purchase.sku.clone(), purchase);
    }
}
