//! Catalog entries.

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::Result;
use crate::types::ProductType;

/// Descriptive and pricing metadata for a purchasable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuDetails {
    /// Product id, the inventory key.
    pub sku: String,
    /// Raw product type (`inapp` or `subs`).
    pub kind: String,
    /// Formatted price including the currency sign.
    pub price: String,
    /// Price in micro-units (1,000,000 micro-units equal one unit).
    pub price_amount_micros: i64,
    /// ISO 4217 currency code.
    pub price_currency_code: String,
    pub title: String,
    pub description: String,
}

impl SkuDetails {
    /// Parse a catalog document.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc = Document::parse(json)?;
        Ok(Self {
            sku: doc.opt_str("productId"),
            kind: doc.opt_str("type"),
            price: doc.opt_str("price"),
            price_amount_micros: doc.opt_i64("price_amount_micros"),
            price_currency_code: doc.opt_str("price_currency_code"),
            title: doc.opt_str("title"),
            description: doc.opt_str("description"),
        })
    }

    /// The product type, if the raw value is one we know.
    pub fn product_type(&self) -> Option<ProductType> {
        ProductType::from_wire(&self.kind)
    }
}
