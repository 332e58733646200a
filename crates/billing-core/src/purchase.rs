//! Purchase receipts.
//!
//! A [`Purchase`] is parsed from the signed JSON document the backend returns.
//! Parsing alone proves nothing: only purchases that went through
//! [`crate::verification`] are ever placed in an [`crate::Inventory`] or
//! handed to a purchase listener.

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::Result;
use crate::types::PurchaseState;

/// A receipt for an owned product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    /// Product id, the inventory key.
    pub sku: String,
    pub order_id: String,
    pub package_name: String,
    /// Purchase time in milliseconds since the Unix epoch.
    pub purchase_time: i64,
    pub purchase_state: PurchaseState,
    /// The anti-tamper token echoed back by the backend.
    pub developer_payload: String,
    /// Backend-issued identifier of this purchase.
    pub purchase_token: String,
    /// Base64 signature over `original_json`.
    pub signature: String,
    /// The signed document, byte for byte as received.
    pub original_json: String,
}

impl Purchase {
    /// Parse a purchase document and attach its signature.
    ///
    /// The purchase token is read from `token`, falling back to
    /// `purchaseToken` when `token` is absent or empty.
    pub fn from_json(json: &str, signature: &str) -> Result<Self> {
        let doc = Document::parse(json)?;

        let mut purchase_token = doc.opt_str("token");
        if purchase_token.is_empty() {
            purchase_token = doc.opt_str("purchaseToken");
        }

        Ok(Self {
            sku: doc.opt_str("productId"),
            order_id: doc.opt_str("orderId"),
            package_name: doc.opt_str("packageName"),
            purchase_time: doc.opt_i64("purchaseTime"),
            purchase_state: PurchaseState::from_code(doc.opt_i64("purchaseState")),
            developer_payload: doc.opt_str("developerPayload"),
            purchase_token,
            signature: signature.to_string(),
            original_json: json.to_string(),
        })
    }
}

/// A purchase document and its signature, as delivered by the backend and
/// not yet verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPurchase {
    /// Product id the backend listed this record under.
    pub sku: String,
    /// The signed JSON document.
    pub data: String,
    /// Base64 signature over `data`.
    pub signature: String,
}

impl SignedPurchase {
    pub fn new(sku: impl Into<String>, data: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            data: data.into(),
            signature: signature.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_fields() {
        let json = r#"{
            "orderId": "GPA.1234-5678",
            "packageName": "com.example.app",
            "productId": "premium",
            "purchaseTime": 1500000000000,
            "purchaseState": 0,
            "developerPayload": "cGF5bG9hZA==",
            "purchaseToken": "opaque-token"
        }"#;
        let purchase = Purchase::from_json(json, "c2ln").unwrap();
        assert_eq!(purchase.sku, "premium");
        assert_eq!(purchase.order_id, "GPA.1234-5678");
        assert_eq!(purchase.package_name, "com.example.app");
        assert_eq!(purchase.purchase_time, 1_500_000_000_000);
        assert_eq!(purchase.purchase_state, PurchaseState::Purchased);
        assert_eq!(purchase.developer_payload, "cGF5bG9hZA==");
        assert_eq!(purchase.purchase_token, "opaque-token");
        assert_eq!(purchase.signature, "c2ln");
        assert_eq!(purchase.original_json, json);
    }

    #[test]
    fn test_token_field_preferred() {
        let purchase =
            Purchase::from_json(r#"{"token": "first", "purchaseToken": "second"}"#, "").unwrap();
        assert_eq!(purchase.purchase_token, "first");
    }

    #[test]
    fn test_empty_token_falls_back() {
        let purchase =
            Purchase::from_json(r#"{"token": "", "purchaseToken": "second"}"#, "").unwrap();
        assert_eq!(purchase.purchase_token, "second");
    }

    #[test]
    fn test_missing_fields_default() {
        let purchase = Purchase::from_json("{}", "sig").unwrap();
        assert_eq!(purchase.sku, "");
        assert_eq!(purchase.purchase_time, 0);
        assert_eq!(purchase.purchase_state, PurchaseState::Purchased);
        assert_eq!(purchase.purchase_token, "");
    }

    #[test]
    fn test_refunded_state() {
        let purchase = Purchase::from_json(r#"{"purchaseState": 2}"#, "").unwrap();
        assert_eq!(purchase.purchase_state, PurchaseState::Refunded);
    }
}
