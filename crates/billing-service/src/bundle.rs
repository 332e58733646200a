//! Reply bundles exchanged with the billing backend.
//!
//! The backend answers every call with a loosely-typed key/value bundle. This
//! module holds the bundle type, the well-known keys, and the decoders that
//! turn a bundle into typed values.

use std::collections::BTreeMap;

use billing_core::{ResponseCode, SignedPurchase};

use crate::error::{Result, ServiceError};

/// Well-known bundle keys.
pub mod keys {
    pub const RESPONSE_CODE: &str = "RESPONSE_CODE";
    pub const DETAILS_LIST: &str = "DETAILS_LIST";
    pub const BUY_INTENT: &str = "BUY_INTENT";
    pub const INAPP_PURCHASE_DATA: &str = "INAPP_PURCHASE_DATA";
    pub const INAPP_DATA_SIGNATURE: &str = "INAPP_DATA_SIGNATURE";
    pub const INAPP_PURCHASE_ITEM_LIST: &str = "INAPP_PURCHASE_ITEM_LIST";
    pub const INAPP_PURCHASE_DATA_LIST: &str = "INAPP_PURCHASE_DATA_LIST";
    pub const INAPP_DATA_SIGNATURE_LIST: &str = "INAPP_DATA_SIGNATURE_LIST";
    pub const INAPP_CONTINUATION_TOKEN: &str = "INAPP_CONTINUATION_TOKEN";
    pub const ITEM_ID_LIST: &str = "ITEM_ID_LIST";
}

/// Opaque handle the purchase UI needs to present a buy flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LaunchHandle(pub String);

impl LaunchHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A single bundle value.
#[derive(Debug, Clone, PartialEq)]
pub enum BundleValue {
    Int(i32),
    Long(i64),
    Bool(bool),
    Str(String),
    StrList(Vec<String>),
    Launch(LaunchHandle),
}

/// A loosely-typed reply from the backend or the purchase UI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    entries: BTreeMap<String, BundleValue>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: BundleValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: BundleValue) {
        self.entries.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&BundleValue> {
        self.entries.get(key)
    }

    /// String value, or `None` if absent or of another type.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(BundleValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// String-list value, or `None` if absent or of another type.
    pub fn get_str_list(&self, key: &str) -> Option<&[String]> {
        match self.entries.get(key) {
            Some(BundleValue::StrList(list)) => Some(list),
            _ => None,
        }
    }

    pub fn get_launch_handle(&self, key: &str) -> Option<&LaunchHandle> {
        match self.entries.get(key) {
            Some(BundleValue::Launch(handle)) => Some(handle),
            _ => None,
        }
    }

    /// Bundle carrying only a response code.
    pub fn with_code(code: ResponseCode) -> Self {
        Self::new().with(keys::RESPONSE_CODE, BundleValue::Int(code.code()))
    }
}

/// Read the status code of a reply.
///
/// An absent code means OK. 32-bit and 64-bit integers are both accepted; a
/// 64-bit value outside the 32-bit range or any other value type is a
/// protocol violation.
pub fn response_code(bundle: &Bundle) -> Result<ResponseCode> {
    match bundle.get(keys::RESPONSE_CODE) {
        None => Ok(ResponseCode::OK),
        Some(BundleValue::Int(code)) => Ok(ResponseCode(*code)),
        Some(BundleValue::Long(code)) => i32::try_from(*code).map(ResponseCode).map_err(|_| {
            ServiceError::Protocol(format!("response code {} out of range", code))
        }),
        Some(other) => Err(ServiceError::Protocol(format!(
            "unexpected type for response code: {}",
            value_type(other)
        ))),
    }
}

/// Fail with [`ServiceError::Status`] unless the reply is OK.
pub fn expect_ok(bundle: &Bundle) -> Result<()> {
    let code = response_code(bundle)?;
    if code.is_ok() {
        Ok(())
    } else {
        Err(ServiceError::Status(code))
    }
}

/// Decode a `get_buy_intent` reply into its launch handle.
pub fn decode_buy_intent(bundle: &Bundle) -> Result<LaunchHandle> {
    expect_ok(bundle)?;
    bundle
        .get_launch_handle(keys::BUY_INTENT)
        .cloned()
        .ok_or_else(|| ServiceError::Protocol("buy intent reply without launch handle".into()))
}

/// Decode a `get_sku_details` reply into catalog documents.
///
/// A missing details list is an empty catalog.
pub fn decode_sku_details(bundle: &Bundle) -> Result<Vec<String>> {
    expect_ok(bundle)?;
    Ok(bundle
        .get_str_list(keys::DETAILS_LIST)
        .map(<[String]>::to_vec)
        .unwrap_or_default())
}

/// One page of owned purchases.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurchasePage {
    pub purchases: Vec<SignedPurchase>,
    pub continuation_token: Option<String>,
}

/// Decode a `get_purchases` reply.
///
/// The backend sends three index-aligned lists (product ids, documents,
/// signatures). They are zipped into [`SignedPurchase`] records here. All
/// three absent means no purchases; only some present, or lists of different
/// lengths, is a protocol violation.
pub fn decode_purchase_page(bundle: &Bundle) -> Result<PurchasePage> {
    expect_ok(bundle)?;

    let skus = bundle.get_str_list(keys::INAPP_PURCHASE_ITEM_LIST);
    let data = bundle.get_str_list(keys::INAPP_PURCHASE_DATA_LIST);
    let signatures = bundle.get_str_list(keys::INAPP_DATA_SIGNATURE_LIST);

    let purchases = match (skus, data, signatures) {
        (None, None, None) => Vec::new(),
        (Some(skus), Some(data), Some(signatures)) => {
            if skus.len() != data.len() || data.len() != signatures.len() {
                return Err(ServiceError::Protocol(format!(
                    "purchase lists differ in length: {} ids, {} documents, {} signatures",
                    skus.len(),
                    data.len(),
                    signatures.len()
                )));
            }
            skus.iter()
                .zip(data)
                .zip(signatures)
                .map(|((sku, data), signature)| SignedPurchase::new(sku, data, signature))
                .collect()
        }
        _ => {
            return Err(ServiceError::Protocol(
                "purchase reply is missing one of its lists".into(),
            ))
        }
    };

    let continuation_token = bundle
        .get_str(keys::INAPP_CONTINUATION_TOKEN)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    Ok(PurchasePage {
        purchases,
        continuation_token,
    })
}

fn value_type(value: &BundleValue) -> &'static str {
    match value {
        BundleValue::Int(_) => "int",
        BundleValue::Long(_) => "long",
        BundleValue::Bool(_) => "bool",
        BundleValue::Str(_) => "string",
        BundleValue::StrList(_) => "string list",
        BundleValue::Launch(_) => "launch handle",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn list(items: &[&str]) -> BundleValue {
        BundleValue::StrList(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_response_code_absent_is_ok() {
        assert_eq!(response_code(&Bundle::new()).unwrap(), ResponseCode::OK);
    }

    #[test]
    fn test_response_code_int_and_long() {
        let int = Bundle::new().with(keys::RESPONSE_CODE, BundleValue::Int(7));
        let long = Bundle::new().with(keys::RESPONSE_CODE, BundleValue::Long(7));
        assert_eq!(response_code(&int).unwrap(), ResponseCode::ITEM_ALREADY_OWNED);
        assert_eq!(response_code(&long).unwrap(), ResponseCode::ITEM_ALREADY_OWNED);
    }

    #[test]
    fn test_response_code_other_types_rejected() {
        let s = Bundle::new().with(keys::RESPONSE_CODE, BundleValue::Str("0".into()));
        assert!(matches!(response_code(&s), Err(ServiceError::Protocol(_))));

        let huge = Bundle::new().with(keys::RESPONSE_CODE, BundleValue::Long(i64::MAX));
        assert!(matches!(response_code(&huge), Err(ServiceError::Protocol(_))));
    }

    #[test]
    fn test_expect_ok_reports_status() {
        let bundle = Bundle::with_code(ResponseCode::ITEM_UNAVAILABLE);
        match expect_ok(&bundle) {
            Err(ServiceError::Status(code)) => assert_eq!(code, ResponseCode::ITEM_UNAVAILABLE),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_decode_buy_intent() {
        let bundle = Bundle::with_code(ResponseCode::OK)
            .with(keys::BUY_INTENT, BundleValue::Launch(LaunchHandle("intent-1".into())));
        assert_eq!(decode_buy_intent(&bundle).unwrap().as_str(), "intent-1");

        let missing = Bundle::with_code(ResponseCode::OK);
        assert!(matches!(decode_buy_intent(&missing), Err(ServiceError::Protocol(_))));
    }

    #[test]
    fn test_decode_sku_details_missing_list() {
        assert!(decode_sku_details(&Bundle::new()).unwrap().is_empty());
    }

    #[test]
    fn test_decode_purchase_page() {
        let bundle = Bundle::new()
            .with(keys::INAPP_PURCHASE_ITEM_LIST, list(&["a", "b"]))
            .with(keys::INAPP_PURCHASE_DATA_LIST, list(&["{\"productId\":\"a\"}", "{}"]))
            .with(keys::INAPP_DATA_SIGNATURE_LIST, list(&["sa", "sb"]))
            .with(keys::INAPP_CONTINUATION_TOKEN, BundleValue::Str("next".into()));

        let page = decode_purchase_page(&bundle).unwrap();
        assert_eq!(page.purchases.len(), 2);
        assert_eq!(page.purchases[1], SignedPurchase::new("b", "{}", "sb"));
        assert_eq!(page.continuation_token.as_deref(), Some("next"));
    }

    #[test]
    fn test_decode_purchase_page_empty() {
        let page = decode_purchase_page(&Bundle::new()).unwrap();
        assert!(page.purchases.is_empty());
        assert!(page.continuation_token.is_none());

        let blank_token =
            Bundle::new().with(keys::INAPP_CONTINUATION_TOKEN, BundleValue::Str(String::new()));
        assert!(decode_purchase_page(&blank_token).unwrap().continuation_token.is_none());
    }

    #[test]
    fn test_decode_purchase_page_misaligned() {
        let bundle = Bundle::new()
            .with(keys::INAPP_PURCHASE_ITEM_LIST, list(&["a", "b"]))
            .with(keys::INAPP_PURCHASE_DATA_LIST, list(&["{}", "{}"]))
            .with(keys::INAPP_DATA_SIGNATURE_LIST, list(&["sa"]));
        assert!(matches!(decode_purchase_page(&bundle), Err(ServiceError::Protocol(_))));

        let partial = Bundle::new().with(keys::INAPP_PURCHASE_DATA_LIST, list(&["{}"]));
        assert!(matches!(decode_purchase_page(&partial), Err(ServiceError::Protocol(_))));
    }

    proptest! {
        #[test]
        fn purchase_lists_stay_aligned(records in prop::collection::vec(("[a-z]{1,8}", "[ -~]{0,16}", "[A-Za-z0-9+/]{0,12}"), 0..20)) {
            let skus: Vec<String> = records.iter().map(|r| r.0.clone()).collect();
            let data: Vec<String> = records.iter().map(|r| r.1.clone()).collect();
            let sigs: Vec<String> = records.iter().map(|r| r.2.clone()).collect();
            let bundle = Bundle::new()
                .with(keys::INAPP_PURCHASE_ITEM_LIST, BundleValue::StrList(skus))
                .with(keys::INAPP_PURCHASE_DATA_LIST, BundleValue::StrList(data))
                .with(keys::INAPP_DATA_SIGNATURE_LIST, BundleValue::StrList(sigs));

            let page = decode_purchase_page(&bundle).unwrap();
            prop_assert_eq!(page.purchases.len(), records.len());
            for (purchase, (sku, data, sig)) in page.purchases.iter().zip(&records) {
                prop_assert_eq!(&purchase.sku, sku);
                prop_assert_eq!(&purchase.data, data);
                prop_assert_eq!(&purchase.signature, sig);
            }
        }
    }
}
