//! Proptest generators for property-based testing.

use proptest::prelude::*;

use billing_core::{DeveloperPayload, ResponseCode};

use crate::fixtures::PurchaseDoc;

/// A plausible product id.
pub fn sku() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_.]{0,15}"
}

/// A distinct set of product ids.
pub fn skus(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(sku(), 0..=max).prop_map(|set| set.into_iter().collect())
}

/// Printable text without quotes or backslashes.
pub fn text(max_len: usize) -> impl Strategy<Value = String> {
    proptest::string::string_regex(&format!("[ -!#-\\[\\]-~]{{0,{}}}", max_len))
        .expect("valid text regex")
}

/// A purchase state code, including values outside the known range.
pub fn purchase_state() -> impl Strategy<Value = i64> {
    prop_oneof![Just(0i64), Just(1), Just(2), -5i64..50]
}

/// A developer payload, generated the way sessions generate them.
pub fn developer_payload() -> impl Strategy<Value = DeveloperPayload> {
    any::<[u8; 16]>().prop_map(|bytes| {
        DeveloperPayload::from_string(billing_core::base64_encode(bytes))
    })
}

/// A backend response code, known or not.
pub fn response_code() -> impl Strategy<Value = ResponseCode> {
    prop_oneof![(0i32..=8).prop_map(ResponseCode), any::<i32>().prop_map(ResponseCode)]
}

/// Parameters for a purchase document.
pub fn purchase_doc() -> impl Strategy<Value = PurchaseDoc> {
    (sku(), text(24), text(24), 0i64..=i64::MAX / 2, purchase_state(), text(32), text(32)).prop_map(
        |(product_id, order_id, package_name, purchase_time, purchase_state, payload, token)| {
            PurchaseDoc {
                product_id,
                order_id,
                package_name,
                purchase_time,
                purchase_state,
                developer_payload: payload,
                purchase_token: token,
            }
        },
    )
}
