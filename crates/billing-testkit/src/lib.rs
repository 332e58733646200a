//! # Billing Testkit
//!
//! Testing utilities for the billing kernel.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a test signer standing in for the backend's key, document
//!   builders, and a pre-wired in-memory backend
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! ```rust
//! use billing_testkit::fixtures::{purchase_json, BackendFixture};
//!
//! let fixture = BackendFixture::new();
//! fixture.list("premium").own("premium");
//!
//! let data = purchase_json("premium", "");
//! let signature = fixture.signer.sign(&data);
//! assert!(fixture.signer.verifier().verify(&data, &signature));
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use billing_testkit::generators::purchase_doc;
//!
//! proptest! {
//!     #[test]
//!     fn parses(doc in purchase_doc()) {
//!         prop_assert!(billing_core::Purchase::from_json(&doc.to_json(), "").is_ok());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    purchase_json, purchase_result, sku_json, BackendFixture, PurchaseDoc, TestSigner,
};
pub use generators::{developer_payload, purchase_doc, response_code, sku, skus};
