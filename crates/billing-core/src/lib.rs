//! # Billing Core
//!
//! Pure primitives for client-side billing verification: catalog entries,
//! purchase receipts, inventories, and RSA signature checks.
//!
//! This crate contains no I/O and no async code. It is pure computation over
//! documents delivered by the billing backend.
//!
//! ## Key Types
//!
//! - [`SkuDetails`] - A catalog entry
//! - [`Purchase`] - A receipt for an owned product
//! - [`Inventory`] - Catalog entries and verified purchases by product id
//! - [`PurchaseVerifier`] - Checks backend signatures with the app's public key
//! - [`ResponseCode`] - Backend and client-side status codes
//!
//! ## Trust Model
//!
//! Purchases only enter an [`Inventory`] through [`reconcile`], which rejects
//! the whole inventory if any receipt fails verification.

pub mod codec;
pub mod crypto;
pub mod document;
pub mod error;
pub mod inventory;
pub mod purchase;
pub mod sku;
pub mod types;
pub mod verification;

#[cfg(test)]
pub(crate) mod testing;

pub use codec::{base64_decode, base64_encode};
pub use crypto::{
    verify_signature, DeveloperPayload, PublicKey, PurchaseVerifier, DEVELOPER_PAYLOAD_LEN,
};
pub use document::Document;
pub use error::{CoreError, Result, VerificationFailure};
pub use inventory::Inventory;
pub use purchase::{Purchase, SignedPurchase};
pub use sku::SkuDetails;
pub use types::{CorrelationId, ProductType, PurchaseState, ResponseCode};
pub use verification::{reconcile, verify_purchase_result};
