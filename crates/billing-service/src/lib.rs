//! # Billing Service
//!
//! The contract between the billing kernel and the platform's billing
//! backend.
//!
//! ## Overview
//!
//! The backend is reached through a platform-owned connection. This crate
//! describes the remote calls ([`BillingService`]), how a connection is
//! bound and released ([`ServiceBinder`]), how reply bundles are decoded, and
//! the multi-call sequences the session runs on worker tasks.
//!
//! ## Connection Slot
//!
//! The bound service lives in a [`ServiceSlot`]. Worker tasks hold a
//! [`ServiceHandle`] and re-read it before every remote call, so a teardown
//! in the middle of an operation surfaces as [`ServiceError::Disposed`]
//! instead of a call on a dead connection.
//!
//! ## Call Flow
//!
//! ```text
//! open:            bind ─> is_billing_supported
//! load inventory:  get_sku_details (chunked) ─> get_purchases (paged)
//! purchase:        get_buy_intent ─> platform purchase UI
//! ```

pub mod bundle;
pub mod error;
pub mod protocol;
pub mod service;

pub use bundle::{
    decode_buy_intent, decode_purchase_page, decode_sku_details, expect_ok, keys, response_code,
    Bundle, BundleValue, LaunchHandle, PurchasePage,
};
pub use error::{Result, ServiceError};
pub use protocol::{
    check_billing_supported, fetch_purchases, fetch_sku_details, request_buy_intent, CallContext,
    MAX_PURCHASE_PAGES,
};
pub use service::{
    memory::{BindBehavior, MemoryBillingService, MemoryBinder, ServiceCall},
    BillingService, ServiceBinder, ServiceHandle, ServiceSlot,
};
