//! # Billing
//!
//! Client-side billing verification: a session that connects to the billing
//! backend, loads verified inventories and drives purchase flows.
//!
//! ## Overview
//!
//! - **Session**: connection lifecycle as an explicit state machine
//!   (Initial, Connecting, Ready, Busy, Terminated)
//! - **Inventory**: catalog entries plus owned purchases, rejected as a whole
//!   if any receipt fails its signature check
//! - **Purchase flow**: every attempt carries a fresh developer payload that
//!   must come back inside the signed receipt
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use billing::{BillingConfig, BillingSession};
//! use billing::launcher::memory::RecordingLauncher;
//! use billing::service::{MemoryBillingService, MemoryBinder};
//!
//! async fn example() -> billing::Result<()> {
//!     let binder = Arc::new(MemoryBinder::new(MemoryBillingService::new()));
//!     let config = BillingConfig::new("com.example.app", "MIIBIjANBgkq...");
//!     let mut session = BillingSession::new(config, binder, RecordingLauncher::new())?;
//!
//!     session.open(|result| println!("open: {:?}", result.is_ok()));
//!     session.process_next().await;
//!
//!     session.load_inventory(vec!["premium".into()], |result| match result {
//!         Ok(inventory) => println!("owned: {:?}", inventory.owned_skus()),
//!         Err(e) => println!("load failed ({}): {}", e.code(), e),
//!     });
//!     session.process_next().await;
//!
//!     session.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `billing::core` - Records, inventories and signature verification
//! - `billing::service` - Backend contract, reply decoding, in-memory backend

pub mod config;
pub mod error;
pub mod launcher;
pub mod session;
mod worker;

// Re-export component crates
pub use billing_core as core;
pub use billing_service as service;

pub use config::{BillingConfig, DEFAULT_API_VERSION, DEFAULT_MAX_SKUS_PER_REQUEST};
pub use error::{BillingError, Cause, Result};
pub use launcher::{PurchaseLauncher, PurchaseOutcome};
pub use session::{BillingSession, Listener, SessionState};

// Re-export commonly used core types
pub use billing_core::{
    CorrelationId, Inventory, ProductType, Purchase, PurchaseState, ResponseCode, SkuDetails,
};
