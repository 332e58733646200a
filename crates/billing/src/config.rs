//! Session configuration.

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use billing_core::{ProductType, PurchaseVerifier};
use billing_service::CallContext;

use crate::error::Result;

/// Backend API version spoken by default.
pub const DEFAULT_API_VERSION: u32 = 3;

/// Per-call product id limit of `get_sku_details`.
pub const DEFAULT_MAX_SKUS_PER_REQUEST: usize = 20;

/// Configuration for a [`crate::BillingSession`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// The calling application's identity, sent with every remote call.
    pub app_id: String,
    /// Base64 of the backend's X.509 public key. Empty rejects every receipt.
    pub public_key: String,
    pub api_version: u32,
    pub product_type: ProductType,
    /// Upper bound on product ids per catalog request.
    pub max_skus_per_request: usize,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            public_key: String::new(),
            api_version: DEFAULT_API_VERSION,
            product_type: ProductType::default(),
            max_skus_per_request: DEFAULT_MAX_SKUS_PER_REQUEST,
        }
    }
}

impl BillingConfig {
    pub fn new(app_id: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            public_key: public_key.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON configuration; absent fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).context("invalid billing configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_api_version(mut self, api_version: u32) -> Self {
        self.api_version = api_version;
        self
    }

    pub fn with_product_type(mut self, product_type: ProductType) -> Self {
        self.product_type = product_type;
        self
    }

    pub fn with_max_skus_per_request(mut self, max: usize) -> Self {
        self.max_skus_per_request = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_skus_per_request == 0 {
            return Err(anyhow!("max_skus_per_request must be positive").into());
        }
        Ok(())
    }

    /// Build the receipt verifier for the configured key.
    pub fn verifier(&self) -> Result<PurchaseVerifier> {
        Ok(PurchaseVerifier::from_base64(&self.public_key)?)
    }

    pub(crate) fn call_context(&self) -> CallContext {
        CallContext {
            api_version: self.api_version,
            app_id: self.app_id.clone(),
            product_type: self.product_type,
        }
    }
}
