//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a signing key standing in for
//! the backend, JSON document builders, and a pre-wired in-memory backend.

use std::sync::{Arc, OnceLock};

use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde_json::json;
use sha1::Sha1;

use billing_core::{base64_encode, PublicKey, PurchaseVerifier, SignedPurchase};
use billing_service::{keys, Bundle, BundleValue, MemoryBillingService, MemoryBinder};

/// Size of generated test keys. Small enough to generate quickly.
pub const TEST_KEY_BITS: usize = 1024;

/// Signs documents the way the backend does (RSA PKCS#1 v1.5 over SHA-1).
pub struct TestSigner {
    key: SigningKey<Sha1>,
    public: PublicKey,
}

impl TestSigner {
    /// Generate a signer with a fresh key.
    pub fn generate() -> Self {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), TEST_KEY_BITS)
            .expect("generate RSA test key");
        let der = private
            .to_public_key()
            .to_public_key_der()
            .expect("encode RSA test key");
        let public = PublicKey::from_der(der.as_bytes()).expect("parse RSA test key");
        Self {
            key: SigningKey::<Sha1>::new(private),
            public,
        }
    }

    /// A process-wide signer, generated once.
    pub fn shared() -> &'static TestSigner {
        static SIGNER: OnceLock<TestSigner> = OnceLock::new();
        SIGNER.get_or_init(TestSigner::generate)
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// The public key in the form shipped with an application.
    pub fn public_key_base64(&self) -> String {
        self.public.to_base64()
    }

    pub fn verifier(&self) -> PurchaseVerifier {
        PurchaseVerifier::new(self.public.clone())
    }

    /// Base64 signature over `data`.
    pub fn sign(&self, data: &str) -> String {
        base64_encode(self.key.sign(data.as_bytes()).to_vec())
    }

    pub fn sign_purchase(&self, sku: &str, data: &str) -> SignedPurchase {
        SignedPurchase::new(sku, data, self.sign(data))
    }

    /// A successful purchase-UI result carrying `data` and its signature.
    pub fn purchase_result(&self, data: &str) -> Bundle {
        purchase_result(data, &self.sign(data))
    }
}

/// A purchase-UI result bundle with explicit data and signature.
pub fn purchase_result(data: &str, signature: &str) -> Bundle {
    Bundle::with_code(billing_core::ResponseCode::OK)
        .with(keys::INAPP_PURCHASE_DATA, BundleValue::Str(data.to_string()))
        .with(keys::INAPP_DATA_SIGNATURE, BundleValue::Str(signature.to_string()))
}

/// Builder for purchase documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseDoc {
    pub product_id: String,
    pub order_id: String,
    pub package_name: String,
    pub purchase_time: i64,
    pub purchase_state: i64,
    pub developer_payload: String,
    pub purchase_token: String,
}

impl PurchaseDoc {
    pub fn new(product_id: &str) -> Self {
        Self {
            product_id: product_id.to_string(),
            order_id: format!("GPA.{}", product_id),
            package_name: "com.example.app".to_string(),
            purchase_time: 1_500_000_000_000,
            purchase_state: 0,
            developer_payload: String::new(),
            purchase_token: format!("token-{}", product_id),
        }
    }

    pub fn payload(mut self, payload: &str) -> Self {
        self.developer_payload = payload.to_string();
        self
    }

    pub fn state(mut self, state: i64) -> Self {
        self.purchase_state = state;
        self
    }

    pub fn time(mut self, millis: i64) -> Self {
        self.purchase_time = millis;
        self
    }

    pub fn to_json(&self) -> String {
        json!({
            "orderId": self.order_id,
            "packageName": self.package_name,
            "productId": self.product_id,
            "purchaseTime": self.purchase_time,
            "purchaseState": self.purchase_state,
            "developerPayload": self.developer_payload,
            "purchaseToken": self.purchase_token,
        })
        .to_string()
    }
}

/// Purchase document for `sku` echoing `payload`.
pub fn purchase_json(sku: &str, payload: &str) -> String {
    PurchaseDoc::new(sku).payload(payload).to_json()
}

/// Catalog document for `sku`.
pub fn sku_json(sku: &str, price: &str) -> String {
    json!({
        "productId": sku,
        "type": "inapp",
        "price": price,
        "price_amount_micros": 990_000,
        "price_currency_code": "USD",
        "title": format!("{} title", sku),
        "description": format!("{} description", sku),
    })
    .to_string()
}

/// An in-memory backend wired to a binder, signing with the shared key.
pub struct BackendFixture {
    pub signer: &'static TestSigner,
    pub service: Arc<MemoryBillingService>,
    pub binder: Arc<MemoryBinder>,
}

impl BackendFixture {
    pub fn new() -> Self {
        let service = MemoryBillingService::new();
        let binder = Arc::new(MemoryBinder::new(Arc::clone(&service)));
        Self {
            signer: TestSigner::shared(),
            service,
            binder,
        }
    }

    /// Add `sku` to the catalog.
    pub fn list(&self, sku: &str) -> &Self {
        self.service.add_catalog_entry(sku, sku_json(sku, "$0.99"));
        self
    }

    /// Record a validly signed purchase of `sku`.
    pub fn own(&self, sku: &str) -> &Self {
        let data = purchase_json(sku, "");
        self.service.add_owned(self.signer.sign_purchase(sku, &data));
        self
    }

    /// Record a purchase of `sku` whose signature does not match its data.
    pub fn own_tampered(&self, sku: &str) -> &Self {
        let signed = purchase_json(sku, "");
        let forged = PurchaseDoc::new(sku).state(2).to_json();
        self.service
            .add_owned(SignedPurchase::new(sku, forged, self.signer.sign(&signed)));
        self
    }

    pub fn public_key_base64(&self) -> String {
        self.signer.public_key_base64()
    }
}

impl Default for BackendFixture {
    fn default() -> Self {
        Self::new()
    }
}
