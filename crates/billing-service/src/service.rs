//! Service abstraction for the billing backend.
//!
//! The platform owns the actual connection mechanism and RPC transport. This
//! module defines the calls the kernel needs ([`BillingService`]), how a
//! connection is established and released ([`ServiceBinder`]), and the
//! connection slot shared between the session and its workers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use billing_core::{ProductType, ResponseCode};

use crate::bundle::Bundle;
use crate::error::{Result, ServiceError};

/// Remote calls exposed by the billing backend.
///
/// Implementations must be thread-safe (Send + Sync); calls are issued from
/// worker tasks, never from the control thread.
#[async_trait]
pub trait BillingService: Send + Sync {
    /// Ask whether billing of `product_type` is supported for `app_id`.
    async fn is_billing_supported(
        &self,
        api_version: u32,
        app_id: &str,
        product_type: ProductType,
    ) -> Result<ResponseCode>;

    /// Request a purchase intent for `sku`, tagged with `developer_payload`.
    ///
    /// Reply keys: `RESPONSE_CODE`, `BUY_INTENT`.
    async fn get_buy_intent(
        &self,
        api_version: u32,
        app_id: &str,
        sku: &str,
        product_type: ProductType,
        developer_payload: &str,
    ) -> Result<Bundle>;

    /// Fetch catalog documents for `skus`.
    ///
    /// Reply keys: `RESPONSE_CODE`, `DETAILS_LIST`.
    async fn get_sku_details(
        &self,
        api_version: u32,
        app_id: &str,
        product_type: ProductType,
        skus: &[String],
    ) -> Result<Bundle>;

    /// Fetch one page of owned purchases.
    ///
    /// Reply keys: `RESPONSE_CODE`, `INAPP_PURCHASE_ITEM_LIST`,
    /// `INAPP_PURCHASE_DATA_LIST`, `INAPP_DATA_SIGNATURE_LIST`,
    /// `INAPP_CONTINUATION_TOKEN`.
    async fn get_purchases(
        &self,
        api_version: u32,
        app_id: &str,
        product_type: ProductType,
        continuation_token: Option<&str>,
    ) -> Result<Bundle>;
}

/// Establishes and releases the connection to the billing backend.
#[async_trait]
pub trait ServiceBinder: Send + Sync + 'static {
    /// The service handed out once bound.
    type Service: BillingService + 'static;

    /// Connect to the backend.
    ///
    /// Fails with [`ServiceError::BindUnavailable`] when the service cannot
    /// be reached, or [`ServiceError::BindRejected`] on a security rejection.
    async fn bind(&self) -> Result<Arc<Self::Service>>;

    /// Release the connection.
    fn unbind(&self) -> Result<()>;
}

/// Owner side of the connection slot.
///
/// The session publishes the bound service here and clears it on teardown or
/// disconnect. Workers observe it through [`ServiceHandle`].
pub struct ServiceSlot<S: ?Sized> {
    tx: watch::Sender<Option<Arc<S>>>,
}

impl<S: ?Sized> ServiceSlot<S> {
    /// Create an empty slot.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Publish a live connection.
    pub fn publish(&self, service: Arc<S>) {
        self.tx.send_replace(Some(service));
    }

    /// Drop the connection. Workers fail with `Disposed` from now on.
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn is_connected(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// A read handle for worker tasks.
    pub fn handle(&self) -> ServiceHandle<S> {
        ServiceHandle {
            rx: self.tx.subscribe(),
        }
    }
}

impl<S: ?Sized> Default for ServiceSlot<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker side of the connection slot.
pub struct ServiceHandle<S: ?Sized> {
    rx: watch::Receiver<Option<Arc<S>>>,
}

impl<S: ?Sized> ServiceHandle<S> {
    /// The live service, or [`ServiceError::Disposed`] if the connection has
    /// been dropped.
    ///
    /// Read this before every remote call; never cache the result across
    /// calls.
    pub fn current(&self) -> Result<Arc<S>> {
        self.rx.borrow().clone().ok_or(ServiceError::Disposed)
    }
}

impl<S: ?Sized> Clone for ServiceHandle<S> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

/// An in-memory billing backend for testing.
///
/// Serves a configurable catalog and set of owned purchases, records every
/// call, and can be paused to hold calls in flight.
pub mod memory {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use billing_core::SignedPurchase;

    use crate::bundle::{keys, BundleValue, LaunchHandle};

    /// A call received by [`MemoryBillingService`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ServiceCall {
        IsBillingSupported {
            app_id: String,
            product_type: ProductType,
        },
        GetBuyIntent {
            sku: String,
            developer_payload: String,
        },
        GetSkuDetails {
            skus: Vec<String>,
        },
        GetPurchases {
            continuation_token: Option<String>,
        },
    }

    #[derive(Default)]
    struct MemoryState {
        api_version: Option<u32>,
        support_code: Option<ResponseCode>,
        buy_intent_code: Option<ResponseCode>,
        catalog: BTreeMap<String, String>,
        owned: Vec<SignedPurchase>,
        page_size: Option<usize>,
        sku_reply: Option<Bundle>,
        purchases_reply: Option<Bundle>,
        transport_failure: Option<String>,
        panic_message: Option<String>,
        calls: Vec<ServiceCall>,
        intents_issued: u32,
    }

    /// In-memory service implementation.
    pub struct MemoryBillingService {
        state: Mutex<MemoryState>,
        paused: watch::Sender<bool>,
    }

    impl MemoryBillingService {
        /// Create a backend that supports billing and owns nothing.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
            self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }

        /// Add a catalog document, keyed by product id.
        pub fn add_catalog_entry(&self, sku: &str, document: impl Into<String>) {
            self.state().catalog.insert(sku.to_string(), document.into());
        }

        /// Add an owned purchase.
        pub fn add_owned(&self, purchase: SignedPurchase) {
            self.state().owned.push(purchase);
        }

        /// Status returned by `is_billing_supported`.
        pub fn set_support_code(&self, code: ResponseCode) {
            self.state().support_code = Some(code);
        }

        /// Status returned by `get_buy_intent`.
        pub fn set_buy_intent_code(&self, code: ResponseCode) {
            self.state().buy_intent_code = Some(code);
        }

        /// Only answer calls made with this API version; others get
        /// `DEVELOPER_ERROR`.
        pub fn require_api_version(&self, version: u32) {
            self.state().api_version = Some(version);
        }

        /// Split owned purchases into pages of `size`.
        pub fn set_page_size(&self, size: usize) {
            self.state().page_size = Some(size.max(1));
        }

        /// Answer every `get_sku_details` call with this bundle.
        pub fn set_sku_reply(&self, reply: Bundle) {
            self.state().sku_reply = Some(reply);
        }

        /// Answer every `get_purchases` call with this bundle.
        pub fn set_purchases_reply(&self, reply: Bundle) {
            self.state().purchases_reply = Some(reply);
        }

        /// Fail every call at the transport level.
        pub fn fail_transport(&self, message: &str) {
            self.state().transport_failure = Some(message.to_string());
        }

        /// Panic inside every call, as a faulty backend would.
        pub fn panic_calls(&self, message: &str) {
            self.state().panic_message = Some(message.to_string());
        }

        /// Hold every call until [`resume`](Self::resume). Held calls are
        /// already listed by [`calls`](Self::calls).
        pub fn pause(&self) {
            self.paused.send_replace(true);
        }

        pub fn resume(&self) {
            self.paused.send_replace(false);
        }

        /// Calls received so far.
        pub fn calls(&self) -> Vec<ServiceCall> {
            self.state().calls.clone()
        }

        async fn enter(&self, call: ServiceCall, api_version: u32) -> Result<Option<ResponseCode>> {
            self.state().calls.push(call);

            let mut paused = self.paused.subscribe();
            loop {
                let is_paused = *paused.borrow_and_update();
                if !is_paused || paused.changed().await.is_err() {
                    break;
                }
            }

            let state = self.state();
            if let Some(message) = state.panic_message.clone() {
                drop(state);
                panic!("{}", message);
            }
            if let Some(message) = &state.transport_failure {
                return Err(ServiceError::Transport(message.clone()));
            }
            match state.api_version {
                Some(required) if required != api_version => {
                    Ok(Some(ResponseCode::DEVELOPER_ERROR))
                }
                _ => Ok(None),
            }
        }

        fn purchase_page(&self, continuation_token: Option<&str>) -> Result<Bundle> {
            let state = self.state();
            if let Some(reply) = &state.purchases_reply {
                return Ok(reply.clone());
            }

            let start = match continuation_token {
                None => 0,
                Some(token) => token
                    .strip_prefix("page-")
                    .and_then(|n| n.parse::<usize>().ok())
                    .ok_or_else(|| {
                        ServiceError::Protocol(format!("unknown continuation token {}", token))
                    })?,
            };
            let size = state.page_size.unwrap_or(usize::MAX);
            let end = start.saturating_add(size).min(state.owned.len());
            let page = state.owned.get(start..end).unwrap_or(&[]);

            let mut reply = Bundle::with_code(ResponseCode::OK)
                .with(
                    keys::INAPP_PURCHASE_ITEM_LIST,
                    BundleValue::StrList(page.iter().map(|p| p.sku.clone()).collect()),
                )
                .with(
                    keys::INAPP_PURCHASE_DATA_LIST,
                    BundleValue::StrList(page.iter().map(|p| p.data.clone()).collect()),
                )
                .with(
                    keys::INAPP_DATA_SIGNATURE_LIST,
                    BundleValue::StrList(page.iter().map(|p| p.signature.clone()).collect()),
                );
            if end < state.owned.len() {
                reply.insert(
                    keys::INAPP_CONTINUATION_TOKEN,
                    BundleValue::Str(format!("page-{}", end)),
                );
            }
            Ok(reply)
        }
    }

    impl Default for MemoryBillingService {
        fn default() -> Self {
            let (paused, _rx) = watch::channel(false);
            Self {
                state: Mutex::new(MemoryState::default()),
                paused,
            }
        }
    }

    #[async_trait]
    impl BillingService for MemoryBillingService {
        async fn is_billing_supported(
            &self,
            api_version: u32,
            app_id: &str,
            product_type: ProductType,
        ) -> Result<ResponseCode> {
            let call = ServiceCall::IsBillingSupported {
                app_id: app_id.to_string(),
                product_type,
            };
            if let Some(code) = self.enter(call, api_version).await? {
                return Ok(code);
            }
            Ok(self.state().support_code.unwrap_or(ResponseCode::OK))
        }

        async fn get_buy_intent(
            &self,
            api_version: u32,
            _app_id: &str,
            sku: &str,
            _product_type: ProductType,
            developer_payload: &str,
        ) -> Result<Bundle> {
            let call = ServiceCall::GetBuyIntent {
                sku: sku.to_string(),
                developer_payload: developer_payload.to_string(),
            };
            if let Some(code) = self.enter(call, api_version).await? {
                return Ok(Bundle::with_code(code));
            }

            let mut state = self.state();
            let code = state.buy_intent_code.unwrap_or(ResponseCode::OK);
            if !code.is_ok() {
                return Ok(Bundle::with_code(code));
            }
            state.intents_issued += 1;
            let handle = LaunchHandle(format!("buy:{}:{}", sku, state.intents_issued));
            Ok(Bundle::with_code(code).with(keys::BUY_INTENT, BundleValue::Launch(handle)))
        }

        async fn get_sku_details(
            &self,
            api_version: u32,
            _app_id: &str,
            _product_type: ProductType,
            skus: &[String],
        ) -> Result<Bundle> {
            let call = ServiceCall::GetSkuDetails {
                skus: skus.to_vec(),
            };
            if let Some(code) = self.enter(call, api_version).await? {
                return Ok(Bundle::with_code(code));
            }

            let state = self.state();
            if let Some(reply) = &state.sku_reply {
                return Ok(reply.clone());
            }
            let details = skus
                .iter()
                .filter_map(|sku| state.catalog.get(sku).cloned())
                .collect();
            Ok(Bundle::with_code(ResponseCode::OK)
                .with(keys::DETAILS_LIST, BundleValue::StrList(details)))
        }

        async fn get_purchases(
            &self,
            api_version: u32,
            _app_id: &str,
            _product_type: ProductType,
            continuation_token: Option<&str>,
        ) -> Result<Bundle> {
            let call = ServiceCall::GetPurchases {
                continuation_token: continuation_token.map(str::to_string),
            };
            if let Some(code) = self.enter(call, api_version).await? {
                return Ok(Bundle::with_code(code));
            }
            self.purchase_page(continuation_token)
        }
    }

    /// How [`MemoryBinder`] answers a bind request.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum BindBehavior {
        Connect,
        Unavailable,
        Reject(String),
    }

    #[derive(Default)]
    struct BinderState {
        binds: u32,
        unbinds: u32,
        fail_unbind: bool,
    }

    /// Binder handing out a shared [`MemoryBillingService`].
    pub struct MemoryBinder {
        service: Arc<MemoryBillingService>,
        behavior: Mutex<BindBehavior>,
        state: Mutex<BinderState>,
    }

    impl MemoryBinder {
        pub fn new(service: Arc<MemoryBillingService>) -> Self {
            Self {
                service,
                behavior: Mutex::new(BindBehavior::Connect),
                state: Mutex::new(BinderState::default()),
            }
        }

        pub fn set_behavior(&self, behavior: BindBehavior) {
            *self.behavior.lock().unwrap_or_else(|p| p.into_inner()) = behavior;
        }

        /// Make `unbind` fail, to exercise teardown error handling.
        pub fn fail_unbind(&self) {
            self.binder_state().fail_unbind = true;
        }

        pub fn service(&self) -> &Arc<MemoryBillingService> {
            &self.service
        }

        pub fn bind_count(&self) -> u32 {
            self.binder_state().binds
        }

        pub fn unbind_count(&self) -> u32 {
            self.binder_state().unbinds
        }

        fn binder_state(&self) -> std::sync::MutexGuard<'_, BinderState> {
            self.state.lock().unwrap_or_else(|p| p.into_inner())
        }
    }

    #[async_trait]
    impl ServiceBinder for MemoryBinder {
        type Service = MemoryBillingService;

        async fn bind(&self) -> Result<Arc<MemoryBillingService>> {
            self.binder_state().binds += 1;
            let behavior = self.behavior.lock().unwrap_or_else(|p| p.into_inner()).clone();
            match behavior {
                BindBehavior::Connect => Ok(Arc::clone(&self.service)),
                BindBehavior::Unavailable => Err(ServiceError::BindUnavailable),
                BindBehavior::Reject(reason) => Err(ServiceError::BindRejected(reason)),
            }
        }

        fn unbind(&self) -> Result<()> {
            let mut state = self.binder_state();
            state.unbinds += 1;
            if state.fail_unbind {
                return Err(ServiceError::Transport("service not registered".into()));
            }
            Ok(())
        }
    }
}
