//! The billing session: connection lifecycle, inventory loading and the
//! purchase flow.
//!
//! A session is owned by a single control thread. Remote work runs on tokio
//! tasks which report back through a completion channel; the control thread
//! pumps that channel with [`BillingSession::process_next`] or
//! [`BillingSession::process_ready`], and listeners run from there.
//!
//! ```text
//! Initial ──open──> Connecting ──supported──> Ready <──completion── Busy
//!                                               └──load / purchase──> Busy
//! any ──close──> Terminated
//! ```

use std::sync::Arc;

use billing_core::{
    verify_purchase_result, CoreError, CorrelationId, DeveloperPayload, Inventory, Purchase,
    PurchaseVerifier,
};
use billing_service::{keys, response_code, Bundle, LaunchHandle, ServiceBinder, ServiceSlot};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::config::BillingConfig;
use crate::error::{BillingError, Result};
use crate::launcher::{PurchaseLauncher, PurchaseOutcome};
use crate::worker::{self, Completion, CompletionSender, ConnectOutcome};

/// Completion callback for a session operation. Invoked at most once.
pub type Listener<T> = Box<dyn FnOnce(Result<T>) + Send>;

/// Lifecycle state of a [`BillingSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet opened.
    Initial,
    /// Binding and checking support. A failed open stays here until closed.
    Connecting,
    /// Connected and idle.
    Ready,
    /// An inventory load or purchase flow is in flight.
    Busy,
    /// Closed. Terminal.
    Terminated,
}

/// The operation currently awaiting completion.
enum Pending {
    None,
    Open(Listener<()>),
    Inventory(Listener<Inventory>),
    BuyIntent {
        payload: DeveloperPayload,
        listener: Listener<Purchase>,
    },
    PurchaseUi {
        correlation_id: CorrelationId,
        payload: DeveloperPayload,
        listener: Listener<Purchase>,
    },
}

impl Pending {
    fn name(&self) -> &'static str {
        match self {
            Pending::None => "none",
            Pending::Open(_) => "open",
            Pending::Inventory(_) => "inventory",
            Pending::BuyIntent { .. } => "buy intent",
            Pending::PurchaseUi { .. } => "purchase ui",
        }
    }
}

/// A client-side billing session.
pub struct BillingSession<B: ServiceBinder> {
    config: BillingConfig,
    verifier: Arc<PurchaseVerifier>,
    binder: Arc<B>,
    launcher: Box<dyn PurchaseLauncher>,
    runtime: Handle,
    slot: ServiceSlot<B::Service>,
    state: SessionState,
    /// Whether the binder holds a connection that `close` must release.
    bound: bool,
    pending: Pending,
    last_correlation: CorrelationId,
    in_flight: usize,
    tx: CompletionSender<B::Service>,
    rx: mpsc::UnboundedReceiver<Completion<B::Service>>,
}

impl<B: ServiceBinder> BillingSession<B> {
    /// Create a session. Must be called from within a tokio runtime.
    ///
    /// Fails if the configured public key is malformed or the configuration
    /// is invalid.
    pub fn new(
        config: BillingConfig,
        binder: Arc<B>,
        launcher: impl PurchaseLauncher + 'static,
    ) -> Result<Self> {
        config.validate()?;
        let verifier = Arc::new(config.verifier()?);
        let runtime = Handle::try_current().map_err(anyhow::Error::from)?;
        let (tx, rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            verifier,
            binder,
            launcher: Box::new(launcher),
            runtime,
            slot: ServiceSlot::new(),
            state: SessionState::Initial,
            bound: false,
            pending: Pending::None,
            last_correlation: CorrelationId(0),
            in_flight: 0,
            tx,
            rx,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    /// Whether a live backend connection is published.
    pub fn is_connected(&self) -> bool {
        self.slot.is_connected()
    }

    /// Correlation id of the purchase UI currently awaited, if any.
    pub fn pending_purchase(&self) -> Option<CorrelationId> {
        match &self.pending {
            Pending::PurchaseUi { correlation_id, .. } => Some(*correlation_id),
            _ => None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Connect to the backend and confirm billing support.
    ///
    /// Only valid from `Initial`; otherwise a no-op and `listener` is dropped
    /// without being called.
    pub fn open(&mut self, listener: impl FnOnce(Result<()>) + Send + 'static) {
        if self.state != SessionState::Initial {
            tracing::debug!(state = ?self.state, "open ignored");
            return;
        }
        tracing::info!(app_id = %self.config.app_id, "opening billing session");
        self.state = SessionState::Connecting;
        self.pending = Pending::Open(Box::new(listener));
        self.spawn(
            worker::connect(Arc::clone(&self.binder), self.config.call_context()),
            Completion::connect_failed,
        );
    }

    /// Load catalog details for `skus` together with every verified purchase.
    ///
    /// Only valid from `Ready`; otherwise a no-op.
    pub fn load_inventory(
        &mut self,
        skus: Vec<String>,
        listener: impl FnOnce(Result<Inventory>) + Send + 'static,
    ) {
        if !self.begin("load_inventory") {
            return;
        }
        self.pending = Pending::Inventory(Box::new(listener));
        self.spawn(
            worker::load_inventory(
                self.slot.handle(),
                self.config.call_context(),
                Arc::clone(&self.verifier),
                skus,
                self.config.max_skus_per_request,
            ),
            Completion::inventory_failed,
        );
    }

    /// Start a purchase flow for `sku`.
    ///
    /// Only valid from `Ready`; otherwise a no-op. The listener receives the
    /// verified purchase once the host reports the UI result through
    /// [`on_purchase_result`](Self::on_purchase_result).
    pub fn launch_purchase(
        &mut self,
        sku: impl Into<String>,
        listener: impl FnOnce(Result<Purchase>) + Send + 'static,
    ) {
        if !self.begin("launch_purchase") {
            return;
        }
        let payload = DeveloperPayload::generate();
        self.pending = Pending::BuyIntent {
            payload: payload.clone(),
            listener: Box::new(listener),
        };
        self.spawn(
            worker::buy_intent(
                self.slot.handle(),
                self.config.call_context(),
                sku.into(),
                payload,
            ),
            Completion::buy_intent_failed,
        );
    }

    /// Deliver the result of the purchase UI.
    ///
    /// Returns `false` if `correlation_id` does not match the awaited flow,
    /// in which case the call has no effect.
    pub fn on_purchase_result(
        &mut self,
        correlation_id: CorrelationId,
        outcome: PurchaseOutcome,
        data: Option<Bundle>,
    ) -> bool {
        let pending = std::mem::replace(&mut self.pending, Pending::None);
        let (payload, listener) = match pending {
            Pending::PurchaseUi {
                correlation_id: expected,
                payload,
                listener,
            } if expected == correlation_id => (payload, listener),
            other => {
                tracing::warn!(%correlation_id, "ignoring purchase result with no matching flow");
                self.pending = other;
                return false;
            }
        };

        self.finish_busy();
        let result = self.verify_purchase(&payload, outcome, data.as_ref());
        if let Err(e) = &result {
            tracing::warn!(%correlation_id, error = %e, "purchase flow failed");
        }
        listener(result);
        true
    }

    /// The platform dropped the backend connection.
    ///
    /// Later remote calls fail with [`BillingError::Disposed`]; the state is
    /// left unchanged.
    pub fn on_service_disconnected(&mut self) {
        tracing::warn!(state = ?self.state, "billing service disconnected");
        self.slot.clear();
    }

    /// Release the backend connection and terminate the session.
    ///
    /// Idempotent. Work already in flight completes and is still reported to
    /// its listener; an awaited purchase UI is abandoned.
    pub fn close(&mut self) {
        if self.state == SessionState::Terminated {
            return;
        }
        tracing::info!(state = ?self.state, "closing billing session");

        self.state = SessionState::Terminated;
        self.slot.clear();
        if self.bound {
            self.bound = false;
            self.release();
        }
        if let Some(correlation_id) = self.pending_purchase() {
            tracing::warn!(%correlation_id, "abandoning pending purchase flow");
            self.pending = Pending::None;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Completion pump
    // ─────────────────────────────────────────────────────────────────────────

    /// Wait for the next background completion and dispatch it.
    ///
    /// Returns `false` immediately if no background work is in flight.
    pub async fn process_next(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        match self.rx.recv().await {
            Some(completion) => {
                self.dispatch(completion);
                true
            }
            None => false,
        }
    }

    /// Dispatch every completion that has already arrived, without waiting.
    /// Returns how many were dispatched.
    pub fn process_ready(&mut self) -> usize {
        let mut count = 0;
        while let Ok(completion) = self.rx.try_recv() {
            self.dispatch(completion);
            count += 1;
        }
        count
    }

    fn dispatch(&mut self, completion: Completion<B::Service>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match completion {
            Completion::Connect(outcome) => self.complete_connect(outcome),
            Completion::Inventory(result) => self.complete_inventory(result),
            Completion::BuyIntent(result) => self.complete_buy_intent(result),
        }
    }

    fn complete_connect(&mut self, outcome: ConnectOutcome<B::Service>) {
        let listener = match self.take_pending() {
            Pending::Open(listener) => Some(listener),
            other => {
                tracing::warn!(pending = other.name(), "connect completion without open listener");
                self.pending = other;
                None
            }
        };

        if self.state == SessionState::Terminated {
            if outcome.bound.is_some() {
                self.release();
            }
            if let Some(listener) = listener {
                listener(Err(BillingError::Disposed));
            }
            return;
        }

        self.bound = outcome.bound.is_some();
        let result = match (outcome.result, outcome.bound) {
            (Ok(()), Some(service)) => {
                self.slot.publish(service);
                self.state = SessionState::Ready;
                tracing::info!("billing session ready");
                Ok(())
            }
            (Ok(()), None) => Err(BillingError::Disposed),
            (Err(e), _) => {
                tracing::warn!(error = %e, "billing session failed to open");
                Err(e)
            }
        };
        if let Some(listener) = listener {
            listener(result);
        }
    }

    fn complete_inventory(&mut self, result: Result<Inventory>) {
        self.finish_busy();
        match self.take_pending() {
            Pending::Inventory(listener) => listener(result),
            other => {
                tracing::warn!(pending = other.name(), "inventory completion without listener");
                self.pending = other;
            }
        }
    }

    fn complete_buy_intent(&mut self, result: Result<LaunchHandle>) {
        let (payload, listener) = match self.take_pending() {
            Pending::BuyIntent { payload, listener } => (payload, listener),
            other => {
                tracing::warn!(pending = other.name(), "buy intent completion without listener");
                self.pending = other;
                return;
            }
        };

        if self.state == SessionState::Terminated {
            listener(Err(BillingError::Disposed));
            return;
        }

        let handle = match result {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "buy intent request failed");
                self.finish_busy();
                listener(Err(e));
                return;
            }
        };

        let correlation_id = self.last_correlation.next();
        self.last_correlation = correlation_id;
        match self.launcher.launch(&handle, correlation_id) {
            Ok(()) => {
                tracing::debug!(%correlation_id, "purchase ui launched");
                self.pending = Pending::PurchaseUi {
                    correlation_id,
                    payload,
                    listener,
                };
            }
            Err(cause) => {
                tracing::warn!(%correlation_id, error = %cause, "purchase ui launch failed");
                self.finish_busy();
                listener(Err(BillingError::purchase_with_cause(
                    "could not launch purchase ui",
                    cause,
                )));
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Move Ready -> Busy, or report that the operation is a no-op.
    fn begin(&mut self, operation: &str) -> bool {
        if self.state != SessionState::Ready {
            tracing::debug!(operation, state = ?self.state, "operation ignored");
            return false;
        }
        tracing::debug!(operation, "session busy");
        self.state = SessionState::Busy;
        true
    }

    /// Busy -> Ready. Leaves every other state alone.
    fn finish_busy(&mut self) {
        if self.state == SessionState::Busy {
            self.state = SessionState::Ready;
        }
    }

    fn take_pending(&mut self) -> Pending {
        std::mem::replace(&mut self.pending, Pending::None)
    }

    fn spawn<F>(&mut self, task: F, on_panic: fn(BillingError) -> Completion<B::Service>)
    where
        F: std::future::Future<Output = Completion<B::Service>> + Send + 'static,
    {
        self.in_flight += 1;
        self.runtime.spawn(worker::supervise(task, on_panic, self.tx.clone()));
    }

    fn release(&self) {
        if let Err(e) = self.binder.unbind() {
            tracing::warn!(error = %e, "ignoring unbind failure");
        }
    }

    fn verify_purchase(
        &self,
        payload: &DeveloperPayload,
        outcome: PurchaseOutcome,
        data: Option<&Bundle>,
    ) -> Result<Purchase> {
        if !outcome.is_ok() {
            return Err(BillingError::purchase(format!(
                "purchase ui finished with {}",
                outcome
            )));
        }
        let data = data.ok_or_else(|| BillingError::purchase("purchase ui returned no data"))?;

        let code = response_code(data)?;
        if !code.is_ok() {
            return Err(BillingError::backend_status(code));
        }

        let (Some(purchase_data), Some(signature)) = (
            data.get_str(keys::INAPP_PURCHASE_DATA),
            data.get_str(keys::INAPP_DATA_SIGNATURE),
        ) else {
            return Err(BillingError::purchase(
                "purchase result without data or signature",
            ));
        };

        verify_purchase_result(&self.verifier, purchase_data, signature, payload).map_err(
            |e| match e {
                CoreError::MalformedRecord(_) => {
                    BillingError::purchase_with_cause("unreadable purchase result", e)
                }
                e => e.into(),
            },
        )
    }
}

impl<B: ServiceBinder> Drop for BillingSession<B> {
    fn drop(&mut self) {
        self.close();
    }
}
