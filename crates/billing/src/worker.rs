//! Background work spawned by a session.
//!
//! Each task runs the remote calls of one operation and reports back with a
//! single [`Completion`]. Tasks never touch session state.
//!
//! Tasks are run through [`supervise`], which turns a panic into the task's
//! failure completion so the session always hears back exactly once.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::anyhow;
use futures::FutureExt;

use billing_core::{reconcile, CoreError, DeveloperPayload, Inventory, PurchaseVerifier, ResponseCode};
use billing_service::{
    fetch_purchases, fetch_sku_details, request_buy_intent, BillingService, CallContext,
    LaunchHandle, ServiceBinder, ServiceError, ServiceHandle,
};
use tokio::sync::mpsc;

use crate::error::{BillingError, Result};

/// Result of a background task, delivered to the session's control thread.
pub(crate) enum Completion<S: ?Sized> {
    Connect(ConnectOutcome<S>),
    Inventory(Result<Inventory>),
    BuyIntent(Result<LaunchHandle>),
}

pub(crate) struct ConnectOutcome<S: ?Sized> {
    /// The bound service, if binding succeeded. Present even when the
    /// support check then failed, so the session can release it.
    pub bound: Option<Arc<S>>,
    pub result: Result<()>,
}

pub(crate) type CompletionSender<S> = mpsc::UnboundedSender<Completion<S>>;

impl<S: ?Sized> Completion<S> {
    /// Failure completion for a connect task.
    pub fn connect_failed(error: BillingError) -> Self {
        Completion::Connect(ConnectOutcome {
            bound: None,
            result: Err(error),
        })
    }

    pub fn inventory_failed(error: BillingError) -> Self {
        Completion::Inventory(Err(error))
    }

    pub fn buy_intent_failed(error: BillingError) -> Self {
        Completion::BuyIntent(Err(error))
    }
}

/// Run `task` and deliver its completion. A panic is reported through
/// `on_panic` as [`BillingError::Unknown`].
pub(crate) async fn supervise<S, F>(
    task: F,
    on_panic: fn(BillingError) -> Completion<S>,
    tx: CompletionSender<S>,
) where
    S: ?Sized,
    F: Future<Output = Completion<S>>,
{
    let completion = match AssertUnwindSafe(task).catch_unwind().await {
        Ok(completion) => completion,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(panic = %message, "billing worker panicked");
            on_panic(BillingError::Unknown(anyhow!("worker panicked: {}", message)))
        }
    };
    if tx.send(completion).is_err() {
        tracing::debug!("session dropped before completion was delivered");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Bind to the backend and confirm billing support.
pub(crate) async fn connect<B: ServiceBinder>(
    binder: Arc<B>,
    ctx: CallContext,
) -> Completion<B::Service> {
    let outcome = match binder.bind().await {
        Err(e) => {
            tracing::warn!(error = %e, "binding to billing service failed");
            ConnectOutcome {
                bound: None,
                result: Err(BillingError::backend_status_with_cause(
                    ResponseCode::BILLING_UNAVAILABLE,
                    e,
                )),
            }
        }
        Ok(service) => {
            let result = check_support(service.as_ref(), &ctx).await;
            ConnectOutcome {
                bound: Some(service),
                result,
            }
        }
    };
    Completion::Connect(outcome)
}

async fn check_support<S: BillingService + ?Sized>(service: &S, ctx: &CallContext) -> Result<()> {
    match service
        .is_billing_supported(ctx.api_version, &ctx.app_id, ctx.product_type)
        .await
    {
        Ok(code) if code.is_ok() => Ok(()),
        Ok(code) => Err(BillingError::backend_status(code)),
        Err(e @ ServiceError::Transport(_)) => Err(BillingError::backend_status_with_cause(
            ResponseCode::ERROR,
            e,
        )),
        Err(e) => Err(e.into()),
    }
}

/// Fetch catalog and owned purchases, then reconcile them into an inventory.
pub(crate) async fn load_inventory<S: BillingService + ?Sized>(
    handle: ServiceHandle<S>,
    ctx: CallContext,
    verifier: Arc<PurchaseVerifier>,
    skus: Vec<String>,
    max_skus_per_request: usize,
) -> Completion<S> {
    Completion::Inventory(
        fetch_inventory(&handle, &ctx, &verifier, &skus, max_skus_per_request).await,
    )
}

async fn fetch_inventory<S: BillingService + ?Sized>(
    handle: &ServiceHandle<S>,
    ctx: &CallContext,
    verifier: &PurchaseVerifier,
    skus: &[String],
    max_skus_per_request: usize,
) -> Result<Inventory> {
    let catalog = fetch_sku_details(handle, ctx, skus, max_skus_per_request)
        .await
        .map_err(load_error)?;
    let purchases = fetch_purchases(handle, ctx).await.map_err(load_error)?;

    match reconcile(verifier, &catalog, &purchases) {
        Ok(inventory) => {
            tracing::debug!(
                details = catalog.len(),
                purchases = purchases.len(),
                "inventory reconciled"
            );
            Ok(inventory)
        }
        Err(e @ CoreError::VerificationFailed(_)) => {
            tracing::warn!(error = %e, "owned purchase failed verification, inventory rejected");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// A failed remote call during a load is an unknown error carrying the cause.
fn load_error(e: ServiceError) -> BillingError {
    match e {
        ServiceError::Transport(_) => {
            BillingError::Unknown(anyhow::Error::new(e).context("inventory load failed"))
        }
        e => e.into(),
    }
}

/// Request a purchase intent for `sku`.
pub(crate) async fn buy_intent<S: BillingService + ?Sized>(
    handle: ServiceHandle<S>,
    ctx: CallContext,
    sku: String,
    payload: DeveloperPayload,
) -> Completion<S> {
    let result = request_buy_intent(&handle, &ctx, &sku, &payload)
        .await
        .map_err(|e| match e {
            ServiceError::Transport(_) => {
                BillingError::purchase_with_cause("buy intent request failed", e)
            }
            e => e.into(),
        });
    Completion::BuyIntent(result)
}
