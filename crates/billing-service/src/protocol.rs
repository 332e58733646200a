//! Fetch protocol: the remote call sequences behind each session operation.
//!
//! Every function re-reads the connection slot before each remote call, so a
//! teardown in the middle of a multi-call sequence surfaces as
//! [`ServiceError::Disposed`] on the next call.

use billing_core::{DeveloperPayload, ProductType, SignedPurchase};

use crate::bundle::{decode_buy_intent, decode_purchase_page, decode_sku_details, LaunchHandle};
use crate::error::{Result, ServiceError};
use crate::service::{BillingService, ServiceHandle};

/// Per-call parameters shared by every remote call of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// Backend API version.
    pub api_version: u32,
    /// The calling application's identity.
    pub app_id: String,
    pub product_type: ProductType,
}

/// Upper bound on continuation pages, against a backend that never stops
/// handing out tokens.
pub const MAX_PURCHASE_PAGES: usize = 1000;

/// Confirm the backend supports billing for this app and product type.
pub async fn check_billing_supported<S>(handle: &ServiceHandle<S>, ctx: &CallContext) -> Result<()>
where
    S: BillingService + ?Sized,
{
    let service = handle.current()?;
    let code = service
        .is_billing_supported(ctx.api_version, &ctx.app_id, ctx.product_type)
        .await?;
    tracing::debug!(app_id = %ctx.app_id, %code, "billing support checked");
    if code.is_ok() {
        Ok(())
    } else {
        Err(ServiceError::Status(code))
    }
}

/// Request a purchase intent for `sku`.
pub async fn request_buy_intent<S>(
    handle: &ServiceHandle<S>,
    ctx: &CallContext,
    sku: &str,
    payload: &DeveloperPayload,
) -> Result<LaunchHandle>
where
    S: BillingService + ?Sized,
{
    let service = handle.current()?;
    let reply = service
        .get_buy_intent(
            ctx.api_version,
            &ctx.app_id,
            sku,
            ctx.product_type,
            payload.as_str(),
        )
        .await?;
    decode_buy_intent(&reply)
}

/// Fetch catalog documents for `skus`, at most `max_per_request` ids per
/// call.
pub async fn fetch_sku_details<S>(
    handle: &ServiceHandle<S>,
    ctx: &CallContext,
    skus: &[String],
    max_per_request: usize,
) -> Result<Vec<String>>
where
    S: BillingService + ?Sized,
{
    let mut documents = Vec::new();

    for chunk in skus.chunks(max_per_request.max(1)) {
        let service = handle.current()?;
        let reply = service
            .get_sku_details(ctx.api_version, &ctx.app_id, ctx.product_type, chunk)
            .await?;
        let mut page = decode_sku_details(&reply)?;
        tracing::debug!(requested = chunk.len(), returned = page.len(), "fetched sku details");
        documents.append(&mut page);
    }

    Ok(documents)
}

/// Fetch every owned purchase, following continuation tokens.
pub async fn fetch_purchases<S>(
    handle: &ServiceHandle<S>,
    ctx: &CallContext,
) -> Result<Vec<SignedPurchase>>
where
    S: BillingService + ?Sized,
{
    let mut purchases = Vec::new();
    let mut continuation: Option<String> = None;

    for _ in 0..MAX_PURCHASE_PAGES {
        let service = handle.current()?;
        let reply = service
            .get_purchases(
                ctx.api_version,
                &ctx.app_id,
                ctx.product_type,
                continuation.as_deref(),
            )
            .await?;
        let mut page = decode_purchase_page(&reply)?;
        tracing::debug!(
            records = page.purchases.len(),
            more = page.continuation_token.is_some(),
            "fetched purchase page"
        );
        purchases.append(&mut page.purchases);

        match page.continuation_token {
            Some(token) => continuation = Some(token),
            None => return Ok(purchases),
        }
    }

    Err(ServiceError::Protocol(format!(
        "purchase listing exceeded {} pages",
        MAX_PURCHASE_PAGES
    )))
}
