//! Purchase verification and inventory reconciliation.
//!
//! Reconciliation is fail-closed: a single receipt that does not verify
//! rejects the whole inventory, including receipts that did verify.

use crate::crypto::{DeveloperPayload, PurchaseVerifier};
use crate::error::{CoreError, Result, VerificationFailure};
use crate::inventory::Inventory;
use crate::purchase::{Purchase, SignedPurchase};
use crate::sku::SkuDetails;

/// Build an inventory from catalog documents and signed purchases.
///
/// Catalog documents are trusted as delivered. Every purchase must carry a
/// valid signature; otherwise the call fails with
/// [`CoreError::VerificationFailed`] and no inventory is produced.
pub fn reconcile<I, S>(
    verifier: &PurchaseVerifier,
    catalog: I,
    purchases: &[SignedPurchase],
) -> Result<Inventory>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut inventory = Inventory::new();

    for document in catalog {
        inventory.add_sku_details(SkuDetails::from_json(document.as_ref())?);
    }

    for signed in purchases {
        if !verifier.verify(&signed.data, &signed.signature) {
            return Err(CoreError::VerificationFailed(VerificationFailure::Signature));
        }
        inventory.add_purchase(Purchase::from_json(&signed.data, &signed.signature)?);
    }

    Ok(inventory)
}

/// Verify the result of a purchase flow.
///
/// The document must parse, its signature must verify, and its developer
/// payload must equal the one generated for this attempt.
pub fn verify_purchase_result(
    verifier: &PurchaseVerifier,
    purchase_data: &str,
    signature: &str,
    expected_payload: &DeveloperPayload,
) -> Result<Purchase> {
    let purchase = Purchase::from_json(purchase_data, signature)?;

    if !verifier.verify(purchase_data, signature) {
        return Err(CoreError::VerificationFailed(VerificationFailure::Signature));
    }
    if !expected_payload.matches(&purchase.developer_payload) {
        return Err(CoreError::VerificationFailed(
            VerificationFailure::PayloadMismatch,
        ));
    }

    Ok(purchase)
}
