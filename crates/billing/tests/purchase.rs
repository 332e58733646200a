//! Purchase flow: buy intent, purchase UI hand-off and result verification.

mod common;

use billing::core::{CorrelationId, VerificationFailure};
use billing::service::{keys, Bundle, BundleValue, ServiceCall};
use billing::{BillingError, Purchase, PurchaseOutcome, ResponseCode, SessionState};
use billing_testkit::fixtures::{purchase_json, purchase_result, PurchaseDoc};
use billing_testkit::generators::developer_payload;
use proptest::prelude::*;

use common::{Capture, Harness};

/// Start a purchase of `sku` and wait until the purchase UI is launched.
async fn launch(h: &mut Harness, sku: &str) -> (Capture<Purchase>, CorrelationId) {
    let purchased = Capture::<Purchase>::new();
    h.session.launch_purchase(sku, purchased.listener());
    assert!(h.session.process_next().await);
    let id = h.launcher.last_correlation().expect("purchase ui not launched");
    assert_eq!(h.session.pending_purchase(), Some(id));
    (purchased, id)
}

#[tokio::test]
async fn test_verified_purchase_is_delivered() {
    let mut h = Harness::ready().await;
    let (purchased, id) = launch(&mut h, "sku1").await;
    assert_eq!(h.session.state(), SessionState::Busy);

    let data = purchase_json("sku1", &h.last_payload());
    let result = h.fixture.signer.purchase_result(&data);
    assert!(h.session.on_purchase_result(id, PurchaseOutcome::Ok, Some(result)));

    let purchase = purchased.single().unwrap();
    assert_eq!(purchase.sku, "sku1");
    assert_eq!(purchase.original_json, data);
    assert_eq!(h.session.state(), SessionState::Ready);
    assert_eq!(h.session.pending_purchase(), None);
}

#[tokio::test]
async fn test_payload_mismatch_fails_verification() {
    let mut h = Harness::ready().await;
    let (purchased, id) = launch(&mut h, "sku1").await;

    let data = purchase_json("sku1", "replayed-payload");
    let result = h.fixture.signer.purchase_result(&data);
    h.session.on_purchase_result(id, PurchaseOutcome::Ok, Some(result));

    let err = purchased.single().unwrap_err();
    assert!(matches!(
        err,
        BillingError::VerificationFailed(VerificationFailure::PayloadMismatch)
    ));
    assert_eq!(err.code(), ResponseCode::VERIFICATION_FAILED);
    assert_eq!(h.session.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_bad_signature_fails_verification() {
    let mut h = Harness::ready().await;
    let (purchased, id) = launch(&mut h, "sku1").await;

    let data = purchase_json("sku1", &h.last_payload());
    let forged = PurchaseDoc::new("sku1")
        .payload(&h.last_payload())
        .state(0)
        .time(1)
        .to_json();
    let result = purchase_result(&forged, &h.fixture.signer.sign(&data));
    h.session.on_purchase_result(id, PurchaseOutcome::Ok, Some(result));

    assert!(matches!(
        purchased.single(),
        Err(BillingError::VerificationFailed(VerificationFailure::Signature))
    ));
}

#[tokio::test]
async fn test_unparseable_result_is_purchase_error() {
    let mut h = Harness::ready().await;
    let (purchased, id) = launch(&mut h, "sku1").await;

    let result = h.fixture.signer.purchase_result("[\"not\", \"an object\"]");
    h.session.on_purchase_result(id, PurchaseOutcome::Ok, Some(result));

    let err = purchased.single().unwrap_err();
    assert!(matches!(err, BillingError::Purchase { .. }));
    assert_eq!(err.code(), ResponseCode::PURCHASE_ERROR);
    let cause = std::error::Error::source(&err).unwrap();
    assert!(cause.to_string().contains("malformed"));
    assert_eq!(h.session.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_second_launch_while_busy_is_noop() {
    let mut h = Harness::ready().await;
    let (purchased, id) = launch(&mut h, "sku1").await;

    let ignored = Capture::<Purchase>::new();
    h.session.launch_purchase("sku2", ignored.listener());
    assert!(!h.session.process_next().await);

    let data = purchase_json("sku1", &h.last_payload());
    let result = h.fixture.signer.purchase_result(&data);
    assert!(h.session.on_purchase_result(id, PurchaseOutcome::Ok, Some(result)));

    assert_eq!(purchased.single().unwrap().sku, "sku1");
    assert_eq!(ignored.count(), 0);
    let intents = h
        .calls()
        .iter()
        .filter(|call| matches!(call, ServiceCall::GetBuyIntent { .. }))
        .count();
    assert_eq!(intents, 1);
}

#[tokio::test]
async fn test_buy_intent_status_reverts_to_ready() {
    let mut h = Harness::ready().await;
    h.fixture
        .service
        .set_buy_intent_code(ResponseCode::ITEM_ALREADY_OWNED);

    let purchased = Capture::<Purchase>::new();
    h.session.launch_purchase("sku1", purchased.listener());
    h.session.process_next().await;

    assert_eq!(
        purchased.single().unwrap_err().code(),
        ResponseCode::ITEM_ALREADY_OWNED
    );
    assert!(h.launcher.launches().is_empty());
    assert_eq!(h.session.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_launcher_refusal_is_purchase_error() {
    let mut h = Harness::ready().await;
    h.launcher.refuse("activity finishing");

    let purchased = Capture::<Purchase>::new();
    h.session.launch_purchase("sku1", purchased.listener());
    h.session.process_next().await;

    let err = purchased.single().unwrap_err();
    assert_eq!(err.code(), ResponseCode::PURCHASE_ERROR);
    let cause = std::error::Error::source(&err).unwrap();
    assert!(cause.to_string().contains("activity finishing"));
    assert_eq!(h.session.state(), SessionState::Ready);
    assert_eq!(h.session.pending_purchase(), None);
}

#[tokio::test]
async fn test_canceled_flow_is_purchase_error() {
    let mut h = Harness::ready().await;
    let (purchased, id) = launch(&mut h, "sku1").await;

    h.session.on_purchase_result(id, PurchaseOutcome::Canceled, None);

    assert_eq!(
        purchased.single().unwrap_err().code(),
        ResponseCode::PURCHASE_ERROR
    );
    assert_eq!(h.session.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_missing_result_data_is_purchase_error() {
    let mut h = Harness::ready().await;
    let (purchased, id) = launch(&mut h, "sku1").await;

    h.session.on_purchase_result(id, PurchaseOutcome::Ok, None);
    assert_eq!(
        purchased.single().unwrap_err().code(),
        ResponseCode::PURCHASE_ERROR
    );

    let (purchased, id) = launch(&mut h, "sku1").await;
    let data = purchase_json("sku1", &h.last_payload());
    let without_signature = Bundle::with_code(ResponseCode::OK)
        .with(keys::INAPP_PURCHASE_DATA, BundleValue::Str(data));
    h.session
        .on_purchase_result(id, PurchaseOutcome::Ok, Some(without_signature));
    assert_eq!(
        purchased.single().unwrap_err().code(),
        ResponseCode::PURCHASE_ERROR
    );
}

#[tokio::test]
async fn test_embedded_status_is_reported() {
    let mut h = Harness::ready().await;
    let (purchased, id) = launch(&mut h, "sku1").await;

    let result = Bundle::with_code(ResponseCode::ITEM_UNAVAILABLE);
    h.session.on_purchase_result(id, PurchaseOutcome::Ok, Some(result));

    assert_eq!(
        purchased.single().unwrap_err().code(),
        ResponseCode::ITEM_UNAVAILABLE
    );
}

#[tokio::test]
async fn test_long_embedded_status_is_accepted() {
    let mut h = Harness::ready().await;
    let (purchased, id) = launch(&mut h, "sku1").await;

    let result = Bundle::new().with(keys::RESPONSE_CODE, BundleValue::Long(6));
    h.session.on_purchase_result(id, PurchaseOutcome::Ok, Some(result));

    assert_eq!(purchased.single().unwrap_err().code(), ResponseCode::ERROR);
}

#[tokio::test]
async fn test_wrong_correlation_id_is_ignored() {
    let mut h = Harness::ready().await;
    let (purchased, id) = launch(&mut h, "sku1").await;

    let data = purchase_json("sku1", &h.last_payload());
    let result = h.fixture.signer.purchase_result(&data);
    assert!(!h.session.on_purchase_result(
        id.next(),
        PurchaseOutcome::Ok,
        Some(result.clone())
    ));
    assert_eq!(purchased.count(), 0);
    assert_eq!(h.session.state(), SessionState::Busy);

    assert!(h.session.on_purchase_result(id, PurchaseOutcome::Ok, Some(result.clone())));
    assert!(purchased.single().is_ok());

    assert!(!h.session.on_purchase_result(id, PurchaseOutcome::Ok, Some(result)));
}

#[tokio::test]
async fn test_close_abandons_purchase_ui() {
    let mut h = Harness::ready().await;
    let (purchased, id) = launch(&mut h, "sku1").await;

    h.session.close();
    let data = purchase_json("sku1", &h.last_payload());
    let result = h.fixture.signer.purchase_result(&data);
    assert!(!h.session.on_purchase_result(id, PurchaseOutcome::Ok, Some(result)));

    assert_eq!(purchased.count(), 0);
    assert_eq!(h.session.state(), SessionState::Terminated);
}

#[tokio::test]
async fn test_close_during_buy_intent_is_disposed() {
    let mut h = Harness::ready().await;
    let purchased = Capture::<Purchase>::new();
    h.session.launch_purchase("sku1", purchased.listener());
    h.session.close();
    h.session.process_next().await;

    assert!(matches!(purchased.single(), Err(BillingError::Disposed)));
    assert!(h.launcher.launches().is_empty());
    assert_eq!(h.session.state(), SessionState::Terminated);
}

#[tokio::test]
async fn test_each_attempt_gets_fresh_payload_and_id() {
    let mut h = Harness::ready().await;

    let (_, first_id) = launch(&mut h, "sku1").await;
    let first_payload = h.last_payload();
    h.session
        .on_purchase_result(first_id, PurchaseOutcome::Canceled, None);

    let (_, second_id) = launch(&mut h, "sku1").await;
    assert_ne!(h.last_payload(), first_payload);
    assert_eq!(second_id, first_id.next());
}

#[tokio::test]
async fn test_close_while_buy_intent_suspended_is_disposed() {
    let mut h = Harness::ready().await;
    h.fixture.service.pause();

    let purchased = Capture::<Purchase>::new();
    h.session.launch_purchase("sku1", purchased.listener());
    while !h
        .calls()
        .iter()
        .any(|call| matches!(call, ServiceCall::GetBuyIntent { .. }))
    {
        tokio::task::yield_now().await;
    }

    h.session.close();
    h.fixture.service.resume();
    assert!(h.session.process_next().await);

    assert!(matches!(purchased.single(), Err(BillingError::Disposed)));
    assert!(!h.session.process_next().await);
    assert!(h.launcher.launches().is_empty());
    assert_eq!(h.session.state(), SessionState::Terminated);
}

#[tokio::test]
async fn test_transport_failure_during_buy_intent_is_purchase_error() {
    let mut h = Harness::ready().await;
    h.fixture.service.fail_transport("dead object");

    let purchased = Capture::<Purchase>::new();
    h.session.launch_purchase("sku1", purchased.listener());
    h.session.process_next().await;

    let err = purchased.single().unwrap_err();
    assert_eq!(err.code(), ResponseCode::PURCHASE_ERROR);
    let cause = std::error::Error::source(&err).unwrap();
    assert!(cause.to_string().contains("dead object"));
    assert_eq!(h.session.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_backend_panic_during_buy_intent_reports_unknown() {
    let mut h = Harness::ready().await;
    h.fixture.service.panic_calls("backend exploded");

    let purchased = Capture::<Purchase>::new();
    h.session.launch_purchase("sku1", purchased.listener());
    assert!(h.session.process_next().await);

    let err = purchased.single().unwrap_err();
    assert!(matches!(err, BillingError::Unknown(_)));
    assert!(h.launcher.launches().is_empty());
    assert_eq!(h.session.state(), SessionState::Ready);
    assert_eq!(h.session.pending_purchase(), None);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn foreign_payloads_never_verify(foreign in developer_payload()) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let mut h = Harness::ready().await;
            let (purchased, id) = launch(&mut h, "sku1").await;
            prop_assume!(foreign.as_str() != h.last_payload());

            let data = purchase_json("sku1", foreign.as_str());
            let result = h.fixture.signer.purchase_result(&data);
            h.session.on_purchase_result(id, PurchaseOutcome::Ok, Some(result));

            prop_assert!(matches!(
                purchased.single(),
                Err(BillingError::VerificationFailed(_))
            ));
            Ok(())
        })?;
    }
}
