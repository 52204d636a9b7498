//! Gateway payment reconciliation: webhook/poll settlement, idempotency, and failure modes.
mod common;

use campus_eats_engine::{
    db_types::{NewContract, OrderStatusType, PaymentMethod, PaymentStatus},
    events::EventProducers,
    order_objects::{CommissionRate, NewOrderRequest, OrderItemRequest},
    traits::{MarketQueries, MarketplaceDatabase, MarketplaceError, ReconcileOutcome, SideEffect, WebhookNotification},
    OrderFlowApi,
    PaymentApi,
    SqliteDatabase,
};
use ce_common::Birr;
use common::{customer, new_test_db, other_customer, payer, seed_menu, TestGateway, TestVerdict};

fn payment_api(db: &SqliteDatabase, gateway: &TestGateway) -> PaymentApi<SqliteDatabase, TestGateway> {
    PaymentApi::new(db.clone(), gateway.clone())
}

/// Places a gateway-paid order and opens its checkout. Returns (order id, payment id, reference).
async fn checkout_order(db: &SqliteDatabase, gateway: &TestGateway, lounge_id: i64, food_id: i64) -> (i64, i64, String) {
    let orders = OrderFlowApi::new(db.clone(), EventProducers::default());
    let placed = orders
        .place_order(
            &customer(),
            NewOrderRequest {
                lounge_id,
                items: vec![OrderItemRequest { food_id, quantity: 1 }],
                method: PaymentMethod::Chapa,
                contract_id: None,
            },
            CommissionRate::default(),
        )
        .await
        .unwrap();
    let payments = payment_api(db, gateway);
    let handle = payments.initialize_checkout(&customer(), placed.payment.id, payer(), None).await.unwrap();
    (placed.order.id, placed.payment.id, handle.reference)
}

fn webhook(reference: &str) -> WebhookNotification {
    WebhookNotification {
        reference: reference.to_string(),
        transaction_id: Some("TX-HOOK-7".to_string()),
        status: Some("success".to_string()),
    }
}

#[tokio::test]
async fn a_verified_payment_completes_and_advances_the_order() {
    let db = new_test_db().await;
    let (lounge_id, burger_id, _) = seed_menu(&db).await;
    let gateway = TestGateway::approving();
    let (order_id, payment_id, reference) = checkout_order(&db, &gateway, lounge_id, burger_id).await;
    let payments = payment_api(&db, &gateway);

    let outcome = payments.handle_webhook(webhook(&reference)).await.unwrap();
    match outcome {
        ReconcileOutcome::Completed { payment, side_effect } => {
            assert_eq!(payment.id, payment_id);
            assert_eq!(payment.status, PaymentStatus::Completed);
            assert!(payment.gateway_tx_id.is_some());
            assert_eq!(side_effect, Some(SideEffect::OrderAdvanced(order_id)));
        },
        other => panic!("expected Completed, got {other:?}"),
    }
    let order = db.fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Preparing);
}

#[tokio::test]
async fn a_duplicate_webhook_applies_no_second_side_effect() {
    let db = new_test_db().await;
    let (lounge_id, burger_id, _) = seed_menu(&db).await;
    let gateway = TestGateway::approving();
    let (order_id, _, reference) = checkout_order(&db, &gateway, lounge_id, burger_id).await;
    let payments = payment_api(&db, &gateway);

    payments.handle_webhook(webhook(&reference)).await.unwrap();
    assert_eq!(gateway.verify_calls(), 1);

    // the gateway redelivers; settlement short-circuits before even asking the gateway
    let outcome = payments.handle_webhook(webhook(&reference)).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::AlreadyCompleted(_)));
    assert_eq!(gateway.verify_calls(), 1);
    let order = db.fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Preparing);
}

#[tokio::test]
async fn a_contract_funding_payment_activates_the_contract_exactly_once() {
    let db = new_test_db().await;
    let (lounge_id, _, _) = seed_menu(&db).await;
    let gateway = TestGateway::approving();
    let (contract, funding) = db
        .create_contract(NewContract {
            user_id: customer().id,
            lounge_id,
            total_amount: Birr::from_birr(400),
            duration_days: 30,
        })
        .await
        .unwrap();
    assert!(!contract.is_active);

    let payments = payment_api(&db, &gateway);
    let handle = payments.initialize_checkout(&customer(), funding.id, payer(), None).await.unwrap();

    let outcome = payments.handle_webhook(webhook(&handle.reference)).await.unwrap();
    assert!(matches!(
        outcome,
        ReconcileOutcome::Completed { side_effect: Some(SideEffect::ContractActivated(id)), .. } if id == contract.id
    ));
    let contract = db.fetch_contract(contract.id).await.unwrap().unwrap();
    assert!(contract.is_active);

    // double delivery: no error, no re-fired activation
    let outcome = payments.handle_webhook(webhook(&handle.reference)).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::AlreadyCompleted(_)));
    assert_eq!(gateway.verify_calls(), 1);
}

#[tokio::test]
async fn a_declined_verdict_fails_the_payment_without_side_effects() {
    let db = new_test_db().await;
    let (lounge_id, burger_id, _) = seed_menu(&db).await;
    let gateway = TestGateway::with_verdict(TestVerdict::Decline);
    let (order_id, payment_id, reference) = checkout_order(&db, &gateway, lounge_id, burger_id).await;
    let payments = payment_api(&db, &gateway);

    let outcome = payments.handle_webhook(webhook(&reference)).await.unwrap();
    match outcome {
        ReconcileOutcome::Failed(payment) => {
            assert_eq!(payment.id, payment_id);
            assert_eq!(payment.status, PaymentStatus::Failed);
        },
        other => panic!("expected Failed, got {other:?}"),
    }
    // the order was not advanced
    let order = db.fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
}

#[tokio::test]
async fn an_unreachable_gateway_is_retryable_not_a_failure() {
    let db = new_test_db().await;
    let (lounge_id, burger_id, _) = seed_menu(&db).await;
    let gateway = TestGateway::with_verdict(TestVerdict::Unreachable);
    let (order_id, payment_id, reference) = checkout_order(&db, &gateway, lounge_id, burger_id).await;
    let payments = payment_api(&db, &gateway);

    let err = payments.handle_webhook(webhook(&reference)).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::GatewayUnreachable(_)));

    // transient failure is not recorded as a declined payment
    let payment = db.fetch_payment(payment_id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);

    // once the gateway is back, the user's poll settles everything
    gateway.set_verdict(TestVerdict::Approve);
    let settled = payments.poll_payment(&customer(), payment_id).await.unwrap();
    assert_eq!(settled.status, PaymentStatus::Completed);
    let order = db.fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Preparing);
}

#[tokio::test]
async fn polling_someone_elses_payment_is_forbidden() {
    let db = new_test_db().await;
    let (lounge_id, burger_id, _) = seed_menu(&db).await;
    let gateway = TestGateway::approving();
    let (_, payment_id, _) = checkout_order(&db, &gateway, lounge_id, burger_id).await;
    let payments = payment_api(&db, &gateway);

    let err = payments.poll_payment(&other_customer(), payment_id).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::NotAuthorized(_)));
}

#[tokio::test]
async fn initializing_a_completed_payment_is_rejected() {
    let db = new_test_db().await;
    let (lounge_id, burger_id, _) = seed_menu(&db).await;
    let gateway = TestGateway::approving();
    let (_, payment_id, reference) = checkout_order(&db, &gateway, lounge_id, burger_id).await;
    let payments = payment_api(&db, &gateway);
    payments.handle_webhook(webhook(&reference)).await.unwrap();

    let err = payments.initialize_checkout(&customer(), payment_id, payer(), None).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::PaymentAlreadyCompleted(_)));
}

#[tokio::test]
async fn reinitializing_an_abandoned_checkout_reuses_the_reference() {
    let db = new_test_db().await;
    let (lounge_id, burger_id, _) = seed_menu(&db).await;
    let gateway = TestGateway::approving();
    let (_, payment_id, reference) = checkout_order(&db, &gateway, lounge_id, burger_id).await;
    let payments = payment_api(&db, &gateway);

    let handle = payments.initialize_checkout(&customer(), payment_id, payer(), None).await.unwrap();
    assert_eq!(handle.reference, reference);
}
