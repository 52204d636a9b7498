//! Contract wallet ledger behaviour: guarded debits, renewals and the expiry sweep.
mod common;

use campus_eats_engine::{
    db_types::{NewContract, PaymentMethod, PaymentStatus, PaymentType},
    events::EventProducers,
    order_objects::{CommissionRate, NewOrderRequest, OrderItemRequest, PaymentQueryFilter},
    traits::{MarketQueries, MarketplaceDatabase, MarketplaceError},
    ContractApi,
    OrderFlowApi,
    SqliteDatabase,
};
use ce_common::Birr;
use common::{customer, lounge_owner, new_test_db, seed_menu};

fn order_api(db: &SqliteDatabase) -> OrderFlowApi<SqliteDatabase> {
    OrderFlowApi::new(db.clone(), EventProducers::default())
}

fn contract_order(lounge_id: i64, contract_id: i64, burger_id: i64, quantity: i64) -> NewOrderRequest {
    NewOrderRequest {
        lounge_id,
        items: vec![OrderItemRequest { food_id: burger_id, quantity }],
        method: PaymentMethod::ContractWallet,
        contract_id: Some(contract_id),
    }
}

/// Opens a contract and settles its funding payment so the wallet is usable.
async fn active_contract(db: &SqliteDatabase, user_id: i64, lounge_id: i64, amount: Birr) -> i64 {
    let (contract, payment) = db
        .create_contract(NewContract { user_id, lounge_id, total_amount: amount, duration_days: 30 })
        .await
        .expect("Error creating contract");
    let reference = format!("CE-test-{}", payment.id);
    db.assign_gateway_reference(payment.id, &reference).await.unwrap();
    db.confirm_payment(&reference, Some("TX-FUND"), None).await.unwrap();
    contract.id
}

#[tokio::test]
async fn a_debit_moves_the_balance_and_creates_a_completed_payment() {
    let db = new_test_db().await;
    let (lounge_id, burger_id, _) = seed_menu(&db).await;
    let contract_id = active_contract(&db, customer().id, lounge_id, Birr::from_birr(500)).await;
    let api = order_api(&db);

    let placed = api
        .place_order(
            &customer(),
            contract_order(lounge_id, contract_id, burger_id, 2),
            CommissionRate::default(),
        )
        .await
        .unwrap();

    // money already moved internally: the payment is born Completed
    assert_eq!(placed.payment.status, PaymentStatus::Completed);
    assert_eq!(placed.payment.method, PaymentMethod::ContractWallet);
    assert_eq!(placed.payment.contract_id, Some(contract_id));
    assert_eq!(placed.order.contract_id, Some(contract_id));

    let contract = db.fetch_contract(contract_id).await.unwrap().unwrap();
    assert_eq!(contract.remaining_balance, Birr::from_birr(400));
    assert_eq!(contract.total_amount, Birr::from_birr(500));
}

#[tokio::test]
async fn insufficient_balance_creates_neither_payment_nor_order() {
    let db = new_test_db().await;
    let (lounge_id, burger_id, _) = seed_menu(&db).await;
    // 30 ETB wallet, 50 ETB order
    let contract_id = active_contract(&db, customer().id, lounge_id, Birr::from_birr(30)).await;
    let api = order_api(&db);

    let err = api
        .place_order(
            &customer(),
            contract_order(lounge_id, contract_id, burger_id, 1),
            CommissionRate::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MarketplaceError::InsufficientBalance { .. }));

    // no partial state: no order, no order payment, untouched balance
    assert!(api.my_orders(&customer(), Default::default()).await.unwrap().is_empty());
    let order_payments = db
        .payments_for_user(customer().id, PaymentQueryFilter {
            payment_type: Some(PaymentType::Order),
            status: None,
        })
        .await
        .unwrap();
    assert!(order_payments.is_empty());
    let contract = db.fetch_contract(contract_id).await.unwrap().unwrap();
    assert_eq!(contract.remaining_balance, Birr::from_birr(30));
}

#[tokio::test]
async fn an_unactivated_contract_cannot_pay() {
    let db = new_test_db().await;
    let (lounge_id, burger_id, _) = seed_menu(&db).await;
    let (contract, _payment) = db
        .create_contract(NewContract {
            user_id: customer().id,
            lounge_id,
            total_amount: Birr::from_birr(500),
            duration_days: 30,
        })
        .await
        .unwrap();
    let api = order_api(&db);

    let err = api
        .place_order(
            &customer(),
            contract_order(lounge_id, contract.id, burger_id, 1),
            CommissionRate::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MarketplaceError::ContractNotFound));
}

#[tokio::test]
async fn a_lapsed_contract_cannot_pay_even_before_the_sweep_runs() {
    let db = new_test_db().await;
    let (lounge_id, burger_id, _) = seed_menu(&db).await;
    // expires immediately; the sweep has not run
    let (contract, payment) = db
        .create_contract(NewContract {
            user_id: customer().id,
            lounge_id,
            total_amount: Birr::from_birr(500),
            duration_days: 0,
        })
        .await
        .unwrap();
    let reference = format!("CE-test-{}", payment.id);
    db.assign_gateway_reference(payment.id, &reference).await.unwrap();
    db.confirm_payment(&reference, None, None).await.unwrap();

    let api = order_api(&db);
    let err = api
        .place_order(
            &customer(),
            contract_order(lounge_id, contract.id, burger_id, 1),
            CommissionRate::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MarketplaceError::ContractNotFound));
}

#[tokio::test]
async fn concurrent_debits_against_one_contract_serialize() {
    let db = new_test_db().await;
    let (lounge_id, _, _) = seed_menu(&db).await;
    use campus_eats_engine::{db_types::NewFoodItem, CatalogManagement};
    let platter = db
        .add_food(NewFoodItem {
            lounge_id,
            name: "Special Platter".to_string(),
            price: Birr::from_birr(60),
            estimated_time: 25,
            is_available: true,
        })
        .await
        .unwrap();
    // balance 100, two concurrent 60 ETB orders: exactly one may win
    let contract_id = active_contract(&db, customer().id, lounge_id, Birr::from_birr(100)).await;
    let api = order_api(&db);

    let order_a = contract_order(lounge_id, contract_id, platter.id, 1);
    let order_b = order_a.clone();
    let cust = customer();
    let (a, b) = tokio::join!(
        api.place_order(&cust, order_a, CommissionRate::default()),
        api.place_order(&cust, order_b, CommissionRate::default()),
    );
    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1, "exactly one of the two 60 ETB orders may settle");

    // the winner's debit is the only one applied; the balance never went negative
    let contract = db.fetch_contract(contract_id).await.unwrap().unwrap();
    assert_eq!(contract.remaining_balance, Birr::from_birr(40));
    let completed = db
        .payments_for_user(customer().id, PaymentQueryFilter {
            payment_type: Some(PaymentType::Order),
            status: Some(PaymentStatus::Completed),
        })
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    let orders = api.my_orders(&customer(), Default::default()).await.unwrap();
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
async fn renewal_extends_from_the_stored_expiry_and_credits_both_totals() {
    let db = new_test_db().await;
    let (lounge_id, _, _) = seed_menu(&db).await;
    let contract_id = active_contract(&db, customer().id, lounge_id, Birr::from_birr(300)).await;
    let before = db.fetch_contract(contract_id).await.unwrap().unwrap();

    let contracts = ContractApi::new(db.clone());
    let (renewed, payment) = contracts
        .renew_contract(&customer(), contract_id, Birr::from_birr(200), Some(30))
        .await
        .unwrap();

    assert_eq!(renewed.total_amount, Birr::from_birr(500));
    assert_eq!(renewed.remaining_balance, Birr::from_birr(500));
    assert_eq!(renewed.renewal_count, 1);
    assert_eq!(renewed.expires_at, before.expires_at + chrono::Duration::days(30));
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.contract_id, Some(contract_id));
}

#[tokio::test]
async fn renewal_of_a_lapsed_contract_still_extends_from_the_old_expiry() {
    let db = new_test_db().await;
    let (lounge_id, _, _) = seed_menu(&db).await;
    let (contract, payment) = db
        .create_contract(NewContract {
            user_id: customer().id,
            lounge_id,
            total_amount: Birr::from_birr(100),
            duration_days: 0,
        })
        .await
        .unwrap();
    let reference = format!("CE-test-{}", payment.id);
    db.assign_gateway_reference(payment.id, &reference).await.unwrap();
    db.confirm_payment(&reference, None, None).await.unwrap();
    let swept = db.expire_lapsed_contracts().await.unwrap();
    assert!(swept.iter().any(|c| c.id == contract.id));

    let contracts = ContractApi::new(db.clone());
    let (renewed, _) = contracts
        .renew_contract(&customer(), contract.id, Birr::from_birr(50), Some(30))
        .await
        .unwrap();

    // anchor is the stored (already lapsed) expiry, not `now`
    assert_eq!(renewed.expires_at, contract.expires_at + chrono::Duration::days(30));
    assert!(!renewed.is_expired);
    assert!(renewed.is_active);
    assert_eq!(renewed.renewal_count, 1);
}

#[tokio::test]
async fn only_the_owner_may_renew() {
    let db = new_test_db().await;
    let (lounge_id, _, _) = seed_menu(&db).await;
    let contract_id = active_contract(&db, customer().id, lounge_id, Birr::from_birr(300)).await;

    let contracts = ContractApi::new(db.clone());
    let err = contracts
        .renew_contract(&lounge_owner(), contract_id, Birr::from_birr(50), None)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketplaceError::NotAuthorized(_)));
}

#[tokio::test]
async fn a_second_active_contract_with_the_same_lounge_is_rejected() {
    let db = new_test_db().await;
    let (lounge_id, _, _) = seed_menu(&db).await;
    let first = active_contract(&db, customer().id, lounge_id, Birr::from_birr(100)).await;

    let contracts = ContractApi::new(db.clone());
    let err = contracts
        .create_contract(&customer(), lounge_id, Birr::from_birr(100), None)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketplaceError::ContractAlreadyActive(id) if id == first));
}

#[tokio::test]
async fn the_sweep_flips_flags_exactly_once() {
    let db = new_test_db().await;
    let (lounge_id, _, _) = seed_menu(&db).await;
    let (contract, payment) = db
        .create_contract(NewContract {
            user_id: customer().id,
            lounge_id,
            total_amount: Birr::from_birr(100),
            duration_days: 0,
        })
        .await
        .unwrap();
    let reference = format!("CE-test-{}", payment.id);
    db.assign_gateway_reference(payment.id, &reference).await.unwrap();
    db.confirm_payment(&reference, None, None).await.unwrap();

    let swept = db.expire_lapsed_contracts().await.unwrap();
    let flipped = swept.iter().find(|c| c.id == contract.id).expect("contract should be swept");
    assert!(flipped.is_expired);
    assert!(!flipped.is_active);

    // second sweep finds nothing left to do for this contract
    let swept_again = db.expire_lapsed_contracts().await.unwrap();
    assert!(!swept_again.iter().any(|c| c.id == contract.id));
}
