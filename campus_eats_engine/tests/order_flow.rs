//! End-to-end order placement and pickup flows against a real SQLite store.
mod common;

use campus_eats_engine::{
    db_types::{OrderStatusType, PaymentMethod, PaymentStatus},
    events::EventProducers,
    order_objects::{CommissionRate, NewOrderRequest, OrderItemRequest},
    qr,
    traits::{MarketQueries, MarketplaceError},
    OrderFlowApi,
    SqliteDatabase,
};
use common::{admin, customer, lounge_owner, new_test_db, seed_menu};

fn order_api(db: &SqliteDatabase) -> OrderFlowApi<SqliteDatabase> {
    OrderFlowApi::new(db.clone(), EventProducers::default())
}

fn chapa_order(lounge_id: i64, items: Vec<OrderItemRequest>) -> NewOrderRequest {
    NewOrderRequest { lounge_id, items, method: PaymentMethod::Chapa, contract_id: None }
}

#[tokio::test]
async fn placing_an_order_prices_from_the_catalog_and_freezes_the_snapshot() {
    let db = new_test_db().await;
    let (lounge_id, burger_id, juice_id) = seed_menu(&db).await;
    let api = order_api(&db);

    let request = chapa_order(lounge_id, vec![
        OrderItemRequest { food_id: burger_id, quantity: 2 },
        OrderItemRequest { food_id: juice_id, quantity: 1 },
    ]);
    let placed = api.place_order(&customer(), request, CommissionRate::default()).await.unwrap();

    // 2 x 50 + 1 x 15 = 115 ETB, commission 5% = 5.75 ETB
    assert_eq!(placed.order.total_price.value(), 11_500);
    assert_eq!(placed.order.commission.value(), 575);
    assert_eq!(placed.order.status, OrderStatusType::Pending);
    assert_eq!(placed.order.payment_method, PaymentMethod::Chapa);

    // line items are a frozen snapshot whose subtotals add up to the order total
    assert_eq!(placed.items.len(), 2);
    let snapshot_total: i64 = placed.items.iter().map(|i| i.subtotal.value()).sum();
    assert_eq!(snapshot_total, placed.order.total_price.value());
    let burger = placed.items.iter().find(|i| i.food_id == burger_id).unwrap();
    assert_eq!(burger.name, "Beef Burger");
    assert_eq!(burger.unit_price.value(), 5_000);
    assert_eq!(burger.quantity, 2);

    // the gateway payment is pending and linked both ways
    assert_eq!(placed.payment.status, PaymentStatus::Pending);
    assert_eq!(placed.payment.order_id, Some(placed.order.id));
    assert_eq!(placed.order.payment_id, Some(placed.payment.id));

    // the commission record snapshots the rate
    assert_eq!(placed.commission.order_id, placed.order.id);
    assert!((placed.commission.rate - 0.05).abs() < f64::EPSILON);
    assert_eq!(placed.commission.order_amount, placed.order.total_price);

    // the pickup token is bound to the order and parses structurally
    let token = placed.order.qr_token.clone().unwrap();
    let parsed = qr::parse_token(&token).unwrap();
    assert_eq!(parsed.order_id, placed.order.id);
    assert!(placed.order.qr_image.unwrap().starts_with("data:image/svg+xml;base64,"));
}

#[tokio::test]
async fn an_unknown_item_rejects_the_whole_order() {
    let db = new_test_db().await;
    let (lounge_id, burger_id, _) = seed_menu(&db).await;
    let api = order_api(&db);

    let request = chapa_order(lounge_id, vec![
        OrderItemRequest { food_id: burger_id, quantity: 1 },
        OrderItemRequest { food_id: 9_999, quantity: 1 },
    ]);
    let err = api.place_order(&customer(), request, CommissionRate::default()).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::FoodNotFound(9_999)));

    // all-or-nothing: the valid line was not partially fulfilled
    let orders = api.my_orders(&customer(), Default::default()).await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn an_unavailable_item_rejects_the_whole_order() {
    let db = new_test_db().await;
    let (lounge_id, burger_id, juice_id) = seed_menu(&db).await;
    use campus_eats_engine::CatalogManagement;
    db.set_food_availability(juice_id, false).await.unwrap();
    let api = order_api(&db);

    let request = chapa_order(lounge_id, vec![
        OrderItemRequest { food_id: burger_id, quantity: 1 },
        OrderItemRequest { food_id: juice_id, quantity: 1 },
    ]);
    let err = api.place_order(&customer(), request, CommissionRate::default()).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::FoodUnavailable { .. }));
    assert!(api.my_orders(&customer(), Default::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn commission_rate_is_frozen_at_order_time() {
    let db = new_test_db().await;
    let (lounge_id, burger_id, _) = seed_menu(&db).await;
    let api = order_api(&db);

    let first = api
        .place_order(
            &customer(),
            chapa_order(lounge_id, vec![OrderItemRequest { food_id: burger_id, quantity: 2 }]),
            CommissionRate::new(0.05).unwrap(),
        )
        .await
        .unwrap();
    // The configured rate changes later; new orders use it, old ones keep theirs.
    let second = api
        .place_order(
            &customer(),
            chapa_order(lounge_id, vec![OrderItemRequest { food_id: burger_id, quantity: 2 }]),
            CommissionRate::new(0.10).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(first.order.commission.value(), 500);
    assert_eq!(second.order.commission.value(), 1_000);
    let first_again = db.fetch_order(first.order.id).await.unwrap().unwrap();
    assert_eq!(first_again.commission.value(), 500);
}

#[tokio::test]
async fn only_the_lounge_owner_or_admin_may_move_an_order_along() {
    let db = new_test_db().await;
    let (lounge_id, burger_id, _) = seed_menu(&db).await;
    let api = order_api(&db);
    let placed = api
        .place_order(
            &customer(),
            chapa_order(lounge_id, vec![OrderItemRequest { food_id: burger_id, quantity: 1 }]),
            CommissionRate::default(),
        )
        .await
        .unwrap();

    // the customer cannot promote their own order
    let err = api.update_status(&customer(), placed.order.id, OrderStatusType::Preparing).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::NotAuthorized(_)));

    let order = api.update_status(&lounge_owner(), placed.order.id, OrderStatusType::Preparing).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Preparing);
    let order = api.update_status(&admin(), placed.order.id, OrderStatusType::Ready).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Ready);
    let order = api.update_status(&lounge_owner(), placed.order.id, OrderStatusType::Delivered).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Delivered);
    assert!(order.delivered_at.is_some());
}

#[tokio::test]
async fn illegal_transitions_are_rejected() {
    let db = new_test_db().await;
    let (lounge_id, burger_id, _) = seed_menu(&db).await;
    let api = order_api(&db);
    let placed = api
        .place_order(
            &customer(),
            chapa_order(lounge_id, vec![OrderItemRequest { food_id: burger_id, quantity: 1 }]),
            CommissionRate::default(),
        )
        .await
        .unwrap();

    // skipping Preparing is not allowed
    let err = api.update_status(&lounge_owner(), placed.order.id, OrderStatusType::Ready).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::ForbiddenTransition { .. }));

    // cancelled is terminal
    api.update_status(&lounge_owner(), placed.order.id, OrderStatusType::Cancelled).await.unwrap();
    let err = api.update_status(&lounge_owner(), placed.order.id, OrderStatusType::Preparing).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::ForbiddenTransition { .. }));
}

#[tokio::test]
async fn pickup_verification_is_exact_match_and_idempotent() {
    let db = new_test_db().await;
    let (lounge_id, burger_id, _) = seed_menu(&db).await;
    let api = order_api(&db);
    let placed = api
        .place_order(
            &customer(),
            chapa_order(lounge_id, vec![OrderItemRequest { food_id: burger_id, quantity: 1 }]),
            CommissionRate::default(),
        )
        .await
        .unwrap();
    let token = placed.order.qr_token.clone().unwrap();

    // structurally malformed tokens are rejected before any lookup
    let err = api.verify_pickup(&lounge_owner(), "not-a-token").await.unwrap_err();
    assert!(matches!(err, MarketplaceError::InvalidQrToken));
    let err = api.verify_pickup(&lounge_owner(), "XX-1-1700000000000-deadbeefdeadbeef").await.unwrap_err();
    assert!(matches!(err, MarketplaceError::InvalidQrToken));

    // a well-formed token with the right order id but a fabricated suffix matches nothing
    let forged = format!("CE-{}-1700000000000-0123456789abcdef", placed.order.id);
    let err = api.verify_pickup(&lounge_owner(), &forged).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::OrderNotFound(_)));

    // the customer cannot verify their own pickup
    let err = api.verify_pickup(&customer(), &token).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::NotAuthorized(_)));

    let delivered = api.verify_pickup(&lounge_owner(), &token).await.unwrap();
    assert_eq!(delivered.status, OrderStatusType::Delivered);
    let delivered_at = delivered.delivered_at.unwrap();

    // second scan fails and does not restamp the delivery time
    let err = api.verify_pickup(&lounge_owner(), &token).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::AlreadyDelivered(_)));
    let order = db.fetch_order(placed.order.id).await.unwrap().unwrap();
    assert_eq!(order.delivered_at.unwrap(), delivered_at);
}
