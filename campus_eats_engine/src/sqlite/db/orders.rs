use ce_common::Birr;
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Order, OrderItem, OrderStatusType, PaymentMethod},
    order_objects::OrderQueryFilter,
    traits::MarketplaceError,
};

/// The frozen line-item values computed during pricing, before the order row exists.
#[derive(Debug, Clone)]
pub(crate) struct ItemSnapshot {
    pub food_id: i64,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Birr,
    pub subtotal: Birr,
    pub estimated_time: i64,
}

/// Inserts the order row. Not atomic on its own; callers embed this in the placement transaction
/// by passing `&mut *tx`.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn insert_order(
    user_id: i64,
    lounge_id: i64,
    total_price: Birr,
    method: PaymentMethod,
    payment_id: i64,
    contract_id: Option<i64>,
    commission: Birr,
    max_estimated_time: i64,
    conn: &mut SqliteConnection,
) -> Result<Order, MarketplaceError> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                user_id,
                lounge_id,
                total_price,
                payment_method,
                payment_id,
                contract_id,
                commission,
                estimated_ready_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, datetime(CURRENT_TIMESTAMP, '+' || $8 || ' minutes'))
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(lounge_id)
    .bind(total_price.value())
    .bind(method.to_string())
    .bind(payment_id)
    .bind(contract_id)
    .bind(commission.value())
    .bind(max_estimated_time)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order [{}] inserted for user #{user_id} at lounge #{lounge_id}", order.id);
    Ok(order)
}

pub(crate) async fn insert_items(
    order_id: i64,
    items: &[ItemSnapshot],
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, MarketplaceError> {
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        let row: OrderItem = sqlx::query_as(
            r#"
                INSERT INTO order_items (order_id, food_id, name, quantity, unit_price, subtotal, estimated_time)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *;
            "#,
        )
        .bind(order_id)
        .bind(item.food_id)
        .bind(item.name.as_str())
        .bind(item.quantity)
        .bind(item.unit_price.value())
        .bind(item.subtotal.value())
        .bind(item.estimated_time)
        .fetch_one(&mut *conn)
        .await?;
        result.push(row);
    }
    Ok(result)
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn items_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Resolves an order by exact pickup-token match. The stored association is authoritative; a
/// token that parses but matches nothing resolves to `None`.
pub async fn fetch_order_by_qr_token(token: &str, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE qr_token = $1").bind(token).fetch_optional(conn).await?;
    Ok(order)
}

/// Attaches the issued pickup token and its rendered image to the order.
pub(crate) async fn set_qr(
    order_id: i64,
    token: &str,
    image: &str,
    conn: &mut SqliteConnection,
) -> Result<Order, MarketplaceError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET qr_token = $1, qr_image = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $3 RETURNING *",
    )
    .bind(token)
    .bind(image)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(MarketplaceError::OrderNotFound(order_id))
}

pub(crate) async fn update_status(
    order_id: i64,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Order, MarketplaceError> {
    let sql = if status == OrderStatusType::Delivered {
        "UPDATE orders SET status = $1, delivered_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP \
         WHERE id = $2 RETURNING *"
    } else {
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *"
    };
    let result: Option<Order> =
        sqlx::query_as(sql).bind(status.to_string()).bind(order_id).fetch_optional(conn).await?;
    result.ok_or(MarketplaceError::OrderNotFound(order_id))
}

/// Marks the order delivered with the double-delivery guard in the statement itself: the row only
/// changes when the order is not already terminal, so a second scan of the same QR can never
/// restamp `delivered_at`.
pub(crate) async fn mark_delivered(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let result: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders
            SET status = 'Delivered', delivered_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status NOT IN ('Delivered', 'Cancelled')
            RETURNING *
        "#,
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Advances a gateway-paid order to `Preparing` once its payment settles. Guarded on the current
/// status so a repeated settlement cannot advance (or regress) the order twice.
pub(crate) async fn advance_to_preparing(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let result: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders
            SET status = 'Preparing', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'Pending'
            RETURNING *
        "#,
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Fetches orders according to the criteria in the `OrderQueryFilter`.
///
/// Resulting orders are ordered by `created_at` in ascending order.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM orders
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if let Some(lounge_id) = query.lounge_id {
        where_clause.push("lounge_id = ");
        where_clause.push_bind_unseparated(lounge_id);
    }
    if let Some(status) = query.status {
        where_clause.push("status = ");
        where_clause.push_bind_unseparated(status.to_string());
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC");

    trace!("🗃️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<Order>();
    let orders = query.fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {:?}", orders.len());
    Ok(orders)
}
