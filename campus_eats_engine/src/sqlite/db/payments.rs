use ce_common::Birr;
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Payment, PaymentMethod, PaymentStatus, PaymentType},
    order_objects::PaymentQueryFilter,
    traits::MarketplaceError,
};

/// Field set for a new payment row. Built by the placement and contract flows inside their
/// transactions.
#[derive(Debug, Clone)]
pub(crate) struct NewPaymentRow {
    pub user_id: i64,
    pub amount: Birr,
    pub payment_type: PaymentType,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub order_id: Option<i64>,
    pub contract_id: Option<i64>,
    pub commission: Birr,
}

pub(crate) async fn insert_payment(
    payment: NewPaymentRow,
    conn: &mut SqliteConnection,
) -> Result<Payment, MarketplaceError> {
    let row: Payment = sqlx::query_as(
        r#"
            INSERT INTO payments (user_id, amount, payment_type, method, status, order_id, contract_id, commission)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(payment.user_id)
    .bind(payment.amount.value())
    .bind(payment.payment_type.to_string())
    .bind(payment.method.to_string())
    .bind(payment.status.to_string())
    .bind(payment.order_id)
    .bind(payment.contract_id)
    .bind(payment.commission.value())
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Payment [{}] inserted ({} {} via {})", row.id, row.status, row.amount, row.method);
    Ok(row)
}

pub async fn fetch_payment(payment_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment =
        sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(payment_id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_by_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE gateway_reference = $1")
        .bind(reference)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

pub(crate) async fn link_order(
    payment_id: i64,
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Payment, MarketplaceError> {
    let result: Option<Payment> = sqlx::query_as(
        "UPDATE payments SET order_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(order_id)
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(MarketplaceError::PaymentNotFound(payment_id))
}

pub(crate) async fn link_contract(
    payment_id: i64,
    contract_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Payment, MarketplaceError> {
    let result: Option<Payment> = sqlx::query_as(
        "UPDATE payments SET contract_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(contract_id)
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(MarketplaceError::PaymentNotFound(payment_id))
}

pub(crate) async fn set_reference(
    payment_id: i64,
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Payment, MarketplaceError> {
    let result: Option<Payment> = sqlx::query_as(
        "UPDATE payments SET gateway_reference = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(reference)
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(MarketplaceError::PaymentNotFound(payment_id))
}

/// The settlement compare-and-swap: only a `Pending` payment transitions to `Completed`. Returns
/// `None` when a concurrent settlement already won, which callers report as an idempotent no-op.
pub(crate) async fn complete_cas(
    reference: &str,
    tx_id: Option<&str>,
    metadata: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let result: Option<Payment> = sqlx::query_as(
        r#"
            UPDATE payments
            SET status = 'Completed',
                gateway_tx_id = COALESCE($1, gateway_tx_id),
                metadata = COALESCE($2, metadata),
                updated_at = CURRENT_TIMESTAMP
            WHERE gateway_reference = $3 AND status = 'Pending'
            RETURNING *
        "#,
    )
    .bind(tx_id)
    .bind(metadata)
    .bind(reference)
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Marks a pending payment failed. Also a compare-and-swap: a payment that completed in the
/// meantime is left alone.
pub(crate) async fn fail_cas(reference: &str, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let result: Option<Payment> = sqlx::query_as(
        r#"
            UPDATE payments
            SET status = 'Failed', updated_at = CURRENT_TIMESTAMP
            WHERE gateway_reference = $1 AND status = 'Pending'
            RETURNING *
        "#,
    )
    .bind(reference)
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Fetches a user's payments, newest first, optionally narrowed by type and status.
pub async fn payments_for_user(
    user_id: i64,
    query: PaymentQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM payments WHERE user_id = ");
    builder.push_bind(user_id);
    if let Some(payment_type) = query.payment_type {
        builder.push(" AND payment_type = ");
        builder.push_bind(payment_type.to_string());
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ");
        builder.push_bind(status.to_string());
    }
    builder.push(" ORDER BY created_at DESC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let payments = builder.build_query_as::<Payment>().fetch_all(conn).await?;
    Ok(payments)
}
