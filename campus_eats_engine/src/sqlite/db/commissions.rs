use ce_common::Birr;
use log::trace;
use sqlx::SqliteConnection;

use crate::{db_types::Commission, traits::MarketplaceError};

pub(crate) async fn insert_commission(
    order_id: i64,
    lounge_id: i64,
    amount: Birr,
    rate: f64,
    order_amount: Birr,
    conn: &mut SqliteConnection,
) -> Result<Commission, MarketplaceError> {
    let commission: Commission = sqlx::query_as(
        r#"
            INSERT INTO commissions (order_id, lounge_id, amount, rate, order_amount)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(lounge_id)
    .bind(amount.value())
    .bind(rate)
    .bind(order_amount.value())
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Commission of {amount} (rate {rate}) recorded for order [{order_id}]");
    Ok(commission)
}
