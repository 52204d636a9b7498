use ce_common::Birr;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{db_types::Contract, traits::MarketplaceError};

pub(crate) async fn insert_contract(
    user_id: i64,
    lounge_id: i64,
    total_amount: Birr,
    duration_days: i64,
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Contract, MarketplaceError> {
    let contract: Contract = sqlx::query_as(
        r#"
            INSERT INTO contracts (user_id, lounge_id, total_amount, remaining_balance, expires_at, payment_id)
            VALUES ($1, $2, $3, $3, datetime(CURRENT_TIMESTAMP, '+' || $4 || ' days'), $5)
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(lounge_id)
    .bind(total_amount.value())
    .bind(duration_days)
    .bind(payment_id)
    .fetch_one(conn)
    .await?;
    debug!(
        "🗃️ Contract [{}] opened for user #{user_id} at lounge #{lounge_id} with {total_amount}, expires {}",
        contract.id, contract.expires_at
    );
    Ok(contract)
}

pub async fn fetch_contract(contract_id: i64, conn: &mut SqliteConnection) -> Result<Option<Contract>, sqlx::Error> {
    let contract =
        sqlx::query_as("SELECT * FROM contracts WHERE id = $1").bind(contract_id).fetch_optional(conn).await?;
    Ok(contract)
}

/// The user's active, unexpired contract with a lounge. The timestamp comparison runs in the
/// query so a lapsed contract the sweep has not reached yet is still filtered out.
pub async fn active_for_user_lounge(
    user_id: i64,
    lounge_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Contract>, sqlx::Error> {
    let contract = sqlx::query_as(
        r#"
            SELECT * FROM contracts
            WHERE user_id = $1 AND lounge_id = $2
              AND is_active = 1 AND is_expired = 0
              AND unixepoch(expires_at) > unixepoch(CURRENT_TIMESTAMP)
            ORDER BY created_at DESC
            LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(lounge_id)
    .fetch_optional(conn)
    .await?;
    Ok(contract)
}

pub async fn contracts_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Contract>, sqlx::Error> {
    let contracts = sqlx::query_as("SELECT * FROM contracts WHERE user_id = $1 ORDER BY created_at DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(contracts)
}

/// The ledger debit. The balance guard lives in the WHERE clause, so two orders racing on the
/// same contract serialize at the database and the loser simply matches no row — the balance can
/// never go negative, and a debit is only ever applied inside the transaction that also writes
/// its payment.
///
/// Returns the number of rows changed (0 or 1).
pub(crate) async fn try_debit(
    contract_id: i64,
    user_id: i64,
    lounge_id: i64,
    amount: Birr,
    conn: &mut SqliteConnection,
) -> Result<u64, MarketplaceError> {
    let result = sqlx::query(
        r#"
            UPDATE contracts
            SET remaining_balance = remaining_balance - $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND user_id = $3 AND lounge_id = $4
              AND is_active = 1 AND is_expired = 0
              AND unixepoch(expires_at) > unixepoch(CURRENT_TIMESTAMP)
              AND remaining_balance >= $1
        "#,
    )
    .bind(amount.value())
    .bind(contract_id)
    .bind(user_id)
    .bind(lounge_id)
    .execute(conn)
    .await?;
    let n = result.rows_affected();
    trace!("🗃️ Debit of {amount} against contract [{contract_id}] affected {n} row(s)");
    Ok(n)
}

/// Applies a renewal credit. Expiry extends from the *stored* `expires_at`, not from now, even
/// when the contract has already lapsed.
pub(crate) async fn apply_renewal(
    contract_id: i64,
    amount: Birr,
    duration_days: i64,
    conn: &mut SqliteConnection,
) -> Result<Contract, MarketplaceError> {
    let result: Option<Contract> = sqlx::query_as(
        r#"
            UPDATE contracts
            SET total_amount = total_amount + $1,
                remaining_balance = remaining_balance + $1,
                renewal_count = renewal_count + 1,
                is_expired = 0,
                is_active = 1,
                expires_at = datetime(expires_at, '+' || $2 || ' days'),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3
            RETURNING *
        "#,
    )
    .bind(amount.value())
    .bind(duration_days)
    .bind(contract_id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(MarketplaceError::ContractNotFound)
}

/// Activation on first successful funding payment. Idempotent by nature: setting `is_active`
/// twice is the same as setting it once.
pub(crate) async fn set_active(contract_id: i64, conn: &mut SqliteConnection) -> Result<Contract, MarketplaceError> {
    let result: Option<Contract> = sqlx::query_as(
        "UPDATE contracts SET is_active = 1, updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *",
    )
    .bind(contract_id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(MarketplaceError::ContractNotFound)
}

/// Flips the expired/active flags on every contract whose expiry has passed.
pub(crate) async fn expire_lapsed(conn: &mut SqliteConnection) -> Result<Vec<Contract>, MarketplaceError> {
    let rows: Vec<Contract> = sqlx::query_as(
        r#"
            UPDATE contracts
            SET is_expired = 1, is_active = 0, updated_at = CURRENT_TIMESTAMP
            WHERE is_expired = 0 AND unixepoch(expires_at) <= unixepoch(CURRENT_TIMESTAMP)
            RETURNING *
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
