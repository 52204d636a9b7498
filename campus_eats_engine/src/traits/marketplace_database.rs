use ce_common::Birr;
use chrono::Duration;
use thiserror::Error;

use crate::{
    db_types::{Contract, NewContract, Order, OrderStatusType, Payment},
    order_objects::{CommissionRate, NewOrderRequest, PlacedOrder},
    qr::QrError,
    traits::{GatewayError, MarketQueries, ReconcileOutcome},
};

/// This trait defines the write-side behaviour a storage backend must provide to power the
/// marketplace engine.
///
/// This behaviour includes:
/// * Pricing and persisting new orders together with their payment, line items, commission and
///   pickup token
/// * The contract ledger: creation, renewal and the guarded balance debit
/// * Payment settlement driven by the reconciler
///
/// Every method here that writes more than one row must apply its writes as a single atomic
/// transaction: either everything persists or nothing does.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase: Clone + MarketQueries {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Prices the requested items against the live catalog and, in one transaction, persists the
    /// order, its frozen line-item snapshots, the payment (an immediate contract debit or a
    /// pending gateway payment), the commission record, and the pickup QR token.
    ///
    /// The whole order is rejected as a unit: an unknown item fails with
    /// [`MarketplaceError::FoodNotFound`], an unavailable one with
    /// [`MarketplaceError::FoodUnavailable`], and nothing is written in either case. Prices come
    /// from the catalog rows read inside the same transaction; anything the client claims about
    /// prices is ignored.
    async fn create_order(
        &self,
        user_id: i64,
        order: NewOrderRequest,
        rate: CommissionRate,
    ) -> Result<PlacedOrder, MarketplaceError>;

    /// Writes a new status for the order, stamping `delivered_at` when the new status is
    /// `Delivered`. Transition legality and authorization are checked by the caller.
    async fn update_order_status(&self, order_id: i64, new_status: OrderStatusType) -> Result<Order, MarketplaceError>;

    /// Moves an order to `Delivered` and stamps the delivery time, guarding against double
    /// delivery in the statement itself. Fails with [`MarketplaceError::AlreadyDelivered`] if the
    /// order is already in the terminal delivered state.
    async fn mark_order_delivered(&self, order_id: i64) -> Result<Order, MarketplaceError>;

    /// Creates an inactive contract and its pending funding payment atomically. Fails with
    /// [`MarketplaceError::ContractAlreadyActive`] if the user already holds an active,
    /// non-expired contract with the lounge.
    async fn create_contract(&self, contract: NewContract) -> Result<(Contract, Payment), MarketplaceError>;

    /// Applies a renewal: adds `amount` to both the total and the remaining balance, increments
    /// the renewal count, clears the expired flag, extends the expiry by `duration` from the
    /// *stored* expiry timestamp (even if the contract has already lapsed), and creates the
    /// accompanying pending payment — all in one transaction.
    async fn renew_contract(
        &self,
        contract_id: i64,
        user_id: i64,
        amount: Birr,
        duration: Duration,
    ) -> Result<(Contract, Payment), MarketplaceError>;

    /// Stores the gateway checkout reference on a payment. The reference must be unique; it is
    /// the key the reconciler later settles by.
    async fn assign_gateway_reference(&self, payment_id: i64, reference: &str) -> Result<Payment, MarketplaceError>;

    /// Settles a gateway payment the gateway has verified as successful.
    ///
    /// In one transaction: transitions the payment `Pending → Completed` (a compare-and-swap — a
    /// concurrent settlement of the same reference turns this call into a no-op reported as
    /// [`ReconcileOutcome::AlreadyCompleted`]), stores the gateway transaction id and metadata,
    /// and applies exactly one side effect: activating the funded contract, or advancing the
    /// funded order from `Pending` to `Preparing`.
    async fn confirm_payment(
        &self,
        reference: &str,
        tx_id: Option<&str>,
        metadata: Option<&str>,
    ) -> Result<ReconcileOutcome, MarketplaceError>;

    /// Marks a gateway payment the gateway explicitly declined as `Failed`. Applies no side
    /// effects. A payment that has already completed is left untouched.
    async fn fail_payment(&self, reference: &str) -> Result<Payment, MarketplaceError>;

    /// Flips `is_expired`/`is_active` on every contract whose expiry has passed, returning the
    /// affected contracts. Run periodically; the debit path does not depend on it having run.
    async fn expire_lapsed_contracts(&self) -> Result<Vec<Contract>, MarketplaceError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), MarketplaceError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum MarketplaceError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Lounge {0} does not exist")]
    LoungeNotFound(i64),
    #[error("Food item {0} does not exist")]
    FoodNotFound(i64),
    #[error("{name} is not available right now")]
    FoodUnavailable { id: i64, name: String },
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(i64),
    #[error("No payment matches gateway reference {0}")]
    PaymentReferenceNotFound(String),
    #[error("Payment {0} has already been completed")]
    PaymentAlreadyCompleted(i64),
    #[error("No active contract matches this user and lounge")]
    ContractNotFound,
    #[error("An active contract (id {0}) already exists with this lounge")]
    ContractAlreadyActive(i64),
    #[error("Insufficient contract balance: {available} available, {required} required")]
    InsufficientBalance { available: Birr, required: Birr },
    #[error("Invalid payment method: {0}")]
    InvalidPaymentMethod(String),
    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Birr),
    #[error("The pickup code is not valid")]
    InvalidQrToken,
    #[error("Order {0} has already been delivered")]
    AlreadyDelivered(i64),
    #[error("Order {id} cannot move from {from} to {to}")]
    ForbiddenTransition { id: i64, from: OrderStatusType, to: OrderStatusType },
    #[error("Not authorized: {0}")]
    NotAuthorized(String),
    #[error("The payment gateway rejected the request: {0}")]
    GatewayRejected(String),
    #[error("The payment gateway could not be reached: {0}")]
    GatewayUnreachable(String),
    #[error("Could not generate the pickup code: {0}")]
    QrGeneration(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<sqlx::Error> for MarketplaceError {
    fn from(e: sqlx::Error) -> Self {
        MarketplaceError::DatabaseError(e.to_string())
    }
}

impl From<QrError> for MarketplaceError {
    fn from(e: QrError) -> Self {
        match e {
            QrError::InvalidToken => MarketplaceError::InvalidQrToken,
            QrError::RenderFailed(msg) => MarketplaceError::QrGeneration(msg),
        }
    }
}

impl From<GatewayError> for MarketplaceError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Rejected(msg) => MarketplaceError::GatewayRejected(msg),
            GatewayError::Unreachable(msg) => MarketplaceError::GatewayUnreachable(msg),
        }
    }
}
