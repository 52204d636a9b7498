//! `SqliteDatabase` is the concrete storage backend for the marketplace engine.
//!
//! It implements the [`MarketplaceDatabase`], [`MarketQueries`] and [`CatalogManagement`] traits
//! over a `SqlitePool`. Every multi-row flow runs inside one transaction obtained from the pool;
//! the low-level table functions in [`super::db`] are composed by passing `&mut tx` through.
use std::fmt::Debug;

use ce_common::Birr;
use chrono::{Duration, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{catalog, commissions, contracts, db_url, new_pool, orders, payments};
use crate::{
    db_types::{
        Contract,
        FoodItem,
        Lounge,
        NewContract,
        NewFoodItem,
        NewLounge,
        Order,
        OrderStatusType,
        OrderWithItems,
        Payment,
        PaymentMethod,
        PaymentStatus,
        PaymentType,
    },
    order_objects::{CommissionRate, NewOrderRequest, OrderQueryFilter, PaymentQueryFilter, PlacedOrder},
    qr,
    sqlite::db::orders::ItemSnapshot,
    sqlite::db::payments::NewPaymentRow,
    traits::{
        CatalogManagement,
        MarketQueries,
        MarketplaceDatabase,
        MarketplaceError,
        ReconcileOutcome,
        SideEffect,
    },
};

const DEFAULT_PREP_TIME_MINUTES: i64 = 15;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Prices the order against the live catalog and persists the whole placement — order, item
    /// snapshots, payment, commission, pickup token — in one transaction. Failure anywhere rolls
    /// the entire placement back: no order ever exists without its payment link, and no debit is
    /// ever observable without its payment row.
    async fn create_order(
        &self,
        user_id: i64,
        order: NewOrderRequest,
        rate: CommissionRate,
    ) -> Result<PlacedOrder, MarketplaceError> {
        if order.items.is_empty() {
            return Err(MarketplaceError::InvalidRequest("order contains no items".into()));
        }
        if order.items.iter().any(|i| i.quantity <= 0) {
            return Err(MarketplaceError::InvalidRequest("item quantities must be positive".into()));
        }
        let mut tx = self.pool.begin().await?;
        let lounge = catalog::fetch_lounge(order.lounge_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::LoungeNotFound(order.lounge_id))?;

        // Price every line from the catalog rows read in this same transaction. All or nothing:
        // one unknown or unavailable item rejects the whole order.
        let mut snapshots = Vec::with_capacity(order.items.len());
        let mut total = Birr::default();
        for item in &order.items {
            let food = catalog::fetch_food(item.food_id, &mut tx)
                .await?
                .filter(|f| f.lounge_id == order.lounge_id)
                .ok_or(MarketplaceError::FoodNotFound(item.food_id))?;
            if !food.is_available {
                return Err(MarketplaceError::FoodUnavailable { id: food.id, name: food.name });
            }
            let subtotal = food.price * item.quantity;
            total = total + subtotal;
            snapshots.push(ItemSnapshot {
                food_id: food.id,
                name: food.name,
                quantity: item.quantity,
                unit_price: food.price,
                subtotal,
                estimated_time: food.estimated_time,
            });
        }
        let commission = rate.commission_on(total);

        let payment = match order.method {
            PaymentMethod::ContractWallet => {
                let contract_id = order.contract_id.ok_or(MarketplaceError::ContractNotFound)?;
                let debited =
                    contracts::try_debit(contract_id, user_id, order.lounge_id, total, &mut tx).await?;
                if debited == 0 {
                    // Diagnose why the guarded debit matched nothing.
                    let err = match contracts::fetch_contract(contract_id, &mut tx).await? {
                        Some(c)
                            if c.user_id == user_id
                                && c.lounge_id == order.lounge_id
                                && c.is_usable(Utc::now()) =>
                        {
                            MarketplaceError::InsufficientBalance { available: c.remaining_balance, required: total }
                        },
                        _ => MarketplaceError::ContractNotFound,
                    };
                    return Err(err);
                }
                debug!("🗃️ Contract [{contract_id}] debited {total} for user #{user_id}");
                payments::insert_payment(
                    NewPaymentRow {
                        user_id,
                        amount: total,
                        payment_type: PaymentType::Order,
                        method: PaymentMethod::ContractWallet,
                        status: PaymentStatus::Completed,
                        order_id: None,
                        contract_id: Some(contract_id),
                        commission,
                    },
                    &mut tx,
                )
                .await?
            },
            PaymentMethod::Chapa => {
                payments::insert_payment(
                    NewPaymentRow {
                        user_id,
                        amount: total,
                        payment_type: PaymentType::Order,
                        method: PaymentMethod::Chapa,
                        status: PaymentStatus::Pending,
                        order_id: None,
                        contract_id: None,
                        commission,
                    },
                    &mut tx,
                )
                .await?
            },
        };

        let contract_id = match order.method {
            PaymentMethod::ContractWallet => order.contract_id,
            PaymentMethod::Chapa => None,
        };
        let max_prep = snapshots.iter().map(|s| s.estimated_time).max().unwrap_or(DEFAULT_PREP_TIME_MINUTES);
        let order_row = orders::insert_order(
            user_id,
            order.lounge_id,
            total,
            order.method,
            payment.id,
            contract_id,
            commission,
            max_prep,
            &mut tx,
        )
        .await?;
        let items = orders::insert_items(order_row.id, &snapshots, &mut tx).await?;

        let token = qr::issue_token(order_row.id);
        let image = qr::render_image_data_url(&token)?;
        let order_row = orders::set_qr(order_row.id, &token, &image, &mut tx).await?;

        let payment = payments::link_order(payment.id, order_row.id, &mut tx).await?;
        let commission_row =
            commissions::insert_commission(order_row.id, lounge.id, commission, rate.value(), total, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order [{}] placed: {} total, {} commission", order_row.id, total, commission);
        Ok(PlacedOrder { order: order_row, items, payment, commission: commission_row })
    }

    async fn update_order_status(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
    ) -> Result<Order, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_status(order_id, new_status, &mut conn).await
    }

    async fn mark_order_delivered(&self, order_id: i64) -> Result<Order, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        match orders::mark_delivered(order_id, &mut conn).await? {
            Some(order) => Ok(order),
            None => match orders::fetch_order(order_id, &mut conn).await? {
                Some(order) if order.status == OrderStatusType::Delivered => {
                    Err(MarketplaceError::AlreadyDelivered(order_id))
                },
                Some(order) => Err(MarketplaceError::ForbiddenTransition {
                    id: order_id,
                    from: order.status,
                    to: OrderStatusType::Delivered,
                }),
                None => Err(MarketplaceError::OrderNotFound(order_id)),
            },
        }
    }

    async fn create_contract(&self, contract: NewContract) -> Result<(Contract, Payment), MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        if let Some(existing) =
            contracts::active_for_user_lounge(contract.user_id, contract.lounge_id, &mut tx).await?
        {
            return Err(MarketplaceError::ContractAlreadyActive(existing.id));
        }
        catalog::fetch_lounge(contract.lounge_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::LoungeNotFound(contract.lounge_id))?;
        let payment = payments::insert_payment(
            NewPaymentRow {
                user_id: contract.user_id,
                amount: contract.total_amount,
                payment_type: PaymentType::Contract,
                method: PaymentMethod::Chapa,
                status: PaymentStatus::Pending,
                order_id: None,
                contract_id: None,
                commission: Birr::default(),
            },
            &mut tx,
        )
        .await?;
        let contract_row = contracts::insert_contract(
            contract.user_id,
            contract.lounge_id,
            contract.total_amount,
            contract.duration_days,
            payment.id,
            &mut tx,
        )
        .await?;
        let payment = payments::link_contract(payment.id, contract_row.id, &mut tx).await?;
        tx.commit().await?;
        Ok((contract_row, payment))
    }

    async fn renew_contract(
        &self,
        contract_id: i64,
        user_id: i64,
        amount: Birr,
        duration: Duration,
    ) -> Result<(Contract, Payment), MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let contract =
            contracts::fetch_contract(contract_id, &mut tx).await?.ok_or(MarketplaceError::ContractNotFound)?;
        if contract.user_id != user_id {
            return Err(MarketplaceError::NotAuthorized("you may not renew someone else's contract".into()));
        }
        let payment = payments::insert_payment(
            NewPaymentRow {
                user_id,
                amount,
                payment_type: PaymentType::Contract,
                method: PaymentMethod::Chapa,
                status: PaymentStatus::Pending,
                order_id: None,
                contract_id: Some(contract_id),
                commission: Birr::default(),
            },
            &mut tx,
        )
        .await?;
        let contract = contracts::apply_renewal(contract_id, amount, duration.num_days(), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Contract [{contract_id}] renewal applied; new balance {}", contract.remaining_balance);
        Ok((contract, payment))
    }

    async fn assign_gateway_reference(
        &self,
        payment_id: i64,
        reference: &str,
    ) -> Result<Payment, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        payments::set_reference(payment_id, reference, &mut conn).await
    }

    /// Settles a verified gateway payment and applies its one side effect in the same
    /// transaction. The `Pending → Completed` update is the idempotency gate: whichever of a
    /// duplicate webhook and a user poll runs second matches no row and is reported as
    /// `AlreadyCompleted` without re-firing side effects.
    async fn confirm_payment(
        &self,
        reference: &str,
        tx_id: Option<&str>,
        metadata: Option<&str>,
    ) -> Result<ReconcileOutcome, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::fetch_by_reference(reference, &mut tx)
            .await?
            .ok_or_else(|| MarketplaceError::PaymentReferenceNotFound(reference.to_string()))?;
        if payment.status == PaymentStatus::Completed {
            return Ok(ReconcileOutcome::AlreadyCompleted(payment));
        }
        let Some(payment) = payments::complete_cas(reference, tx_id, metadata, &mut tx).await? else {
            // Lost the race against a concurrent settlement of the same reference.
            let payment = payments::fetch_by_reference(reference, &mut tx)
                .await?
                .ok_or_else(|| MarketplaceError::PaymentReferenceNotFound(reference.to_string()))?;
            return Ok(ReconcileOutcome::AlreadyCompleted(payment));
        };
        let side_effect = match payment.payment_type {
            PaymentType::Contract => match payment.contract_id {
                Some(contract_id) => {
                    contracts::set_active(contract_id, &mut tx).await?;
                    debug!("🗃️ Contract [{contract_id}] activated by payment [{}]", payment.id);
                    Some(SideEffect::ContractActivated(contract_id))
                },
                None => {
                    warn!("🗃️ Contract payment [{}] has no linked contract to activate", payment.id);
                    None
                },
            },
            PaymentType::Order => match payment.order_id {
                Some(order_id) => orders::advance_to_preparing(order_id, &mut tx)
                    .await?
                    .map(|_| SideEffect::OrderAdvanced(order_id)),
                None => {
                    warn!("🗃️ Order payment [{}] has no linked order to advance", payment.id);
                    None
                },
            },
            PaymentType::Refund => None,
        };
        tx.commit().await?;
        debug!("🗃️ Payment [{}] is now Completed", payment.id);
        Ok(ReconcileOutcome::Completed { payment, side_effect })
    }

    async fn fail_payment(&self, reference: &str) -> Result<Payment, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        match payments::fail_cas(reference, &mut conn).await? {
            Some(payment) => {
                debug!("🗃️ Payment [{}] marked Failed", payment.id);
                Ok(payment)
            },
            None => {
                // Completed (or already failed) in the meantime; report the current state
                // rather than clobbering it.
                let payment = payments::fetch_by_reference(reference, &mut conn)
                    .await?
                    .ok_or_else(|| MarketplaceError::PaymentReferenceNotFound(reference.to_string()))?;
                warn!(
                    "🗃️ Decline for reference {reference} ignored; payment [{}] is already {}",
                    payment.id, payment.status
                );
                Ok(payment)
            },
        }
    }

    async fn expire_lapsed_contracts(&self) -> Result<Vec<Contract>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        contracts::expire_lapsed(&mut conn).await
    }

    async fn close(&mut self) -> Result<(), MarketplaceError> {
        self.pool.close().await;
        Ok(())
    }
}

impl MarketQueries for SqliteDatabase {
    async fn fetch_lounge(&self, lounge_id: i64) -> Result<Option<Lounge>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_lounge(lounge_id, &mut conn).await?)
    }

    async fn fetch_food(&self, food_id: i64) -> Result<Option<FoodItem>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_food(food_id, &mut conn).await?)
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order(order_id, &mut conn).await?)
    }

    async fn fetch_order_with_items(&self, order_id: i64) -> Result<Option<OrderWithItems>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let Some(order) = orders::fetch_order(order_id, &mut conn).await? else {
            return Ok(None);
        };
        let items = orders::items_for_order(order_id, &mut conn).await?;
        Ok(Some(OrderWithItems { order, items }))
    }

    async fn fetch_order_by_qr_token(&self, token: &str) -> Result<Option<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_qr_token(token, &mut conn).await?)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::search_orders(query, &mut conn).await?)
    }

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment(payment_id, &mut conn).await?)
    }

    async fn fetch_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_by_reference(reference, &mut conn).await?)
    }

    async fn payments_for_user(
        &self,
        user_id: i64,
        query: PaymentQueryFilter,
    ) -> Result<Vec<Payment>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::payments_for_user(user_id, query, &mut conn).await?)
    }

    async fn fetch_contract(&self, contract_id: i64) -> Result<Option<Contract>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(contracts::fetch_contract(contract_id, &mut conn).await?)
    }

    async fn active_contract_for_lounge(
        &self,
        user_id: i64,
        lounge_id: i64,
    ) -> Result<Option<Contract>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(contracts::active_for_user_lounge(user_id, lounge_id, &mut conn).await?)
    }

    async fn contracts_for_user(&self, user_id: i64) -> Result<Vec<Contract>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(contracts::contracts_for_user(user_id, &mut conn).await?)
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn add_lounge(&self, lounge: NewLounge) -> Result<Lounge, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_lounge(lounge, &mut conn).await
    }

    async fn add_food(&self, food: NewFoodItem) -> Result<FoodItem, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_food(food, &mut conn).await
    }

    async fn set_food_availability(&self, food_id: i64, available: bool) -> Result<FoodItem, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        catalog::set_availability(food_id, available, &mut conn).await
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL from the environment.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
