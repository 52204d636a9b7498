use crate::{
    db_types::{Contract, FoodItem, Lounge, Order, OrderWithItems, Payment},
    order_objects::{OrderQueryFilter, PaymentQueryFilter},
    traits::MarketplaceError,
};

/// Read-side lookups for marketplace records. Backends implement this alongside
/// [`super::MarketplaceDatabase`]; the APIs use it for fetching and authorization checks.
#[allow(async_fn_in_trait)]
pub trait MarketQueries {
    async fn fetch_lounge(&self, lounge_id: i64) -> Result<Option<Lounge>, MarketplaceError>;

    async fn fetch_food(&self, food_id: i64) -> Result<Option<FoodItem>, MarketplaceError>;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, MarketplaceError>;

    /// The order together with its frozen line-item snapshots.
    async fn fetch_order_with_items(&self, order_id: i64) -> Result<Option<OrderWithItems>, MarketplaceError>;

    /// Resolves a pickup token by exact match against stored tokens. The token's embedded order
    /// id is never trusted on its own.
    async fn fetch_order_by_qr_token(&self, token: &str) -> Result<Option<Order>, MarketplaceError>;

    /// Fetches orders matching the filter, oldest first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, MarketplaceError>;

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, MarketplaceError>;

    async fn fetch_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, MarketplaceError>;

    async fn payments_for_user(
        &self,
        user_id: i64,
        query: PaymentQueryFilter,
    ) -> Result<Vec<Payment>, MarketplaceError>;

    async fn fetch_contract(&self, contract_id: i64) -> Result<Option<Contract>, MarketplaceError>;

    /// The user's active, non-expired contract with the given lounge, if any.
    async fn active_contract_for_lounge(
        &self,
        user_id: i64,
        lounge_id: i64,
    ) -> Result<Option<Contract>, MarketplaceError>;

    async fn contracts_for_user(&self, user_id: i64) -> Result<Vec<Contract>, MarketplaceError>;
}
