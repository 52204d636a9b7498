use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Lounge, Order, OrderStatusType, OrderWithItems, Principal, Role},
    events::{EventProducers, OrderCreatedEvent, OrderStatusChangedEvent},
    order_objects::{CommissionRate, NewOrderRequest, OrderQueryFilter, PlacedOrder},
    qr,
    traits::{MarketplaceDatabase, MarketplaceError},
};

/// `OrderFlowApi` is the primary API for placing orders, moving them through their lifecycle, and
/// verifying pickups.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: MarketplaceDatabase
{
    /// Places a new order for the acting user.
    ///
    /// The items are priced against the live catalog inside the backend's transaction; the
    /// commission rate is frozen into the order at this moment. Payment is settled according to
    /// the request's method: an immediate contract-wallet debit, or a pending gateway payment
    /// that the reconciler completes later.
    ///
    /// On success an `OrderCreated` event is published. Event delivery is best-effort; a failing
    /// subscriber never fails the order.
    pub async fn place_order(
        &self,
        principal: &Principal,
        order: NewOrderRequest,
        rate: CommissionRate,
    ) -> Result<PlacedOrder, MarketplaceError> {
        let placed = self.db.create_order(principal.id, order, rate).await?;
        debug!(
            "🍱️ Order [{}] created for user #{} at lounge #{}: {} ({} commission), paid via {}",
            placed.order.id,
            placed.order.user_id,
            placed.order.lounge_id,
            placed.order.total_price,
            placed.order.commission,
            placed.order.payment_method,
        );
        self.call_order_created_hook(&placed.order).await;
        Ok(placed)
    }

    /// Fetches an order with its line items. Visible to the customer who placed it, the owner of
    /// the lounge it was placed at, and admins.
    pub async fn order_with_items(
        &self,
        principal: &Principal,
        order_id: i64,
    ) -> Result<OrderWithItems, MarketplaceError> {
        let result = self
            .db
            .fetch_order_with_items(order_id)
            .await?
            .ok_or(MarketplaceError::OrderNotFound(order_id))?;
        self.authorize_order_access(principal, &result.order).await?;
        Ok(result)
    }

    /// The acting user's own orders, optionally narrowed by the filter.
    pub async fn my_orders(
        &self,
        principal: &Principal,
        filter: OrderQueryFilter,
    ) -> Result<Vec<Order>, MarketplaceError> {
        let filter = filter.with_user_id(principal.id);
        self.db.search_orders(filter).await
    }

    /// Orders placed at the given lounge. Restricted to the lounge owner and admins.
    pub async fn lounge_orders(
        &self,
        principal: &Principal,
        lounge_id: i64,
        filter: OrderQueryFilter,
    ) -> Result<Vec<Order>, MarketplaceError> {
        let lounge = self.db.fetch_lounge(lounge_id).await?.ok_or(MarketplaceError::LoungeNotFound(lounge_id))?;
        self.require_lounge_owner(principal, &lounge)?;
        self.db.search_orders(filter.with_lounge_id(lounge_id)).await
    }

    /// Changes the status of an order. Only the owner of the lounge the order was placed at (or
    /// an admin) may do this.
    ///
    /// Transitions follow the lifecycle table; everything else is rejected:
    ///
    /// | From \ To  | Preparing | Ready | Delivered | Cancelled |
    /// |------------|-----------|-------|-----------|-----------|
    /// | Pending    | ✓         | –     | –         | ✓         |
    /// | Preparing  | –         | ✓     | –         | ✓         |
    /// | Ready      | –         | –     | ✓         | –         |
    /// | Delivered  | –         | –     | –         | –         |
    /// | Cancelled  | –         | –     | –         | –         |
    ///
    /// Moving to `Delivered` stamps the delivery time. An `OrderStatusChanged` event is published
    /// on success.
    pub async fn update_status(
        &self,
        principal: &Principal,
        order_id: i64,
        new_status: OrderStatusType,
    ) -> Result<Order, MarketplaceError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(MarketplaceError::OrderNotFound(order_id))?;
        let lounge =
            self.db.fetch_lounge(order.lounge_id).await?.ok_or(MarketplaceError::LoungeNotFound(order.lounge_id))?;
        self.require_lounge_owner(principal, &lounge)?;
        let old_status = order.status;
        if !old_status.can_transition_to(new_status) {
            return Err(MarketplaceError::ForbiddenTransition { id: order_id, from: old_status, to: new_status });
        }
        let updated = self.db.update_order_status(order_id, new_status).await?;
        debug!("🍱️ Order [{order_id}] moved from {old_status} to {new_status}");
        self.call_status_changed_hook(&updated, old_status).await;
        Ok(updated)
    }

    /// Verifies a pickup token presented at the counter and marks the order delivered.
    ///
    /// The token is parsed structurally first; a malformed token is rejected before any lookup
    /// happens. The order is then resolved by exact token match — the stored association is
    /// authoritative, never the id embedded in the token. Re-verifying an already-delivered
    /// order fails with [`MarketplaceError::AlreadyDelivered`] and leaves the original delivery
    /// timestamp untouched.
    pub async fn verify_pickup(&self, principal: &Principal, token: &str) -> Result<Order, MarketplaceError> {
        let parsed = qr::parse_token(token)?;
        trace!("🍱️ Pickup token for order hint [{}] parsed, resolving", parsed.order_id);
        let order = self.db.fetch_order_by_qr_token(token).await?.ok_or_else(|| {
            warn!("🍱️ Pickup token with order hint [{}] matched no stored order", parsed.order_id);
            MarketplaceError::OrderNotFound(parsed.order_id)
        })?;
        let lounge =
            self.db.fetch_lounge(order.lounge_id).await?.ok_or(MarketplaceError::LoungeNotFound(order.lounge_id))?;
        self.require_lounge_owner(principal, &lounge)?;
        if order.status == OrderStatusType::Delivered {
            return Err(MarketplaceError::AlreadyDelivered(order.id));
        }
        let old_status = order.status;
        let delivered = self.db.mark_order_delivered(order.id).await?;
        debug!("🍱️ Order [{}] picked up and marked delivered", delivered.id);
        self.call_status_changed_hook(&delivered, old_status).await;
        Ok(delivered)
    }

    async fn authorize_order_access(&self, principal: &Principal, order: &Order) -> Result<(), MarketplaceError> {
        if principal.is_admin() || order.user_id == principal.id {
            return Ok(());
        }
        let lounge =
            self.db.fetch_lounge(order.lounge_id).await?.ok_or(MarketplaceError::LoungeNotFound(order.lounge_id))?;
        if lounge.owner_id == principal.id {
            Ok(())
        } else {
            Err(MarketplaceError::NotAuthorized("you may not view this order".into()))
        }
    }

    fn require_lounge_owner(&self, principal: &Principal, lounge: &Lounge) -> Result<(), MarketplaceError> {
        let is_owner = principal.role == Role::Lounge && lounge.owner_id == principal.id;
        if principal.is_admin() || is_owner {
            Ok(())
        } else {
            Err(MarketplaceError::NotAuthorized("only the lounge owner may manage this order".into()))
        }
    }

    async fn call_order_created_hook(&self, order: &Order) {
        for emitter in &self.producers.order_created_producer {
            trace!("🍱️ Notifying order-created subscribers for order [{}]", order.id);
            emitter.publish_event(OrderCreatedEvent::new(order.clone())).await;
        }
    }

    async fn call_status_changed_hook(&self, order: &Order, old_status: OrderStatusType) {
        for emitter in &self.producers.order_status_producer {
            trace!("🍱️ Notifying status-changed subscribers for order [{}]", order.id);
            emitter.publish_event(OrderStatusChangedEvent::new(order.clone(), old_status)).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}
