use ce_common::Birr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Commission, Order, OrderItem, OrderStatusType, Payment, PaymentMethod, PaymentStatus, PaymentType},
    traits::MarketplaceError,
};

//--------------------------------------   CommissionRate    ---------------------------------------------------------
/// The platform's cut as a fraction of the order total.
///
/// This is deliberately a call-time value, not ambient state: the caller reads it from its own
/// configuration and passes it into order placement, so a later configuration change never
/// rewrites commissions that were already frozen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommissionRate(f64);

pub const DEFAULT_COMMISSION_RATE: f64 = 0.05;

impl Default for CommissionRate {
    fn default() -> Self {
        Self(DEFAULT_COMMISSION_RATE)
    }
}

impl CommissionRate {
    pub fn new(rate: f64) -> Result<Self, MarketplaceError> {
        if !(0.0..=1.0).contains(&rate) || !rate.is_finite() {
            return Err(MarketplaceError::InvalidRequest(format!("commission rate {rate} is not a fraction in [0, 1]")));
        }
        Ok(Self(rate))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// The commission owed on `total`, rounded to the nearest cent.
    pub fn commission_on(&self, total: Birr) -> Birr {
        Birr::from_cents((total.value() as f64 * self.0).round() as i64)
    }
}

//--------------------------------------   NewOrderRequest   ---------------------------------------------------------
/// A client's order request. Note what is *absent*: prices. Clients only name catalog ids and
/// quantities; pricing always comes from the live catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub lounge_id: i64,
    pub items: Vec<OrderItemRequest>,
    pub method: PaymentMethod,
    /// Required when `method` is the contract wallet.
    pub contract_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub food_id: i64,
    pub quantity: i64,
}

//--------------------------------------     PlacedOrder     ---------------------------------------------------------
/// Everything persisted for one successful order placement.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment: Payment,
    pub commission: Commission,
}

//--------------------------------------  OrderQueryFilter   ---------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub user_id: Option<i64>,
    pub lounge_id: Option<i64>,
    pub status: Option<OrderStatusType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl OrderQueryFilter {
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none()
            && self.lounge_id.is_none()
            && self.status.is_none()
            && self.since.is_none()
            && self.until.is_none()
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_lounge_id(mut self, lounge_id: i64) -> Self {
        self.lounge_id = Some(lounge_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status = Some(status);
        self
    }
}

//-------------------------------------- PaymentQueryFilter  ---------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentQueryFilter {
    pub payment_type: Option<PaymentType>,
    pub status: Option<PaymentStatus>,
}

//--------------------------------------      Checkout       ---------------------------------------------------------
/// Payer details forwarded to the gateway's hosted checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayerInfo {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// Everything the gateway needs to open a checkout session.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    pub amount: Birr,
    pub payer: PayerInfo,
    pub reference: String,
    pub return_url: Option<String>,
    pub description: String,
}

/// The gateway's answer to a successful initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutHandle {
    pub checkout_url: String,
    pub reference: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn commission_is_five_percent_of_total() {
        // catalog price 50 ETB, quantity 2, rate 0.05 -> total 100 ETB, commission 5.00 ETB
        let total = Birr::from_birr(50) * 2;
        let rate = CommissionRate::default();
        assert_eq!(total, Birr::from_birr(100));
        assert_eq!(rate.commission_on(total), Birr::from_birr(5));
    }

    #[test]
    fn commission_rounds_to_nearest_cent() {
        let rate = CommissionRate::new(0.05).unwrap();
        // 33 cents * 0.05 = 1.65 cents -> 2 cents
        assert_eq!(rate.commission_on(Birr::from_cents(33)), Birr::from_cents(2));
        // 30 cents * 0.05 = 1.5 cents -> 2 cents (round half away from zero)
        assert_eq!(rate.commission_on(Birr::from_cents(30)), Birr::from_cents(2));
        assert_eq!(rate.commission_on(Birr::from_cents(20)), Birr::from_cents(1));
    }

    #[test]
    fn rejects_rates_outside_the_unit_interval() {
        assert!(CommissionRate::new(-0.01).is_err());
        assert!(CommissionRate::new(1.01).is_err());
        assert!(CommissionRate::new(f64::NAN).is_err());
        assert!(CommissionRate::new(0.0).is_ok());
        assert!(CommissionRate::new(1.0).is_ok());
    }
}
