use std::{fmt::Display, str::FromStr};

use ce_common::Birr;
use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ConversionError(String);

//--------------------------------------        Role        ---------------------------------------------------------
/// The role carried by an authenticated principal. The engine trusts whatever the auth layer
/// resolved; it never re-validates credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum Role {
    /// A campus customer placing orders.
    User,
    /// A vendor account. Lounge owners manage order status and verify pickups.
    Lounge,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "User"),
            Role::Lounge => write!(f, "Lounge"),
            Role::Admin => write!(f, "Admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "User" => Ok(Self::User),
            "Lounge" => Ok(Self::Lounge),
            "Admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------      Principal      ---------------------------------------------------------
/// The acting, already-authenticated user for an API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub role: Role,
}

impl Principal {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// Newly created. Contract-paid orders leave this state as soon as the kitchen confirms;
    /// gateway-paid orders leave it when the payment reconciles.
    Pending,
    Preparing,
    Ready,
    /// Terminal. Set when the pickup QR is verified or the vendor marks the hand-over.
    Delivered,
    /// Terminal.
    Cancelled,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Delivered | OrderStatusType::Cancelled)
    }

    /// The order lifecycle transition table. Delivered and Cancelled are dead ends; everything
    /// else moves strictly forward.
    pub fn can_transition_to(&self, new: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!(
            (self, new),
            (Pending, Preparing) | (Pending, Cancelled) | (Preparing, Ready) | (Preparing, Cancelled) | (Ready, Delivered)
        )
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Preparing => write!(f, "Preparing"),
            OrderStatusType::Ready => write!(f, "Ready"),
            OrderStatusType::Delivered => write!(f, "Delivered"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Preparing" => Ok(Self::Preparing),
            "Ready" => Ok(Self::Ready),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------    PaymentMethod    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// The Chapa payment gateway. Settlement is asynchronous via webhook or poll.
    Chapa,
    /// A prepaid contract wallet held against the lounge. Settlement is an immediate debit.
    ContractWallet,
}

impl PaymentMethod {
    /// Parses the wire-format method names clients send (`"chapa"` / `"contract"`).
    pub fn from_request(s: &str) -> Option<Self> {
        match s {
            "chapa" => Some(Self::Chapa),
            "contract" => Some(Self::ContractWallet),
            _ => None,
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Chapa => write!(f, "Chapa"),
            PaymentMethod::ContractWallet => write!(f, "ContractWallet"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Chapa" => Ok(Self::Chapa),
            "ContractWallet" => Ok(Self::ContractWallet),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------     PaymentType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentType {
    /// Pays for a single order.
    Order,
    /// Funds (or renews) a contract wallet.
    Contract,
    Refund,
}

impl Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentType::Order => write!(f, "Order"),
            PaymentType::Contract => write!(f, "Contract"),
            PaymentType::Refund => write!(f, "Refund"),
        }
    }
}

impl FromStr for PaymentType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Order" => Ok(Self::Order),
            "Contract" => Ok(Self::Contract),
            "Refund" => Ok(Self::Refund),
            s => Err(ConversionError(format!("Invalid payment type: {s}"))),
        }
    }
}

//--------------------------------------    PaymentStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Completed,
    /// Terminal. The gateway explicitly declined the payment.
    Failed,
    /// Terminal.
    Refunded,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Refunded)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Completed => write!(f, "Completed"),
            PaymentStatus::Failed => write!(f, "Failed"),
            PaymentStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------  CommissionStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum CommissionStatus {
    Pending,
    Paid,
    Cancelled,
}

impl Display for CommissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommissionStatus::Pending => write!(f, "Pending"),
            CommissionStatus::Paid => write!(f, "Paid"),
            CommissionStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

//--------------------------------------       Lounge        ---------------------------------------------------------
/// A food vendor. Only the seed/lookup surface the core flows need; full vendor management lives
/// elsewhere.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Lounge {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLounge {
    pub owner_id: i64,
    pub name: String,
}

//--------------------------------------      FoodItem       ---------------------------------------------------------
/// A live catalog record. Orders are priced against the *current* row; the order keeps its own
/// frozen snapshot afterwards.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FoodItem {
    pub id: i64,
    pub lounge_id: i64,
    pub name: String,
    pub price: Birr,
    /// Estimated preparation time in minutes.
    pub estimated_time: i64,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFoodItem {
    pub lounge_id: i64,
    pub name: String,
    pub price: Birr,
    pub estimated_time: i64,
    pub is_available: bool,
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub lounge_id: i64,
    pub total_price: Birr,
    pub status: OrderStatusType,
    pub payment_method: PaymentMethod,
    pub payment_id: Option<i64>,
    pub contract_id: Option<i64>,
    /// The platform's cut, frozen at order time.
    pub commission: Birr,
    pub qr_token: Option<String>,
    pub qr_image: Option<String>,
    pub estimated_ready_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      OrderItem      ---------------------------------------------------------
/// A frozen line-item snapshot. Never re-read from the catalog after the order is created.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub food_id: i64,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Birr,
    pub subtotal: Birr,
    pub estimated_time: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

//--------------------------------------       Payment       ---------------------------------------------------------
/// One money movement. Created by the order flow or the contract top-up flow; only the payment
/// reconciler moves it out of `Pending`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub amount: Birr,
    pub payment_type: PaymentType,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub order_id: Option<i64>,
    pub contract_id: Option<i64>,
    pub commission: Birr,
    pub gateway_reference: Option<String>,
    pub gateway_tx_id: Option<String>,
    /// Raw verification payload from the gateway, stored as JSON for audit.
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      Contract       ---------------------------------------------------------
/// A prepaid wallet a user holds against one lounge.
///
/// Invariant: `0 <= remaining_balance <= total_amount`. The balance only decreases through the
/// guarded debit in the ledger, and only increases on renewal.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Contract {
    pub id: i64,
    pub user_id: i64,
    pub lounge_id: i64,
    pub total_amount: Birr,
    pub remaining_balance: Birr,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_expired: bool,
    /// False until the funding payment reconciles.
    pub is_active: bool,
    pub payment_id: Option<i64>,
    pub renewal_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contract {
    /// A contract can pay for orders only while it is active, not flagged expired, and its expiry
    /// timestamp has not passed. The periodic sweep flips the flags; this check does not rely on
    /// the sweep having run.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired && now < self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct NewContract {
    pub user_id: i64,
    pub lounge_id: i64,
    pub total_amount: Birr,
    pub duration_days: i64,
}

//--------------------------------------     Commission      ---------------------------------------------------------
/// The platform's cut of one order. `rate` is a point-in-time snapshot; a later change to the
/// configured rate never rewrites existing rows.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Commission {
    pub id: i64,
    pub order_id: i64,
    pub lounge_id: i64,
    pub amount: Birr,
    pub rate: f64,
    pub order_amount: Birr,
    pub status: CommissionStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
