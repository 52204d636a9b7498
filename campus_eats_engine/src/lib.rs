//! Campus Eats Engine
//!
//! The core library for the Campus Eats food-ordering marketplace. It prices and persists orders
//! against a live catalog, settles them from prepaid contract wallets or an external payment
//! gateway, reconciles gateway payments delivered via webhook or poll, and issues the QR pickup
//! tokens that lounge staff scan at the counter.
//!
//! The library is split into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You should
//!    never need to touch tables directly; use the public APIs instead. The record types stored in
//!    the database are defined in [`db_types`] and are public.
//! 2. The public APIs ([`OrderFlowApi`], [`ContractApi`], [`PaymentApi`]). These own the order,
//!    contract-ledger and payment-reconciliation flows. Backends implement the traits in
//!    [`traits`] to power them.
//! 3. Event hooks ([`events`]). The engine emits an event when an order is created or changes
//!    status; callers can subscribe (e.g. to push notifications) without the engine knowing or
//!    caring whether delivery succeeds.
mod api;

pub mod db_types;
pub mod events;
pub mod qr;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod test_utils;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use api::{
    contract_api::ContractApi,
    order_flow_api::OrderFlowApi,
    order_objects,
    payment_api::PaymentApi,
};
pub use traits::{CatalogManagement, MarketQueries, MarketplaceDatabase, MarketplaceError, PaymentGateway};
