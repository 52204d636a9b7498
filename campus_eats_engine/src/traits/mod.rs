//! Interface contracts for marketplace backends and external collaborators.
//!
//! The engine is written against traits so that the storage backend and the payment gateway can
//! be swapped (and mocked in tests) without touching the flows themselves.
//!
//! * [`MarketplaceDatabase`] is the atomic write-side: order creation, the contract ledger, and
//!   payment settlement. Every method that touches more than one row is a single transaction.
//! * [`MarketQueries`] is the read-side: lookups and filtered searches.
//! * [`CatalogManagement`] is the small seed surface for lounges and menu items that the core
//!   flows and tests need. Full catalog CRUD is out of scope for this crate.
//! * [`PaymentGateway`] is the contract for the external payment processor. Implementations must
//!   distinguish a gateway that said *no* from a gateway that could not be reached.
mod catalog_management;
mod data_objects;
mod market_queries;
mod marketplace_database;
mod payment_gateway;

pub use catalog_management::CatalogManagement;
pub use data_objects::{ReconcileOutcome, SideEffect, WebhookNotification};
pub use market_queries::MarketQueries;
pub use marketplace_database::{MarketplaceDatabase, MarketplaceError};
pub use payment_gateway::{GatewayError, GatewayVerdict, PaymentGateway};
