pub mod contract_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_api;
