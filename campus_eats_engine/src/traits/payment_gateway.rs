use thiserror::Error;

use crate::order_objects::{CheckoutHandle, CheckoutRequest};

/// The external payment processor, specified as a contract rather than a protocol.
///
/// `initialize` starts a hosted checkout for a pending payment; `verify` asks the gateway for the
/// authoritative status of a reference. Implementations must keep the two failure modes apart: a
/// gateway that *answered* with a rejection is terminal, a gateway that could not be reached is
/// retryable and must never be recorded as a declined payment.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone + Send + Sync {
    /// Starts a checkout session for the given amount/payer/reference and returns the handle the
    /// client is redirected to.
    async fn initialize(&self, request: &CheckoutRequest) -> Result<CheckoutHandle, GatewayError>;

    /// Asks the gateway whether the payment behind `reference` went through.
    async fn verify(&self, reference: &str) -> Result<GatewayVerdict, GatewayError>;
}

/// The gateway's answer to a `verify` call. Both variants mean the gateway responded; transport
/// failures surface as [`GatewayError::Unreachable`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayVerdict {
    /// The gateway confirms the money moved.
    Approved { tx_id: Option<String>, metadata: Option<String> },
    /// The gateway reports the payment did not succeed (declined, cancelled, still unpaid...).
    Declined { status: String },
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The gateway answered and said no (bad request, unknown reference, rejected
    /// initialization). Terminal for this attempt.
    #[error("Gateway rejected the request: {0}")]
    Rejected(String),
    /// The gateway could not be reached or timed out. Retryable; says nothing about the payment.
    #[error("Gateway unreachable: {0}")]
    Unreachable(String),
}
