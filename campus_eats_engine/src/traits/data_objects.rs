use serde::{Deserialize, Serialize};

use crate::db_types::Payment;

/// The side effect a completed payment triggered. Each payment funds exactly one of a contract or
/// an order, so at most one of these fires per settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideEffect {
    /// The funded contract was switched to active.
    ContractActivated(i64),
    /// The funded order moved from `Pending` to `Preparing`.
    OrderAdvanced(i64),
}

/// Result of reconciling one gateway payment.
#[derive(Debug, Clone, Serialize)]
pub enum ReconcileOutcome {
    /// The payment was already settled; nothing was re-applied. Gateways deliver webhooks
    /// at-least-once, so this is a normal outcome, not an error.
    AlreadyCompleted(Payment),
    /// The payment transitioned to `Completed` in this call, together with its side effect (if a
    /// linked record existed to act on).
    Completed { payment: Payment, side_effect: Option<SideEffect> },
    /// The gateway reported the payment as unsuccessful; the payment is now `Failed`.
    Failed(Payment),
}

impl ReconcileOutcome {
    pub fn payment(&self) -> &Payment {
        match self {
            ReconcileOutcome::AlreadyCompleted(p) => p,
            ReconcileOutcome::Completed { payment, .. } => payment,
            ReconcileOutcome::Failed(p) => p,
        }
    }
}

/// An inbound gateway webhook, reduced to the fields the reconciler acts on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookNotification {
    /// The checkout reference we generated at initialization time (`tx_ref` on the wire).
    pub reference: String,
    /// The gateway's transaction id, if it sent one.
    pub transaction_id: Option<String>,
    /// The status string the webhook claims. Informational only — settlement always goes through
    /// a `verify` call, never through the webhook body alone.
    pub status: Option<String>,
}
