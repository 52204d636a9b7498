use chrono::Utc;
use log::*;

use crate::{
    db_types::{Payment, PaymentStatus, Principal},
    order_objects::{CheckoutHandle, CheckoutRequest, PayerInfo, PaymentQueryFilter},
    traits::{
        GatewayVerdict,
        MarketplaceDatabase,
        MarketplaceError,
        PaymentGateway,
        ReconcileOutcome,
        WebhookNotification,
    },
};

/// `PaymentApi` owns the two halves of gateway settlement: opening a hosted checkout for a
/// pending payment, and reconciling that payment later when the gateway reports back (by webhook)
/// or when the user polls.
///
/// Reconciliation is idempotent. A webhook delivered twice, or a webhook racing a user poll for
/// the same reference, settles the payment exactly once; the loser observes
/// [`ReconcileOutcome::AlreadyCompleted`].
pub struct PaymentApi<B, G> {
    db: B,
    gateway: G,
}

impl<B, G> PaymentApi<B, G> {
    pub fn new(db: B, gateway: G) -> Self {
        Self { db, gateway }
    }
}

impl<B, G> PaymentApi<B, G>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    /// Opens a gateway checkout for a pending payment owned by the acting user.
    ///
    /// Assigns the payment its unique gateway reference (kept if one was already assigned, so
    /// re-initializing an abandoned checkout reuses the same reference) and returns the checkout
    /// URL to redirect the client to.
    pub async fn initialize_checkout(
        &self,
        principal: &Principal,
        payment_id: i64,
        payer: PayerInfo,
        return_url: Option<String>,
    ) -> Result<CheckoutHandle, MarketplaceError> {
        let payment =
            self.db.fetch_payment(payment_id).await?.ok_or(MarketplaceError::PaymentNotFound(payment_id))?;
        if !principal.is_admin() && payment.user_id != principal.id {
            return Err(MarketplaceError::NotAuthorized("you may not pay for someone else's payment".into()));
        }
        if payment.status == PaymentStatus::Completed {
            return Err(MarketplaceError::PaymentAlreadyCompleted(payment_id));
        }
        let reference = match &payment.gateway_reference {
            Some(reference) => reference.clone(),
            None => {
                let reference = new_reference(payment_id);
                self.db.assign_gateway_reference(payment_id, &reference).await?;
                reference
            },
        };
        let request = CheckoutRequest {
            amount: payment.amount,
            payer,
            reference: reference.clone(),
            return_url,
            description: format!("Payment for {}", payment.payment_type),
        };
        let handle = self.gateway.initialize(&request).await?;
        debug!("💳️ Checkout opened for payment [{payment_id}] with reference {reference}");
        Ok(handle)
    }

    /// Handles an inbound gateway webhook. Delivery is at-least-once and possibly out of order
    /// with user polls; both paths are safe to race.
    pub async fn handle_webhook(&self, notification: WebhookNotification) -> Result<ReconcileOutcome, MarketplaceError> {
        debug!("💳️ Webhook received for reference {}", notification.reference);
        self.reconcile(&notification.reference, notification.transaction_id.as_deref()).await
    }

    /// A user-initiated "verify my payment" poll. Returns the settled payment state.
    pub async fn poll_payment(&self, principal: &Principal, payment_id: i64) -> Result<Payment, MarketplaceError> {
        let payment =
            self.db.fetch_payment(payment_id).await?.ok_or(MarketplaceError::PaymentNotFound(payment_id))?;
        if !principal.is_admin() && payment.user_id != principal.id {
            return Err(MarketplaceError::NotAuthorized("you may not view this payment".into()));
        }
        // Nothing to reconcile: already settled, or checkout never initialized.
        if payment.status == PaymentStatus::Completed || payment.gateway_reference.is_none() {
            return Ok(payment);
        }
        let reference = payment.gateway_reference.clone().unwrap_or_default();
        let outcome = self.reconcile(&reference, None).await?;
        Ok(outcome.payment().clone())
    }

    /// The single reconciliation path shared by webhooks and polls.
    ///
    /// Short-circuits on already-completed payments *before* calling the gateway, then settles
    /// according to the gateway's verdict. A transport failure talking to the gateway is returned
    /// to the caller as retryable and leaves the payment untouched — it is never converted into a
    /// `Failed` payment.
    async fn reconcile(
        &self,
        reference: &str,
        fallback_tx_id: Option<&str>,
    ) -> Result<ReconcileOutcome, MarketplaceError> {
        let payment = self
            .db
            .fetch_payment_by_reference(reference)
            .await?
            .ok_or_else(|| MarketplaceError::PaymentReferenceNotFound(reference.to_string()))?;
        if payment.status == PaymentStatus::Completed {
            debug!("💳️ Payment [{}] already completed; reconciliation is a no-op", payment.id);
            return Ok(ReconcileOutcome::AlreadyCompleted(payment));
        }
        match self.gateway.verify(reference).await? {
            GatewayVerdict::Approved { tx_id, metadata } => {
                let tx_id = tx_id.as_deref().or(fallback_tx_id);
                let outcome = self.db.confirm_payment(reference, tx_id, metadata.as_deref()).await?;
                match &outcome {
                    ReconcileOutcome::Completed { payment, side_effect } => {
                        debug!("💳️ Payment [{}] completed. Side effect: {side_effect:?}", payment.id);
                    },
                    ReconcileOutcome::AlreadyCompleted(payment) => {
                        debug!("💳️ Payment [{}] was settled by a concurrent reconciliation", payment.id);
                    },
                    ReconcileOutcome::Failed(_) => {},
                }
                Ok(outcome)
            },
            GatewayVerdict::Declined { status } => {
                info!("💳️ Gateway declined reference {reference} with status '{status}'");
                let payment = self.db.fail_payment(reference).await?;
                Ok(ReconcileOutcome::Failed(payment))
            },
        }
    }

    /// The acting user's payments, optionally filtered by type and status.
    pub async fn my_payments(
        &self,
        principal: &Principal,
        filter: PaymentQueryFilter,
    ) -> Result<Vec<Payment>, MarketplaceError> {
        self.db.payments_for_user(principal.id, filter).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}

/// A checkout reference is unique per assignment: wall-clock millis plus the payment id.
fn new_reference(payment_id: i64) -> String {
    format!("CE-{}-{payment_id}", Utc::now().timestamp_millis())
}
