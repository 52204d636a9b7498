//! Request and response DTOs for the HTTP surface.
use campus_eats_engine::traits::WebhookNotification;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderParams {
    pub lounge_id: i64,
    pub items: Vec<OrderItemParams>,
    /// Wire names: `"chapa"` or `"contract"`.
    pub payment_method: String,
    pub contract_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemParams {
    pub food_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusParams {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyQrParams {
    pub qr_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderQueryParams {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateContractParams {
    pub lounge_id: i64,
    /// Birr cents.
    pub amount: i64,
    pub duration_days: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenewContractParams {
    /// Birr cents.
    pub amount: i64,
    pub duration_days: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitializePaymentParams {
    pub payment_id: i64,
    pub return_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentQueryParams {
    #[serde(rename = "type")]
    pub payment_type: Option<String>,
    pub status: Option<String>,
}

/// The webhook body Chapa posts on payment events.
#[derive(Debug, Clone, Deserialize)]
pub struct ChapaWebhookPayload {
    pub tx_ref: String,
    pub status: Option<String>,
    pub transaction_id: Option<String>,
}

impl From<ChapaWebhookPayload> for WebhookNotification {
    fn from(payload: ChapaWebhookPayload) -> Self {
        WebhookNotification {
            reference: payload.tx_ref,
            transaction_id: payload.transaction_id,
            status: payload.status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn ok<S: Into<String>>(message: S) -> Self {
        Self { success: true, message: message.into() }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chapa_webhook_payload_deserializes() {
        let body = r#"{"tx_ref":"CE-1700000000000-12","status":"success","transaction_id":"TX-99","extra":"ignored"}"#;
        let payload: ChapaWebhookPayload = serde_json::from_str(body).unwrap();
        assert_eq!(payload.tx_ref, "CE-1700000000000-12");
        let notification: WebhookNotification = payload.into();
        assert_eq!(notification.reference, "CE-1700000000000-12");
        assert_eq!(notification.transaction_id.as_deref(), Some("TX-99"));
    }

    #[test]
    fn create_order_params_deserialize() {
        let body = r#"{"lounge_id":3,"items":[{"food_id":1,"quantity":2}],"payment_method":"contract","contract_id":9}"#;
        let params: CreateOrderParams = serde_json::from_str(body).unwrap();
        assert_eq!(params.items.len(), 1);
        assert_eq!(params.payment_method, "contract");
        assert_eq!(params.contract_id, Some(9));
    }
}
