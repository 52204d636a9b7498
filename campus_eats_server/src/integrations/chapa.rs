//! Chapa payment gateway client.
//!
//! Implements the engine's [`PaymentGateway`] contract over Chapa's REST API. The split between
//! the two failure modes matters here: any transport problem maps to `Unreachable` (retryable,
//! says nothing about the payment), while an answered-but-negative response maps to `Rejected` or
//! a `Declined` verdict.
use campus_eats_engine::{
    order_objects::{CheckoutHandle, CheckoutRequest},
    traits::{GatewayError, GatewayVerdict, PaymentGateway},
};
use log::*;
use serde::{Deserialize, Serialize};

use crate::config::ChapaConfig;

#[derive(Clone)]
pub struct ChapaGateway {
    config: ChapaConfig,
    client: reqwest::Client,
}

impl ChapaGateway {
    pub fn new(config: &ChapaConfig) -> Self {
        Self { config: config.clone(), client: reqwest::Client::new() }
    }
}

#[derive(Debug, Serialize)]
struct InitializePayload<'a> {
    amount: String,
    currency: &'static str,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<&'a str>,
    tx_ref: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    return_url: Option<&'a str>,
    customization: Customization<'a>,
}

#[derive(Debug, Serialize)]
struct Customization<'a> {
    title: &'static str,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChapaResponse {
    status: String,
    message: Option<String>,
    data: Option<serde_json::Value>,
}

impl PaymentGateway for ChapaGateway {
    async fn initialize(&self, request: &CheckoutRequest) -> Result<CheckoutHandle, GatewayError> {
        let url = format!("{}/transaction/initialize", self.config.api_url);
        let payload = InitializePayload {
            amount: format!("{:.2}", request.amount.to_decimal()),
            currency: "ETB",
            email: &request.payer.email,
            first_name: &request.payer.first_name,
            last_name: &request.payer.last_name,
            phone_number: request.payer.phone.as_deref(),
            tx_ref: &request.reference,
            callback_url: self.config.callback_url.as_deref(),
            return_url: request.return_url.as_deref(),
            customization: Customization { title: "Campus Eats", description: &request.description },
        };
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.secret_key.reveal())
            .json(&payload)
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;
        let http_status = response.status();
        let body: ChapaResponse =
            response.json().await.map_err(|e| GatewayError::Rejected(format!("unparseable response: {e}")))?;
        if !http_status.is_success() || body.status != "success" {
            let reason = body.message.unwrap_or_else(|| format!("HTTP {http_status}"));
            warn!("💳️ Chapa rejected checkout initialization for {}: {reason}", request.reference);
            return Err(GatewayError::Rejected(reason));
        }
        let checkout_url = body
            .data
            .as_ref()
            .and_then(|d| d.get("checkout_url"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::Rejected("initialize response had no checkout_url".to_string()))?
            .to_string();
        debug!("💳️ Chapa checkout opened for {}", request.reference);
        Ok(CheckoutHandle { checkout_url, reference: request.reference.clone() })
    }

    async fn verify(&self, reference: &str) -> Result<GatewayVerdict, GatewayError> {
        let url = format!("{}/transaction/verify/{reference}", self.config.api_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.config.secret_key.reveal())
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;
        let http_status = response.status();
        if http_status.is_server_error() {
            return Err(GatewayError::Unreachable(format!("HTTP {http_status}")));
        }
        let body: ChapaResponse =
            response.json().await.map_err(|e| GatewayError::Rejected(format!("unparseable response: {e}")))?;
        if !http_status.is_success() {
            let reason = body.message.unwrap_or_else(|| format!("HTTP {http_status}"));
            return Err(GatewayError::Rejected(reason));
        }
        let tx_status =
            body.data.as_ref().and_then(|d| d.get("status")).and_then(|v| v.as_str()).unwrap_or("unknown");
        if body.status == "success" && tx_status == "success" {
            let tx_id = body
                .data
                .as_ref()
                .and_then(|d| d.get("reference"))
                .and_then(|v| v.as_str())
                .map(String::from);
            let metadata = body.data.as_ref().map(|d| d.to_string());
            Ok(GatewayVerdict::Approved { tx_id, metadata })
        } else {
            Ok(GatewayVerdict::Declined { status: tx_status.to_string() })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn initialize_payload_serializes_the_chapa_shape() {
        let payload = InitializePayload {
            amount: "115.00".to_string(),
            currency: "ETB",
            email: "student@campus.example",
            first_name: "Abel",
            last_name: "Tesfaye",
            phone_number: Some("+251911000000"),
            tx_ref: "CE-1700000000000-12",
            callback_url: Some("https://api.campuseats.et/api/v1/payments/webhook"),
            return_url: None,
            customization: Customization { title: "Campus Eats", description: "Payment for Order" },
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["amount"], "115.00");
        assert_eq!(json["currency"], "ETB");
        assert_eq!(json["tx_ref"], "CE-1700000000000-12");
        assert!(json.get("return_url").is_none());
        assert_eq!(json["customization"]["title"], "Campus Eats");
    }

    #[test]
    fn verify_response_parses_both_shapes() {
        let ok: ChapaResponse = serde_json::from_str(
            r#"{"status":"success","message":"Payment details","data":{"status":"success","reference":"REF-1"}}"#,
        )
        .unwrap();
        assert_eq!(ok.status, "success");
        assert_eq!(ok.data.unwrap()["reference"], "REF-1");

        let failed: ChapaResponse =
            serde_json::from_str(r#"{"status":"failed","message":"Invalid API Key"}"#).unwrap();
        assert_eq!(failed.status, "failed");
        assert!(failed.data.is_none());
    }
}
