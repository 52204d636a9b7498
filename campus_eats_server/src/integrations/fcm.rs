//! Best-effort push notifications over FCM.
//!
//! Delivery is wired to the engine's order events through [`notification_hooks`]. A failed or
//! misconfigured push is logged and dropped — it can never fail an order or a payment.
use campus_eats_engine::{
    db_types::OrderStatusType,
    events::EventHooks,
};
use log::*;
use serde_json::json;

use crate::config::FcmConfig;

#[derive(Clone)]
pub struct FcmNotifier {
    config: FcmConfig,
    client: reqwest::Client,
}

#[derive(Debug, Clone)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
}

impl FcmNotifier {
    pub fn new(config: &FcmConfig) -> Self {
        if config.server_key.reveal().is_empty() {
            warn!("📣️ CE_FCM_SERVER_KEY is not set. Push notifications will be skipped.");
        }
        Self { config: config.clone(), client: reqwest::Client::new() }
    }

    /// Per-status message templates shown to the customer.
    pub fn order_status_notification(status: OrderStatusType, order_id: i64) -> PushNotification {
        let (title, body) = match status {
            OrderStatusType::Pending => {
                ("Order Confirmed".to_string(), format!("Your order #{order_id} has been placed."))
            },
            OrderStatusType::Preparing => {
                ("Order Confirmed".to_string(), format!("Your order #{order_id} is being prepared."))
            },
            OrderStatusType::Ready => (
                "Order Ready".to_string(),
                format!("Your order #{order_id} is ready for pickup! Show your QR code."),
            ),
            OrderStatusType::Delivered => {
                ("Order Delivered".to_string(), format!("Your order #{order_id} has been delivered. Enjoy your meal!"))
            },
            OrderStatusType::Cancelled => {
                ("Order Cancelled".to_string(), format!("Your order #{order_id} has been cancelled."))
            },
        };
        PushNotification { title, body }
    }

    /// Sends one notification. `to` is an FCM target: a device token or a topic path.
    pub async fn send(&self, to: &str, notification: PushNotification, data: serde_json::Value) {
        if self.config.server_key.reveal().is_empty() {
            debug!("📣️ FCM not configured, skipping notification to {to}");
            return;
        }
        let payload = json!({
            "to": to,
            "priority": "high",
            "notification": {
                "title": notification.title,
                "body": notification.body,
            },
            "data": data,
        });
        let result = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("key={}", self.config.server_key.reveal()))
            .json(&payload)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                debug!("📣️ Notification '{}' delivered to {to}", notification.title);
            },
            Ok(response) => {
                warn!("📣️ FCM rejected notification to {to}: HTTP {}", response.status());
            },
            Err(e) => {
                warn!("📣️ Could not deliver notification to {to}: {e}");
            },
        }
    }
}

/// Each user subscribes their devices to their own topic at login.
fn topic_for_user(user_id: i64) -> String {
    format!("/topics/user-{user_id}")
}

/// Builds the engine event hooks that forward order events to FCM.
pub fn notification_hooks(notifier: FcmNotifier) -> EventHooks {
    let mut hooks = EventHooks::default();
    let on_created = notifier.clone();
    hooks.on_order_created(move |event| {
        let notifier = on_created.clone();
        Box::pin(async move {
            let order = event.order;
            let note = FcmNotifier::order_status_notification(order.status, order.id);
            let data = json!({ "order_id": order.id, "type": "order_status", "status": order.status });
            notifier.send(&topic_for_user(order.user_id), note, data).await;
        })
    });
    let on_status = notifier;
    hooks.on_order_status_changed(move |event| {
        let notifier = on_status.clone();
        Box::pin(async move {
            let order = event.order;
            let note = FcmNotifier::order_status_notification(order.status, order.id);
            let data = json!({ "order_id": order.id, "type": "order_status", "status": order.status });
            notifier.send(&topic_for_user(order.user_id), note, data).await;
        })
    });
    hooks
}
