//! Razorpay implementation of the gateway contract
//!
//! REST calls go through the shared HTTP client with basic auth; signature
//! checks are HMAC-SHA256 per Razorpay's scheme: `orderId|paymentId` keyed
//! by the API secret for checkout callbacks, and the raw request body keyed
//! by a separate webhook secret for webhooks.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::GatewayConfig;

use super::gateway::{
    constant_time_compare, hmac_sha256_hex, GatewayError, GatewayOrder, GatewayPayment,
    GatewayPaymentStatus, GatewayRefund, GatewayResult, PaymentGateway, WebhookEvent, WebhookKind,
};
use super::http_client;

pub struct RazorpayGateway {
    key_id: String,
    key_secret: String,
    webhook_secret: String,
    base_url: String,
}

impl RazorpayGateway {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> GatewayResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let response = http_client::client()
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await?;
        Self::check_status(response).await
    }

    async fn get(&self, path: &str) -> GatewayResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let response = http_client::client()
            .get(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;
        Self::check_status(response).await
    }

    async fn check_status(response: reqwest::Response) -> GatewayResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(GatewayError::Unavailable(format!("{status}: {body}")))
        } else {
            Err(GatewayError::Rejected(format!("{status}: {body}")))
        }
    }
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

#[derive(Deserialize)]
struct PaymentResponse {
    id: String,
    order_id: String,
    status: String,
    method: Option<String>,
    amount: i64,
}

#[derive(Deserialize)]
struct RefundResponse {
    id: String,
    amount: i64,
    status: String,
}

#[derive(Deserialize)]
struct RawWebhookEvent {
    event: String,
    payload: Option<RawWebhookPayload>,
}

#[derive(Deserialize)]
struct RawWebhookPayload {
    payment: Option<RawWebhookPayment>,
}

#[derive(Deserialize)]
struct RawWebhookPayment {
    entity: RawPaymentEntity,
}

#[derive(Deserialize)]
struct RawPaymentEntity {
    id: String,
    order_id: Option<String>,
    error_description: Option<String>,
}

fn payment_status(raw: &str) -> GatewayPaymentStatus {
    match raw {
        "created" => GatewayPaymentStatus::Created,
        "authorized" => GatewayPaymentStatus::Authorized,
        "captured" => GatewayPaymentStatus::Captured,
        "refunded" => GatewayPaymentStatus::Refunded,
        _ => GatewayPaymentStatus::Failed,
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn name(&self) -> &'static str {
        "razorpay"
    }

    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> GatewayResult<GatewayOrder> {
        let body = json!({
            "amount": amount_minor,
            "currency": currency,
            "receipt": receipt,
        });
        let response = self.post("/orders", body).await?;
        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        Ok(GatewayOrder {
            id: order.id,
            amount_minor: order.amount,
            currency: order.currency,
        })
    }

    async fn fetch_payment(&self, gateway_payment_id: &str) -> GatewayResult<GatewayPayment> {
        let response = self
            .get(&format!("/payments/{gateway_payment_id}"))
            .await?;
        let payment: PaymentResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        Ok(GatewayPayment {
            id: payment.id,
            order_id: payment.order_id,
            status: payment_status(&payment.status),
            method: payment.method,
            amount_minor: payment.amount,
        })
    }

    async fn refund(
        &self,
        gateway_payment_id: &str,
        amount_minor: Option<i64>,
    ) -> GatewayResult<GatewayRefund> {
        let body = match amount_minor {
            Some(amount) => json!({ "amount": amount }),
            None => json!({}),
        };
        let response = self
            .post(&format!("/payments/{gateway_payment_id}/refund"), body)
            .await?;
        let refund: RefundResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        Ok(GatewayRefund {
            id: refund.id,
            amount_minor: refund.amount,
            status: refund.status,
        })
    }

    fn verify_payment_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        let payload = format!("{order_id}|{payment_id}");
        let expected = hmac_sha256_hex(&self.key_secret, payload.as_bytes());
        constant_time_compare(&expected, signature)
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        let expected = hmac_sha256_hex(&self.webhook_secret, payload);
        constant_time_compare(&expected, signature)
    }

    fn parse_webhook(&self, payload: &[u8]) -> GatewayResult<WebhookEvent> {
        let raw: RawWebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        let entity = raw
            .payload
            .and_then(|p| p.payment)
            .map(|p| p.entity);
        let kind = match raw.event.as_str() {
            "payment.captured" => WebhookKind::PaymentCaptured,
            "payment.failed" => WebhookKind::PaymentFailed,
            other => WebhookKind::Other(other.to_string()),
        };
        Ok(WebhookEvent {
            kind,
            gateway_payment_id: entity.as_ref().map(|e| e.id.clone()),
            gateway_order_id: entity.as_ref().and_then(|e| e.order_id.clone()),
            failure_reason: entity.and_then(|e| e.error_description),
        })
    }
}
