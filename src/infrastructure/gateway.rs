//! Payment gateway seam
//!
//! Everything gateway-facing goes through the `PaymentGateway` trait so the
//! settlement engine can be exercised against a fake. Amounts cross this
//! boundary in minor currency units, which is how gateways count money.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Unreachable or 5xx; retryable with backoff.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
    /// The gateway understood the request and said no; not retryable.
    #[error("gateway rejected request: {0}")]
    Rejected(String),
    /// Response body did not match the expected shape.
    #[error("gateway response malformed: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Unavailable(err.to_string())
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable(msg) => AppError::ExternalService(msg),
            GatewayError::Rejected(msg) => AppError::PaymentFailed(msg),
            GatewayError::Malformed(msg) => AppError::Internal(msg),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway-side order created before the customer pays.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount_minor: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayPaymentStatus {
    Created,
    Authorized,
    Captured,
    Failed,
    Refunded,
}

/// The gateway's own record of a payment, used to cross-check
/// client-submitted verifications.
#[derive(Debug, Clone)]
pub struct GatewayPayment {
    pub id: String,
    pub order_id: String,
    pub status: GatewayPaymentStatus,
    pub method: Option<String>,
    pub amount_minor: i64,
}

#[derive(Debug, Clone)]
pub struct GatewayRefund {
    pub id: String,
    pub amount_minor: i64,
    pub status: String,
}

/// Normalized webhook event, decoupled from any vendor's JSON shape.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub kind: WebhookKind,
    pub gateway_payment_id: Option<String>,
    pub gateway_order_id: Option<String>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookKind {
    PaymentCaptured,
    PaymentFailed,
    /// Anything else is acknowledged and ignored.
    Other(String),
}

/// Contract every payment-gateway vendor adapter must satisfy.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Create a gateway order. The order does not exist until this returns Ok.
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> GatewayResult<GatewayOrder>;

    async fn fetch_payment(&self, gateway_payment_id: &str) -> GatewayResult<GatewayPayment>;

    /// Refund a captured payment; `None` means the full remaining amount.
    async fn refund(
        &self,
        gateway_payment_id: &str,
        amount_minor: Option<i64>,
    ) -> GatewayResult<GatewayRefund>;

    /// HMAC check of a client-submitted `orderId|paymentId` signature.
    fn verify_payment_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;

    /// HMAC check over the exact raw webhook bytes. Re-serialized JSON would
    /// verify against different bytes than the gateway signed.
    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool;

    /// Parse a raw webhook body into a normalized event.
    fn parse_webhook(&self, payload: &[u8]) -> GatewayResult<WebhookEvent>;
}

pub fn hmac_sha256_hex(secret: &str, data: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take any size key");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Byte-wise comparison that does not short-circuit, to avoid leaking how
/// much of a signature matched.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Bounded retry with doubling backoff, for caller-initiated gateway calls
/// (order creation, refunds). Only `Unavailable` is retried; a rejection is
/// final.
pub async fn retry_gateway<T, F, Fut>(operation: &str, attempts: u32, mut call: F) -> GatewayResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GatewayResult<T>>,
{
    let mut delay = Duration::from_millis(200);
    let mut attempt = 1;
    loop {
        match call().await {
            Err(GatewayError::Unavailable(msg)) if attempt < attempts => {
                tracing::warn!(operation, attempt, error = %msg, "gateway call failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_is_deterministic() {
        let a = hmac_sha256_hex("secret", b"order_1|pay_1");
        let b = hmac_sha256_hex("secret", b"order_1|pay_1");
        assert_eq!(a, b);
        assert_ne!(a, hmac_sha256_hex("other", b"order_1|pay_1"));
    }

    #[test]
    fn constant_time_compare_matches_equality() {
        assert!(constant_time_compare("abc123", "abc123"));
        assert!(!constant_time_compare("abc123", "abc124"));
        assert!(!constant_time_compare("abc123", "abc12"));
        assert!(constant_time_compare("", ""));
    }

    #[tokio::test]
    async fn retry_stops_on_rejection() {
        let mut calls = 0u32;
        let result: GatewayResult<()> = retry_gateway("test", 5, || {
            calls += 1;
            async { Err(GatewayError::Rejected("bad amount".into())) }
        })
        .await;
        assert!(matches!(result, Err(GatewayError::Rejected(_))));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn retry_is_bounded() {
        let mut calls = 0u32;
        let result: GatewayResult<()> = retry_gateway("test", 3, || {
            calls += 1;
            async { Err(GatewayError::Unavailable("timeout".into())) }
        })
        .await;
        assert!(matches!(result, Err(GatewayError::Unavailable(_))));
        assert_eq!(calls, 3);
    }
}
