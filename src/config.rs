//! Environment-derived configuration
//!
//! Plain values only: fee percentages, the slot hold window, and gateway
//! credentials. Behavior never lives in the environment.

use chrono::Duration;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub currency: String,
    /// Platform commission, percent of the services subtotal.
    pub platform_commission_pct: Decimal,
    /// Surcharge for home visits, percent of the services subtotal.
    pub home_service_fee_pct: Decimal,
    /// Tax over (services + home fee + platform fee). Defaults to zero.
    pub tax_pct: Decimal,
    /// How long an unpaid `pending` appointment keeps blocking its slot.
    pub hold_window: Duration,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
    pub base_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            currency: env_or("CURRENCY", "INR"),
            platform_commission_pct: env_pct("PLATFORM_COMMISSION_PCT", 15),
            home_service_fee_pct: env_pct("HOME_SERVICE_FEE_PCT", 10),
            tax_pct: env_pct("TAX_PCT", 0),
            hold_window: Duration::minutes(env_i64("HOLD_WINDOW_MINUTES", 15)),
            gateway: GatewayConfig {
                key_id: env_or("RAZORPAY_KEY_ID", "rzp_test_key"),
                key_secret: env_or("RAZORPAY_KEY_SECRET", "rzp_test_secret"),
                webhook_secret: env_or("RAZORPAY_WEBHOOK_SECRET", "whsec_test"),
                base_url: env_or("RAZORPAY_BASE_URL", "https://api.razorpay.com/v1"),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_pct(key: &str, default: i64) -> Decimal {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| Decimal::from(default))
}
