//! Payment amount calculator
//!
//! Pure and deterministic: the same appointment and configuration always
//! produce the same breakdown, so amounts can be recomputed for audits and
//! refund caps.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{AmountBreakdown, LocationType};

/// Round to two decimal places, half away from zero.
fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn pct_of(base: Decimal, pct: Decimal) -> Decimal {
    base * pct / Decimal::from(100)
}

/// Derive the full amount breakdown for a set of selected services.
///
/// Each component is rounded independently and the total is the sum of the
/// rounded components, so `total == services + homeServiceFee + platformFee
/// + tax` holds exactly.
pub fn compute_amount(
    location_type: LocationType,
    service_prices: &[Decimal],
    config: &Config,
) -> AmountBreakdown {
    let services: Decimal = service_prices.iter().copied().sum();
    let services = round_currency(services);

    let home_service_fee = match location_type {
        LocationType::HomeVisit => round_currency(pct_of(services, config.home_service_fee_pct)),
        LocationType::SalonVisit => Decimal::ZERO,
    };
    let platform_fee = round_currency(pct_of(services, config.platform_commission_pct));
    let tax = round_currency(pct_of(
        services + home_service_fee + platform_fee,
        config.tax_pct,
    ));

    AmountBreakdown {
        services,
        home_service_fee,
        platform_fee,
        tax,
        total: services + home_service_fee + platform_fee + tax,
    }
}

/// Convert a major-unit amount to the gateway's minor units (paise).
pub fn to_minor_units(amount: Decimal) -> AppResult<i64> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| AppError::Internal(format!("amount {amount} out of range")))
}
