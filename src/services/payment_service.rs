//! Payment settlement engine
//!
//! The only writer of payment status. Two entry points can race toward the
//! same settlement (the client's verify call and the gateway's webhook);
//! the store-level compare-and-set picks exactly one winner and the loser
//! observes the already-settled record and reports the same success.

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::infrastructure::gateway::{retry_gateway, GatewayPaymentStatus, WebhookKind};
use crate::infrastructure::store::{
    AppointmentStore, OpenInsert, PaymentStore, RefundClaim, RefundOutcome, ServiceCatalog,
    SettleOutcome, SettleTo,
};
use crate::models::{
    AppointmentStatus, Cancellation, InitiatePaymentResponse, Payment, PaymentMethod,
    PaymentStatus, RefundRecord, VerifyPaymentRequest,
};
use crate::services::{appointment_service, pricing};
use crate::state::AppState;

const GATEWAY_ATTEMPTS: u32 = 3;

pub async fn initiate_payment(
    state: &AppState,
    customer_id: Uuid,
    appointment_id: Uuid,
    method: PaymentMethod,
) -> AppResult<InitiatePaymentResponse> {
    let appointment = state
        .appointments
        .get(appointment_id)
        .await?
        .ok_or(AppError::NotFound("appointment"))?;

    if appointment.customer_id != customer_id {
        return Err(AppError::Forbidden(
            "appointment belongs to a different customer".into(),
        ));
    }
    if appointment.status != AppointmentStatus::Pending {
        return Err(AppError::Validation(format!(
            "payment can only be initiated for a pending appointment (state {:?})",
            appointment.status
        )));
    }

    // Idempotent initiation: an open attempt reuses its gateway order
    // instead of creating a duplicate.
    if let Some(open) = state.payments.open_for_appointment(appointment_id).await? {
        return Ok(InitiatePaymentResponse {
            payment_id: open.id,
            gateway_order_id: open.gateway_order_id,
            amount: open.amount,
            currency: state.config.currency.clone(),
        });
    }

    let services = state
        .catalog
        .services_for(appointment.salon_id, &appointment.service_ids)
        .await?;
    if services.len() != appointment.service_ids.len() {
        return Err(AppError::Internal(format!(
            "appointment {appointment_id} references services missing from the catalog"
        )));
    }
    let prices: Vec<_> = services.iter().map(|s| s.price).collect();
    let amount = pricing::compute_amount(appointment.location_type, &prices, &state.config);
    let amount_minor = pricing::to_minor_units(amount.total)?;

    let receipt = format!("appt_{appointment_id}");
    let order = retry_gateway("create_order", GATEWAY_ATTEMPTS, || {
        state
            .gateway
            .create_order(amount_minor, &state.config.currency, &receipt)
    })
    .await?;

    let payment = Payment {
        id: Uuid::new_v4(),
        appointment_id,
        customer_id,
        salon_id: appointment.salon_id,
        amount,
        method,
        status: PaymentStatus::Initiated,
        gateway_order_id: order.id.clone(),
        gateway_payment_id: None,
        gateway_signature: None,
        refund: None,
        failure_reason: None,
        created_at: Utc::now(),
    };
    // The insert re-checks for an open attempt in the same critical section;
    // a racing initiation that got there first wins and its order is reused.
    let payment = match state.payments.insert_open(payment).await? {
        OpenInsert::Inserted(p) => p,
        OpenInsert::Open(existing) => {
            tracing::warn!(
                appointment_id = %appointment_id,
                abandoned_order_id = %order.id,
                payment_id = %existing.id,
                "concurrent initiation already opened a payment, reusing it"
            );
            return Ok(InitiatePaymentResponse {
                payment_id: existing.id,
                gateway_order_id: existing.gateway_order_id,
                amount: existing.amount,
                currency: state.config.currency.clone(),
            });
        }
    };

    tracing::info!(
        payment_id = %payment.id,
        appointment_id = %appointment_id,
        gateway_order_id = %payment.gateway_order_id,
        "payment initiated"
    );
    Ok(InitiatePaymentResponse {
        payment_id: payment.id,
        gateway_order_id: payment.gateway_order_id,
        amount: payment.amount,
        currency: state.config.currency.clone(),
    })
}

/// Synchronous settlement path: the client submits the gateway's checkout
/// callback. Repeated calls with the same ids are a no-op success.
pub async fn verify_payment(
    state: &AppState,
    customer_id: Uuid,
    request: VerifyPaymentRequest,
) -> AppResult<Payment> {
    let payment = state
        .payments
        .find_by_order(&request.order_id)
        .await?
        .ok_or(AppError::NotFound("payment"))?;

    if payment.customer_id != customer_id {
        return Err(AppError::Forbidden(
            "payment belongs to a different customer".into(),
        ));
    }

    if !state
        .gateway
        .verify_payment_signature(&request.order_id, &request.payment_id, &request.signature)
    {
        tracing::warn!(payment_id = %payment.id, "payment signature mismatch");
        let _ = state
            .payments
            .settle(
                payment.id,
                &request.payment_id,
                None,
                SettleTo::Failure {
                    reason: "signature verification failed".into(),
                },
            )
            .await?;
        return Err(AppError::PaymentFailed(
            "payment signature verification failed".into(),
        ));
    }

    // Cross-check the gateway's own record. An outage here is tolerated
    // because the signature already proves the client holds gateway-issued
    // credentials for this order.
    match state.gateway.fetch_payment(&request.payment_id).await {
        Ok(record) => {
            let captured = matches!(
                record.status,
                GatewayPaymentStatus::Captured | GatewayPaymentStatus::Authorized
            );
            if record.order_id != request.order_id || !captured {
                let _ = state
                    .payments
                    .settle(
                        payment.id,
                        &request.payment_id,
                        None,
                        SettleTo::Failure {
                            reason: "gateway does not report this payment as captured".into(),
                        },
                    )
                    .await?;
                return Err(AppError::PaymentFailed(
                    "gateway does not report this payment as captured".into(),
                ));
            }
        }
        Err(e) => {
            tracing::warn!(payment_id = %payment.id, error = %e, "gateway cross-check unavailable");
        }
    }

    settle_success(
        state,
        &payment,
        &request.payment_id,
        Some(&request.signature),
    )
    .await
}

/// Asynchronous settlement path: the gateway posts the event. Duplicates,
/// race losers and unknown-but-valid events all acknowledge with success,
/// because gateways retry anything non-2xx.
pub async fn handle_webhook(state: &AppState, raw_body: &[u8], signature: &str) -> AppResult<()> {
    if !state.gateway.verify_webhook_signature(raw_body, signature) {
        return Err(AppError::Unauthorized("invalid webhook signature".into()));
    }

    let event = state
        .gateway
        .parse_webhook(raw_body)
        .map_err(|e| AppError::Validation(format!("unparseable webhook event: {e}")))?;

    let (gateway_payment_id, order_id) = match (&event.gateway_payment_id, &event.gateway_order_id)
    {
        (Some(p), Some(o)) => (p.clone(), o.clone()),
        _ => {
            tracing::debug!(kind = ?event.kind, "webhook event without payment context ignored");
            return Ok(());
        }
    };

    let payment = match state.payments.find_by_order(&order_id).await? {
        Some(p) => p,
        None => {
            // Not ours (or long gone); acknowledge so the gateway stops
            // retrying.
            tracing::warn!(%order_id, "webhook for unknown gateway order ignored");
            return Ok(());
        }
    };

    match event.kind {
        WebhookKind::PaymentCaptured => {
            match settle_success(state, &payment, &gateway_payment_id, None).await {
                Ok(_) => Ok(()),
                // The refund-and-cancel fallback already ran; the event is
                // consumed either way.
                Err(AppError::Conflict(_)) | Err(AppError::PaymentFailed(_)) => Ok(()),
                Err(e) => Err(e),
            }
        }
        WebhookKind::PaymentFailed => {
            let reason = event
                .failure_reason
                .unwrap_or_else(|| "gateway reported failure".into());
            let outcome = state
                .payments
                .settle(
                    payment.id,
                    &gateway_payment_id,
                    None,
                    SettleTo::Failure { reason },
                )
                .await?;
            if let SettleOutcome::Won(p) = outcome {
                tracing::info!(payment_id = %p.id, "payment marked failed from webhook");
            }
            Ok(())
        }
        WebhookKind::Other(kind) => {
            tracing::debug!(%kind, "webhook event type ignored");
            Ok(())
        }
    }
}

/// Apply the winning success transition at most once, then promote the
/// appointment. When the confirmation re-check loses the slot, the money
/// goes back: refund, cancel, and surface a conflict.
async fn settle_success(
    state: &AppState,
    payment: &Payment,
    gateway_payment_id: &str,
    gateway_signature: Option<&str>,
) -> AppResult<Payment> {
    let outcome = state
        .payments
        .settle(
            payment.id,
            gateway_payment_id,
            gateway_signature,
            SettleTo::Success,
        )
        .await?;

    match outcome {
        SettleOutcome::Won(settled) => {
            tracing::info!(
                payment_id = %settled.id,
                gateway_payment_id = %gateway_payment_id,
                "payment settled"
            );
            match appointment_service::confirm_paid(state, settled.appointment_id).await {
                Ok(_) => Ok(settled),
                Err(AppError::Conflict(msg)) => {
                    tracing::warn!(
                        payment_id = %settled.id,
                        appointment_id = %settled.appointment_id,
                        "confirmation re-check failed, refunding"
                    );
                    refund_after_lost_slot(state, &settled).await?;
                    Err(AppError::Conflict(format!(
                        "{msg}; the payment has been refunded"
                    )))
                }
                Err(e) => Err(e),
            }
        }
        SettleOutcome::AlreadySettled(existing) => match existing.status {
            PaymentStatus::Successful | PaymentStatus::RefundPending | PaymentStatus::Refunded => {
                tracing::info!(payment_id = %existing.id, "duplicate settlement attempt, no-op");
                Ok(existing)
            }
            _ => Err(AppError::PaymentFailed(
                "payment already failed; initiate a new payment to retry".into(),
            )),
        },
        SettleOutcome::OtherPaymentSucceeded(other) => {
            tracing::warn!(
                payment_id = %payment.id,
                settled_payment_id = %other.id,
                gateway_payment_id = %gateway_payment_id,
                "capture for an already-paid appointment, refunding at the gateway"
            );
            let refund = retry_gateway("refund", GATEWAY_ATTEMPTS, || {
                state.gateway.refund(gateway_payment_id, None)
            })
            .await?;
            let _ = state
                .payments
                .settle(
                    payment.id,
                    gateway_payment_id,
                    gateway_signature,
                    SettleTo::Failure {
                        reason: format!("appointment already paid; capture refunded ({})", refund.id),
                    },
                )
                .await?;
            Err(AppError::PaymentFailed(
                "appointment already paid by another payment; this capture has been refunded"
                    .into(),
            ))
        }
        SettleOutcome::DuplicatePaymentId => Err(AppError::Internal(format!(
            "gateway payment id {gateway_payment_id} already recorded on another payment"
        ))),
        SettleOutcome::NotFound => Err(AppError::NotFound("payment")),
    }
}

async fn refund_after_lost_slot(state: &AppState, payment: &Payment) -> AppResult<()> {
    refund_payment(
        state,
        payment.id,
        payment.customer_id,
        "slot conflict at confirmation".into(),
        None,
    )
    .await?;

    let cancellation = Cancellation {
        reason: "slot conflict at confirmation".into(),
        cancelled_by: payment.customer_id,
        cancelled_at: Utc::now(),
    };
    state
        .appointments
        .cancel(
            payment.appointment_id,
            &[AppointmentStatus::Pending],
            cancellation,
        )
        .await?;
    Ok(())
}

/// Refund a captured payment, fully or partially. Idempotent: refunding an
/// already-refunded payment returns the recorded refund without touching
/// the gateway again. The store-level claim makes sure racing refund
/// requests reach the gateway exactly once.
pub async fn refund_payment(
    state: &AppState,
    payment_id: Uuid,
    actor_id: Uuid,
    reason: String,
    amount: Option<Decimal>,
) -> AppResult<Payment> {
    let payment = match state.payments.claim_refund(payment_id).await? {
        RefundClaim::Claimed(p) => p,
        RefundClaim::AlreadyRefunded(p) => return Ok(p),
        RefundClaim::InFlight => {
            return Err(AppError::Conflict(
                "a refund for this payment is already in progress".into(),
            ))
        }
        RefundClaim::InvalidState(other) => {
            return Err(AppError::Validation(format!(
                "cannot refund a payment in state {other:?}"
            )))
        }
        RefundClaim::NotFound => return Err(AppError::NotFound("payment")),
    };

    let result = issue_refund(state, &payment, actor_id, reason, amount).await;
    if result.is_err() {
        // The gateway was not (or may not have been) debited; give the
        // claim back so a later request can retry.
        state.payments.release_refund(payment_id).await?;
    }
    result
}

async fn issue_refund(
    state: &AppState,
    payment: &Payment,
    actor_id: Uuid,
    reason: String,
    amount: Option<Decimal>,
) -> AppResult<Payment> {
    let cap = payment.amount.total;
    let refund_amount = amount.unwrap_or(cap);
    if refund_amount <= Decimal::ZERO || refund_amount > cap {
        return Err(AppError::Validation(format!(
            "refund amount must be between 0 and {cap}"
        )));
    }

    let gateway_payment_id = payment.gateway_payment_id.clone().ok_or_else(|| {
        AppError::Internal(format!(
            "successful payment {} has no gateway payment id",
            payment.id
        ))
    })?;
    let amount_minor = pricing::to_minor_units(refund_amount)?;

    let gateway_refund = retry_gateway("refund", GATEWAY_ATTEMPTS, || {
        state.gateway.refund(&gateway_payment_id, Some(amount_minor))
    })
    .await?;

    let record = RefundRecord {
        amount: refund_amount,
        reason,
        refunded_at: Utc::now(),
        refunded_by: actor_id,
        gateway_refund_id: gateway_refund.id,
    };

    match state.payments.record_refund(payment.id, record).await? {
        RefundOutcome::Applied(p) => {
            tracing::info!(payment_id = %payment.id, amount = %refund_amount, "payment refunded");
            Ok(p)
        }
        RefundOutcome::AlreadyRefunded(p) => Ok(p),
        RefundOutcome::InvalidState(status) => Err(AppError::Internal(format!(
            "payment {} moved to {status:?} during refund",
            payment.id
        ))),
        RefundOutcome::NotFound => Err(AppError::NotFound("payment")),
    }
}
