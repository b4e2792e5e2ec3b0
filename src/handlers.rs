//! HTTP request handlers
//!
//! This module contains all the HTTP endpoint handlers. Each handler is responsible
//! for extracting data from HTTP requests, calling the appropriate services, and
//! returning HTTP responses. Authentication is upstream; identity reaches this
//! layer as `x-actor-id` (plus `x-actor-salon-id` for salon-side staff).

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::infrastructure::store::{AppointmentStore, PaymentStore};
use crate::models::*;
use crate::services::{appointment_service, availability_service, payment_service};
use crate::state::AppState;

pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-razorpay-signature";

fn header_uuid(headers: &HeaderMap, name: &str) -> AppResult<Option<Uuid>> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| AppError::Unauthorized(format!("malformed {name} header")))?;
            let id = raw
                .parse()
                .map_err(|_| AppError::Unauthorized(format!("malformed {name} header")))?;
            Ok(Some(id))
        }
    }
}

/// The acting party, from trusted identity headers.
fn actor(headers: &HeaderMap) -> AppResult<Actor> {
    let actor_id = header_uuid(headers, "x-actor-id")?
        .ok_or_else(|| AppError::Unauthorized("missing x-actor-id header".into()))?;
    Ok(match header_uuid(headers, "x-actor-salon-id")? {
        Some(salon_id) => Actor::Salon { actor_id, salon_id },
        None => Actor::Customer(actor_id),
    })
}

fn customer(headers: &HeaderMap) -> AppResult<Uuid> {
    match actor(headers)? {
        Actor::Customer(id) => Ok(id),
        Actor::Salon { .. } => Err(AppError::Forbidden(
            "this operation is customer-only".into(),
        )),
    }
}

fn can_view(actor: &Actor, customer_id: Uuid, salon_id: Uuid) -> bool {
    match actor {
        Actor::Customer(id) => *id == customer_id,
        Actor::Salon { salon_id: s, .. } => *s == salon_id,
    }
}

/// Root endpoint - simple liveness check
pub async fn root() -> &'static str {
    "trimsalon"
}

pub async fn check_availability(
    State(state): State<AppState>,
    Json(payload): Json<CheckAvailabilityRequest>,
) -> AppResult<Json<AvailabilityResponse>> {
    let available = availability_service::is_available(
        &state,
        payload.salon_id,
        payload.barber_id,
        payload.scheduled_at,
        payload.duration,
    )
    .await?;
    Ok(Json(AvailabilityResponse { available }))
}

pub async fn create_appointment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateAppointmentRequest>,
) -> AppResult<(StatusCode, Json<Appointment>)> {
    let customer_id = customer(&headers)?;
    let appointment = appointment_service::create_appointment(&state, customer_id, payload).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Appointment>> {
    let actor = actor(&headers)?;
    let appointment = state
        .appointments
        .get(id)
        .await?
        .ok_or(AppError::NotFound("appointment"))?;
    if !can_view(&actor, appointment.customer_id, appointment.salon_id) {
        return Err(AppError::Forbidden(
            "actor has no authority over this appointment".into(),
        ));
    }
    Ok(Json(appointment))
}

pub async fn update_appointment_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<Json<Appointment>> {
    let actor = actor(&headers)?;
    let appointment =
        appointment_service::update_status(&state, id, payload.status, &actor).await?;
    Ok(Json(appointment))
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelAppointmentRequest>,
) -> AppResult<Json<Appointment>> {
    let actor = actor(&headers)?;
    let appointment =
        appointment_service::cancel_appointment(&state, id, &actor, payload.reason).await?;
    Ok(Json(appointment))
}

pub async fn initiate_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<InitiatePaymentRequest>,
) -> AppResult<(StatusCode, Json<InitiatePaymentResponse>)> {
    let customer_id = customer(&headers)?;
    let response = payment_service::initiate_payment(
        &state,
        customer_id,
        payload.appointment_id,
        payload.method,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn verify_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<VerifyPaymentRequest>,
) -> AppResult<Json<Payment>> {
    let customer_id = customer(&headers)?;
    let payment = payment_service::verify_payment(&state, customer_id, payload).await?;
    Ok(Json(payment))
}

/// Gateway-facing webhook. No caller identity; the request is authenticated
/// solely by its signature over the raw body bytes.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing webhook signature header".into()))?;
    payment_service::handle_webhook(&state, &body, signature).await?;
    Ok(Json(WebhookAck { success: true }))
}

pub async fn get_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Payment>> {
    let actor = actor(&headers)?;
    let payment = state
        .payments
        .get(id)
        .await?
        .ok_or(AppError::NotFound("payment"))?;
    if !can_view(&actor, payment.customer_id, payment.salon_id) {
        return Err(AppError::Forbidden(
            "actor has no authority over this payment".into(),
        ));
    }
    Ok(Json(payment))
}

pub async fn refund_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<RefundPaymentRequest>,
) -> AppResult<Json<Payment>> {
    let actor = actor(&headers)?;
    let payment = state
        .payments
        .get(id)
        .await?
        .ok_or(AppError::NotFound("payment"))?;
    if !can_view(&actor, payment.customer_id, payment.salon_id) {
        return Err(AppError::Forbidden(
            "actor has no authority over this payment".into(),
        ));
    }
    let refunded =
        payment_service::refund_payment(&state, id, actor.id(), payload.reason, payload.amount)
            .await?;
    Ok(Json(refunded))
}
