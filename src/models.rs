//! Domain models and data structures
//!
//! This module contains all the core data types used throughout the application.
//! These are "pure" data structures without business logic.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timeslot::TimeRange;

/// Appointment lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

/// Where the service is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    SalonVisit,
    HomeVisit,
}

/// Payment instrument selected by the customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Upi,
    Card,
    Wallet,
}

/// Payment lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Initiated,
    Processing,
    Successful,
    /// A refund has been claimed and is in flight at the gateway.
    RefundPending,
    Failed,
    Refunded,
}

/// Metadata recorded when an appointment is cancelled
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancellation {
    pub reason: String,
    pub cancelled_by: Uuid,
    pub cancelled_at: DateTime<Utc>,
}

/// A booked appointment
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub salon_id: Uuid,
    pub barber_id: Option<Uuid>,
    pub service_ids: Vec<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub location_type: LocationType,
    pub status: AppointmentStatus,
    pub cancellation: Option<Cancellation>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.scheduled_at, self.duration_minutes)
    }

    /// Whether this appointment still occupies its slot.
    ///
    /// `pending` appointments stop blocking once their payment hold window
    /// has elapsed; abandoned bookings must not lock a slot forever.
    pub fn blocks_slot(&self, now: DateTime<Utc>, hold_window: Duration) -> bool {
        match self.status {
            AppointmentStatus::Confirmed | AppointmentStatus::InProgress => true,
            AppointmentStatus::Pending => self.created_at + hold_window > now,
            _ => false,
        }
    }
}

/// Price/fee/tax decomposition of a payment, in major currency units
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountBreakdown {
    pub services: Decimal,
    pub home_service_fee: Decimal,
    pub platform_fee: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Refund details recorded against a payment
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRecord {
    pub amount: Decimal,
    pub reason: String,
    pub refunded_at: DateTime<Utc>,
    pub refunded_by: Uuid,
    pub gateway_refund_id: String,
}

/// A payment attempt against an appointment
///
/// `gateway_signature` is write-only; it never leaves the service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub customer_id: Uuid,
    pub salon_id: Uuid,
    pub amount: AmountBreakdown,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    #[serde(skip_serializing)]
    pub gateway_signature: Option<String>,
    pub refund: Option<RefundRecord>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Catalog entry for a bookable salon service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalonService {
    pub id: Uuid,
    pub salon_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub duration_minutes: i64,
}

/// The authenticated party behind a request
///
/// Token issuance and verification are handled upstream; by the time a
/// request reaches this core, identity arrives as trusted headers.
#[derive(Debug, Clone, Copy)]
pub enum Actor {
    Customer(Uuid),
    Salon { actor_id: Uuid, salon_id: Uuid },
}

impl Actor {
    pub fn id(&self) -> Uuid {
        match self {
            Actor::Customer(id) => *id,
            Actor::Salon { actor_id, .. } => *actor_id,
        }
    }
}

// ---- request/response DTOs ----

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAvailabilityRequest {
    pub salon_id: Uuid,
    pub barber_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub duration: i64,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub salon_id: Uuid,
    pub service_ids: Vec<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub location_type: LocationType,
    pub barber_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub appointment_id: Uuid,
    pub method: PaymentMethod,
}

/// Everything the client needs to hand to the gateway checkout
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentResponse {
    pub payment_id: Uuid,
    pub gateway_order_id: String,
    pub amount: AmountBreakdown,
    pub currency: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundPaymentRequest {
    pub reason: String,
    pub amount: Option<Decimal>,
}

#[derive(Serialize)]
pub struct WebhookAck {
    pub success: bool,
}
