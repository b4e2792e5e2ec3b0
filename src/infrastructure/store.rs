//! Persistence seams
//!
//! The core never talks to a concrete engine; it goes through these traits.
//! The conditional-update methods (`confirm_pending`, `settle`,
//! `record_refund`) are the atomicity boundary: an implementation must apply
//! each of them as a single compare-and-set, so racing settlement attempts
//! resolve to one winner and a detectable no-op for the loser.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    Appointment, AppointmentStatus, Cancellation, Payment, PaymentStatus, RefundRecord,
    SalonService,
};

/// Result of the atomic `pending -> confirmed` transition.
#[derive(Debug)]
pub enum ConfirmOutcome {
    Confirmed(Appointment),
    /// A racing booking took the slot; the caller must refund, not confirm.
    SlotTaken,
    AlreadyConfirmed(Appointment),
    InvalidState(AppointmentStatus),
    NotFound,
}

/// Result of a plain status compare-and-set.
#[derive(Debug)]
pub enum TransitionOutcome {
    Applied(Appointment),
    InvalidState(AppointmentStatus),
    NotFound,
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, appointment: Appointment) -> AppResult<()>;

    async fn get(&self, id: Uuid) -> AppResult<Option<Appointment>>;

    /// Appointments that currently block a slot for the given barber, or for
    /// the whole salon when no barber is specified. Hold-window expiry is
    /// evaluated here, lazily, against `now`.
    async fn blocking_in_scope(
        &self,
        salon_id: Uuid,
        barber_id: Option<Uuid>,
        now: DateTime<Utc>,
        hold_window: Duration,
    ) -> AppResult<Vec<Appointment>>;

    /// Atomically move `pending -> confirmed`, re-checking inside the same
    /// critical section that no other blocking appointment overlaps the slot.
    async fn confirm_pending(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        hold_window: Duration,
    ) -> AppResult<ConfirmOutcome>;

    /// Compare-and-set the status, succeeding only from one of `from`.
    async fn transition(
        &self,
        id: Uuid,
        from: &[AppointmentStatus],
        to: AppointmentStatus,
    ) -> AppResult<TransitionOutcome>;

    /// Cancel with metadata, succeeding only from one of `from`.
    async fn cancel(
        &self,
        id: Uuid,
        from: &[AppointmentStatus],
        cancellation: Cancellation,
    ) -> AppResult<TransitionOutcome>;
}

/// Terminal state a settlement attempt wants to reach.
#[derive(Debug, Clone)]
pub enum SettleTo {
    Success,
    Failure { reason: String },
}

/// Result of inserting a new payment attempt.
#[derive(Debug)]
pub enum OpenInsert {
    Inserted(Payment),
    /// An open attempt already exists for the appointment; the stored record
    /// is returned so the caller reuses its gateway order.
    Open(Payment),
}

/// Result of claiming the exclusive right to refund a payment.
#[derive(Debug)]
pub enum RefundClaim {
    /// The payment moved to `refund_pending`; the caller owns the refund and
    /// must finish with `record_refund` or back out with `release_refund`.
    Claimed(Payment),
    AlreadyRefunded(Payment),
    /// Another refund holds the claim.
    InFlight,
    InvalidState(PaymentStatus),
    NotFound,
}

/// Result of a settlement compare-and-set.
#[derive(Debug)]
pub enum SettleOutcome {
    /// This attempt performed the transition.
    Won(Payment),
    /// Another attempt got there first; the stored record is returned
    /// unchanged so the caller can report the same outcome.
    AlreadySettled(Payment),
    /// A different payment for the same appointment is already successful.
    /// The returned record is that other payment; the attempt's capture must
    /// be refunded, never booked as a second success.
    OtherPaymentSucceeded(Payment),
    /// The gateway payment id is already recorded on a different live
    /// payment. Invariant violation, never expected in normal operation.
    DuplicatePaymentId,
    NotFound,
}

/// Result of recording a refund.
#[derive(Debug)]
pub enum RefundOutcome {
    Applied(Payment),
    AlreadyRefunded(Payment),
    InvalidState(PaymentStatus),
    NotFound,
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert a new attempt unless an `initiated`/`processing` payment for
    /// the same appointment already exists; the check and the insert happen
    /// in one critical section so racing initiations converge on one record.
    async fn insert_open(&self, payment: Payment) -> AppResult<OpenInsert>;

    async fn get(&self, id: Uuid) -> AppResult<Option<Payment>>;

    async fn find_by_order(&self, gateway_order_id: &str) -> AppResult<Option<Payment>>;

    /// An `initiated`/`processing` payment for the appointment, if any.
    /// Used to keep initiation idempotent.
    async fn open_for_appointment(&self, appointment_id: Uuid) -> AppResult<Option<Payment>>;

    async fn successful_for_appointment(&self, appointment_id: Uuid)
        -> AppResult<Option<Payment>>;

    /// Compare-and-set `initiated|processing -> successful|failed`, recording
    /// the gateway payment id (the idempotency key) and signature.
    async fn settle(
        &self,
        id: Uuid,
        gateway_payment_id: &str,
        gateway_signature: Option<&str>,
        to: SettleTo,
    ) -> AppResult<SettleOutcome>;

    /// Compare-and-set `successful -> refund_pending`, reserving the refund
    /// for one caller so the gateway is never asked twice.
    async fn claim_refund(&self, id: Uuid) -> AppResult<RefundClaim>;

    /// Back out of a claimed refund (`refund_pending -> successful`), used
    /// when the gateway call fails.
    async fn release_refund(&self, id: Uuid) -> AppResult<()>;

    /// Compare-and-set `refund_pending -> refunded` with the refund details.
    async fn record_refund(&self, id: Uuid, refund: RefundRecord) -> AppResult<RefundOutcome>;
}

/// Read access to the service catalog (catalog CRUD lives outside this core).
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    /// The subset of `ids` that exist for this salon. Callers detect unknown
    /// services by comparing lengths.
    async fn services_for(&self, salon_id: Uuid, ids: &[Uuid]) -> AppResult<Vec<SalonService>>;
}
