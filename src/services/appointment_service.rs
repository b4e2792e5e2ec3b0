//! Appointment lifecycle manager
//!
//! Owns the appointment state machine. The only other writer of appointment
//! status is the settlement engine, and it goes through `confirm_paid` /
//! the cancellation path here.
//!
//! ```text
//! pending -> confirmed      (payment success)
//! pending -> cancelled      (explicit cancel, or hold-window expiry)
//! confirmed -> in_progress
//! confirmed -> cancelled    (explicit cancel, refund triggered)
//! confirmed -> no_show
//! in_progress -> completed
//! ```

use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::infrastructure::store::{
    AppointmentStore, ConfirmOutcome, PaymentStore, ServiceCatalog, TransitionOutcome,
};
use crate::models::{
    Actor, Appointment, AppointmentStatus, Cancellation, CreateAppointmentRequest,
};
use crate::services::{availability_service, payment_service};
use crate::state::AppState;

use AppointmentStatus::*;

fn transition_allowed(from: AppointmentStatus, to: AppointmentStatus) -> bool {
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Pending, Cancelled)
            | (Confirmed, InProgress)
            | (Confirmed, Cancelled)
            | (Confirmed, NoShow)
            | (InProgress, Completed)
    )
}

pub async fn create_appointment(
    state: &AppState,
    customer_id: Uuid,
    request: CreateAppointmentRequest,
) -> AppResult<Appointment> {
    if request.service_ids.is_empty() {
        return Err(AppError::Validation(
            "at least one service must be selected".into(),
        ));
    }
    let mut seen = std::collections::HashSet::new();
    if !request.service_ids.iter().all(|id| seen.insert(id)) {
        return Err(AppError::Validation(
            "each service may be selected at most once".into(),
        ));
    }

    let services = state
        .catalog
        .services_for(request.salon_id, &request.service_ids)
        .await?;
    if services.len() != request.service_ids.len() {
        return Err(AppError::Validation(
            "one or more selected services do not exist for this salon".into(),
        ));
    }
    let duration_minutes: i64 = services.iter().map(|s| s.duration_minutes).sum();

    let available = availability_service::is_available(
        state,
        request.salon_id,
        request.barber_id,
        request.scheduled_at,
        duration_minutes,
    )
    .await?;
    if !available {
        return Err(AppError::Conflict("the requested slot is not available".into()));
    }

    let appointment = Appointment {
        id: Uuid::new_v4(),
        customer_id,
        salon_id: request.salon_id,
        barber_id: request.barber_id,
        service_ids: request.service_ids,
        scheduled_at: request.scheduled_at,
        duration_minutes,
        location_type: request.location_type,
        status: Pending,
        cancellation: None,
        // Anchors the payment hold window.
        created_at: Utc::now(),
    };
    state.appointments.insert(appointment.clone()).await?;

    tracing::info!(
        appointment_id = %appointment.id,
        salon_id = %appointment.salon_id,
        scheduled_at = %appointment.scheduled_at,
        "appointment created"
    );
    Ok(appointment)
}

/// Operational transitions driven by salon-side staff.
///
/// `confirmed` is reserved for the settlement engine and `cancelled` for the
/// cancel operation, so the statuses reachable here are `in_progress`,
/// `completed` and `no_show`.
pub async fn update_status(
    state: &AppState,
    appointment_id: Uuid,
    new_status: AppointmentStatus,
    actor: &Actor,
) -> AppResult<Appointment> {
    let appointment = state
        .appointments
        .get(appointment_id)
        .await?
        .ok_or(AppError::NotFound("appointment"))?;

    match new_status {
        Confirmed => {
            return Err(AppError::Validation(
                "appointments are confirmed by payment settlement, not by status update".into(),
            ))
        }
        Cancelled => {
            return Err(AppError::Validation(
                "use the cancel operation to cancel an appointment".into(),
            ))
        }
        _ => {}
    }

    match actor {
        Actor::Salon { salon_id, .. } if *salon_id == appointment.salon_id => {}
        Actor::Salon { .. } => {
            return Err(AppError::Forbidden(
                "appointment belongs to a different salon".into(),
            ))
        }
        Actor::Customer(_) => {
            return Err(AppError::Forbidden(
                "customers cannot change appointment status".into(),
            ))
        }
    }

    if !transition_allowed(appointment.status, new_status) {
        return Err(AppError::Validation(format!(
            "cannot transition appointment from {:?} to {:?}",
            appointment.status, new_status
        )));
    }

    match state
        .appointments
        .transition(appointment_id, &[appointment.status], new_status)
        .await?
    {
        TransitionOutcome::Applied(updated) => {
            tracing::info!(appointment_id = %appointment_id, status = ?new_status, "appointment status updated");
            Ok(updated)
        }
        TransitionOutcome::InvalidState(current) => Err(AppError::Conflict(format!(
            "appointment was concurrently moved to {current:?}"
        ))),
        TransitionOutcome::NotFound => Err(AppError::NotFound("appointment")),
    }
}

/// Cancel a `pending` or `confirmed` appointment.
///
/// When a captured payment exists the refund is issued first; a cancellation
/// never completes with the customer's money still held.
pub async fn cancel_appointment(
    state: &AppState,
    appointment_id: Uuid,
    actor: &Actor,
    reason: String,
) -> AppResult<Appointment> {
    let appointment = state
        .appointments
        .get(appointment_id)
        .await?
        .ok_or(AppError::NotFound("appointment"))?;

    match actor {
        Actor::Customer(customer_id) if *customer_id == appointment.customer_id => {}
        Actor::Salon { salon_id, .. } if *salon_id == appointment.salon_id => {}
        _ => {
            return Err(AppError::Forbidden(
                "actor has no authority over this appointment".into(),
            ))
        }
    }

    if !matches!(appointment.status, Pending | Confirmed) {
        return Err(AppError::Validation(format!(
            "cannot cancel an appointment in state {:?}",
            appointment.status
        )));
    }

    if let Some(payment) = state
        .payments
        .successful_for_appointment(appointment_id)
        .await?
    {
        payment_service::refund_payment(
            state,
            payment.id,
            actor.id(),
            "appointment cancelled".into(),
            None,
        )
        .await?;
    }

    let cancellation = Cancellation {
        reason,
        cancelled_by: actor.id(),
        cancelled_at: Utc::now(),
    };
    match state
        .appointments
        .cancel(appointment_id, &[Pending, Confirmed], cancellation)
        .await?
    {
        TransitionOutcome::Applied(updated) => {
            tracing::info!(appointment_id = %appointment_id, "appointment cancelled");
            Ok(updated)
        }
        TransitionOutcome::InvalidState(current) => Err(AppError::Conflict(format!(
            "appointment was concurrently moved to {current:?}"
        ))),
        TransitionOutcome::NotFound => Err(AppError::NotFound("appointment")),
    }
}

/// Atomic `pending -> confirmed` on payment success, re-validating the slot
/// inside the store's critical section. A `SlotTaken` outcome means a racing
/// booking won the slot while the payment was in flight; the settlement
/// engine refunds instead of confirming.
pub(crate) async fn confirm_paid(state: &AppState, appointment_id: Uuid) -> AppResult<Appointment> {
    let now = Utc::now();
    match state
        .appointments
        .confirm_pending(appointment_id, now, state.config.hold_window)
        .await?
    {
        ConfirmOutcome::Confirmed(a) => {
            tracing::info!(appointment_id = %appointment_id, "appointment confirmed");
            Ok(a)
        }
        ConfirmOutcome::AlreadyConfirmed(a) => Ok(a),
        ConfirmOutcome::SlotTaken => Err(AppError::Conflict(
            "slot was taken by another booking while payment completed".into(),
        )),
        ConfirmOutcome::InvalidState(status) => Err(AppError::Conflict(format!(
            "appointment is no longer confirmable (state {status:?})"
        ))),
        ConfirmOutcome::NotFound => Err(AppError::NotFound("appointment")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocationType;
    use crate::state::test_support::{seeded_state, test_state};
    use chrono::Duration;

    #[tokio::test]
    async fn create_computes_duration_from_services() {
        let (state, seed) = seeded_state();
        let appointment = create_appointment(
            &state,
            Uuid::new_v4(),
            CreateAppointmentRequest {
                salon_id: seed.salon_id,
                service_ids: vec![seed.haircut_id, seed.shave_id],
                scheduled_at: Utc::now() + Duration::hours(2),
                location_type: LocationType::SalonVisit,
                barber_id: Some(seed.barber_id),
            },
        )
        .await
        .unwrap();

        // 30 minute haircut + 15 minute shave
        assert_eq!(appointment.duration_minutes, 45);
        assert_eq!(appointment.status, Pending);
    }

    #[tokio::test]
    async fn create_rejects_unknown_services() {
        let (state, seed) = seeded_state();
        let result = create_appointment(
            &state,
            Uuid::new_v4(),
            CreateAppointmentRequest {
                salon_id: seed.salon_id,
                service_ids: vec![Uuid::new_v4()],
                scheduled_at: Utc::now() + Duration::hours(2),
                location_type: LocationType::SalonVisit,
                barber_id: None,
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_services() {
        let (state, seed) = seeded_state();
        let result = create_appointment(
            &state,
            Uuid::new_v4(),
            CreateAppointmentRequest {
                salon_id: seed.salon_id,
                service_ids: vec![seed.haircut_id, seed.haircut_id],
                scheduled_at: Utc::now() + Duration::hours(2),
                location_type: LocationType::SalonVisit,
                barber_id: None,
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn double_booking_is_a_conflict() {
        let (state, seed) = seeded_state();
        let start = Utc::now() + Duration::hours(2);
        let request = |at| CreateAppointmentRequest {
            salon_id: seed.salon_id,
            service_ids: vec![seed.haircut_id],
            scheduled_at: at,
            location_type: LocationType::SalonVisit,
            barber_id: Some(seed.barber_id),
        };

        create_appointment(&state, Uuid::new_v4(), request(start))
            .await
            .unwrap();

        let overlapping =
            create_appointment(&state, Uuid::new_v4(), request(start + Duration::minutes(15)))
                .await;
        assert!(matches!(overlapping, Err(AppError::Conflict(_))));

        // Touching boundary is bookable.
        create_appointment(&state, Uuid::new_v4(), request(start + Duration::minutes(30)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn customer_cannot_drive_operational_transitions() {
        let (state, seed) = seeded_state();
        let customer = Uuid::new_v4();
        let appointment = seed.pending_appointment(&state, customer).await;

        let result = update_status(
            &state,
            appointment.id,
            InProgress,
            &Actor::Customer(customer),
        )
        .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn foreign_salon_actor_is_rejected() {
        let (state, seed) = seeded_state();
        let appointment = seed.pending_appointment(&state, Uuid::new_v4()).await;

        let foreign = Actor::Salon {
            actor_id: Uuid::new_v4(),
            salon_id: Uuid::new_v4(),
        };
        let result = update_status(&state, appointment.id, NoShow, &foreign).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn status_update_honors_the_transition_table() {
        let (state, seed) = seeded_state();
        let appointment = seed.pending_appointment(&state, Uuid::new_v4()).await;
        let salon_actor = Actor::Salon {
            actor_id: Uuid::new_v4(),
            salon_id: seed.salon_id,
        };

        // pending -> in_progress is not in the table
        let skip = update_status(&state, appointment.id, InProgress, &salon_actor).await;
        assert!(matches!(skip, Err(AppError::Validation(_))));

        // confirmed is reserved for settlement
        let confirm = update_status(&state, appointment.id, Confirmed, &salon_actor).await;
        assert!(matches!(confirm, Err(AppError::Validation(_))));

        confirm_paid(&state, appointment.id).await.unwrap();
        update_status(&state, appointment.id, InProgress, &salon_actor)
            .await
            .unwrap();
        let done = update_status(&state, appointment.id, Completed, &salon_actor)
            .await
            .unwrap();
        assert_eq!(done.status, Completed);

        // completed is terminal
        let further = update_status(&state, appointment.id, NoShow, &salon_actor).await;
        assert!(matches!(further, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn cancel_records_metadata() {
        let (state, seed) = seeded_state();
        let customer = Uuid::new_v4();
        let appointment = seed.pending_appointment(&state, customer).await;

        let cancelled = cancel_appointment(
            &state,
            appointment.id,
            &Actor::Customer(customer),
            "changed my mind".into(),
        )
        .await
        .unwrap();

        assert_eq!(cancelled.status, Cancelled);
        let meta = cancelled.cancellation.unwrap();
        assert_eq!(meta.reason, "changed my mind");
        assert_eq!(meta.cancelled_by, customer);
    }

    #[tokio::test]
    async fn cancel_is_rejected_from_terminal_states() {
        let (state, seed) = seeded_state();
        let customer = Uuid::new_v4();
        let appointment = seed.pending_appointment(&state, customer).await;
        let actor = Actor::Customer(customer);

        cancel_appointment(&state, appointment.id, &actor, "first".into())
            .await
            .unwrap();
        let again = cancel_appointment(&state, appointment.id, &actor, "second".into()).await;
        assert!(matches!(again, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn confirm_paid_detects_slot_stolen_by_racing_booking() {
        let (state, seed) = seeded_state();
        let start = Utc::now() + Duration::hours(2);

        let first = seed
            .pending_appointment_at(&state, Uuid::new_v4(), start)
            .await;

        // Second booking for the same slot confirms first (its payment won).
        let second = seed
            .pending_appointment_at_unchecked(&state, Uuid::new_v4(), start)
            .await;
        confirm_paid(&state, second.id).await.unwrap();

        let result = confirm_paid(&state, first.id).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn create_requires_services() {
        let state = test_state();
        let result = create_appointment(
            &state,
            Uuid::new_v4(),
            CreateAppointmentRequest {
                salon_id: Uuid::new_v4(),
                service_ids: vec![],
                scheduled_at: Utc::now() + Duration::hours(1),
                location_type: LocationType::SalonVisit,
                barber_id: None,
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
