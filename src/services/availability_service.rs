//! Availability checker
//!
//! Answers whether a candidate time range can be booked for a barber (or a
//! whole salon) without colliding with an appointment that still holds its
//! slot.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::infrastructure::store::AppointmentStore;
use crate::state::AppState;
use crate::timeslot::TimeRange;

/// `true` when no blocking appointment overlaps `[start, start + duration)`.
///
/// Blocking means `confirmed`, `in_progress`, or `pending` still inside its
/// payment hold window; expired holds are ignored so abandoned bookings free
/// their slot without an explicit cancellation.
pub async fn is_available(
    state: &AppState,
    salon_id: Uuid,
    barber_id: Option<Uuid>,
    start: DateTime<Utc>,
    duration_minutes: i64,
) -> AppResult<bool> {
    if duration_minutes <= 0 {
        return Err(AppError::Validation(
            "duration must be a positive number of minutes".into(),
        ));
    }
    let now = Utc::now();
    if start < now {
        return Err(AppError::Validation(
            "scheduledAt must not be in the past".into(),
        ));
    }

    let candidate = TimeRange::new(start, duration_minutes);
    let blocking = state
        .appointments
        .blocking_in_scope(salon_id, barber_id, now, state.config.hold_window)
        .await?;

    Ok(!blocking.iter().any(|a| a.time_range().overlaps(&candidate)))
}
