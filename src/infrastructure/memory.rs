//! In-process store implementations
//!
//! Shared maps behind `RwLock`, cloned out on read. Every conditional
//! update runs under a single write lock, which is what makes the
//! compare-and-set contracts of the store traits hold.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    Appointment, AppointmentStatus, Cancellation, Payment, PaymentStatus, RefundRecord,
    SalonService,
};

use super::store::{
    AppointmentStore, ConfirmOutcome, OpenInsert, PaymentStore, RefundClaim, RefundOutcome,
    ServiceCatalog, SettleOutcome, SettleTo, TransitionOutcome,
};

fn lock_poisoned(which: &str) -> AppError {
    AppError::Internal(format!("{which} store lock poisoned"))
}

#[derive(Default)]
pub struct InMemoryAppointments {
    inner: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointments {
    pub fn new() -> Self {
        Self::default()
    }
}

fn in_scope(appointment: &Appointment, salon_id: Uuid, barber_id: Option<Uuid>) -> bool {
    match barber_id {
        Some(barber) => appointment.barber_id == Some(barber),
        None => appointment.salon_id == salon_id,
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointments {
    async fn insert(&self, appointment: Appointment) -> AppResult<()> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| lock_poisoned("appointment"))?;
        map.insert(appointment.id, appointment);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Appointment>> {
        let map = self.inner.read().map_err(|_| lock_poisoned("appointment"))?;
        Ok(map.get(&id).cloned())
    }

    async fn blocking_in_scope(
        &self,
        salon_id: Uuid,
        barber_id: Option<Uuid>,
        now: DateTime<Utc>,
        hold_window: Duration,
    ) -> AppResult<Vec<Appointment>> {
        let map = self.inner.read().map_err(|_| lock_poisoned("appointment"))?;
        Ok(map
            .values()
            .filter(|a| in_scope(a, salon_id, barber_id) && a.blocks_slot(now, hold_window))
            .cloned()
            .collect())
    }

    async fn confirm_pending(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        hold_window: Duration,
    ) -> AppResult<ConfirmOutcome> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| lock_poisoned("appointment"))?;

        let current = match map.get(&id) {
            Some(a) => a.clone(),
            None => return Ok(ConfirmOutcome::NotFound),
        };

        match current.status {
            AppointmentStatus::Pending => {}
            AppointmentStatus::Confirmed => return Ok(ConfirmOutcome::AlreadyConfirmed(current)),
            other => return Ok(ConfirmOutcome::InvalidState(other)),
        }

        // Re-validate the slot under the same write lock that flips the
        // status; a racing booking may have been confirmed since the
        // original availability check.
        let range = current.time_range();
        let conflict = map.values().any(|other| {
            other.id != id
                && in_scope(other, current.salon_id, current.barber_id)
                && other.blocks_slot(now, hold_window)
                && other.status != AppointmentStatus::Pending
                && other.time_range().overlaps(&range)
        });
        if conflict {
            return Ok(ConfirmOutcome::SlotTaken);
        }

        let entry = map.get_mut(&id).ok_or_else(|| {
            AppError::Internal("appointment vanished during confirmation".into())
        })?;
        entry.status = AppointmentStatus::Confirmed;
        Ok(ConfirmOutcome::Confirmed(entry.clone()))
    }

    async fn transition(
        &self,
        id: Uuid,
        from: &[AppointmentStatus],
        to: AppointmentStatus,
    ) -> AppResult<TransitionOutcome> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| lock_poisoned("appointment"))?;
        let entry = match map.get_mut(&id) {
            Some(a) => a,
            None => return Ok(TransitionOutcome::NotFound),
        };
        if !from.contains(&entry.status) {
            return Ok(TransitionOutcome::InvalidState(entry.status));
        }
        entry.status = to;
        Ok(TransitionOutcome::Applied(entry.clone()))
    }

    async fn cancel(
        &self,
        id: Uuid,
        from: &[AppointmentStatus],
        cancellation: Cancellation,
    ) -> AppResult<TransitionOutcome> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| lock_poisoned("appointment"))?;
        let entry = match map.get_mut(&id) {
            Some(a) => a,
            None => return Ok(TransitionOutcome::NotFound),
        };
        if !from.contains(&entry.status) {
            return Ok(TransitionOutcome::InvalidState(entry.status));
        }
        entry.status = AppointmentStatus::Cancelled;
        entry.cancellation = Some(cancellation);
        Ok(TransitionOutcome::Applied(entry.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryPayments {
    inner: RwLock<HashMap<Uuid, Payment>>,
}

impl InMemoryPayments {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPayments {
    async fn insert_open(&self, payment: Payment) -> AppResult<OpenInsert> {
        let mut map = self.inner.write().map_err(|_| lock_poisoned("payment"))?;
        let open = map.values().find(|p| {
            p.appointment_id == payment.appointment_id
                && matches!(
                    p.status,
                    PaymentStatus::Initiated | PaymentStatus::Processing
                )
        });
        if let Some(existing) = open {
            return Ok(OpenInsert::Open(existing.clone()));
        }
        map.insert(payment.id, payment.clone());
        Ok(OpenInsert::Inserted(payment))
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Payment>> {
        let map = self.inner.read().map_err(|_| lock_poisoned("payment"))?;
        Ok(map.get(&id).cloned())
    }

    async fn find_by_order(&self, gateway_order_id: &str) -> AppResult<Option<Payment>> {
        let map = self.inner.read().map_err(|_| lock_poisoned("payment"))?;
        Ok(map
            .values()
            .find(|p| p.gateway_order_id == gateway_order_id)
            .cloned())
    }

    async fn open_for_appointment(&self, appointment_id: Uuid) -> AppResult<Option<Payment>> {
        let map = self.inner.read().map_err(|_| lock_poisoned("payment"))?;
        Ok(map
            .values()
            .find(|p| {
                p.appointment_id == appointment_id
                    && matches!(
                        p.status,
                        PaymentStatus::Initiated | PaymentStatus::Processing
                    )
            })
            .cloned())
    }

    async fn successful_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> AppResult<Option<Payment>> {
        let map = self.inner.read().map_err(|_| lock_poisoned("payment"))?;
        Ok(map
            .values()
            .find(|p| p.appointment_id == appointment_id && p.status == PaymentStatus::Successful)
            .cloned())
    }

    async fn settle(
        &self,
        id: Uuid,
        gateway_payment_id: &str,
        gateway_signature: Option<&str>,
        to: SettleTo,
    ) -> AppResult<SettleOutcome> {
        let mut map = self.inner.write().map_err(|_| lock_poisoned("payment"))?;

        // gateway_payment_id is the idempotency key: unique across every
        // payment that is not failed.
        let duplicate = map.values().any(|p| {
            p.id != id
                && p.status != PaymentStatus::Failed
                && p.gateway_payment_id.as_deref() == Some(gateway_payment_id)
        });
        if duplicate {
            return Ok(SettleOutcome::DuplicatePaymentId);
        }

        let current = match map.get(&id) {
            Some(p) => p.clone(),
            None => return Ok(SettleOutcome::NotFound),
        };
        match current.status {
            PaymentStatus::Initiated | PaymentStatus::Processing => {}
            _ => return Ok(SettleOutcome::AlreadySettled(current)),
        }

        // At most one successful payment per appointment; a second capture
        // must never reach `successful`, under the same lock that settles.
        if matches!(to, SettleTo::Success) {
            let other_success = map.values().find(|p| {
                p.id != id
                    && p.appointment_id == current.appointment_id
                    && p.status == PaymentStatus::Successful
            });
            if let Some(other) = other_success {
                return Ok(SettleOutcome::OtherPaymentSucceeded(other.clone()));
            }
        }

        let entry = map
            .get_mut(&id)
            .ok_or_else(|| AppError::Internal("payment vanished during settlement".into()))?;
        entry.gateway_payment_id = Some(gateway_payment_id.to_string());
        entry.gateway_signature = gateway_signature.map(str::to_string);
        match to {
            SettleTo::Success => entry.status = PaymentStatus::Successful,
            SettleTo::Failure { reason } => {
                entry.status = PaymentStatus::Failed;
                entry.failure_reason = Some(reason);
            }
        }
        Ok(SettleOutcome::Won(entry.clone()))
    }

    async fn claim_refund(&self, id: Uuid) -> AppResult<RefundClaim> {
        let mut map = self.inner.write().map_err(|_| lock_poisoned("payment"))?;
        let entry = match map.get_mut(&id) {
            Some(p) => p,
            None => return Ok(RefundClaim::NotFound),
        };
        match entry.status {
            PaymentStatus::Successful => {
                entry.status = PaymentStatus::RefundPending;
                Ok(RefundClaim::Claimed(entry.clone()))
            }
            PaymentStatus::RefundPending => Ok(RefundClaim::InFlight),
            PaymentStatus::Refunded => Ok(RefundClaim::AlreadyRefunded(entry.clone())),
            other => Ok(RefundClaim::InvalidState(other)),
        }
    }

    async fn release_refund(&self, id: Uuid) -> AppResult<()> {
        let mut map = self.inner.write().map_err(|_| lock_poisoned("payment"))?;
        if let Some(entry) = map.get_mut(&id) {
            if entry.status == PaymentStatus::RefundPending {
                entry.status = PaymentStatus::Successful;
            }
        }
        Ok(())
    }

    async fn record_refund(&self, id: Uuid, refund: RefundRecord) -> AppResult<RefundOutcome> {
        let mut map = self.inner.write().map_err(|_| lock_poisoned("payment"))?;
        let entry = match map.get_mut(&id) {
            Some(p) => p,
            None => return Ok(RefundOutcome::NotFound),
        };
        match entry.status {
            PaymentStatus::RefundPending => {
                entry.refund = Some(refund);
                entry.status = PaymentStatus::Refunded;
                Ok(RefundOutcome::Applied(entry.clone()))
            }
            PaymentStatus::Refunded => Ok(RefundOutcome::AlreadyRefunded(entry.clone())),
            other => Ok(RefundOutcome::InvalidState(other)),
        }
    }
}

/// Catalog backed by a seeded map; service CRUD is out of scope for the core.
#[derive(Default)]
pub struct InMemoryCatalog {
    inner: RwLock<HashMap<Uuid, SalonService>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, services: Vec<SalonService>) {
        if let Ok(mut map) = self.inner.write() {
            for service in services {
                map.insert(service.id, service);
            }
        }
    }
}

#[async_trait]
impl ServiceCatalog for InMemoryCatalog {
    async fn services_for(&self, salon_id: Uuid, ids: &[Uuid]) -> AppResult<Vec<SalonService>> {
        let map = self.inner.read().map_err(|_| lock_poisoned("catalog"))?;
        Ok(ids
            .iter()
            .filter_map(|id| map.get(id))
            .filter(|s| s.salon_id == salon_id)
            .cloned()
            .collect())
    }
}
