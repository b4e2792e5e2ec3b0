//! Application state management
//!
//! This module defines the global application state that is shared across
//! all handlers and services. Collaborators are injected as trait objects,
//! so the whole core can run against fakes in tests.

use std::sync::Arc;

use crate::config::Config;
use crate::infrastructure::gateway::PaymentGateway;
use crate::infrastructure::memory::{InMemoryAppointments, InMemoryCatalog, InMemoryPayments};
use crate::infrastructure::store::{AppointmentStore, PaymentStore, ServiceCatalog};

/// Global application state
///
/// Cheaply cloneable; every handler shares the same stores and gateway
/// through `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub appointments: Arc<dyn AppointmentStore>,
    pub payments: Arc<dyn PaymentStore>,
    pub catalog: Arc<dyn ServiceCatalog>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub config: Arc<Config>,
}

impl AppState {
    /// State with in-process stores and the given gateway.
    pub fn new(config: Config, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            appointments: Arc::new(InMemoryAppointments::new()),
            payments: Arc::new(InMemoryPayments::new()),
            catalog: Arc::new(InMemoryCatalog::new()),
            gateway,
            config: Arc::new(config),
        }
    }

    /// State with every collaborator supplied by the caller.
    pub fn with_collaborators(
        config: Config,
        appointments: Arc<dyn AppointmentStore>,
        payments: Arc<dyn PaymentStore>,
        catalog: Arc<dyn ServiceCatalog>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            appointments,
            payments,
            catalog,
            gateway,
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::infrastructure::razorpay::RazorpayGateway;
    use crate::models::{Appointment, AppointmentStatus, LocationType, SalonService};
    use chrono::{DateTime, Duration, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    pub fn test_config() -> Config {
        Config {
            bind_addr: "127.0.0.1:0".into(),
            currency: "INR".into(),
            platform_commission_pct: Decimal::from(15),
            home_service_fee_pct: Decimal::from(10),
            tax_pct: Decimal::ZERO,
            hold_window: Duration::minutes(15),
            gateway: GatewayConfig {
                key_id: "rzp_test_key".into(),
                key_secret: "rzp_test_secret".into(),
                webhook_secret: "whsec_test".into(),
                base_url: "http://127.0.0.1:1".into(),
            },
        }
    }

    /// State with in-memory stores; gateway signature checks work, network
    /// calls fail fast (tests that need them use a fake gateway).
    pub fn test_state() -> AppState {
        let config = test_config();
        let gateway = Arc::new(RazorpayGateway::new(&config.gateway));
        AppState::new(config, gateway)
    }

    /// Handles to the seeded catalog entries.
    pub struct SeededCatalog {
        pub salon_id: Uuid,
        pub barber_id: Uuid,
        pub haircut_id: Uuid,
        pub shave_id: Uuid,
    }

    impl SeededCatalog {
        pub async fn pending_appointment(
            &self,
            state: &AppState,
            customer_id: Uuid,
        ) -> Appointment {
            self.pending_appointment_at(state, customer_id, Utc::now() + Duration::hours(2))
                .await
        }

        pub async fn pending_appointment_at(
            &self,
            state: &AppState,
            customer_id: Uuid,
            start: DateTime<Utc>,
        ) -> Appointment {
            crate::services::appointment_service::create_appointment(
                state,
                customer_id,
                crate::models::CreateAppointmentRequest {
                    salon_id: self.salon_id,
                    service_ids: vec![self.haircut_id],
                    scheduled_at: start,
                    location_type: LocationType::SalonVisit,
                    barber_id: Some(self.barber_id),
                },
            )
            .await
            .expect("seeded booking should succeed")
        }

        /// Insert a pending appointment directly, bypassing the availability
        /// check, to stage confirmation-time race scenarios.
        pub async fn pending_appointment_at_unchecked(
            &self,
            state: &AppState,
            customer_id: Uuid,
            start: DateTime<Utc>,
        ) -> Appointment {
            let appointment = Appointment {
                id: Uuid::new_v4(),
                customer_id,
                salon_id: self.salon_id,
                barber_id: Some(self.barber_id),
                service_ids: vec![self.haircut_id],
                scheduled_at: start,
                duration_minutes: 30,
                location_type: LocationType::SalonVisit,
                status: AppointmentStatus::Pending,
                cancellation: None,
                created_at: Utc::now(),
            };
            state
                .appointments
                .insert(appointment.clone())
                .await
                .expect("insert");
            appointment
        }
    }

    pub fn seeded_state() -> (AppState, SeededCatalog) {
        let config = test_config();
        let gateway = Arc::new(RazorpayGateway::new(&config.gateway));
        let catalog = Arc::new(InMemoryCatalog::new());

        let seed = SeededCatalog {
            salon_id: Uuid::new_v4(),
            barber_id: Uuid::new_v4(),
            haircut_id: Uuid::new_v4(),
            shave_id: Uuid::new_v4(),
        };
        catalog.seed(vec![
            SalonService {
                id: seed.haircut_id,
                salon_id: seed.salon_id,
                name: "Haircut".into(),
                price: Decimal::from(300),
                duration_minutes: 30,
            },
            SalonService {
                id: seed.shave_id,
                salon_id: seed.salon_id,
                name: "Shave".into(),
                price: Decimal::from(150),
                duration_minutes: 15,
            },
        ]);

        let state = AppState::with_collaborators(
            config,
            Arc::new(InMemoryAppointments::new()),
            Arc::new(InMemoryPayments::new()),
            catalog,
            gateway,
        );
        (state, seed)
    }
}
