use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;

use trimsalon::infrastructure::memory::{InMemoryAppointments, InMemoryCatalog, InMemoryPayments};
use trimsalon::infrastructure::razorpay::RazorpayGateway;
use trimsalon::infrastructure::store::ServiceCatalog;
use trimsalon::{handlers, AppState, Config, SalonService};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let bind_addr = config.bind_addr.clone();

    let gateway = Arc::new(RazorpayGateway::new(&config.gateway));
    let catalog = seeded_catalog();
    let app_state = AppState::with_collaborators(
        config,
        Arc::new(InMemoryAppointments::new()),
        Arc::new(InMemoryPayments::new()),
        catalog,
        gateway,
    );

    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {bind_addr}: {e}"));

    tracing::info!(%bind_addr, "service starting");

    axum::serve(listener, app)
        .await
        .expect("Failed to start HTTP server");
}

fn create_router(app_state: AppState) -> Router {
    let appointments = Router::new()
        .route("/check-availability", post(handlers::check_availability))
        .route("/", post(handlers::create_appointment))
        .route("/{id}", get(handlers::get_appointment))
        .route("/{id}/status", patch(handlers::update_appointment_status))
        .route("/{id}/cancel", post(handlers::cancel_appointment));

    let payments = Router::new()
        .route("/initiate", post(handlers::initiate_payment))
        .route("/verify", post(handlers::verify_payment))
        .route("/webhook", post(handlers::payment_webhook))
        .route("/{id}", get(handlers::get_payment))
        .route("/{id}/refund", post(handlers::refund_payment));

    Router::new()
        .route("/", get(handlers::root))
        .nest("/api/v1/appointments", appointments)
        .nest("/api/v1/payments", payments)
        .with_state(app_state)
}

/// Service-catalog CRUD lives outside this core; the catalog is loaded once
/// at startup from `CATALOG_SEED_FILE` (a JSON array of services) when set.
fn seeded_catalog() -> Arc<dyn ServiceCatalog> {
    let catalog = InMemoryCatalog::new();
    if let Ok(path) = std::env::var("CATALOG_SEED_FILE") {
        match std::fs::read(&path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                serde_json::from_slice::<Vec<SalonService>>(&bytes).map_err(|e| e.to_string())
            }) {
            Ok(services) => {
                tracing::info!(count = services.len(), %path, "service catalog seeded");
                catalog.seed(services);
            }
            Err(error) => {
                tracing::warn!(%path, %error, "could not load catalog seed file");
            }
        }
    }
    Arc::new(catalog)
}
