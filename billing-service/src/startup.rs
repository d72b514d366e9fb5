//! Application startup and lifecycle management.

use crate::access::AccessGate;
use crate::config::BillingConfig;
use crate::handlers::{fees, invoices, payments, reports, roles, students};
use crate::services::{get_metrics, init_metrics, Database};
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: BillingConfig,
    pub db: Database,
    pub gate: AccessGate,
}

/// State for health check endpoints.
#[derive(Clone)]
struct HealthState {
    db: Database,
}

/// Health check endpoint for Docker/K8s liveness probes.
async fn health_check(State(state): State<HealthState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => {
            tracing::debug!("Health check passed");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "service": "billing-service",
                    "version": env!("CARGO_PKG_VERSION")
                })),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "billing-service",
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Readiness check endpoint for K8s readiness probes.
async fn readiness_check(State(state): State<HealthState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Metrics endpoint for Prometheus scraping.
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: BillingConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the harness.
    pub async fn build_without_migrations(config: BillingConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(config: BillingConfig, run_migrations: bool) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;

        if run_migrations {
            db.run_migrations().await?;
        }

        let gate = AccessGate::new(db.clone());

        let state = AppState {
            config: config.clone(),
            db,
            gate,
        };

        // Port 0 binds a random free port, which tests rely on.
        let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("billing-service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the application state.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let health_state = HealthState {
            db: self.state.db.clone(),
        };

        let api = Router::new()
            .route(
                "/students",
                post(students::create_student).get(students::list_students),
            )
            .route(
                "/students/:student_id",
                get(students::get_student)
                    .put(students::update_student)
                    .delete(students::delete_student),
            )
            .route(
                "/fee-structures",
                post(fees::create_fee_structure).get(fees::list_fee_structures),
            )
            .route(
                "/fee-structures/:fee_structure_id",
                get(fees::get_fee_structure)
                    .put(fees::update_fee_structure)
                    .delete(fees::delete_fee_structure),
            )
            .route(
                "/discounts",
                post(fees::create_discount).get(fees::list_discounts),
            )
            .route(
                "/discounts/:discount_id",
                put(fees::update_discount).delete(fees::delete_discount),
            )
            .route(
                "/invoices",
                post(invoices::create_invoice).get(invoices::list_invoices),
            )
            .route(
                "/invoices/:invoice_id",
                get(invoices::get_invoice).delete(invoices::delete_invoice),
            )
            .route("/invoices/:invoice_id/cancel", post(invoices::cancel_invoice))
            .route(
                "/payments",
                post(payments::record_payment).get(payments::list_payments),
            )
            .route("/payments/:payment_id", get(payments::get_payment))
            .route("/reports/dashboard", get(reports::dashboard))
            .route("/reports/daily-collection", get(reports::daily_collection))
            .route("/reports/pending-fees", get(reports::pending_fees))
            .route("/reports/class-wise", get(reports::class_wise_collection))
            .route("/reports/payment-modes", get(reports::payment_mode_breakdown))
            .route(
                "/reports/student-ledger/:student_id",
                get(reports::student_ledger),
            )
            .route("/roles", put(roles::assign_role).get(roles::get_role))
            .with_state(self.state);

        let router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .with_state(health_state)
            .route("/metrics", get(metrics_handler))
            .nest("/api/v1", api)
            .layer(middleware::from_fn(metrics_middleware))
            .layer(middleware::from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(CorsLayer::permissive());

        axum::serve(self.listener, router).await
    }
}
