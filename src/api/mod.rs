//! HTTP surface: payment initiation, the provider callback listener and read endpoints.

pub mod callbacks;
pub mod payments;
pub mod subscriptions;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

use crate::database::callback_repository::CallbackStore;
use crate::health::{HealthChecker, HealthState, HealthStatus};
use crate::middleware::logging::{request_logging_middleware, UuidRequestId};
use crate::services::{CallbackService, PaymentIssuer, SubscriptionService};

/// Paths the router registers itself; the callback listener path must avoid them.
pub const FIXED_ROUTES: [&str; 6] = [
    "/",
    "/health",
    "/api/payments/stk-push",
    "/api/callbacks",
    "/api/subscriptions",
    "/api/subscriptions/{phone}",
];

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<PaymentIssuer>,
    pub callbacks: Arc<CallbackService>,
    pub store: Arc<dyn CallbackStore>,
    pub subscriptions: Arc<SubscriptionService>,
    pub health_checker: HealthChecker,
}

pub fn router(state: AppState, callback_path: &str) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/payments/stk-push", post(payments::initiate_stk_push))
        .route(callback_path, post(callbacks::receive_callback))
        .route("/api/callbacks", get(callbacks::list_callbacks))
        .route("/api/subscriptions", post(subscriptions::subscribe))
        .route(
            "/api/subscriptions/{phone}",
            get(subscriptions::subscription_status),
        )
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

async fn root() -> &'static str {
    "M-Pesa STK push backend is running"
}

async fn health(
    State(state): State<AppState>,
) -> Result<Json<HealthStatus>, (StatusCode, Json<HealthStatus>)> {
    let health_status = state.health_checker.check_health().await;

    if health_status.status == HealthState::Unhealthy {
        error!("Health check failed - service unhealthy");
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(health_status)))
    } else {
        info!(status = ?health_status.status, "Health check passed");
        Ok(Json(health_status))
    }
}
