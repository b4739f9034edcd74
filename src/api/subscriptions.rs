use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    response::Response,
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::payments::{outcome_response, rejected_body};
use super::AppState;
use crate::error::AppError;
use crate::logging::mask_phone;
use crate::middleware::error::with_request_id;
use crate::payments::types::PhoneNumber;
use crate::services::SubscriptionStatus;

#[derive(Debug, Deserialize)]
pub struct SubscribeBody {
    pub phone: String,
}

/// POST /api/subscriptions
///
/// Charges the subscription price through an STK push; access is granted when the
/// success callback arrives.
pub async fn subscribe(
    State(state): State<AppState>,
    body: Result<Json<SubscribeBody>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => return rejected_body(rejection),
    };
    let price = state.subscriptions.price();
    info!(phone = %mask_phone(&body.phone), price, "subscription requested");
    outcome_response(state.issuer.try_issue(&body.phone, price).await)
}

/// GET /api/subscriptions/{phone}
pub async fn subscription_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(phone): Path<String>,
) -> Result<Json<SubscriptionStatus>, AppError> {
    let phone = PhoneNumber::parse(&phone).map_err(with_request_id(&headers))?;
    let status = state
        .subscriptions
        .status(phone.as_str())
        .await
        .map_err(with_request_id(&headers))?;
    Ok(Json(status))
}
