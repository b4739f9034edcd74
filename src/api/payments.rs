use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::info;

use super::AppState;
use crate::logging::mask_phone;
use crate::payments::error::PaymentResult;
use crate::payments::types::IssueOutcome;

#[derive(Debug, Deserialize)]
pub struct StkPushBody {
    pub phone: String,
    pub amount: i64,
}

/// POST /api/payments/stk-push
pub async fn initiate_stk_push(
    State(state): State<AppState>,
    body: Result<Json<StkPushBody>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => return rejected_body(rejection),
    };
    info!(
        phone = %mask_phone(&body.phone),
        amount = body.amount,
        "STK push requested"
    );
    let result = state.issuer.try_issue(&body.phone, body.amount).await;
    outcome_response(result)
}

/// 200 with the provider body when sent; otherwise the error outcome under the matching status.
pub(crate) fn outcome_response(result: PaymentResult<JsonValue>) -> Response {
    match result {
        Ok(response) => (StatusCode::OK, Json(IssueOutcome::Sent { response })).into_response(),
        Err(e) => {
            let status =
                StatusCode::from_u16(e.http_status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, Json(IssueOutcome::from(e))).into_response()
        }
    }
}

/// A body that did not deserialize still gets an error outcome, under axum's status.
pub(crate) fn rejected_body(rejection: JsonRejection) -> Response {
    info!(
        status = rejection.status().as_u16(),
        error = %rejection.body_text(),
        "request body rejected"
    );
    (
        rejection.status(),
        Json(IssueOutcome::error("invalid request body", Some(rejection.body_text()))),
    )
        .into_response()
}
