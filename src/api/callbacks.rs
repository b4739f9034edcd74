use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use tracing::info;

use super::AppState;
use crate::database::callback_repository::{CallbackFilter, CallbackRecord};
use crate::error::AppError;
use crate::middleware::error::with_request_id;
use crate::services::CallbackAck;

/// POST {MPESA_CALLBACK_PATH}
///
/// Always answers 200 with an ack; raw bytes are taken so that no body is rejected
/// or altered before it is stored.
pub async fn receive_callback(State(state): State<AppState>, body: Bytes) -> Json<CallbackAck> {
    info!(bytes = body.len(), "M-Pesa callback received");
    Json(state.callbacks.ingest(&body).await)
}

/// GET /api/callbacks?txn=&phone=&limit=
pub async fn list_callbacks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filter): Query<CallbackFilter>,
) -> Result<Json<Vec<CallbackRecord>>, AppError> {
    let records = state
        .store
        .query(&filter)
        .await
        .map_err(with_request_id(&headers))?;
    info!(
        count = records.len(),
        txn = ?filter.txn(),
        "callback history served"
    );
    Ok(Json(records))
}
