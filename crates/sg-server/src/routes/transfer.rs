//! `POST /transfer`: export a Snowflake table into a GCS bucket.

use crate::error::{ApiError, ApiResult};
use crate::routes::parse_json;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use sg_core::request::TransferRequest;
use sg_core::validation::ValidationError;
use sg_transfer::{run_transfer, TransferError, TransferReport};
use std::sync::Arc;

pub async fn transfer(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<TransferReport>> {
    let payload = parse_json(&body)?;
    let source = match payload.get("sourceData") {
        Some(v) if !v.is_null() => v,
        _ => return Err(ValidationError::single("sourceData", "field is missing").into()),
    };
    let request = TransferRequest::from_payload(source)?;
    let table = request.source();
    tracing::info!(
        table = %table.quoted(),
        bucket = %request.destination().bucket,
        "transfer requested"
    );

    let report = run_transfer(state.connector.as_ref(), &request, &state.transfer, Utc::now())
        .await
        .map_err(|e| match e {
            TransferError::Copy { ref statement, .. } => ApiError::Statement {
                statement: statement.clone(),
                message: e.to_string(),
            },
            TransferError::Connect(_) => ApiError::internal(e.to_string()),
        })?;
    Ok(Json(report))
}
