use axum::{extract::State, Json};
use serde_json::Value;

use crate::errors::AppError;
use crate::state::AppState;

/// POST /api/idp/callback
pub async fn handle_idp_callback(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let result = state
        .pipeline
        .process_callback(payload, state.config.callback_hmac_secret.as_deref())
        .await?;
    Ok(Json(result))
}
