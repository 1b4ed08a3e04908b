use crate::{error::AppError, server::Server};
use axum::{extract::State, response::Json};
use serde_json::Value;

pub async fn health_check(State(server): State<Server>) -> Result<Json<Value>, AppError> {
    let health_response = server.health_service.check_health().await;

    let response_json = serde_json::to_value(&health_response)
        .map_err(|e| AppError::Internal(format!("Failed to serialize health response: {}", e)))?;

    Ok(Json(response_json))
}
