use super::{json_body, reject};
use crate::dtos::CreateClientRequest;
use crate::models::{normalize_cpf, NewClient};
use crate::startup::AppState;
use axum::extract::rejection::JsonRejection;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

pub async fn create_client(
    State(state): State<AppState>,
    payload: Result<Json<CreateClientRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = json_body(payload)?;
    req.validate()?;

    let client = state
        .clients
        .create_client(NewClient::from(req))
        .await
        .map_err(reject)?;

    Ok((StatusCode::CREATED, Json(client)))
}

/// Look a client up by CPF, punctuated or not.
pub async fn get_client_by_cpf(
    State(state): State<AppState>,
    Path(cpf): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let client = state
        .clients
        .client_by_cpf(&normalize_cpf(&cpf))
        .await
        .map_err(reject)?;
    Ok(Json(client))
}
