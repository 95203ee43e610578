//! HTTP handlers for order-service.

pub mod checkout;
pub mod clients;
pub mod orders;
pub mod products;
pub mod webhooks;

use crate::services::{record_error, OrderError};
use axum::extract::rejection::JsonRejection;
use axum::Json;
use service_core::error::AppError;

/// Count the failure and convert it for the response.
pub(crate) fn reject(err: OrderError) -> AppError {
    record_error(err.kind());
    err.into()
}

/// Unwrap a JSON body, reporting malformed input as a bad request.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e.body_text())))
}
