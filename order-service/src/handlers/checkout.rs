use super::{json_body, reject};
use crate::dtos::CheckoutRequest;
use crate::models::NewOrder;
use crate::startup::AppState;
use axum::extract::rejection::JsonRejection;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;
use validator::Validate;

pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = json_body(payload)?;
    req.validate()?;

    let new_order = NewOrder::try_from(req).map_err(reject)?;
    let order = state
        .checkout
        .place_order(new_order)
        .await
        .map_err(reject)?;

    Ok((StatusCode::CREATED, Json(order)))
}
