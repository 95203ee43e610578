use super::reject;
use crate::dtos::PaginationQuery;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.orders.get_order(id).await.map_err(reject)?;
    Ok(Json(order))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = state
        .orders
        .list_orders(query.into())
        .await
        .map_err(reject)?;
    Ok(Json(page))
}

pub async fn mark_ready(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.order_status.mark_ready(id).await.map_err(reject)?;
    let order = state.orders.get_order(id).await.map_err(reject)?;
    Ok(Json(order))
}

pub async fn mark_delivered(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.order_status.mark_delivered(id).await.map_err(reject)?;
    let order = state.orders.get_order(id).await.map_err(reject)?;
    Ok(Json(order))
}

pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.orders.soft_delete_order(id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}
