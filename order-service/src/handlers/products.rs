use super::{json_body, reject};
use crate::dtos::{CreateProductRequest, ProductQuery, UpdateProductRequest};
use crate::models::{NewProduct, ProductChanges};
use crate::services::ProductFilter;
use crate::startup::AppState;
use axum::extract::rejection::JsonRejection;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = ProductFilter::from(query);
    let page = state
        .catalog
        .list_products(&filter)
        .await
        .map_err(reject)?;
    Ok(Json(page))
}

pub async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = json_body(payload)?;
    req.validate()?;

    let product = state
        .product_admin
        .create_product(NewProduct::from(req))
        .await
        .map_err(reject)?;

    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = json_body(payload)?;
    req.validate()?;

    let product = state
        .product_admin
        .update_product(id, ProductChanges::from(req))
        .await
        .map_err(reject)?;

    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state
        .product_admin
        .delete_product(id)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}
