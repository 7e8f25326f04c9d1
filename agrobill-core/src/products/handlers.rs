use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::app::AppState;
use crate::error::AppError;
use crate::json::AppJson;
use crate::models::product::{CreateProduct, Product};
use crate::products::service;

/// `POST /api/products`
pub async fn create_product_handler(
    State(state): State<AppState>,
    AppJson(input): AppJson<CreateProduct>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let product = service::create_product(&state.db, &input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// `GET /api/products`
pub async fn list_products_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(service::list_products(&state.db).await?))
}

/// `GET /api/products/:id`
pub async fn get_product_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(service::get_product(&state.db, id).await?))
}
