use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::info;

use crate::app::AppState;
use crate::error::AppError;
use crate::json::AppJson;
use crate::purchases::service;
use crate::purchases::types::{PurchaseCreated, PurchaseRequest, PurchaseUpdated, PurchaseWithItems};
use crate::tenant::CompanyCode;

/// `POST /api/purchases`
pub async fn create_purchase_handler(
    State(state): State<AppState>,
    company: CompanyCode,
    AppJson(request): AppJson<PurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseCreated>), AppError> {
    let tables = company.or_body(request.company_code.as_deref())?;
    info!(
        "Purchase create for company {} with {} items",
        tables.code(),
        request.items.len()
    );

    let created = service::create_purchase(&state.db, &tables, &request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `PUT /api/purchases/:id`
pub async fn update_purchase_handler(
    State(state): State<AppState>,
    company: CompanyCode,
    Path(id): Path<i64>,
    AppJson(request): AppJson<PurchaseRequest>,
) -> Result<Json<PurchaseUpdated>, AppError> {
    let tables = company.or_body(request.company_code.as_deref())?;
    let updated = service::update_purchase(&state.db, &tables, id, &request).await?;
    Ok(Json(updated))
}

/// `GET /api/purchases`
pub async fn list_purchases_handler(
    State(state): State<AppState>,
    company: CompanyCode,
) -> Result<Json<Vec<PurchaseWithItems>>, AppError> {
    let tables = company.require()?;
    Ok(Json(service::list_purchases(&state.db, &tables).await?))
}

/// `GET /api/purchases/:id`
pub async fn get_purchase_handler(
    State(state): State<AppState>,
    company: CompanyCode,
    Path(id): Path<i64>,
) -> Result<Json<PurchaseWithItems>, AppError> {
    let tables = company.require()?;
    Ok(Json(service::get_purchase(&state.db, &tables, id).await?))
}
