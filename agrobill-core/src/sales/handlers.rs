use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::app::AppState;
use crate::error::AppError;
use crate::json::AppJson;
use crate::sales::service;
use crate::sales::types::{
    NewBillNo, PaymentRecorded, PaymentRequest, SaleCreated, SaleRequest, SaleUpdated,
    SaleWithItems,
};
use crate::tenant::CompanyCode;

/// `POST /api/sales`
pub async fn create_sale_handler(
    State(state): State<AppState>,
    company: CompanyCode,
    AppJson(request): AppJson<SaleRequest>,
) -> Result<(StatusCode, Json<SaleCreated>), AppError> {
    let tables = company.or_body(request.company_code.as_deref())?;
    info!(
        "Sale create for company {} with {} items",
        tables.code(),
        request.items.len()
    );

    let created = service::create_sale(&state.db, &tables, &request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `PUT /api/sales/:id`
pub async fn update_sale_handler(
    State(state): State<AppState>,
    company: CompanyCode,
    Path(id): Path<i64>,
    AppJson(request): AppJson<SaleRequest>,
) -> Result<Json<SaleUpdated>, AppError> {
    let tables = company.or_body(request.company_code.as_deref())?;
    Ok(Json(service::update_sale(&state.db, &tables, id, &request).await?))
}

/// `DELETE /api/sales/:id`
pub async fn cancel_sale_handler(
    State(state): State<AppState>,
    company: CompanyCode,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let tables = company.require()?;
    service::cancel_sale(&state.db, &tables, id).await?;
    Ok(Json(json!({ "message": "Sale cancelled successfully" })))
}

/// `GET /api/sales`
pub async fn list_sales_handler(
    State(state): State<AppState>,
    company: CompanyCode,
) -> Result<Json<Vec<SaleWithItems>>, AppError> {
    let tables = company.require()?;
    Ok(Json(service::list_sales(&state.db, &tables).await?))
}

/// `GET /api/sales/:id`
pub async fn get_sale_handler(
    State(state): State<AppState>,
    company: CompanyCode,
    Path(id): Path<i64>,
) -> Result<Json<SaleWithItems>, AppError> {
    let tables = company.require()?;
    Ok(Json(service::get_sale(&state.db, &tables, id).await?))
}

/// `GET /api/sales/new-bill-no`
pub async fn new_bill_no_handler(
    State(state): State<AppState>,
    company: CompanyCode,
) -> Result<Json<NewBillNo>, AppError> {
    let tables = company.require()?;
    Ok(Json(service::new_bill_no(&state.db, &tables).await?))
}

/// `POST /api/sales/payments`
pub async fn record_payment_handler(
    State(state): State<AppState>,
    company: CompanyCode,
    AppJson(request): AppJson<PaymentRequest>,
) -> Result<(StatusCode, Json<PaymentRecorded>), AppError> {
    let tables = company.or_body(request.company_code.as_deref())?;
    let recorded = service::record_payment(&state.db, &tables, &request).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}
