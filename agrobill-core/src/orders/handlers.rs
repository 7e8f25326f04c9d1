//! Purchase-order and sales-order routes. Orders live in global tables, so
//! none of these read the company code.

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
use crate::orders::service;
use crate::orders::types::{OrderInvoice, OrderKind, OrderRequest, OrderSaved, OrderWithItems};

async fn create(
    state: AppState,
    kind: OrderKind,
    request: OrderRequest,
) -> Result<(StatusCode, Json<OrderSaved>), AppError> {
    info!("{} create with {} items", kind.label(), request.items.len());
    let saved = service::create_order(&state.db, kind, &request).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn delete(state: AppState, kind: OrderKind, id: i64) -> Result<Json<Value>, AppError> {
    service::delete_order(&state.db, kind, id).await?;
    Ok(Json(json!({ "message": format!("{} {} deleted", kind.label(), id) })))
}

/// `POST /api/purchase-orders`
pub async fn create_purchase_order_handler(
    State(state): State<AppState>,
    AppJson(request): AppJson<OrderRequest>,
) -> Result<(StatusCode, Json<OrderSaved>), AppError> {
    create(state, OrderKind::Purchase, request).await
}

/// `GET /api/purchase-orders`
pub async fn list_purchase_orders_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<OrderWithItems>>, AppError> {
    Ok(Json(service::list_orders(&state.db, OrderKind::Purchase).await?))
}

/// `GET /api/purchase-orders/:id`
pub async fn get_purchase_order_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OrderWithItems>, AppError> {
    Ok(Json(service::get_order(&state.db, OrderKind::Purchase, id).await?))
}

/// `PUT /api/purchase-orders/:id`
pub async fn update_purchase_order_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(request): AppJson<OrderRequest>,
) -> Result<Json<OrderSaved>, AppError> {
    Ok(Json(
        service::update_order(&state.db, OrderKind::Purchase, id, &request).await?,
    ))
}

/// `DELETE /api/purchase-orders/:id`
pub async fn delete_purchase_order_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    delete(state, OrderKind::Purchase, id).await
}

/// `POST /api/sales-orders`
pub async fn create_sales_order_handler(
    State(state): State<AppState>,
    AppJson(request): AppJson<OrderRequest>,
) -> Result<(StatusCode, Json<OrderSaved>), AppError> {
    create(state, OrderKind::Sales, request).await
}

/// `GET /api/sales-orders`
pub async fn list_sales_orders_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<OrderWithItems>>, AppError> {
    Ok(Json(service::list_orders(&state.db, OrderKind::Sales).await?))
}

/// `GET /api/sales-orders/:id`
pub async fn get_sales_order_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OrderWithItems>, AppError> {
    Ok(Json(service::get_order(&state.db, OrderKind::Sales, id).await?))
}

/// `PUT /api/sales-orders/:id`
pub async fn update_sales_order_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(request): AppJson<OrderRequest>,
) -> Result<Json<OrderSaved>, AppError> {
    Ok(Json(
        service::update_order(&state.db, OrderKind::Sales, id, &request).await?,
    ))
}

/// `DELETE /api/sales-orders/:id`
pub async fn delete_sales_order_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    delete(state, OrderKind::Sales, id).await
}

/// `GET /api/sales-orders/:id/invoice`
pub async fn sales_order_invoice_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OrderInvoice>, AppError> {
    Ok(Json(service::order_invoice(&state.db, id).await?))
}
