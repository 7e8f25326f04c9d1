use axum::{extract::State, http::StatusCode, response::Json};

use crate::app::AppState;
use crate::companies::service;
use crate::error::AppError;
use crate::json::AppJson;
use crate::models::company::{Company, CreateCompany};

/// `POST /api/companies`
pub async fn create_company_handler(
    State(state): State<AppState>,
    AppJson(input): AppJson<CreateCompany>,
) -> Result<(StatusCode, Json<Company>), AppError> {
    let company = service::create_company(&state.db, &input).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

/// `GET /api/companies`
pub async fn list_companies_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<Company>>, AppError> {
    Ok(Json(service::list_companies(&state.db).await?))
}
