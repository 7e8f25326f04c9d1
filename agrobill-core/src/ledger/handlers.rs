use axum::{
    extract::{Path, State},
    response::Json,
};

use crate::app::AppState;
use crate::error::AppError;
use crate::ledger::service::{party_due, PartyDue};
use crate::models::party::PartyType;
use crate::tenant::CompanyCode;

/// `GET /api/sales/party/:type/:id/previous-due`
pub async fn previous_due_handler(
    State(state): State<AppState>,
    company: CompanyCode,
    Path((party_type, party_id)): Path<(String, i64)>,
) -> Result<Json<PartyDue>, AppError> {
    let party_type: PartyType = party_type
        .parse()
        .map_err(|_| AppError::validation("type must be 'customer' | 'vendor' | 'farmer'"))?;
    if party_id <= 0 {
        return Err(AppError::validation("Invalid party id"));
    }
    let tables = company.require()?;

    Ok(Json(party_due(&state.db, &tables, party_type, party_id).await?))
}
