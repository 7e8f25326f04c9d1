use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::info;

use crate::app::AppState;
use crate::error::AppError;
use crate::json::AppJson;
use crate::models::party::{CreateParty, Party, PartyType};
use crate::parties::service;

fn party_type_from_path(raw: &str) -> Result<PartyType, AppError> {
    raw.parse::<PartyType>()
        .map_err(|_| AppError::validation("party type must be 'customer' | 'vendor' | 'farmer'"))
}

/// `GET /api/parties/:type`
pub async fn list_parties_handler(
    State(state): State<AppState>,
    Path(party_type): Path<String>,
) -> Result<Json<Vec<Party>>, AppError> {
    let party_type = party_type_from_path(&party_type)?;
    let parties = service::list_parties(&state.db, party_type).await?;
    Ok(Json(parties))
}

/// `POST /api/parties/:type`
pub async fn create_party_handler(
    State(state): State<AppState>,
    Path(party_type): Path<String>,
    AppJson(input): AppJson<CreateParty>,
) -> Result<(StatusCode, Json<Party>), AppError> {
    let party_type = party_type_from_path(&party_type)?;
    let party = service::create_party(&state.db, party_type, &input).await?;
    info!("Created {} {}", party_type, party.id);
    Ok((StatusCode::CREATED, Json(party)))
}

/// `GET /api/parties/:type/:id`
pub async fn get_party_handler(
    State(state): State<AppState>,
    Path((party_type, id)): Path<(String, i64)>,
) -> Result<Json<Party>, AppError> {
    let party_type = party_type_from_path(&party_type)?;
    let party = service::get_party(&state.db, party_type, id).await?;
    Ok(Json(party))
}
