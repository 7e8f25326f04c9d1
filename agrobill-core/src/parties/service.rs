use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::party::{CreateParty, Party, PartyType};
use crate::validation::{optional_text, require_text};

/// How a document names its counterparty: by id, or by name with
/// find-or-create semantics.
#[derive(Debug, Clone, Default)]
pub struct PartyLookup<'a> {
    pub id: Option<i64>,
    pub name: Option<&'a str>,
    /// Used only when a vendor row has to be created.
    pub firm_name: Option<&'a str>,
    pub gst_no: Option<&'a str>,
}

fn select_party_sql(party_type: PartyType) -> String {
    let (firm, gst) = match party_type {
        PartyType::Vendor => ("firm_name", "gst_no"),
        PartyType::Customer | PartyType::Farmer => ("NULL::varchar", "NULL::varchar"),
    };
    format!(
        "SELECT id, {name} AS name, {firm} AS firm_name, {gst} AS gst_no, address, \
         contact_number, status, balance, min_balance, created_at FROM {table}",
        name = party_type.name_column(),
        firm = firm,
        gst = gst,
        table = party_type.table(),
    )
}

/// Checks that a party row exists.
///
/// # Errors
///
/// `NotFound` naming the party kind and id.
pub async fn ensure_party_exists<'a, E>(
    executor: E,
    party_type: PartyType,
    id: i64,
) -> Result<(), AppError>
where
    E: sqlx::Executor<'a, Database = Postgres>,
{
    let sql = format!("SELECT 1 FROM {} WHERE id = $1", party_type.table());
    let exists: Option<i32> = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    match exists {
        Some(_) => Ok(()),
        None => Err(AppError::not_found(format!("{} {} not found", party_type, id))),
    }
}

/// Resolves the counterparty of a document inside its transaction.
///
/// An explicit id must exist. Without an id the first row whose name
/// matches exactly wins; if none matches a minimal row is inserted with
/// the table's default balance.
#[instrument(skip(tx, lookup), fields(party_type = %party_type))]
pub async fn resolve_party(
    tx: &mut Transaction<'_, Postgres>,
    party_type: PartyType,
    lookup: &PartyLookup<'_>,
) -> Result<i64, AppError> {
    if let Some(id) = lookup.id {
        ensure_party_exists(&mut **tx, party_type, id).await?;
        return Ok(id);
    }

    let name = optional_text(lookup.name).ok_or_else(|| {
        AppError::validation(format!(
            "{pt}_id or {pt}_name required for {pt} party",
            pt = party_type
        ))
    })?;

    let find_sql = format!(
        "SELECT id FROM {} WHERE {} = $1 ORDER BY id LIMIT 1",
        party_type.table(),
        party_type.name_column()
    );
    let existing: Option<i64> = sqlx::query_scalar(&find_sql)
        .bind(&name)
        .fetch_optional(&mut **tx)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id: i64 = match party_type {
        PartyType::Vendor => {
            sqlx::query_scalar(
                "INSERT INTO vendors (vendor_name, firm_name, gst_no, status) \
                 VALUES ($1, $2, $3, 'active') RETURNING id",
            )
            .bind(&name)
            .bind(lookup.firm_name.unwrap_or(""))
            .bind(optional_text(lookup.gst_no))
            .fetch_one(&mut **tx)
            .await?
        }
        PartyType::Farmer | PartyType::Customer => {
            let sql = format!(
                "INSERT INTO {} (name, status) VALUES ($1, $2) RETURNING id",
                party_type.table()
            );
            sqlx::query_scalar(&sql)
                .bind(&name)
                .bind(party_type.default_status())
                .fetch_one(&mut **tx)
                .await?
        }
    };

    info!(party_id = id, name = %name, "Created party from document");
    Ok(id)
}

/// Creates a party of the given kind.
#[instrument(skip(pool, input), fields(party_type = %party_type))]
pub async fn create_party(
    pool: &PgPool,
    party_type: PartyType,
    input: &CreateParty,
) -> Result<Party, AppError> {
    let name = require_text(input.name.as_deref(), "name")?;
    if let Some(balance) = input.min_balance {
        if balance < Decimal::ZERO {
            return Err(AppError::validation("min_balance must not be negative"));
        }
    }

    let id: i64 = match party_type {
        PartyType::Vendor => {
            sqlx::query_scalar(
                "INSERT INTO vendors (vendor_name, firm_name, gst_no, address, contact_number, status, balance, min_balance) \
                 VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 0), COALESCE($8, 0)) RETURNING id",
            )
            .bind(&name)
            .bind(input.firm_name.as_deref().unwrap_or(""))
            .bind(optional_text(input.gst_no.as_deref()))
            .bind(optional_text(input.address.as_deref()))
            .bind(optional_text(input.contact_number.as_deref()))
            .bind(input.status.as_deref().unwrap_or(party_type.default_status()))
            .bind(input.balance)
            .bind(input.min_balance)
            .fetch_one(pool)
            .await?
        }
        PartyType::Farmer | PartyType::Customer => {
            let default_min = match party_type {
                PartyType::Farmer => Decimal::new(5000, 0),
                _ => Decimal::ZERO,
            };
            let sql = format!(
                "INSERT INTO {} (name, address, contact_number, status, balance, min_balance) \
                 VALUES ($1, $2, $3, $4, COALESCE($5, 0), $6) RETURNING id",
                party_type.table()
            );
            sqlx::query_scalar(&sql)
                .bind(&name)
                .bind(optional_text(input.address.as_deref()))
                .bind(optional_text(input.contact_number.as_deref()))
                .bind(input.status.as_deref().unwrap_or(party_type.default_status()))
                .bind(input.balance)
                .bind(input.min_balance.unwrap_or(default_min))
                .fetch_one(pool)
                .await?
        }
    };

    info!(party_id = id, "Party created");
    get_party(pool, party_type, id).await
}

pub async fn get_party(pool: &PgPool, party_type: PartyType, id: i64) -> Result<Party, AppError> {
    let sql = format!("{} WHERE id = $1", select_party_sql(party_type));
    sqlx::query_as::<_, Party>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("{} {} not found", party_type, id)))
}

pub async fn list_parties(pool: &PgPool, party_type: PartyType) -> Result<Vec<Party>, AppError> {
    let sql = format!("{} ORDER BY id DESC", select_party_sql(party_type));
    let parties = sqlx::query_as::<_, Party>(&sql).fetch_all(pool).await?;
    Ok(parties)
}
