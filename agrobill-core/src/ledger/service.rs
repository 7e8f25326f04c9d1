//! Outstanding balance of a party, computed from a company's sales and
//! payments on every call.
//!
//! The `balance` column on party rows is maintained elsewhere and is only
//! reported alongside the computed figure; it never feeds into it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres};
use tracing::{debug, instrument};

use crate::calc;
use crate::error::AppError;
use crate::models::party::PartyType;
use crate::models::sale::SALE_STATUS_CANCELLED;
use crate::tenant::TenantTables;

/// Raw sums behind a due figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromRow, Serialize, Deserialize)]
pub struct DueTotals {
    /// Sales to the party, cancelled sales excluded
    pub total_sales: Decimal,
    pub total_payments: Decimal,
}

impl DueTotals {
    pub fn previous_due(&self) -> Decimal {
        calc::previous_due(self.total_sales, self.total_payments)
    }
}

/// `GET /api/sales/party/:type/:id/previous-due` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyDue {
    pub party_type: PartyType,
    pub party_id: i64,
    pub previous_due: Decimal,
    pub total_sales: Decimal,
    pub total_payments: Decimal,

    /// Advisory stored balance from the party row
    pub stored_balance: Decimal,
}

/// Sums a party's sales and payments in one company.
///
/// Accepts a pool or an open transaction, so a sale can read the due it
/// is about to extend inside its own transaction.
pub async fn party_totals<'a, E>(
    executor: E,
    tables: &TenantTables,
    party_type: PartyType,
    party_id: i64,
) -> Result<DueTotals, AppError>
where
    E: sqlx::Executor<'a, Database = Postgres>,
{
    let sql = format!(
        "SELECT \
           COALESCE((SELECT SUM(s.total_amount) FROM {sales} s \
                     WHERE s.party_type = $1 AND s.{column} = $2 AND s.status <> $3), 0) AS total_sales, \
           COALESCE((SELECT SUM(p.amount) FROM {payments} p \
                     WHERE p.party_type = $1 AND p.{column} = $2), 0) AS total_payments",
        sales = tables.sales(),
        payments = tables.sale_payments(),
        column = party_type.id_column(),
    );

    let totals = sqlx::query_as::<_, DueTotals>(&sql)
        .bind(party_type)
        .bind(party_id)
        .bind(SALE_STATUS_CANCELLED)
        .fetch_one(executor)
        .await?;
    Ok(totals)
}

/// Current due of a party together with the sums it was derived from.
///
/// # Errors
///
/// `NotFound` when the party does not exist or the company has no tables.
#[instrument(skip(pool, tables), fields(company = %tables.code()))]
pub async fn party_due(
    pool: &PgPool,
    tables: &TenantTables,
    party_type: PartyType,
    party_id: i64,
) -> Result<PartyDue, AppError> {
    let sql = format!("SELECT balance FROM {} WHERE id = $1", party_type.table());
    let stored_balance: Decimal = sqlx::query_scalar(&sql)
        .bind(party_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("{} {} not found", party_type, party_id)))?;

    let totals = party_totals(pool, tables, party_type, party_id).await?;
    let previous_due = totals.previous_due();

    if previous_due != stored_balance {
        debug!(%previous_due, %stored_balance, "Stored balance differs from computed due");
    }

    Ok(PartyDue {
        party_type,
        party_id,
        previous_due,
        total_sales: totals.total_sales,
        total_payments: totals.total_payments,
        stored_balance,
    })
}
