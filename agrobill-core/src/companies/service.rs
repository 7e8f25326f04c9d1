use sqlx::PgPool;
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::company::{Company, CreateCompany};
use crate::tenant::{normalize_tenant_code, provision_tenant_tables};
use crate::validation::{optional_text, require_text};

const SELECT_COMPANY: &str = "SELECT id, code, name, address, gst_no, contact_no, email, owner_name, \
     status, created_at, updated_at FROM companies";

/// Registers a company and provisions its private tables.
///
/// The registry row and the tables are created in one transaction, so a
/// failed provisioning leaves no half-registered company behind.
///
/// # Errors
///
/// `InvalidTenantCode` when the code normalizes to nothing, `Conflict`
/// when the normalized code is already registered.
#[instrument(skip(pool, input))]
pub async fn create_company(pool: &PgPool, input: &CreateCompany) -> Result<Company, AppError> {
    let raw_code = require_text(input.code.as_deref(), "code")?;
    let code = normalize_tenant_code(&raw_code)?;
    let name = require_text(input.name.as_deref(), "name")?;

    let mut tx = pool.begin().await?;

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM companies WHERE code = $1")
        .bind(code.as_str())
        .fetch_optional(&mut *tx)
        .await?;
    if existing.is_some() {
        return Err(AppError::conflict(format!("company code {} already exists", code)));
    }

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO companies (code, name, address, gst_no, contact_no, email, owner_name)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(code.as_str())
    .bind(&name)
    .bind(optional_text(input.address.as_deref()))
    .bind(optional_text(input.gst_no.as_deref()))
    .bind(optional_text(input.contact_no.as_deref()))
    .bind(optional_text(input.email.as_deref()))
    .bind(optional_text(input.owner_name.as_deref()))
    .fetch_one(&mut *tx)
    .await?;

    provision_tenant_tables(&mut *tx, &code).await?;

    let sql = format!("{} WHERE id = $1", SELECT_COMPANY);
    let company = sqlx::query_as::<_, Company>(&sql)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(company_id = id, code = %code, "Company registered");
    Ok(company)
}

pub async fn list_companies(pool: &PgPool) -> Result<Vec<Company>, AppError> {
    let sql = format!("{} ORDER BY id DESC", SELECT_COMPANY);
    let companies = sqlx::query_as::<_, Company>(&sql).fetch_all(pool).await?;
    Ok(companies)
}
