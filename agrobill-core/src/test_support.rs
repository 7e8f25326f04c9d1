//! Fixtures for the database-backed tests.
//!
//! These need a PostgreSQL database in `DATABASE_URL`; the tests using them
//! are `#[ignore]`d and run with `cargo test -- --ignored`.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::party::PartyType;
use crate::tenant::{normalize_tenant_code, provision_tenant_tables, TenantTables};

/// Connects to the test database and brings the schema up to date.
pub async fn create_test_pool() -> Result<PgPool, anyhow::Error> {
    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL not set for tests"))?;

    let pool = PgPool::connect(&database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// Provisions a company with a random code so tests never share tables.
pub async fn provision_company(pool: &PgPool) -> TenantTables {
    let raw = format!("t_{}", &Uuid::new_v4().simple().to_string()[..12]);
    let code = normalize_tenant_code(&raw).expect("generated code is valid");

    let mut conn = pool.acquire().await.expect("connection");
    provision_tenant_tables(&mut *conn, &code)
        .await
        .expect("provisioning succeeds");

    TenantTables::new(code)
}

pub async fn create_product(pool: &PgPool, stock: Decimal) -> i64 {
    sqlx::query_scalar("INSERT INTO products (product_name, size) VALUES ($1, $2) RETURNING id")
        .bind(format!("Test product {}", Uuid::new_v4()))
        .bind(stock)
        .fetch_one(pool)
        .await
        .expect("product insert")
}

pub async fn stock_of(pool: &PgPool, product_id: i64) -> Decimal {
    sqlx::query_scalar("SELECT size FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .expect("product exists")
}

pub async fn create_party(pool: &PgPool, party_type: PartyType) -> i64 {
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ($1) RETURNING id",
        party_type.table(),
        party_type.name_column()
    );
    sqlx::query_scalar(&sql)
        .bind(format!("Test {} {}", party_type, Uuid::new_v4()))
        .fetch_one(pool)
        .await
        .expect("party insert")
}

/// Id of a product that certainly does not exist.
pub async fn missing_product_id(pool: &PgPool) -> i64 {
    let max: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM products")
        .fetch_one(pool)
        .await
        .expect("max id");
    max.unwrap_or(0) + 1_000_000
}

/// Database error carrying only a SQLSTATE, for exercising error mapping
/// without a server.
#[derive(Debug)]
pub struct FakeDbError {
    code: &'static str,
}

impl std::fmt::Display for FakeDbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "database error {}", self.code)
    }
}

impl std::error::Error for FakeDbError {}

impl sqlx::error::DatabaseError for FakeDbError {
    fn message(&self) -> &str {
        "fake database error"
    }

    fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
        Some(std::borrow::Cow::Borrowed(self.code))
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        match self.code {
            "23505" => sqlx::error::ErrorKind::UniqueViolation,
            "23514" => sqlx::error::ErrorKind::CheckViolation,
            _ => sqlx::error::ErrorKind::Other,
        }
    }
}

pub fn db_error(code: &'static str) -> sqlx::Error {
    sqlx::Error::Database(Box::new(FakeDbError { code }))
}
