use sqlx::PgConnection;
use std::fmt;
use tracing::{info, instrument};

use crate::tenant::code::TenantCode;

/// Logical entities that every company owns a private table for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TenantEntity {
    Purchases,
    PurchaseItems,
    Sales,
    SaleItems,
    SalePayments,
}

impl TenantEntity {
    pub const ALL: [TenantEntity; 5] = [
        TenantEntity::Purchases,
        TenantEntity::PurchaseItems,
        TenantEntity::Sales,
        TenantEntity::SaleItems,
        TenantEntity::SalePayments,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TenantEntity::Purchases => "purchases",
            TenantEntity::PurchaseItems => "purchase_items",
            TenantEntity::Sales => "sales",
            TenantEntity::SaleItems => "sale_items",
            TenantEntity::SalePayments => "sale_payments",
        }
    }

    /// Shared template the per-company table is cloned from.
    pub fn template_table(self) -> String {
        format!("tpl_{}", self.as_str())
    }
}

impl fmt::Display for TenantEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical table name for `entity` owned by `code`.
///
/// Pure: the same inputs always produce the same name.
pub fn physical_table_name(code: &TenantCode, entity: TenantEntity) -> String {
    format!("{}_{}", code.as_str(), entity.as_str())
}

/// Table resolver bound to one company.
///
/// Services receive one of these instead of the raw code, so SQL is only
/// ever built from identifiers produced here.
#[derive(Debug, Clone)]
pub struct TenantTables {
    code: TenantCode,
}

impl TenantTables {
    pub fn new(code: TenantCode) -> Self {
        Self { code }
    }

    pub fn code(&self) -> &TenantCode {
        &self.code
    }

    /// Double-quoted identifier ready to be interpolated into SQL.
    pub fn table(&self, entity: TenantEntity) -> String {
        format!("\"{}\"", physical_table_name(&self.code, entity))
    }

    pub fn purchases(&self) -> String {
        self.table(TenantEntity::Purchases)
    }

    pub fn purchase_items(&self) -> String {
        self.table(TenantEntity::PurchaseItems)
    }

    pub fn sales(&self) -> String {
        self.table(TenantEntity::Sales)
    }

    pub fn sale_items(&self) -> String {
        self.table(TenantEntity::SaleItems)
    }

    pub fn sale_payments(&self) -> String {
        self.table(TenantEntity::SalePayments)
    }
}

/// DDL statements that create a company's tables if they do not exist yet.
pub fn provisioning_statements(code: &TenantCode) -> Vec<String> {
    TenantEntity::ALL
        .iter()
        .map(|entity| {
            format!(
                "CREATE TABLE IF NOT EXISTS \"{}\" (LIKE {} INCLUDING ALL)",
                physical_table_name(code, *entity),
                entity.template_table()
            )
        })
        .collect()
}

/// Ensures every per-company table exists, cloned from its template.
///
/// Idempotent: running it again for the same code is a no-op.
#[instrument(skip(conn), fields(company = %code))]
pub async fn provision_tenant_tables(
    conn: &mut PgConnection,
    code: &TenantCode,
) -> Result<(), sqlx::Error> {
    for statement in provisioning_statements(code) {
        sqlx::query(&statement).execute(&mut *conn).await?;
    }

    info!("Company tables provisioned");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::code::normalize_tenant_code;

    fn acme() -> TenantCode {
        normalize_tenant_code("acme").expect("valid code")
    }

    #[test]
    fn test_physical_table_name_is_deterministic() {
        let code = acme();
        assert_eq!(physical_table_name(&code, TenantEntity::Purchases), "acme_purchases");
        assert_eq!(
            physical_table_name(&code, TenantEntity::Purchases),
            physical_table_name(&code, TenantEntity::Purchases)
        );
        assert_eq!(physical_table_name(&code, TenantEntity::SalePayments), "acme_sale_payments");
    }

    #[test]
    fn test_tables_are_quoted() {
        let tables = TenantTables::new(acme());
        assert_eq!(tables.sale_items(), "\"acme_sale_items\"");
        assert_eq!(tables.purchase_items(), "\"acme_purchase_items\"");
    }

    #[test]
    fn test_provisioning_covers_every_entity() {
        let statements = provisioning_statements(&acme());
        assert_eq!(statements.len(), TenantEntity::ALL.len());
        assert_eq!(
            statements[0],
            "CREATE TABLE IF NOT EXISTS \"acme_purchases\" (LIKE tpl_purchases INCLUDING ALL)"
        );
        assert!(statements.iter().all(|s| s.contains("IF NOT EXISTS")));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_provisioning_twice_is_a_no_op() {
        let pool = crate::test_support::create_test_pool()
            .await
            .expect("Failed to create test pool");
        let tables = crate::test_support::provision_company(&pool).await;

        let sql = format!(
            "INSERT INTO {} (party_type, amount, payment_date) VALUES ('customer', 10, CURRENT_DATE)",
            tables.sale_payments()
        );
        sqlx::query(&sql).execute(&pool).await.expect("insert payment");

        let mut conn = pool.acquire().await.expect("connection");
        provision_tenant_tables(&mut *conn, tables.code())
            .await
            .expect("second provisioning");

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", tables.sale_payments()))
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_companies_do_not_share_rows() {
        let pool = crate::test_support::create_test_pool()
            .await
            .expect("Failed to create test pool");
        let first = crate::test_support::provision_company(&pool).await;
        let second = crate::test_support::provision_company(&pool).await;

        let sql = format!(
            "INSERT INTO {} (party_type, amount, payment_date) VALUES ('customer', 10, CURRENT_DATE)",
            first.sale_payments()
        );
        sqlx::query(&sql).execute(&pool).await.expect("insert payment");

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", second.sale_payments()))
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count, 0);
    }
}
