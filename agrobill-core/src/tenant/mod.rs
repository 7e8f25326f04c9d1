pub mod code;
pub mod extract;
pub mod tables;

pub use code::{normalize_tenant_code, TenantCode};
pub use extract::CompanyCode;
pub use tables::{physical_table_name, provision_tenant_tables, TenantEntity, TenantTables};
