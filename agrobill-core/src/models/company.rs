use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Company (tenant) registry row.
///
/// `code` is the normalized identifier that prefixes the company's private
/// tables.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub gst_no: Option<String>,
    pub contact_no: Option<String>,
    pub email: Option<String>,
    pub owner_name: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Company creation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCompany {
    pub code: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub gst_no: Option<String>,
    pub contact_no: Option<String>,
    pub email: Option<String>,
    pub owner_name: Option<String>,
}
