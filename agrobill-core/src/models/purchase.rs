use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::party::PartyType;

/// Measurement unit of a document line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "varchar", rename_all = "UPPERCASE")]
pub enum Unit {
    Kg,
    Gm,
    #[default]
    Pcs,
    Ltr,
}

/// Purchase header, read from a company's `purchases` table joined with
/// the party name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Purchase {
    pub id: i64,
    pub vendor_id: Option<i64>,
    pub farmer_id: Option<i64>,
    pub party_type: PartyType,

    /// Vendor or farmer name, chosen by `party_type`
    pub party_name: Option<String>,

    pub firm_name: Option<String>,
    pub gst_no: Option<String>,
    pub bill_no: String,
    pub bill_date: NaiveDate,

    /// Always the sum of the item totals
    pub total_amount: Decimal,

    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Purchase line joined with its product name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseItem {
    pub id: i64,
    pub purchase_id: i64,
    pub product_id: i64,
    pub product_name: Option<String>,
    pub rate: Decimal,

    /// Quantity received
    pub size: Decimal,

    pub unit: Unit,
    pub status: String,

    /// `rate * size`, generated by the database
    pub total: Decimal,
}
