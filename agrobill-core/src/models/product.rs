use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Product model representing the shared catalogue.
///
/// Products are global: every company's purchases and sales draw on the
/// same stock pool. `size` is the on-hand quantity and never goes negative.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: i64,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub product_name: String,

    /// On-hand stock
    pub size: Decimal,

    pub purchase_rate: Decimal,
    pub transport_charge: Decimal,
    pub local_transport: Decimal,
    pub packaging_cost: Decimal,
    pub packing_weight: Decimal,
    pub hsn_code: Option<String>,

    /// Computed sale value
    pub value: Decimal,

    pub discount_30: Decimal,
    pub discount_25: Decimal,
    pub discount_50: Decimal,
    pub total: Decimal,
    pub gst: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product creation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProduct {
    pub category_id: Option<i64>,
    pub product_name: Option<String>,
    /// Opening stock
    pub size: Option<Decimal>,
    pub purchase_rate: Option<Decimal>,
    pub transport_charge: Option<Decimal>,
    pub local_transport: Option<Decimal>,
    pub packaging_cost: Option<Decimal>,
    pub packing_weight: Option<Decimal>,
    pub hsn_code: Option<String>,
    pub value: Option<Decimal>,
    pub discount_30: Option<Decimal>,
    pub discount_25: Option<Decimal>,
    pub discount_50: Option<Decimal>,
    pub total: Option<Decimal>,
    pub gst: Option<Decimal>,
}
