use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::party::PartyType;

/// Purchase order or sales order header.
///
/// Both kinds share one shape; see `orders::OrderKind` for the tables.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderHeader {
    pub id: i64,
    pub order_no: String,
    pub party_type: PartyType,
    pub vendor_id: Option<i64>,
    pub farmer_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub party_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub bill_time: Option<NaiveTime>,
    pub address: String,
    pub mobile_no: String,
    pub gst_no: String,
    pub place_of_supply: String,
    pub terms_condition: String,

    /// Taxable total (after discounts, before GST)
    pub total_amount: Decimal,

    pub gst_amount: Decimal,
    pub final_amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order line with its derived amounts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: Option<String>,
    pub hsn_code: String,
    pub qty: Decimal,
    pub rate: Decimal,

    /// Discount percentage applied to each unit's rate
    pub discount_per_qty: Decimal,

    pub gst_percent: Decimal,
    pub amount: Decimal,

    /// Discount per unit in currency
    pub discount_rate: Decimal,

    pub discount_total: Decimal,
    pub gst_amount: Decimal,
    pub final_amount: Decimal,
    pub status: String,
}
