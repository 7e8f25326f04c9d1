use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use crate::models::party::PartyType;
use crate::models::purchase::Unit;

/// Settlement state of a sale, derived from amounts owed and received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum PaymentStatus {
    Paid,
    Partial,
    Unpaid,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Paid => write!(f, "Paid"),
            PaymentStatus::Partial => write!(f, "Partial"),
            PaymentStatus::Unpaid => write!(f, "Unpaid"),
        }
    }
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Online,
    #[serde(rename = "Credit Card")]
    #[sqlx(rename = "Credit Card")]
    CreditCard,
    #[serde(rename = "UPI")]
    #[sqlx(rename = "UPI")]
    Upi,
}

/// Sale status values. `Cancelled` sales are excluded from dues.
pub const SALE_STATUS_CANCELLED: &str = "Cancelled";

/// Sale header, read from a company's `sales` table joined with the
/// party name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Sale {
    pub id: i64,
    pub customer_id: Option<i64>,
    pub vendor_id: Option<i64>,
    pub farmer_id: Option<i64>,
    pub party_type: PartyType,
    pub party_name: Option<String>,
    pub bill_no: String,
    pub bill_date: NaiveDate,
    pub total_taxable: Decimal,
    pub total_gst: Decimal,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub remarks: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sale line joined with its product name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SaleItem {
    pub id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    pub product_name: Option<String>,
    pub rate: Decimal,
    pub qty: Decimal,

    /// Discount as a percentage of `rate`
    pub discount_rate: Decimal,

    pub discount_amount: Decimal,
    pub taxable_amount: Decimal,
    pub gst_percent: Decimal,
    pub gst_amount: Decimal,
    pub net_total: Decimal,
    pub unit: Unit,
    pub total: Decimal,
    pub status: String,
}

/// Immutable ledger entry reducing a party's due.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SalePayment {
    pub id: i64,
    pub sale_id: Option<i64>,
    pub party_type: PartyType,
    pub customer_id: Option<i64>,
    pub vendor_id: Option<i64>,
    pub farmer_id: Option<i64>,
    pub payment_date: NaiveDate,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}
