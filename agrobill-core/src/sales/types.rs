use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calc::{line_amounts, DocumentTotals, LineAmounts};
use crate::error::AppError;
use crate::inventory::StockChange;
use crate::models::party::PartyType;
use crate::models::purchase::Unit;
use crate::models::sale::{PaymentMethod, PaymentStatus, Sale, SaleItem, SalePayment};
use crate::reconcile::IncomingLine;
use crate::validation::{
    non_negative, optional_text, parse_date, parse_party_type, percentage, positive_quantity,
    product_id,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaleItemInput {
    pub id: Option<i64>,
    pub product_id: Option<i64>,
    pub rate: Option<Decimal>,
    pub qty: Option<Decimal>,

    /// Discount as a percentage of `rate`
    pub discount_rate: Option<Decimal>,

    pub gst_percent: Option<Decimal>,
    pub unit: Option<Unit>,
}

/// Create or update payload for a sale.
///
/// The party id matching `party_type` is required; sales never create
/// parties by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaleRequest {
    pub company_code: Option<String>,
    pub party_type: Option<String>,
    pub customer_id: Option<i64>,
    pub vendor_id: Option<i64>,
    pub farmer_id: Option<i64>,

    /// Generated on create when absent; kept on update when absent
    pub bill_no: Option<String>,

    pub bill_date: Option<String>,
    pub status: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub remarks: Option<String>,

    /// Cash taken with the bill; only accepted on create
    pub cash_received: Option<Decimal>,

    #[serde(default)]
    pub items: Vec<SaleItemInput>,
}

/// A checked sale line with its derived amounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleLine {
    pub id: Option<i64>,
    pub product_id: i64,
    pub rate: Decimal,
    pub qty: Decimal,
    pub discount_percent: Decimal,
    pub gst_percent: Decimal,
    pub unit: Unit,
    pub amounts: LineAmounts,
}

impl IncomingLine for SaleLine {
    fn line_id(&self) -> Option<i64> {
        self.id
    }

    fn product_id(&self) -> i64 {
        self.product_id
    }

    fn quantity(&self) -> Decimal {
        self.qty
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedSale {
    pub party_type: PartyType,
    pub party_id: i64,
    pub bill_no: Option<String>,
    pub bill_date: NaiveDate,
    pub status: String,
    pub payment_method: PaymentMethod,
    pub remarks: Option<String>,
    pub cash_received: Decimal,
    pub lines: Vec<SaleLine>,
}

const SALE_PARTIES: [PartyType; 3] = [PartyType::Customer, PartyType::Vendor, PartyType::Farmer];
const SALE_STATUSES: [&str; 2] = ["Active", "Inactive"];

impl SaleRequest {
    pub fn validate(&self) -> Result<ValidatedSale, AppError> {
        let bill_date = parse_date(self.bill_date.as_deref(), "bill_date")?;
        if self.items.is_empty() {
            return Err(AppError::validation("items must be a non-empty array"));
        }
        let party_type = parse_party_type(self.party_type.as_deref(), &SALE_PARTIES)?;

        let chosen = match party_type {
            PartyType::Customer => self.customer_id,
            PartyType::Vendor => self.vendor_id,
            PartyType::Farmer => self.farmer_id,
        };
        let party_id = chosen
            .filter(|id| *id > 0)
            .ok_or_else(|| AppError::validation(format!("{}_id is required", party_type)))?;

        let status = optional_text(self.status.as_deref()).unwrap_or_else(|| "Active".to_string());
        if !SALE_STATUSES.contains(&status.as_str()) {
            return Err(AppError::validation("status must be 'Active' | 'Inactive'"));
        }

        let cash_received = non_negative(self.cash_received, "cash_received")?;

        let lines = self
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let line = index + 1;
                let qty = positive_quantity(item.qty, line)?;
                let rate = non_negative(item.rate, &format!("item {}: rate", line))?;
                let discount_percent =
                    percentage(item.discount_rate, &format!("item {}: discount_rate", line))?;
                let gst_percent = percentage(item.gst_percent, &format!("item {}: gst_percent", line))?;
                Ok(SaleLine {
                    id: item.id,
                    product_id: product_id(item.product_id, line)?,
                    rate,
                    qty,
                    discount_percent,
                    gst_percent,
                    unit: item.unit.unwrap_or_default(),
                    amounts: line_amounts(qty, rate, discount_percent, gst_percent)?,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(ValidatedSale {
            party_type,
            party_id,
            bill_no: optional_text(self.bill_no.as_deref()),
            bill_date,
            status,
            payment_method: self.payment_method.unwrap_or_default(),
            remarks: optional_text(self.remarks.as_deref()),
            cash_received,
            lines,
        })
    }
}

impl ValidatedSale {
    /// Totals the stored header will carry after commit.
    pub fn totals(&self) -> DocumentTotals {
        self.lines.iter().map(|line| &line.amounts).collect()
    }

    /// Party id columns `(customer_id, vendor_id, farmer_id)`.
    pub fn party_columns(&self) -> (Option<i64>, Option<i64>, Option<i64>) {
        party_columns(self.party_type, self.party_id)
    }
}

pub fn party_columns(party_type: PartyType, party_id: i64) -> (Option<i64>, Option<i64>, Option<i64>) {
    match party_type {
        PartyType::Customer => (Some(party_id), None, None),
        PartyType::Vendor => (None, Some(party_id), None),
        PartyType::Farmer => (None, None, Some(party_id)),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleCreated {
    pub message: String,
    pub id: i64,
    pub bill_no: String,
    pub total_taxable: Decimal,
    pub total_gst: Decimal,
    pub total_amount: Decimal,
    pub previous_due: Decimal,
    pub cash_received: Decimal,
    pub new_due: Decimal,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleUpdated {
    pub message: String,
    pub id: i64,
    pub total_taxable: Decimal,
    pub total_gst: Decimal,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub stock: Vec<StockChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleWithItems {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBillNo {
    pub bill_no: String,
}

/// Payment received from a party, optionally against one sale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub company_code: Option<String>,
    pub party_type: Option<String>,
    pub party_id: Option<i64>,
    pub sale_id: Option<i64>,
    pub amount: Option<Decimal>,

    /// Defaults to today
    pub payment_date: Option<String>,

    pub method: Option<PaymentMethod>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub message: String,
    pub payment: SalePayment,

    /// Party due after this payment
    pub previous_due: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> SaleRequest {
        SaleRequest {
            party_type: Some("customer".to_string()),
            customer_id: Some(4),
            bill_date: Some("2024-05-10".to_string()),
            items: vec![SaleItemInput {
                product_id: Some(1),
                rate: Some(dec!(100)),
                qty: Some(dec!(10)),
                discount_rate: Some(dec!(10)),
                gst_percent: Some(dec!(5)),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_derives_line_amounts() {
        let sale = request().validate().expect("valid");
        assert_eq!(sale.party_columns(), (Some(4), None, None));
        assert_eq!(sale.payment_method, PaymentMethod::Cash);
        let totals = sale.totals();
        assert_eq!(totals.total_taxable, dec!(900));
        assert_eq!(totals.total_gst, dec!(45));
        assert_eq!(totals.total_amount, dec!(945));
    }

    #[test]
    fn test_validate_requires_matching_party_id() {
        let mut sale = request();
        sale.party_type = Some("farmer".to_string());
        let err = sale.validate().expect_err("farmer id missing");
        assert_eq!(err.to_string(), "farmer_id is required");
    }

    #[test]
    fn test_validate_rejects_out_of_range_percentages() {
        let mut sale = request();
        sale.items[0].gst_percent = Some(dec!(120));
        let err = sale.validate().expect_err("gst out of range");
        assert_eq!(err.to_string(), "item 1: gst_percent must be between 0 and 100");
    }

    #[test]
    fn test_validate_rejects_amounts_that_overflow() {
        let mut sale = request();
        sale.items[0].qty = Some(dec!(10000000000000000000));
        sale.items[0].rate = Some(dec!(10000000000000000000));
        assert!(matches!(sale.validate(), Err(AppError::Validation(_))));

        let mut sale = request();
        sale.items[0].qty = Some(dec!(9999999999));
        sale.items[0].rate = Some(dec!(9999999999));
        let err = sale.validate().expect_err("line amount too large");
        assert_eq!(err.to_string(), "amount out of range");
    }

    #[test]
    fn test_validate_rejects_negative_cash() {
        let mut sale = request();
        sale.cash_received = Some(dec!(-1));
        assert!(matches!(sale.validate(), Err(AppError::Validation(_))));
    }
}
