use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calc::{line_amounts, DocumentTotals, LineAmounts};
use crate::error::AppError;
use crate::models::order::{OrderHeader, OrderItem};
use crate::models::party::PartyType;
use crate::reconcile::IncomingLine;
use crate::validation::{
    non_negative, optional_text, parse_date, parse_party_type, percentage, positive_quantity,
    product_id, require_text,
};

/// Which order book a request targets. Both share one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Purchase,
    Sales,
}

impl OrderKind {
    pub fn headers_table(self) -> &'static str {
        match self {
            OrderKind::Purchase => "purchase_orders",
            OrderKind::Sales => "sales_orders",
        }
    }

    pub fn items_table(self) -> &'static str {
        match self {
            OrderKind::Purchase => "purchase_order_items",
            OrderKind::Sales => "sales_order_items",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderKind::Purchase => "purchase order",
            OrderKind::Sales => "sales order",
        }
    }

    pub fn allowed_parties(self) -> &'static [PartyType] {
        match self {
            OrderKind::Purchase => &[PartyType::Vendor, PartyType::Farmer],
            OrderKind::Sales => &[PartyType::Customer, PartyType::Vendor, PartyType::Farmer],
        }
    }

    pub fn default_party(self) -> PartyType {
        match self {
            OrderKind::Purchase => PartyType::Vendor,
            OrderKind::Sales => PartyType::Customer,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderItemInput {
    pub id: Option<i64>,
    pub product_id: Option<i64>,
    pub hsn_code: Option<String>,
    pub qty: Option<Decimal>,
    pub rate: Option<Decimal>,

    /// Discount as a percentage of `rate`
    pub discount_per_qty: Option<Decimal>,

    pub gst_percent: Option<Decimal>,
    pub status: Option<String>,
}

/// Create or update payload for a purchase or sales order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderRequest {
    #[serde(alias = "po_no", alias = "so_no")]
    pub order_no: Option<String>,

    pub party_type: Option<String>,
    pub vendor_id: Option<i64>,
    pub farmer_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub date: Option<String>,

    /// `HH:MM`, `HH:MM:SS` or `YYYY-MM-DD HH:MM:SS`
    pub bill_time: Option<String>,

    pub address: Option<String>,
    pub mobile_no: Option<String>,
    pub gst_no: Option<String>,
    pub place_of_supply: Option<String>,
    pub terms_condition: Option<String>,
    pub status: Option<String>,

    #[serde(default)]
    pub items: Vec<OrderItemInput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub id: Option<i64>,
    pub product_id: i64,
    pub hsn_code: String,
    pub qty: Decimal,
    pub rate: Decimal,
    pub discount_percent: Decimal,
    pub gst_percent: Decimal,
    pub status: String,
    pub amounts: LineAmounts,
}

impl IncomingLine for OrderLine {
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
pub struct ValidatedOrder {
    pub order_no: String,
    pub party_type: PartyType,
    pub party_id: i64,
    pub date: Option<NaiveDate>,
    pub bill_time: Option<NaiveTime>,
    pub address: String,
    pub mobile_no: String,
    pub gst_no: String,
    pub place_of_supply: String,
    pub terms_condition: String,
    pub status: String,
    pub lines: Vec<OrderLine>,
}

impl ValidatedOrder {
    /// `(vendor_id, farmer_id, customer_id)`
    pub fn party_columns(&self) -> (Option<i64>, Option<i64>, Option<i64>) {
        match self.party_type {
            PartyType::Vendor => (Some(self.party_id), None, None),
            PartyType::Farmer => (None, Some(self.party_id), None),
            PartyType::Customer => (None, None, Some(self.party_id)),
        }
    }
}

fn parse_bill_time(value: Option<&str>) -> Result<Option<NaiveTime>, AppError> {
    let raw = match optional_text(value) {
        Some(raw) => raw,
        None => return Ok(None),
    };
    NaiveTime::parse_from_str(&raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.time()))
        .map(Some)
        .map_err(|_| AppError::validation("bill_time must be a time (HH:MM[:SS])"))
}

impl OrderRequest {
    pub fn validate(&self, kind: OrderKind) -> Result<ValidatedOrder, AppError> {
        let order_no = require_text(self.order_no.as_deref(), "order_no")?;
        if self.items.is_empty() {
            return Err(AppError::validation("items are required"));
        }

        let party_type = match self.party_type.as_deref() {
            Some(raw) => parse_party_type(Some(raw), kind.allowed_parties())?,
            None => kind.default_party(),
        };
        let party_id = match party_type {
            PartyType::Vendor => self.vendor_id,
            PartyType::Farmer => self.farmer_id,
            PartyType::Customer => self.customer_id,
        }
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::validation(format!("{}_id is required", party_type)))?;

        let date = match optional_text(self.date.as_deref()) {
            Some(raw) => Some(parse_date(Some(&raw), "date")?),
            None => None,
        };

        let lines = self
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let line = index + 1;
                let qty = positive_quantity(item.qty, line)?;
                let rate = non_negative(item.rate, &format!("item {}: rate", line))?;
                let discount_percent =
                    percentage(item.discount_per_qty, &format!("item {}: discount_per_qty", line))?;
                let gst_percent = percentage(item.gst_percent, &format!("item {}: gst_percent", line))?;
                Ok(OrderLine {
                    id: item.id,
                    product_id: product_id(item.product_id, line)?,
                    hsn_code: optional_text(item.hsn_code.as_deref()).unwrap_or_default(),
                    qty,
                    rate,
                    discount_percent,
                    gst_percent,
                    status: optional_text(item.status.as_deref()).unwrap_or_else(|| "Active".to_string()),
                    amounts: line_amounts(qty, rate, discount_percent, gst_percent)?,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(ValidatedOrder {
            order_no,
            party_type,
            party_id,
            date,
            bill_time: parse_bill_time(self.bill_time.as_deref())?,
            address: optional_text(self.address.as_deref()).unwrap_or_default(),
            mobile_no: optional_text(self.mobile_no.as_deref()).unwrap_or_default(),
            gst_no: optional_text(self.gst_no.as_deref()).unwrap_or_default(),
            place_of_supply: optional_text(self.place_of_supply.as_deref()).unwrap_or_default(),
            terms_condition: optional_text(self.terms_condition.as_deref()).unwrap_or_default(),
            status: optional_text(self.status.as_deref()).unwrap_or_else(|| "Issued".to_string()),
            lines,
        })
    }
}

/// Order totals as shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderSummary {
    pub total_taxable: Decimal,
    pub total_gst: Decimal,
    pub grand_total: Decimal,
}

impl From<DocumentTotals> for OrderSummary {
    fn from(totals: DocumentTotals) -> Self {
        Self {
            total_taxable: totals.total_taxable,
            total_gst: totals.total_gst,
            grand_total: totals.total_amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSaved {
    pub message: String,
    pub id: i64,
    pub order_no: String,
    pub summary: OrderSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: OrderHeader,
    pub items: Vec<OrderItem>,
    pub summary: OrderSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceParty {
    pub name: String,
    pub address: String,
    pub gst_no: String,
}

/// Printable view of a sales order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderInvoice {
    #[serde(rename = "invoiceNo")]
    pub invoice_no: String,
    pub date: Option<NaiveDate>,
    pub customer: InvoiceParty,
    pub items: Vec<OrderItem>,
    pub summary: OrderSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_order_number_aliases() {
        let po: OrderRequest = serde_json::from_value(json!({ "po_no": "PO-7" })).expect("po");
        assert_eq!(po.order_no.as_deref(), Some("PO-7"));
        let so: OrderRequest = serde_json::from_value(json!({ "so_no": "SO-3" })).expect("so");
        assert_eq!(so.order_no.as_deref(), Some("SO-3"));
    }

    #[test]
    fn test_sales_order_defaults_to_customer() {
        let request = OrderRequest {
            order_no: Some("SO-1".to_string()),
            customer_id: Some(9),
            bill_time: Some("2024-06-01 14:30:00".to_string()),
            items: vec![OrderItemInput {
                product_id: Some(1),
                qty: Some(dec!(4)),
                rate: Some(dec!(25)),
                discount_per_qty: Some(dec!(10)),
                gst_percent: Some(dec!(18)),
                ..Default::default()
            }],
            ..Default::default()
        };
        let order = request.validate(OrderKind::Sales).expect("valid");
        assert_eq!(order.party_type, PartyType::Customer);
        assert_eq!(order.party_columns(), (None, None, Some(9)));
        assert_eq!(order.status, "Issued");
        assert_eq!(order.bill_time, NaiveTime::from_hms_opt(14, 30, 0));

        let amounts = order.lines[0].amounts;
        assert_eq!(amounts.amount, dec!(100));
        assert_eq!(amounts.discount_total, dec!(10));
        assert_eq!(amounts.gst_amount, dec!(16.20));
        assert_eq!(amounts.net_total, dec!(106.20));
    }

    #[test]
    fn test_purchase_order_rejects_customer() {
        let request = OrderRequest {
            order_no: Some("PO-1".to_string()),
            party_type: Some("customer".to_string()),
            customer_id: Some(1),
            items: vec![OrderItemInput {
                product_id: Some(1),
                qty: Some(dec!(1)),
                ..Default::default()
            }],
            ..Default::default()
        };
        let err = request.validate(OrderKind::Purchase).expect_err("customer not allowed");
        assert_eq!(err.to_string(), "party_type must be 'vendor' | 'farmer'");
    }

    #[test]
    fn test_bill_time_formats() {
        assert_eq!(parse_bill_time(None).expect("none"), None);
        assert_eq!(
            parse_bill_time(Some("09:15")).expect("short"),
            NaiveTime::from_hms_opt(9, 15, 0)
        );
        assert!(parse_bill_time(Some("quarter past nine")).is_err());
    }
}
