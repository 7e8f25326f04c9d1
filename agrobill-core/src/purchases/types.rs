use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calc::purchase_line_total;
use crate::error::AppError;
use crate::inventory::StockChange;
use crate::models::party::PartyType;
use crate::models::purchase::{Purchase, PurchaseItem, Unit};
use crate::parties::PartyLookup;
use crate::reconcile::IncomingLine;
use crate::validation::{
    non_negative, optional_text, parse_date, parse_party_type, positive_quantity, product_id,
    require_text,
};

/// One line of a purchase request.
///
/// `id` is set when the line already exists and should be updated in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurchaseItemInput {
    pub id: Option<i64>,
    pub product_id: Option<i64>,
    pub rate: Option<Decimal>,

    /// Quantity received
    pub size: Option<Decimal>,

    pub unit: Option<Unit>,
}

/// Create or update payload for a purchase.
///
/// The party is given either by id or by name; a name that matches no
/// existing vendor or farmer creates one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Fallback when neither header nor query string carries the code
    pub company_code: Option<String>,

    pub party_type: Option<String>,
    pub vendor_id: Option<i64>,
    pub farmer_id: Option<i64>,
    pub vendor_name: Option<String>,
    pub farmer_name: Option<String>,
    pub firm_name: Option<String>,
    pub gst_no: Option<String>,
    pub bill_no: Option<String>,
    pub bill_date: Option<String>,
    pub status: Option<String>,

    #[serde(default)]
    pub items: Vec<PurchaseItemInput>,
}

/// A checked purchase line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseLine {
    pub id: Option<i64>,
    pub product_id: i64,
    pub rate: Decimal,
    pub size: Decimal,
    pub unit: Unit,

    /// `rate * size`, rounded
    pub total: Decimal,
}

impl IncomingLine for PurchaseLine {
    fn line_id(&self) -> Option<i64> {
        self.id
    }

    fn product_id(&self) -> i64 {
        self.product_id
    }

    fn quantity(&self) -> Decimal {
        self.size
    }
}

/// A purchase request that passed every check that needs no database.
#[derive(Debug, Clone)]
pub struct ValidatedPurchase {
    pub party_type: PartyType,
    pub party_id: Option<i64>,
    pub party_name: Option<String>,
    pub firm_name: Option<String>,
    pub gst_no: Option<String>,
    pub bill_no: String,
    pub bill_date: NaiveDate,
    pub status: String,
    pub lines: Vec<PurchaseLine>,
}

const PURCHASE_PARTIES: [PartyType; 2] = [PartyType::Vendor, PartyType::Farmer];
const PURCHASE_STATUSES: [&str; 2] = ["Active", "Inactive"];

impl PurchaseRequest {
    /// Checks the payload in the order a client would fix it: items, bill
    /// fields, party, then each line.
    pub fn validate(&self) -> Result<ValidatedPurchase, AppError> {
        if self.items.is_empty() {
            return Err(AppError::validation("items must be a non-empty array"));
        }
        let bill_no = require_text(self.bill_no.as_deref(), "bill_no")?;
        let bill_date = parse_date(self.bill_date.as_deref(), "bill_date")?;
        let party_type = parse_party_type(self.party_type.as_deref(), &PURCHASE_PARTIES)?;

        let (party_id, party_name) = match party_type {
            PartyType::Farmer => (self.farmer_id, optional_text(self.farmer_name.as_deref())),
            _ => (self.vendor_id, optional_text(self.vendor_name.as_deref())),
        };
        if party_id.is_none() && party_name.is_none() {
            return Err(AppError::validation(format!(
                "{pt}_id or {pt}_name required for {pt} party",
                pt = party_type
            )));
        }

        let status = optional_text(self.status.as_deref()).unwrap_or_else(|| "Active".to_string());
        if !PURCHASE_STATUSES.contains(&status.as_str()) {
            return Err(AppError::validation("status must be 'Active' | 'Inactive'"));
        }

        let lines = self
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let line = index + 1;
                let rate = non_negative(item.rate, &format!("item {}: rate", line))?;
                let size = positive_quantity(item.size, line)?;
                Ok(PurchaseLine {
                    id: item.id,
                    product_id: product_id(item.product_id, line)?,
                    rate,
                    size,
                    unit: item.unit.unwrap_or_default(),
                    total: purchase_line_total(rate, size)?,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(ValidatedPurchase {
            party_type,
            party_id,
            party_name,
            firm_name: optional_text(self.firm_name.as_deref()),
            gst_no: optional_text(self.gst_no.as_deref()),
            bill_no,
            bill_date,
            status,
            lines,
        })
    }
}

impl ValidatedPurchase {
    pub fn lookup(&self) -> PartyLookup<'_> {
        PartyLookup {
            id: self.party_id,
            name: self.party_name.as_deref(),
            firm_name: self.firm_name.as_deref(),
            gst_no: self.gst_no.as_deref(),
        }
    }

    /// Sum of the line totals, equal to the stored header total after commit.
    pub fn expected_total(&self) -> Decimal {
        self.lines.iter().map(|line| line.total).sum()
    }
}

/// Response of a successful create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseCreated {
    pub message: String,
    pub purchase_id: i64,
    pub bill_no: String,
    pub total_amount: Decimal,
    pub stock: Vec<StockChange>,
}

/// Response of a successful update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseUpdated {
    pub message: String,
    pub purchase_id: i64,
    pub total_amount: Decimal,
    pub stock: Vec<StockChange>,
}

/// Purchase header with its lines nested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseWithItems {
    #[serde(flatten)]
    pub purchase: Purchase,
    pub items: Vec<PurchaseItem>,
}
