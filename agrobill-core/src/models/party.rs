use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Counterparty kind on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum PartyType {
    Customer,
    Vendor,
    Farmer,
}

impl PartyType {
    pub fn as_str(self) -> &'static str {
        match self {
            PartyType::Customer => "customer",
            PartyType::Vendor => "vendor",
            PartyType::Farmer => "farmer",
        }
    }

    /// Global table holding parties of this kind.
    pub fn table(self) -> &'static str {
        match self {
            PartyType::Customer => "customers",
            PartyType::Vendor => "vendors",
            PartyType::Farmer => "farmers",
        }
    }

    /// Foreign-key column used on document and payment rows.
    pub fn id_column(self) -> &'static str {
        match self {
            PartyType::Customer => "customer_id",
            PartyType::Vendor => "vendor_id",
            PartyType::Farmer => "farmer_id",
        }
    }

    /// Column holding the display name in [`PartyType::table`].
    pub fn name_column(self) -> &'static str {
        match self {
            PartyType::Vendor => "vendor_name",
            PartyType::Customer | PartyType::Farmer => "name",
        }
    }

    /// Status value given to rows created through name lookup.
    pub fn default_status(self) -> &'static str {
        match self {
            PartyType::Vendor => "active",
            PartyType::Customer | PartyType::Farmer => "Active",
        }
    }
}

impl fmt::Display for PartyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(PartyType::Customer),
            "vendor" => Ok(PartyType::Vendor),
            "farmer" => Ok(PartyType::Farmer),
            other => Err(format!("unknown party type {:?}", other)),
        }
    }
}

/// A vendor, farmer or customer row, projected onto a common shape.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Party {
    pub id: i64,

    /// `vendor_name` for vendors, `name` otherwise
    pub name: String,

    /// Vendors only
    pub firm_name: Option<String>,

    pub gst_no: Option<String>,
    pub address: Option<String>,
    pub contact_number: Option<String>,
    pub status: String,

    /// Stored balance, maintained independently of the computed due.
    pub balance: Decimal,

    pub min_balance: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Party creation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateParty {
    pub name: Option<String>,
    pub firm_name: Option<String>,
    pub gst_no: Option<String>,
    pub address: Option<String>,
    pub contact_number: Option<String>,
    pub status: Option<String>,
    pub balance: Option<Decimal>,
    pub min_balance: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_party_type_parsing() {
        assert_eq!("Vendor".parse::<PartyType>(), Ok(PartyType::Vendor));
        assert_eq!(" farmer ".parse::<PartyType>(), Ok(PartyType::Farmer));
        assert!("supplier".parse::<PartyType>().is_err());
    }

    #[test]
    fn test_party_columns() {
        assert_eq!(PartyType::Vendor.name_column(), "vendor_name");
        assert_eq!(PartyType::Farmer.id_column(), "farmer_id");
        assert_eq!(PartyType::Customer.table(), "customers");
    }
}
