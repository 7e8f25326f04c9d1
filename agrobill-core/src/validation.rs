//! Request field checks shared by the document services.

use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;

use crate::calc::{round_money, MAX_AMOUNT};
use crate::error::AppError;
use crate::models::party::PartyType;

/// Trimmed, non-empty text.
pub fn require_text(value: Option<&str>, field: &str) -> Result<String, AppError> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::validation(format!("{} is required", field)))
}

/// Trimmed text, `None` when blank.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, AppError> {
    let raw = require_text(value, field)?;
    if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.date_naive())
        .map_err(|_| AppError::validation(format!("{} must be a date (YYYY-MM-DD)", field)))
}

/// Parses a party type and checks it against the kinds a document allows.
pub fn parse_party_type(value: Option<&str>, allowed: &[PartyType]) -> Result<PartyType, AppError> {
    let parsed = value.and_then(|raw| raw.parse::<PartyType>().ok());
    match parsed {
        Some(party_type) if allowed.contains(&party_type) => Ok(party_type),
        _ => {
            let names: Vec<String> = allowed.iter().map(|p| format!("'{}'", p)).collect();
            Err(AppError::validation(format!(
                "party_type must be {}",
                names.join(" | ")
            )))
        }
    }
}

/// Line quantity: present and strictly positive, rounded to storage scale.
pub fn positive_quantity(value: Option<Decimal>, line: usize) -> Result<Decimal, AppError> {
    match value.map(round_money) {
        Some(qty) if qty > MAX_AMOUNT => Err(AppError::validation(format!(
            "item {}: quantity must not exceed {}",
            line, MAX_AMOUNT
        ))),
        Some(qty) if qty > Decimal::ZERO => Ok(qty),
        Some(_) => Err(AppError::validation(format!(
            "item {}: quantity must be greater than zero",
            line
        ))),
        None => Err(AppError::validation(format!("item {}: quantity is required", line))),
    }
}

/// Non-negative amount defaulting to zero, rounded to storage scale.
pub fn non_negative(value: Option<Decimal>, field: &str) -> Result<Decimal, AppError> {
    let amount = round_money(value.unwrap_or(Decimal::ZERO));
    if amount < Decimal::ZERO {
        return Err(AppError::validation(format!("{} must not be negative", field)));
    }
    if amount > MAX_AMOUNT {
        return Err(AppError::validation(format!(
            "{} must not exceed {}",
            field, MAX_AMOUNT
        )));
    }
    Ok(amount)
}

/// Percentage between 0 and 100 inclusive, defaulting to zero.
pub fn percentage(value: Option<Decimal>, field: &str) -> Result<Decimal, AppError> {
    let pct = round_money(value.unwrap_or(Decimal::ZERO));
    if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
        return Err(AppError::validation(format!("{} must be between 0 and 100", field)));
    }
    Ok(pct)
}

/// Product reference on a line.
pub fn product_id(value: Option<i64>, line: usize) -> Result<i64, AppError> {
    match value {
        Some(id) if id > 0 => Ok(id),
        _ => Err(AppError::validation(format!("item {}: product_id is required", line))),
    }
}
