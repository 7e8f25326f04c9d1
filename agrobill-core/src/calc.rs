//! Monetary arithmetic shared by every document type.
//!
//! All amounts are rounded to two decimal places per line, and header
//! totals are sums of the rounded line values, so a stored header always
//! equals the sum of its stored lines.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;
use crate::models::sale::PaymentStatus;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Largest value a `NUMERIC(12, 2)` column holds: 9999999999.99.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn out_of_range() -> AppError {
    AppError::validation("amount out of range")
}

fn mul(a: Decimal, b: Decimal) -> Result<Decimal, AppError> {
    a.checked_mul(b).ok_or_else(out_of_range)
}

fn stored(value: Decimal) -> Result<Decimal, AppError> {
    let value = round_money(value);
    if value.abs() > MAX_AMOUNT {
        return Err(out_of_range());
    }
    Ok(value)
}

fn percent_of(value: Decimal, percent: Decimal) -> Result<Decimal, AppError> {
    mul(value, percent)?.checked_div(HUNDRED).ok_or_else(out_of_range)
}

/// Purchase line value: `rate * quantity`.
pub fn purchase_line_total(rate: Decimal, quantity: Decimal) -> Result<Decimal, AppError> {
    stored(mul(rate, quantity)?)
}

/// Derived amounts of a taxable line (sale items and order items).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineAmounts {
    /// `qty * rate`
    pub amount: Decimal,
    /// Discount per unit in currency
    pub discount_rate: Decimal,
    pub discount_total: Decimal,
    pub taxable: Decimal,
    pub gst_amount: Decimal,
    /// `taxable + gst_amount`
    pub net_total: Decimal,
}

/// Computes a line where the discount is a percentage of the unit rate
/// and GST is a percentage of the discounted amount.
///
/// Fails with a validation error when a derived amount would not fit its
/// column.
pub fn line_amounts(
    qty: Decimal,
    rate: Decimal,
    discount_percent: Decimal,
    gst_percent: Decimal,
) -> Result<LineAmounts, AppError> {
    let amount = stored(mul(qty, rate)?)?;
    let discount_per_unit = percent_of(rate, discount_percent)?;
    let discount_total = stored(mul(discount_per_unit, qty)?)?;
    let taxable = amount.checked_sub(discount_total).ok_or_else(out_of_range)?;
    let gst_amount = stored(percent_of(taxable, gst_percent)?)?;
    let net_total = stored(taxable.checked_add(gst_amount).ok_or_else(out_of_range)?)?;

    Ok(LineAmounts {
        amount,
        discount_rate: round_money(discount_per_unit),
        discount_total,
        taxable,
        gst_amount,
        net_total,
    })
}

/// Header totals accumulated from line amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, FromRow)]
pub struct DocumentTotals {
    pub total_taxable: Decimal,
    pub total_gst: Decimal,
    pub total_amount: Decimal,
}

impl DocumentTotals {
    pub fn add_line(&mut self, line: &LineAmounts) {
        self.total_taxable += line.taxable;
        self.total_gst += line.gst_amount;
        self.total_amount += line.net_total;
    }
}

impl<'a> FromIterator<&'a LineAmounts> for DocumentTotals {
    fn from_iter<I: IntoIterator<Item = &'a LineAmounts>>(iter: I) -> Self {
        let mut totals = DocumentTotals::default();
        for line in iter {
            totals.add_line(line);
        }
        totals
    }
}

/// Outstanding balance: sales minus payments, never below zero.
pub fn previous_due(total_sales: Decimal, total_payments: Decimal) -> Decimal {
    (total_sales - total_payments).max(Decimal::ZERO)
}

/// Balance left after a new bill and the cash taken with it.
pub fn new_due(previous_due: Decimal, bill_total: Decimal, cash_received: Decimal) -> Decimal {
    (previous_due + bill_total - cash_received).max(Decimal::ZERO)
}

/// `Paid` once nothing is owed, `Partial` when some cash came in,
/// `Unpaid` otherwise.
pub fn payment_status(due: Decimal, cash_received: Decimal) -> PaymentStatus {
    if due <= Decimal::ZERO {
        PaymentStatus::Paid
    } else if cash_received > Decimal::ZERO {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Unpaid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_purchase_line_total_rounds() {
        assert_eq!(purchase_line_total(dec!(12.50), dec!(3)).expect("total"), dec!(37.50));
        assert_eq!(purchase_line_total(dec!(0.335), dec!(1)).expect("total"), dec!(0.34));
    }

    #[test]
    fn test_line_amounts_with_discount_and_gst() {
        let line = line_amounts(dec!(10), dec!(100), dec!(10), dec!(5)).expect("line");
        assert_eq!(line.amount, dec!(1000));
        assert_eq!(line.discount_rate, dec!(10));
        assert_eq!(line.discount_total, dec!(100));
        assert_eq!(line.taxable, dec!(900));
        assert_eq!(line.gst_amount, dec!(45));
        assert_eq!(line.net_total, dec!(945));
    }

    #[test]
    fn test_net_total_is_sum_of_rounded_parts() {
        let line = line_amounts(dec!(3), dec!(33.33), dec!(7.5), dec!(18)).expect("line");
        assert_eq!(line.net_total, line.taxable + line.gst_amount);
        assert_eq!(line.taxable, line.amount - line.discount_total);
    }

    #[test]
    fn test_overflowing_line_is_rejected() {
        let huge = dec!(10000000000000000000);
        assert!(matches!(
            line_amounts(huge, huge, Decimal::ZERO, Decimal::ZERO),
            Err(AppError::Validation(ref m)) if m == "amount out of range"
        ));
        assert!(matches!(
            line_amounts(Decimal::ONE, Decimal::MAX, dec!(50), Decimal::ZERO),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            purchase_line_total(huge, huge),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_amounts_must_fit_storage() {
        assert_eq!(MAX_AMOUNT, dec!(9999999999.99));
        assert_eq!(purchase_line_total(MAX_AMOUNT, Decimal::ONE).expect("fits"), MAX_AMOUNT);
        assert!(purchase_line_total(MAX_AMOUNT, dec!(2)).is_err());
        let line = line_amounts(dec!(9999999999), Decimal::ONE, Decimal::ZERO, dec!(1));
        assert!(matches!(line, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_document_totals_sum_lines() {
        let lines = [
            line_amounts(dec!(2), dec!(50), dec!(0), dec!(12)).expect("line"),
            line_amounts(dec!(1), dec!(199.99), dec!(5), dec!(0)).expect("line"),
        ];
        let totals: DocumentTotals = lines.iter().collect();
        assert_eq!(totals.total_taxable, lines[0].taxable + lines[1].taxable);
        assert_eq!(totals.total_gst, lines[0].gst_amount + lines[1].gst_amount);
        assert_eq!(totals.total_amount, totals.total_taxable + totals.total_gst);
    }

    #[test]
    fn test_previous_due_clamps_at_zero() {
        assert_eq!(previous_due(dec!(1000), dec!(300)), dec!(700));
        assert_eq!(previous_due(dec!(100), dec!(300)), Decimal::ZERO);
    }

    #[test]
    fn test_payment_status_derivation() {
        assert_eq!(payment_status(Decimal::ZERO, dec!(500)), PaymentStatus::Paid);
        assert_eq!(payment_status(dec!(10), dec!(500)), PaymentStatus::Partial);
        assert_eq!(payment_status(dec!(10), Decimal::ZERO), PaymentStatus::Unpaid);
        assert_eq!(new_due(dec!(200), dec!(300), dec!(600)), Decimal::ZERO);
        assert_eq!(new_due(dec!(200), dec!(300), dec!(100)), dec!(400));
    }
}
