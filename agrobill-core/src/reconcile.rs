//! Three-way reconciliation of a document's stored lines against an
//! incoming line list.
//!
//! Item identity decides what happens to each line:
//!
//! - incoming line with a known id: updated in place, stock moves by the
//!   quantity delta
//! - incoming line without an id: inserted, stock moves by its full quantity
//! - stored line whose id is absent from the incoming list: deleted, its
//!   quantity is reversed out of stock
//!
//! The three cases partition the union of stored and incoming ids. The plan
//! is pure; services apply the row changes and hand the netted stock deltas
//! to [`crate::inventory::Inventory::apply`].

use rust_decimal::Decimal;
use sqlx::FromRow;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::AppError;

/// How a document's quantities move product stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDirection {
    /// Goods received: more quantity means more stock (purchases).
    Inbound,
    /// Goods issued: more quantity means less stock (sale updates).
    Outbound,
    /// No stock effect (quotations and orders).
    Untracked,
}

impl StockDirection {
    /// Stock delta for a line quantity change of `quantity`.
    pub fn stock_delta(self, quantity: Decimal) -> Decimal {
        match self {
            StockDirection::Inbound => quantity,
            StockDirection::Outbound => -quantity,
            StockDirection::Untracked => Decimal::ZERO,
        }
    }
}

/// A line as currently stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct StoredLine {
    pub id: i64,
    pub product_id: i64,
    pub quantity: Decimal,
}

/// Identity, product and quantity of an incoming line.
pub trait IncomingLine {
    fn line_id(&self) -> Option<i64>;
    fn product_id(&self) -> i64;
    fn quantity(&self) -> Decimal;
}

/// Row and stock changes needed to turn the stored lines into the incoming
/// ones.
#[derive(Debug)]
pub struct ReconcilePlan<'a, T> {
    /// Incoming lines that replace a stored line with the same id
    pub updates: Vec<(StoredLine, &'a T)>,
    /// Incoming lines without an id
    pub inserts: Vec<&'a T>,
    /// Stored lines missing from the incoming list
    pub removals: Vec<StoredLine>,
    /// Net stock change per product, zero entries dropped
    pub stock_deltas: BTreeMap<i64, Decimal>,
}

impl<'a, T> ReconcilePlan<'a, T> {
    /// Products referenced by incoming lines, in input order, deduplicated.
    pub fn incoming_products(&self) -> Vec<i64>
    where
        T: IncomingLine,
    {
        let mut seen = HashSet::new();
        self.updates
            .iter()
            .map(|(_, line)| line.product_id())
            .chain(self.inserts.iter().map(|line| line.product_id()))
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

fn stock_change_out_of_range() -> AppError {
    AppError::validation("stock change out of range")
}

/// Nets `delta` into the running change for `product_id`.
fn add_delta(
    deltas: &mut BTreeMap<i64, Decimal>,
    product_id: i64,
    delta: Decimal,
) -> Result<(), AppError> {
    let entry = deltas.entry(product_id).or_insert(Decimal::ZERO);
    *entry = entry.checked_add(delta).ok_or_else(stock_change_out_of_range)?;
    Ok(())
}

/// Builds the reconciliation plan for an update.
///
/// # Errors
///
/// Returns a validation error when an incoming id appears twice, does
/// not belong to the document, or the netted stock change overflows.
pub fn plan<'a, T: IncomingLine>(
    stored: &[StoredLine],
    incoming: &'a [T],
    direction: StockDirection,
) -> Result<ReconcilePlan<'a, T>, AppError> {
    let by_id: HashMap<i64, StoredLine> = stored.iter().map(|line| (line.id, *line)).collect();
    let mut seen_ids = HashSet::new();
    let mut deltas: BTreeMap<i64, Decimal> = BTreeMap::new();

    let mut updates = Vec::new();
    let mut inserts = Vec::new();

    for line in incoming {
        match line.line_id() {
            Some(id) => {
                if !seen_ids.insert(id) {
                    return Err(AppError::validation(format!("item {} appears more than once", id)));
                }
                let previous = by_id.get(&id).copied().ok_or_else(|| {
                    AppError::validation(format!("item {} does not belong to this document", id))
                })?;

                if previous.product_id == line.product_id() {
                    let change = line
                        .quantity()
                        .checked_sub(previous.quantity)
                        .ok_or_else(stock_change_out_of_range)?;
                    add_delta(&mut deltas, line.product_id(), direction.stock_delta(change))?;
                } else {
                    add_delta(
                        &mut deltas,
                        previous.product_id,
                        -direction.stock_delta(previous.quantity),
                    )?;
                    add_delta(&mut deltas, line.product_id(), direction.stock_delta(line.quantity()))?;
                }
                updates.push((previous, line));
            }
            None => {
                add_delta(&mut deltas, line.product_id(), direction.stock_delta(line.quantity()))?;
                inserts.push(line);
            }
        }
    }

    let removals: Vec<StoredLine> = stored
        .iter()
        .filter(|line| !seen_ids.contains(&line.id))
        .copied()
        .collect();
    for line in &removals {
        add_delta(&mut deltas, line.product_id, -direction.stock_delta(line.quantity))?;
    }

    deltas.retain(|_, delta| !delta.is_zero());

    Ok(ReconcilePlan {
        updates,
        inserts,
        removals,
        stock_deltas: deltas,
    })
}

/// Plan for a brand-new document: every line is an insert.
///
/// Lines carrying an id are rejected, since nothing is stored yet.
pub fn plan_new<'a, T: IncomingLine>(
    incoming: &'a [T],
    direction: StockDirection,
) -> Result<ReconcilePlan<'a, T>, AppError> {
    plan(&[], incoming, direction)
}
