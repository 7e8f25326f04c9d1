use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, Transaction};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, instrument};

use crate::error::StockError;

/// Result of one stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub product_id: i64,
    pub delta: Decimal,
    pub new_stock: Decimal,
}

/// Computes the stock level after applying `delta`, refusing to go below zero.
pub fn checked_stock(product_id: i64, on_hand: Decimal, delta: Decimal) -> Result<Decimal, StockError> {
    let updated = on_hand + delta;
    if updated < Decimal::ZERO {
        return Err(StockError::NegativeStock {
            product_id,
            on_hand,
            delta,
        });
    }
    Ok(updated)
}

/// The only writer of `products.size`.
///
/// Every adjustment locks the product row with `SELECT ... FOR UPDATE`
/// inside the caller's transaction before the read-modify-write, so two
/// documents touching the same product serialize on that row until one
/// of them commits or rolls back.
pub struct Inventory;

impl Inventory {
    /// Locks the product row and applies `delta` to its stock.
    ///
    /// # Errors
    ///
    /// `ProductNotFound` if the row does not exist, `NegativeStock` if the
    /// result would drop below zero. The caller must abandon the
    /// transaction on error.
    #[instrument(skip(tx))]
    pub async fn adjust_stock(
        tx: &mut Transaction<'_, Postgres>,
        product_id: i64,
        delta: Decimal,
    ) -> Result<Decimal, StockError> {
        let on_hand: Option<Decimal> =
            sqlx::query_scalar("SELECT size FROM products WHERE id = $1 FOR UPDATE")
                .bind(product_id)
                .fetch_optional(&mut **tx)
                .await?;

        let on_hand = on_hand.ok_or(StockError::ProductNotFound(product_id))?;
        let updated = checked_stock(product_id, on_hand, delta)?;

        sqlx::query("UPDATE products SET size = $2, updated_at = NOW() WHERE id = $1")
            .bind(product_id)
            .bind(updated)
            .execute(&mut **tx)
            .await?;

        debug!(product_id, %on_hand, %delta, %updated, "Stock adjusted");
        Ok(updated)
    }

    /// Applies netted per-product deltas in ascending product id order.
    ///
    /// The fixed order keeps concurrent documents from acquiring the same
    /// product locks in opposite orders.
    pub async fn apply(
        tx: &mut Transaction<'_, Postgres>,
        deltas: &BTreeMap<i64, Decimal>,
    ) -> Result<Vec<StockChange>, StockError> {
        let mut changes = Vec::with_capacity(deltas.len());
        for (&product_id, &delta) in deltas {
            if delta.is_zero() {
                continue;
            }
            let new_stock = Self::adjust_stock(tx, product_id, delta).await?;
            changes.push(StockChange {
                product_id,
                delta,
                new_stock,
            });
        }
        Ok(changes)
    }

    /// Verifies every referenced product exists, reporting the first missing
    /// one in `product_ids` order.
    pub async fn ensure_products_exist(
        tx: &mut Transaction<'_, Postgres>,
        product_ids: &[i64],
    ) -> Result<(), StockError> {
        if product_ids.is_empty() {
            return Ok(());
        }

        let found: Vec<i64> = sqlx::query_scalar("SELECT id FROM products WHERE id = ANY($1)")
            .bind(product_ids)
            .fetch_all(&mut **tx)
            .await?;
        let found: HashSet<i64> = found.into_iter().collect();

        match product_ids.iter().find(|id| !found.contains(id)) {
            Some(&missing) => Err(StockError::ProductNotFound(missing)),
            None => Ok(()),
        }
    }
}
