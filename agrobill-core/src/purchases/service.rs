use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::{info, instrument};

use crate::error::AppError;
use crate::inventory::Inventory;
use crate::models::party::PartyType;
use crate::models::purchase::{Purchase, PurchaseItem};
use crate::parties::resolve_party;
use crate::purchases::types::{
    PurchaseCreated, PurchaseLine, PurchaseRequest, PurchaseUpdated, PurchaseWithItems,
    ValidatedPurchase,
};
use crate::reconcile::{self, StockDirection, StoredLine};
use crate::tenant::TenantTables;

/// Creates a purchase and receives its quantities into stock.
///
/// Runs in one transaction: party resolution, header, lines, stock
/// increments and the header total either all commit or none do.
///
/// # Errors
///
/// - `Validation` for a malformed payload
/// - `NotFound` for an unknown party or product
/// - `Conflict` for a bill number already used by this company
#[instrument(skip(pool, tables, request), fields(company = %tables.code()))]
pub async fn create_purchase(
    pool: &PgPool,
    tables: &TenantTables,
    request: &PurchaseRequest,
) -> Result<PurchaseCreated, AppError> {
    let input = request.validate()?;
    let plan = reconcile::plan_new(&input.lines, StockDirection::Inbound)?;

    let mut tx = pool.begin().await?;

    let party_id = resolve_party(&mut tx, input.party_type, &input.lookup()).await?;
    ensure_bill_no_free(&mut tx, tables, &input.bill_no, None).await?;
    Inventory::ensure_products_exist(&mut tx, &plan.incoming_products()).await?;

    let (vendor_id, farmer_id) = party_columns(input.party_type, party_id);
    let sql = format!(
        "INSERT INTO {} (vendor_id, farmer_id, party_type, gst_no, bill_no, bill_date, total_amount, status) \
         VALUES ($1, $2, $3, $4, $5, $6, 0, $7) RETURNING id",
        tables.purchases()
    );
    let purchase_id: i64 = sqlx::query_scalar(&sql)
        .bind(vendor_id)
        .bind(farmer_id)
        .bind(input.party_type)
        .bind(&input.gst_no)
        .bind(&input.bill_no)
        .bind(input.bill_date)
        .bind(&input.status)
        .fetch_one(&mut *tx)
        .await?;

    for line in &plan.inserts {
        insert_line(&mut tx, tables, purchase_id, line).await?;
    }

    let stock = Inventory::apply(&mut tx, &plan.stock_deltas).await?;
    let total_amount = refresh_total(&mut tx, tables, purchase_id).await?;
    debug_assert_eq!(input.expected_total(), total_amount);

    tx.commit().await?;

    info!(
        purchase_id,
        bill_no = %input.bill_no,
        items = input.lines.len(),
        %total_amount,
        "Purchase created"
    );

    Ok(PurchaseCreated {
        message: "Purchase created successfully".to_string(),
        purchase_id,
        bill_no: input.bill_no,
        total_amount,
        stock,
    })
}

/// Replaces a purchase's header and reconciles its lines against the
/// incoming list, moving stock by the difference.
///
/// The header row is locked first so two updates of the same purchase
/// cannot both diff against the same stored lines.
#[instrument(skip(pool, tables, request), fields(company = %tables.code()))]
pub async fn update_purchase(
    pool: &PgPool,
    tables: &TenantTables,
    purchase_id: i64,
    request: &PurchaseRequest,
) -> Result<PurchaseUpdated, AppError> {
    let input = request.validate()?;

    let mut tx = pool.begin().await?;

    lock_purchase(&mut tx, tables, purchase_id).await?;
    let party_id = resolve_party(&mut tx, input.party_type, &input.lookup()).await?;
    ensure_bill_no_free(&mut tx, tables, &input.bill_no, Some(purchase_id)).await?;
    update_header(&mut tx, tables, purchase_id, &input, party_id).await?;

    let sql = format!(
        "SELECT id, product_id, size AS quantity FROM {} WHERE purchase_id = $1 ORDER BY id",
        tables.purchase_items()
    );
    let stored: Vec<StoredLine> = sqlx::query_as(&sql)
        .bind(purchase_id)
        .fetch_all(&mut *tx)
        .await?;

    let plan = reconcile::plan(&stored, &input.lines, StockDirection::Inbound)?;
    Inventory::ensure_products_exist(&mut tx, &plan.incoming_products()).await?;

    let update_sql = format!(
        "UPDATE {} SET product_id = $3, rate = $4, size = $5, unit = $6, updated_at = NOW() \
         WHERE id = $1 AND purchase_id = $2",
        tables.purchase_items()
    );
    for (previous, line) in &plan.updates {
        sqlx::query(&update_sql)
            .bind(previous.id)
            .bind(purchase_id)
            .bind(line.product_id)
            .bind(line.rate)
            .bind(line.size)
            .bind(line.unit)
            .execute(&mut *tx)
            .await?;
    }

    for line in &plan.inserts {
        insert_line(&mut tx, tables, purchase_id, line).await?;
    }

    if !plan.removals.is_empty() {
        let removed: Vec<i64> = plan.removals.iter().map(|line| line.id).collect();
        let sql = format!(
            "DELETE FROM {} WHERE purchase_id = $1 AND id = ANY($2)",
            tables.purchase_items()
        );
        sqlx::query(&sql)
            .bind(purchase_id)
            .bind(&removed)
            .execute(&mut *tx)
            .await?;
    }

    let stock = Inventory::apply(&mut tx, &plan.stock_deltas).await?;
    let total_amount = refresh_total(&mut tx, tables, purchase_id).await?;
    debug_assert_eq!(input.expected_total(), total_amount);

    tx.commit().await?;

    info!(
        purchase_id,
        updated = plan.updates.len(),
        inserted = plan.inserts.len(),
        removed = plan.removals.len(),
        %total_amount,
        "Purchase updated"
    );

    Ok(PurchaseUpdated {
        message: "Purchase updated successfully".to_string(),
        purchase_id,
        total_amount,
        stock,
    })
}

/// One purchase with its lines.
pub async fn get_purchase(
    pool: &PgPool,
    tables: &TenantTables,
    purchase_id: i64,
) -> Result<PurchaseWithItems, AppError> {
    let sql = format!("{} WHERE p.id = $1", select_purchases(tables));
    let purchase = sqlx::query_as::<_, Purchase>(&sql)
        .bind(purchase_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("purchase {} not found", purchase_id)))?;

    let items = fetch_items(pool, tables, &[purchase_id]).await?;
    Ok(PurchaseWithItems { purchase, items })
}

/// Every purchase of the company, newest first, lines nested.
pub async fn list_purchases(
    pool: &PgPool,
    tables: &TenantTables,
) -> Result<Vec<PurchaseWithItems>, AppError> {
    let sql = format!("{} ORDER BY p.id DESC", select_purchases(tables));
    let purchases = sqlx::query_as::<_, Purchase>(&sql).fetch_all(pool).await?;

    let ids: Vec<i64> = purchases.iter().map(|p| p.id).collect();
    let mut by_purchase: HashMap<i64, Vec<PurchaseItem>> = HashMap::new();
    for item in fetch_items(pool, tables, &ids).await? {
        by_purchase.entry(item.purchase_id).or_default().push(item);
    }

    Ok(purchases
        .into_iter()
        .map(|purchase| {
            let items = by_purchase.remove(&purchase.id).unwrap_or_default();
            PurchaseWithItems { purchase, items }
        })
        .collect())
}

fn select_purchases(tables: &TenantTables) -> String {
    format!(
        "SELECT p.id, p.vendor_id, p.farmer_id, p.party_type, \
         CASE WHEN p.party_type = 'farmer' THEN f.name ELSE v.vendor_name END AS party_name, \
         v.firm_name, p.gst_no, p.bill_no, p.bill_date, p.total_amount, p.status, \
         p.created_at, p.updated_at \
         FROM {} p \
         LEFT JOIN vendors v ON v.id = p.vendor_id \
         LEFT JOIN farmers f ON f.id = p.farmer_id",
        tables.purchases()
    )
}

async fn fetch_items(
    pool: &PgPool,
    tables: &TenantTables,
    purchase_ids: &[i64],
) -> Result<Vec<PurchaseItem>, AppError> {
    if purchase_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT i.id, i.purchase_id, i.product_id, pr.product_name, i.rate, i.size, i.unit, \
         i.status, i.total \
         FROM {} i LEFT JOIN products pr ON pr.id = i.product_id \
         WHERE i.purchase_id = ANY($1) ORDER BY i.id",
        tables.purchase_items()
    );
    let items = sqlx::query_as::<_, PurchaseItem>(&sql)
        .bind(purchase_ids)
        .fetch_all(pool)
        .await?;
    Ok(items)
}

fn party_columns(party_type: PartyType, party_id: i64) -> (Option<i64>, Option<i64>) {
    match party_type {
        PartyType::Farmer => (None, Some(party_id)),
        _ => (Some(party_id), None),
    }
}

async fn lock_purchase(
    tx: &mut Transaction<'_, Postgres>,
    tables: &TenantTables,
    purchase_id: i64,
) -> Result<(), AppError> {
    let sql = format!("SELECT id FROM {} WHERE id = $1 FOR UPDATE", tables.purchases());
    let found: Option<i64> = sqlx::query_scalar(&sql)
        .bind(purchase_id)
        .fetch_optional(&mut **tx)
        .await?;
    found
        .map(|_| ())
        .ok_or_else(|| AppError::not_found(format!("purchase {} not found", purchase_id)))
}

async fn ensure_bill_no_free(
    tx: &mut Transaction<'_, Postgres>,
    tables: &TenantTables,
    bill_no: &str,
    own_id: Option<i64>,
) -> Result<(), AppError> {
    let sql = format!(
        "SELECT id FROM {} WHERE bill_no = $1 AND ($2::BIGINT IS NULL OR id <> $2)",
        tables.purchases()
    );
    let taken: Option<i64> = sqlx::query_scalar(&sql)
        .bind(bill_no)
        .bind(own_id)
        .fetch_optional(&mut **tx)
        .await?;
    match taken {
        Some(_) => Err(AppError::conflict(format!("bill_no {} already exists", bill_no))),
        None => Ok(()),
    }
}

async fn update_header(
    tx: &mut Transaction<'_, Postgres>,
    tables: &TenantTables,
    purchase_id: i64,
    input: &ValidatedPurchase,
    party_id: i64,
) -> Result<(), AppError> {
    let (vendor_id, farmer_id) = party_columns(input.party_type, party_id);
    let sql = format!(
        "UPDATE {} SET vendor_id = $2, farmer_id = $3, party_type = $4, gst_no = $5, \
         bill_no = $6, bill_date = $7, status = $8, updated_at = NOW() WHERE id = $1",
        tables.purchases()
    );
    sqlx::query(&sql)
        .bind(purchase_id)
        .bind(vendor_id)
        .bind(farmer_id)
        .bind(input.party_type)
        .bind(&input.gst_no)
        .bind(&input.bill_no)
        .bind(input.bill_date)
        .bind(&input.status)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn insert_line(
    tx: &mut Transaction<'_, Postgres>,
    tables: &TenantTables,
    purchase_id: i64,
    line: &PurchaseLine,
) -> Result<i64, AppError> {
    let sql = format!(
        "INSERT INTO {} (purchase_id, product_id, rate, size, unit, status) \
         VALUES ($1, $2, $3, $4, $5, 'Active') RETURNING id",
        tables.purchase_items()
    );
    let id = sqlx::query_scalar(&sql)
        .bind(purchase_id)
        .bind(line.product_id)
        .bind(line.rate)
        .bind(line.size)
        .bind(line.unit)
        .fetch_one(&mut **tx)
        .await?;
    Ok(id)
}

/// Rewrites the header total as the sum of the stored line totals.
async fn refresh_total(
    tx: &mut Transaction<'_, Postgres>,
    tables: &TenantTables,
    purchase_id: i64,
) -> Result<rust_decimal::Decimal, AppError> {
    let sql = format!(
        "UPDATE {purchases} SET total_amount = \
         (SELECT COALESCE(SUM(total), 0) FROM {items} WHERE purchase_id = $1), updated_at = NOW() \
         WHERE id = $1 RETURNING total_amount",
        purchases = tables.purchases(),
        items = tables.purchase_items()
    );
    let total = sqlx::query_scalar(&sql)
        .bind(purchase_id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(total)
}
