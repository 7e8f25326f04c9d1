use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::{info, instrument};

use crate::calc::DocumentTotals;
use crate::error::AppError;
use crate::inventory::Inventory;
use crate::models::order::{OrderHeader, OrderItem};
use crate::orders::types::{
    InvoiceParty, OrderInvoice, OrderKind, OrderLine, OrderRequest, OrderSaved, OrderSummary,
    OrderWithItems, ValidatedOrder,
};
use crate::parties::ensure_party_exists;
use crate::reconcile::{self, StockDirection, StoredLine};

/// Orders are quotations; their lines never move product stock.
const ORDER_STOCK: StockDirection = StockDirection::Untracked;

/// Creates a purchase or sales order with its lines.
///
/// # Errors
///
/// - `Validation` for a malformed payload
/// - `NotFound` for an unknown party or product
/// - `Conflict` when the order number is already taken
#[instrument(skip(pool, request), fields(kind = kind.label()))]
pub async fn create_order(
    pool: &PgPool,
    kind: OrderKind,
    request: &OrderRequest,
) -> Result<OrderSaved, AppError> {
    let input = request.validate(kind)?;
    let plan = reconcile::plan_new(&input.lines, ORDER_STOCK)?;

    let mut tx = pool.begin().await?;

    ensure_party_exists(&mut *tx, input.party_type, input.party_id).await?;
    ensure_order_no_free(&mut tx, kind, &input.order_no, None).await?;
    Inventory::ensure_products_exist(&mut tx, &plan.incoming_products()).await?;

    let (vendor_id, farmer_id, customer_id) = input.party_columns();
    let sql = format!(
        "INSERT INTO {} (order_no, party_type, vendor_id, farmer_id, customer_id, date, bill_time, \
         address, mobile_no, gst_no, place_of_supply, terms_condition, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING id",
        kind.headers_table()
    );
    let order_id: i64 = sqlx::query_scalar(&sql)
        .bind(&input.order_no)
        .bind(input.party_type)
        .bind(vendor_id)
        .bind(farmer_id)
        .bind(customer_id)
        .bind(input.date)
        .bind(input.bill_time)
        .bind(&input.address)
        .bind(&input.mobile_no)
        .bind(&input.gst_no)
        .bind(&input.place_of_supply)
        .bind(&input.terms_condition)
        .bind(&input.status)
        .fetch_one(&mut *tx)
        .await?;

    for line in &plan.inserts {
        insert_line(&mut tx, kind, order_id, line).await?;
    }
    let totals = refresh_totals(&mut tx, kind, order_id).await?;

    tx.commit().await?;

    info!(
        order_id,
        order_no = %input.order_no,
        items = input.lines.len(),
        grand_total = %totals.total_amount,
        "Order created"
    );

    Ok(OrderSaved {
        message: format!("{} created successfully", capitalize(kind.label())),
        id: order_id,
        order_no: input.order_no,
        summary: totals.into(),
    })
}

/// Replaces an order's header and reconciles its lines. Lines missing from
/// the payload are deleted.
#[instrument(skip(pool, request), fields(kind = kind.label()))]
pub async fn update_order(
    pool: &PgPool,
    kind: OrderKind,
    order_id: i64,
    request: &OrderRequest,
) -> Result<OrderSaved, AppError> {
    let input = request.validate(kind)?;

    let mut tx = pool.begin().await?;

    lock_order(&mut tx, kind, order_id).await?;
    ensure_party_exists(&mut *tx, input.party_type, input.party_id).await?;
    ensure_order_no_free(&mut tx, kind, &input.order_no, Some(order_id)).await?;
    update_header(&mut tx, kind, order_id, &input).await?;

    let sql = format!(
        "SELECT id, product_id, qty AS quantity FROM {} WHERE order_id = $1 ORDER BY id",
        kind.items_table()
    );
    let stored: Vec<StoredLine> = sqlx::query_as(&sql)
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;

    let plan = reconcile::plan(&stored, &input.lines, ORDER_STOCK)?;
    Inventory::ensure_products_exist(&mut tx, &plan.incoming_products()).await?;

    let update_sql = format!(
        "UPDATE {} SET product_id = $3, hsn_code = $4, qty = $5, rate = $6, discount_per_qty = $7, \
         gst_percent = $8, amount = $9, discount_rate = $10, discount_total = $11, \
         gst_amount = $12, final_amount = $13, status = $14 \
         WHERE id = $1 AND order_id = $2",
        kind.items_table()
    );
    for (previous, line) in &plan.updates {
        sqlx::query(&update_sql)
            .bind(previous.id)
            .bind(order_id)
            .bind(line.product_id)
            .bind(&line.hsn_code)
            .bind(line.qty)
            .bind(line.rate)
            .bind(line.discount_percent)
            .bind(line.gst_percent)
            .bind(line.amounts.amount)
            .bind(line.amounts.discount_rate)
            .bind(line.amounts.discount_total)
            .bind(line.amounts.gst_amount)
            .bind(line.amounts.net_total)
            .bind(&line.status)
            .execute(&mut *tx)
            .await?;
    }

    for line in &plan.inserts {
        insert_line(&mut tx, kind, order_id, line).await?;
    }

    if !plan.removals.is_empty() {
        let removed: Vec<i64> = plan.removals.iter().map(|line| line.id).collect();
        let sql = format!(
            "DELETE FROM {} WHERE order_id = $1 AND id = ANY($2)",
            kind.items_table()
        );
        sqlx::query(&sql)
            .bind(order_id)
            .bind(&removed)
            .execute(&mut *tx)
            .await?;
    }

    let totals = refresh_totals(&mut tx, kind, order_id).await?;

    tx.commit().await?;

    info!(
        order_id,
        updated = plan.updates.len(),
        inserted = plan.inserts.len(),
        removed = plan.removals.len(),
        grand_total = %totals.total_amount,
        "Order updated"
    );

    Ok(OrderSaved {
        message: format!("{} updated successfully", capitalize(kind.label())),
        id: order_id,
        order_no: input.order_no,
        summary: totals.into(),
    })
}

/// Deletes an order and its lines.
#[instrument(skip(pool), fields(kind = kind.label()))]
pub async fn delete_order(pool: &PgPool, kind: OrderKind, order_id: i64) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    lock_order(&mut tx, kind, order_id).await?;

    let sql = format!("DELETE FROM {} WHERE order_id = $1", kind.items_table());
    let lines = sqlx::query(&sql)
        .bind(order_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let sql = format!("DELETE FROM {} WHERE id = $1", kind.headers_table());
    sqlx::query(&sql).bind(order_id).execute(&mut *tx).await?;

    tx.commit().await?;
    info!(order_id, lines, "Order deleted");
    Ok(())
}

pub async fn get_order(
    pool: &PgPool,
    kind: OrderKind,
    order_id: i64,
) -> Result<OrderWithItems, AppError> {
    let order = fetch_header(pool, kind, order_id).await?;
    let items = fetch_items(pool, kind, &[order_id]).await?;
    Ok(with_summary(order, items))
}

/// Every order of one kind, newest first, lines nested.
pub async fn list_orders(pool: &PgPool, kind: OrderKind) -> Result<Vec<OrderWithItems>, AppError> {
    let sql = format!("{} ORDER BY o.id DESC", select_orders(kind));
    let orders = sqlx::query_as::<_, OrderHeader>(&sql).fetch_all(pool).await?;

    let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
    let mut by_order: HashMap<i64, Vec<OrderItem>> = HashMap::new();
    for item in fetch_items(pool, kind, &ids).await? {
        by_order.entry(item.order_id).or_default().push(item);
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let items = by_order.remove(&order.id).unwrap_or_default();
            with_summary(order, items)
        })
        .collect())
}

/// Printable invoice view of a sales order.
pub async fn order_invoice(pool: &PgPool, order_id: i64) -> Result<OrderInvoice, AppError> {
    let kind = OrderKind::Sales;
    let order = fetch_header(pool, kind, order_id).await?;
    let items = fetch_items(pool, kind, &[order_id]).await?;

    let party_address: Option<String> = sqlx::query_scalar(&format!(
        "SELECT address FROM {} WHERE id = $1",
        order.party_type.table()
    ))
    .bind(order.vendor_id.or(order.farmer_id).or(order.customer_id))
    .fetch_optional(pool)
    .await?
    .flatten();

    let address = if order.address.is_empty() {
        party_address.unwrap_or_default()
    } else {
        order.address.clone()
    };

    Ok(OrderInvoice {
        invoice_no: format!("SIN-{}", order.id),
        date: order.date,
        customer: InvoiceParty {
            name: order.party_name.clone().unwrap_or_default(),
            address,
            gst_no: order.gst_no.clone(),
        },
        items,
        summary: header_summary(&order),
    })
}

fn with_summary(order: OrderHeader, items: Vec<OrderItem>) -> OrderWithItems {
    let summary = header_summary(&order);
    OrderWithItems {
        order,
        items,
        summary,
    }
}

fn header_summary(order: &OrderHeader) -> OrderSummary {
    OrderSummary {
        total_taxable: order.total_amount,
        total_gst: order.gst_amount,
        grand_total: order.final_amount,
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn select_orders(kind: OrderKind) -> String {
    format!(
        "SELECT o.id, o.order_no, o.party_type, o.vendor_id, o.farmer_id, o.customer_id, \
         CASE o.party_type WHEN 'vendor' THEN v.vendor_name WHEN 'farmer' THEN f.name \
         ELSE c.name END AS party_name, \
         o.date, o.bill_time, o.address, o.mobile_no, o.gst_no, o.place_of_supply, \
         o.terms_condition, o.total_amount, o.gst_amount, o.final_amount, o.status, \
         o.created_at, o.updated_at \
         FROM {} o \
         LEFT JOIN vendors v ON v.id = o.vendor_id \
         LEFT JOIN farmers f ON f.id = o.farmer_id \
         LEFT JOIN customers c ON c.id = o.customer_id",
        kind.headers_table()
    )
}

async fn fetch_header(pool: &PgPool, kind: OrderKind, order_id: i64) -> Result<OrderHeader, AppError> {
    let sql = format!("{} WHERE o.id = $1", select_orders(kind));
    sqlx::query_as::<_, OrderHeader>(&sql)
        .bind(order_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| not_found(kind, order_id))
}

async fn fetch_items(
    pool: &PgPool,
    kind: OrderKind,
    order_ids: &[i64],
) -> Result<Vec<OrderItem>, AppError> {
    if order_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT i.id, i.order_id, i.product_id, p.product_name, i.hsn_code, i.qty, i.rate, \
         i.discount_per_qty, i.gst_percent, i.amount, i.discount_rate, i.discount_total, \
         i.gst_amount, i.final_amount, i.status \
         FROM {} i LEFT JOIN products p ON p.id = i.product_id \
         WHERE i.order_id = ANY($1) ORDER BY i.id",
        kind.items_table()
    );
    let items = sqlx::query_as::<_, OrderItem>(&sql)
        .bind(order_ids)
        .fetch_all(pool)
        .await?;
    Ok(items)
}

fn not_found(kind: OrderKind, order_id: i64) -> AppError {
    AppError::not_found(format!("{} {} not found", kind.label(), order_id))
}

async fn lock_order(
    tx: &mut Transaction<'_, Postgres>,
    kind: OrderKind,
    order_id: i64,
) -> Result<(), AppError> {
    let sql = format!("SELECT id FROM {} WHERE id = $1 FOR UPDATE", kind.headers_table());
    let found: Option<i64> = sqlx::query_scalar(&sql)
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await?;
    found.map(|_| ()).ok_or_else(|| not_found(kind, order_id))
}

async fn ensure_order_no_free(
    tx: &mut Transaction<'_, Postgres>,
    kind: OrderKind,
    order_no: &str,
    own_id: Option<i64>,
) -> Result<(), AppError> {
    let sql = format!(
        "SELECT id FROM {} WHERE order_no = $1 AND ($2::BIGINT IS NULL OR id <> $2)",
        kind.headers_table()
    );
    let taken: Option<i64> = sqlx::query_scalar(&sql)
        .bind(order_no)
        .bind(own_id)
        .fetch_optional(&mut **tx)
        .await?;
    match taken {
        Some(_) => Err(AppError::conflict(format!(
            "{} number {} already exists",
            kind.label(),
            order_no
        ))),
        None => Ok(()),
    }
}

async fn update_header(
    tx: &mut Transaction<'_, Postgres>,
    kind: OrderKind,
    order_id: i64,
    input: &ValidatedOrder,
) -> Result<(), AppError> {
    let (vendor_id, farmer_id, customer_id) = input.party_columns();
    let sql = format!(
        "UPDATE {} SET order_no = $2, party_type = $3, vendor_id = $4, farmer_id = $5, \
         customer_id = $6, date = $7, bill_time = $8, address = $9, mobile_no = $10, gst_no = $11, \
         place_of_supply = $12, terms_condition = $13, status = $14, updated_at = NOW() \
         WHERE id = $1",
        kind.headers_table()
    );
    sqlx::query(&sql)
        .bind(order_id)
        .bind(&input.order_no)
        .bind(input.party_type)
        .bind(vendor_id)
        .bind(farmer_id)
        .bind(customer_id)
        .bind(input.date)
        .bind(input.bill_time)
        .bind(&input.address)
        .bind(&input.mobile_no)
        .bind(&input.gst_no)
        .bind(&input.place_of_supply)
        .bind(&input.terms_condition)
        .bind(&input.status)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn insert_line(
    tx: &mut Transaction<'_, Postgres>,
    kind: OrderKind,
    order_id: i64,
    line: &OrderLine,
) -> Result<i64, AppError> {
    let sql = format!(
        "INSERT INTO {} (order_id, product_id, hsn_code, qty, rate, discount_per_qty, gst_percent, \
         amount, discount_rate, discount_total, gst_amount, final_amount, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING id",
        kind.items_table()
    );
    let id = sqlx::query_scalar(&sql)
        .bind(order_id)
        .bind(line.product_id)
        .bind(&line.hsn_code)
        .bind(line.qty)
        .bind(line.rate)
        .bind(line.discount_percent)
        .bind(line.gst_percent)
        .bind(line.amounts.amount)
        .bind(line.amounts.discount_rate)
        .bind(line.amounts.discount_total)
        .bind(line.amounts.gst_amount)
        .bind(line.amounts.net_total)
        .bind(&line.status)
        .fetch_one(&mut **tx)
        .await?;
    Ok(id)
}

/// Rewrites the header totals from the stored lines.
async fn refresh_totals(
    tx: &mut Transaction<'_, Postgres>,
    kind: OrderKind,
    order_id: i64,
) -> Result<DocumentTotals, AppError> {
    let sql = format!(
        "UPDATE {orders} o SET total_amount = t.taxable, gst_amount = t.gst, final_amount = t.net, \
         updated_at = NOW() \
         FROM (SELECT COALESCE(SUM(amount - discount_total), 0) AS taxable, \
               COALESCE(SUM(gst_amount), 0) AS gst, COALESCE(SUM(final_amount), 0) AS net \
               FROM {items} WHERE order_id = $1) t \
         WHERE o.id = $1 \
         RETURNING o.total_amount AS total_taxable, o.gst_amount AS total_gst, \
         o.final_amount AS total_amount",
        orders = kind.headers_table(),
        items = kind.items_table()
    );
    let totals = sqlx::query_as::<_, DocumentTotals>(&sql)
        .bind(order_id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(totals)
}
