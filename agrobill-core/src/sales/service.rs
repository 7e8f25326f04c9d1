use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::{info, instrument, warn};

use crate::calc::{self, DocumentTotals};
use crate::error::{is_unique_violation, AppError};
use crate::inventory::Inventory;
use crate::ledger::party_totals;
use crate::models::party::PartyType;
use crate::models::sale::{
    PaymentMethod, PaymentStatus, Sale, SaleItem, SalePayment, SALE_STATUS_CANCELLED,
};
use crate::parties::ensure_party_exists;
use crate::reconcile::{self, StockDirection, StoredLine};
use crate::sales::types::{
    party_columns, NewBillNo, PaymentRecorded, PaymentRequest, SaleCreated, SaleLine,
    SaleRequest, SaleUpdated, SaleWithItems,
};
use crate::tenant::TenantTables;
use crate::validation::{optional_text, parse_date, parse_party_type};

/// Creating a sale records quantities without issuing them from stock.
/// Later edits of the sale do move stock, outbound.
const SALE_CREATE_STOCK: StockDirection = StockDirection::Untracked;
const SALE_UPDATE_STOCK: StockDirection = StockDirection::Outbound;

const PAYMENT_COLUMNS: &str =
    "id, sale_id, party_type, customer_id, vendor_id, farmer_id, payment_date, amount, method, remarks, created_at";

/// Bill number for the `n`th sale.
pub fn format_bill_no(n: i64) -> String {
    format!("S-{:05}", n)
}

/// Creates a sale, takes the cash received with it and derives the
/// party's new due.
///
/// The previous due is read inside the same transaction before the sale
/// is inserted, so it never includes this bill.
#[instrument(skip(pool, tables, request), fields(company = %tables.code()))]
pub async fn create_sale(
    pool: &PgPool,
    tables: &TenantTables,
    request: &SaleRequest,
) -> Result<SaleCreated, AppError> {
    let input = request.validate()?;
    let plan = reconcile::plan_new(&input.lines, SALE_CREATE_STOCK)?;

    let mut tx = pool.begin().await?;

    ensure_party_exists(&mut *tx, input.party_type, input.party_id).await?;
    let bill_no = match &input.bill_no {
        Some(bill_no) => {
            ensure_bill_no_free(&mut tx, tables, bill_no, None).await?;
            bill_no.clone()
        }
        None => next_bill_no(&mut tx, tables).await?,
    };
    Inventory::ensure_products_exist(&mut tx, &plan.incoming_products()).await?;

    let previous_due = party_totals(&mut *tx, tables, input.party_type, input.party_id)
        .await?
        .previous_due();

    let (customer_id, vendor_id, farmer_id) = input.party_columns();
    let sql = format!(
        "INSERT INTO {} (customer_id, vendor_id, farmer_id, party_type, bill_no, bill_date, \
         payment_method, remarks, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
        tables.sales()
    );
    let sale_id: i64 = sqlx::query_scalar(&sql)
        .bind(customer_id)
        .bind(vendor_id)
        .bind(farmer_id)
        .bind(input.party_type)
        .bind(&bill_no)
        .bind(input.bill_date)
        .bind(input.payment_method)
        .bind(&input.remarks)
        .bind(&input.status)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| generated_bill_no_error(e, input.bill_no.is_none()))?;

    for line in &plan.inserts {
        insert_line(&mut tx, tables, sale_id, line).await?;
    }
    // No-op while sale creation is untracked.
    Inventory::apply(&mut tx, &plan.stock_deltas).await?;

    let totals = refresh_totals(&mut tx, tables, sale_id).await?;
    debug_assert_eq!(input.totals(), totals);

    if input.cash_received > Decimal::ZERO {
        insert_payment(
            &mut tx,
            tables,
            NewPayment {
                sale_id: Some(sale_id),
                party_type: input.party_type,
                party_id: input.party_id,
                payment_date: input.bill_date,
                amount: input.cash_received,
                method: input.payment_method,
                remarks: Some(format!("Received with bill {}", bill_no)),
            },
        )
        .await?;
    }

    let new_due = calc::new_due(previous_due, totals.total_amount, input.cash_received);
    let payment_status = calc::payment_status(new_due, input.cash_received);
    set_payment_status(&mut tx, tables, sale_id, payment_status).await?;

    tx.commit().await?;

    info!(
        sale_id,
        bill_no = %bill_no,
        total = %totals.total_amount,
        %previous_due,
        %new_due,
        "Sale created"
    );

    Ok(SaleCreated {
        message: "Sale created successfully".to_string(),
        id: sale_id,
        bill_no,
        total_taxable: totals.total_taxable,
        total_gst: totals.total_gst,
        total_amount: totals.total_amount,
        previous_due,
        cash_received: input.cash_received,
        new_due,
        payment_status,
    })
}

/// Updates a sale and reconciles its lines, issuing added quantity from
/// stock and returning removed quantity to it.
///
/// Payment status is re-derived from the payments recorded against this
/// sale. Cash is not accepted here; use [`record_payment`].
#[instrument(skip(pool, tables, request), fields(company = %tables.code()))]
pub async fn update_sale(
    pool: &PgPool,
    tables: &TenantTables,
    sale_id: i64,
    request: &SaleRequest,
) -> Result<SaleUpdated, AppError> {
    let input = request.validate()?;
    if input.cash_received > Decimal::ZERO {
        return Err(AppError::validation(
            "cash_received is only accepted when creating a sale; record a payment instead",
        ));
    }

    let mut tx = pool.begin().await?;

    let status = lock_sale(&mut tx, tables, sale_id).await?;
    if status == SALE_STATUS_CANCELLED {
        return Err(AppError::conflict(format!("sale {} is cancelled", sale_id)));
    }
    ensure_party_exists(&mut *tx, input.party_type, input.party_id).await?;
    if let Some(bill_no) = &input.bill_no {
        ensure_bill_no_free(&mut tx, tables, bill_no, Some(sale_id)).await?;
    }

    let (customer_id, vendor_id, farmer_id) = input.party_columns();
    let sql = format!(
        "UPDATE {} SET customer_id = $2, vendor_id = $3, farmer_id = $4, party_type = $5, \
         bill_no = COALESCE($6, bill_no), bill_date = $7, payment_method = $8, remarks = $9, \
         status = $10, updated_at = NOW() WHERE id = $1",
        tables.sales()
    );
    sqlx::query(&sql)
        .bind(sale_id)
        .bind(customer_id)
        .bind(vendor_id)
        .bind(farmer_id)
        .bind(input.party_type)
        .bind(&input.bill_no)
        .bind(input.bill_date)
        .bind(input.payment_method)
        .bind(&input.remarks)
        .bind(&input.status)
        .execute(&mut *tx)
        .await?;

    let sql = format!(
        "SELECT id, product_id, qty AS quantity FROM {} WHERE sale_id = $1 ORDER BY id",
        tables.sale_items()
    );
    let stored: Vec<StoredLine> = sqlx::query_as(&sql)
        .bind(sale_id)
        .fetch_all(&mut *tx)
        .await?;

    let plan = reconcile::plan(&stored, &input.lines, SALE_UPDATE_STOCK)?;
    Inventory::ensure_products_exist(&mut tx, &plan.incoming_products()).await?;

    let update_sql = format!(
        "UPDATE {} SET product_id = $3, rate = $4, qty = $5, discount_rate = $6, \
         discount_amount = $7, taxable_amount = $8, gst_percent = $9, gst_amount = $10, \
         net_total = $11, unit = $12, updated_at = NOW() \
         WHERE id = $1 AND sale_id = $2",
        tables.sale_items()
    );
    for (previous, line) in &plan.updates {
        sqlx::query(&update_sql)
            .bind(previous.id)
            .bind(sale_id)
            .bind(line.product_id)
            .bind(line.rate)
            .bind(line.qty)
            .bind(line.discount_percent)
            .bind(line.amounts.discount_total)
            .bind(line.amounts.taxable)
            .bind(line.gst_percent)
            .bind(line.amounts.gst_amount)
            .bind(line.amounts.net_total)
            .bind(line.unit)
            .execute(&mut *tx)
            .await?;
    }

    for line in &plan.inserts {
        insert_line(&mut tx, tables, sale_id, line).await?;
    }

    if !plan.removals.is_empty() {
        let removed: Vec<i64> = plan.removals.iter().map(|line| line.id).collect();
        let sql = format!(
            "DELETE FROM {} WHERE sale_id = $1 AND id = ANY($2)",
            tables.sale_items()
        );
        sqlx::query(&sql)
            .bind(sale_id)
            .bind(&removed)
            .execute(&mut *tx)
            .await?;
    }

    let stock = Inventory::apply(&mut tx, &plan.stock_deltas).await?;
    let totals = refresh_totals(&mut tx, tables, sale_id).await?;
    debug_assert_eq!(input.totals(), totals);
    let payment_status = rederive_payment_status(&mut tx, tables, sale_id, totals.total_amount).await?;

    tx.commit().await?;

    info!(
        sale_id,
        updated = plan.updates.len(),
        inserted = plan.inserts.len(),
        removed = plan.removals.len(),
        total = %totals.total_amount,
        "Sale updated"
    );

    Ok(SaleUpdated {
        message: "Sale updated successfully".to_string(),
        id: sale_id,
        total_taxable: totals.total_taxable,
        total_gst: totals.total_gst,
        total_amount: totals.total_amount,
        payment_status,
        stock,
    })
}

/// Marks a sale cancelled. Lines and payments are kept; the sale stops
/// counting towards the party's due. Cancelling twice is a no-op.
#[instrument(skip(pool, tables), fields(company = %tables.code()))]
pub async fn cancel_sale(pool: &PgPool, tables: &TenantTables, sale_id: i64) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let status = lock_sale(&mut tx, tables, sale_id).await?;
    if status == SALE_STATUS_CANCELLED {
        warn!(sale_id, "Sale already cancelled");
        return Ok(());
    }

    let sql = format!(
        "UPDATE {} SET status = $2, updated_at = NOW() WHERE id = $1",
        tables.sales()
    );
    sqlx::query(&sql)
        .bind(sale_id)
        .bind(SALE_STATUS_CANCELLED)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    info!(sale_id, "Sale cancelled");
    Ok(())
}

/// Bill number the next sale will get when none is supplied.
pub async fn new_bill_no(pool: &PgPool, tables: &TenantTables) -> Result<NewBillNo, AppError> {
    let mut tx = pool.begin().await?;
    let bill_no = next_bill_no(&mut tx, tables).await?;
    tx.rollback().await?;
    Ok(NewBillNo { bill_no })
}

/// Records a payment from a party. Payments are never edited afterwards.
///
/// When `sale_id` is given the sale must belong to the party, and its
/// payment status is re-derived.
#[instrument(skip(pool, tables, request), fields(company = %tables.code()))]
pub async fn record_payment(
    pool: &PgPool,
    tables: &TenantTables,
    request: &PaymentRequest,
) -> Result<PaymentRecorded, AppError> {
    let party_type = parse_party_type(
        request.party_type.as_deref(),
        &[PartyType::Customer, PartyType::Vendor, PartyType::Farmer],
    )?;
    let party_id = request
        .party_id
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::validation("party_id is required"))?;
    let amount = request
        .amount
        .map(calc::round_money)
        .filter(|amount| *amount > Decimal::ZERO)
        .ok_or_else(|| AppError::validation("amount must be greater than zero"))?;
    if amount > calc::MAX_AMOUNT {
        return Err(AppError::validation(format!(
            "amount must not exceed {}",
            calc::MAX_AMOUNT
        )));
    }
    let payment_date = match request.payment_date.as_deref() {
        Some(raw) => parse_date(Some(raw), "payment_date")?,
        None => Utc::now().date_naive(),
    };

    let mut tx = pool.begin().await?;

    ensure_party_exists(&mut *tx, party_type, party_id).await?;

    if let Some(sale_id) = request.sale_id {
        let sql = format!(
            "SELECT status FROM {} WHERE id = $1 AND party_type = $2 AND {} = $3 FOR UPDATE",
            tables.sales(),
            party_type.id_column()
        );
        let status: Option<String> = sqlx::query_scalar(&sql)
            .bind(sale_id)
            .bind(party_type)
            .bind(party_id)
            .fetch_optional(&mut *tx)
            .await?;
        match status.as_deref() {
            None => {
                return Err(AppError::not_found(format!(
                    "sale {} not found for {} {}",
                    sale_id, party_type, party_id
                )))
            }
            Some(SALE_STATUS_CANCELLED) => {
                return Err(AppError::conflict(format!("sale {} is cancelled", sale_id)))
            }
            Some(_) => {}
        }
    }

    let payment = insert_payment(
        &mut tx,
        tables,
        NewPayment {
            sale_id: request.sale_id,
            party_type,
            party_id,
            payment_date,
            amount,
            method: request.method.unwrap_or_default(),
            remarks: optional_text(request.remarks.as_deref()),
        },
    )
    .await?;

    if let Some(sale_id) = request.sale_id {
        let sql = format!("SELECT total_amount FROM {} WHERE id = $1", tables.sales());
        let total: Decimal = sqlx::query_scalar(&sql)
            .bind(sale_id)
            .fetch_one(&mut *tx)
            .await?;
        rederive_payment_status(&mut tx, tables, sale_id, total).await?;
    }

    let previous_due = party_totals(&mut *tx, tables, party_type, party_id)
        .await?
        .previous_due();

    tx.commit().await?;

    info!(payment_id = payment.id, %amount, %previous_due, "Payment recorded");

    Ok(PaymentRecorded {
        message: "Payment recorded successfully".to_string(),
        payment,
        previous_due,
    })
}

pub async fn get_sale(pool: &PgPool, tables: &TenantTables, sale_id: i64) -> Result<SaleWithItems, AppError> {
    let sql = format!("{} WHERE s.id = $1", select_sales(tables));
    let sale = sqlx::query_as::<_, Sale>(&sql)
        .bind(sale_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("sale {} not found", sale_id)))?;

    let items = fetch_items(pool, tables, &[sale_id]).await?;
    Ok(SaleWithItems { sale, items })
}

pub async fn list_sales(pool: &PgPool, tables: &TenantTables) -> Result<Vec<SaleWithItems>, AppError> {
    let sql = format!("{} ORDER BY s.id DESC", select_sales(tables));
    let sales = sqlx::query_as::<_, Sale>(&sql).fetch_all(pool).await?;

    let ids: Vec<i64> = sales.iter().map(|s| s.id).collect();
    let mut by_sale: HashMap<i64, Vec<SaleItem>> = HashMap::new();
    for item in fetch_items(pool, tables, &ids).await? {
        by_sale.entry(item.sale_id).or_default().push(item);
    }

    Ok(sales
        .into_iter()
        .map(|sale| {
            let items = by_sale.remove(&sale.id).unwrap_or_default();
            SaleWithItems { sale, items }
        })
        .collect())
}

fn select_sales(tables: &TenantTables) -> String {
    format!(
        "SELECT s.id, s.customer_id, s.vendor_id, s.farmer_id, s.party_type, \
         CASE s.party_type WHEN 'customer' THEN c.name WHEN 'vendor' THEN v.vendor_name ELSE f.name END AS party_name, \
         s.bill_no, s.bill_date, s.total_taxable, s.total_gst, s.total_amount, s.payment_status, \
         s.payment_method, s.remarks, s.status, s.created_at, s.updated_at \
         FROM {} s \
         LEFT JOIN customers c ON c.id = s.customer_id \
         LEFT JOIN vendors v ON v.id = s.vendor_id \
         LEFT JOIN farmers f ON f.id = s.farmer_id",
        tables.sales()
    )
}

async fn fetch_items(
    pool: &PgPool,
    tables: &TenantTables,
    sale_ids: &[i64],
) -> Result<Vec<SaleItem>, AppError> {
    if sale_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT i.id, i.sale_id, i.product_id, p.product_name, i.rate, i.qty, i.discount_rate, \
         i.discount_amount, i.taxable_amount, i.gst_percent, i.gst_amount, i.net_total, i.unit, \
         i.total, i.status \
         FROM {} i LEFT JOIN products p ON p.id = i.product_id \
         WHERE i.sale_id = ANY($1) ORDER BY i.id",
        tables.sale_items()
    );
    let items = sqlx::query_as::<_, SaleItem>(&sql)
        .bind(sale_ids)
        .fetch_all(pool)
        .await?;
    Ok(items)
}

/// Locks the sale header and returns its status.
async fn lock_sale(
    tx: &mut Transaction<'_, Postgres>,
    tables: &TenantTables,
    sale_id: i64,
) -> Result<String, AppError> {
    let sql = format!("SELECT status FROM {} WHERE id = $1 FOR UPDATE", tables.sales());
    sqlx::query_scalar(&sql)
        .bind(sale_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("sale {} not found", sale_id)))
}

async fn ensure_bill_no_free(
    tx: &mut Transaction<'_, Postgres>,
    tables: &TenantTables,
    bill_no: &str,
    own_id: Option<i64>,
) -> Result<(), AppError> {
    let sql = format!(
        "SELECT id FROM {} WHERE bill_no = $1 AND ($2::BIGINT IS NULL OR id <> $2)",
        tables.sales()
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

/// `S-{n}` where `n` starts at max id + 1 and skips numbers already used
/// by manually numbered bills.
async fn next_bill_no(tx: &mut Transaction<'_, Postgres>, tables: &TenantTables) -> Result<String, AppError> {
    let sql = format!("SELECT COALESCE(MAX(id), 0) + 1 FROM {}", tables.sales());
    let mut n: i64 = sqlx::query_scalar(&sql).fetch_one(&mut **tx).await?;

    let exists_sql = format!("SELECT EXISTS (SELECT 1 FROM {} WHERE bill_no = $1)", tables.sales());
    loop {
        let candidate = format_bill_no(n);
        let taken: bool = sqlx::query_scalar(&exists_sql)
            .bind(&candidate)
            .fetch_one(&mut **tx)
            .await?;
        if !taken {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// A generated bill number can be claimed by a concurrent create between
/// the lookup and the insert; the caller may simply resubmit.
fn generated_bill_no_error(err: sqlx::Error, generated: bool) -> AppError {
    if generated && is_unique_violation(&err) {
        AppError::Retryable("bill number taken by a concurrent sale, retry the request".to_string())
    } else {
        err.into()
    }
}

async fn insert_line(
    tx: &mut Transaction<'_, Postgres>,
    tables: &TenantTables,
    sale_id: i64,
    line: &SaleLine,
) -> Result<i64, AppError> {
    let sql = format!(
        "INSERT INTO {} (sale_id, product_id, rate, qty, discount_rate, discount_amount, \
         taxable_amount, gst_percent, gst_amount, net_total, unit, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'Active') RETURNING id",
        tables.sale_items()
    );
    let id = sqlx::query_scalar(&sql)
        .bind(sale_id)
        .bind(line.product_id)
        .bind(line.rate)
        .bind(line.qty)
        .bind(line.discount_percent)
        .bind(line.amounts.discount_total)
        .bind(line.amounts.taxable)
        .bind(line.gst_percent)
        .bind(line.amounts.gst_amount)
        .bind(line.amounts.net_total)
        .bind(line.unit)
        .fetch_one(&mut **tx)
        .await?;
    Ok(id)
}

/// Rewrites the header totals as sums of the stored lines.
async fn refresh_totals(
    tx: &mut Transaction<'_, Postgres>,
    tables: &TenantTables,
    sale_id: i64,
) -> Result<DocumentTotals, AppError> {
    let sql = format!(
        "UPDATE {sales} s SET total_taxable = t.taxable, total_gst = t.gst, total_amount = t.net, \
         updated_at = NOW() \
         FROM (SELECT COALESCE(SUM(taxable_amount), 0) AS taxable, COALESCE(SUM(gst_amount), 0) AS gst, \
               COALESCE(SUM(net_total), 0) AS net FROM {items} WHERE sale_id = $1) t \
         WHERE s.id = $1 \
         RETURNING s.total_taxable, s.total_gst, s.total_amount",
        sales = tables.sales(),
        items = tables.sale_items()
    );
    let totals = sqlx::query_as::<_, DocumentTotals>(&sql)
        .bind(sale_id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(totals)
}

async fn set_payment_status(
    tx: &mut Transaction<'_, Postgres>,
    tables: &TenantTables,
    sale_id: i64,
    status: PaymentStatus,
) -> Result<(), AppError> {
    let sql = format!("UPDATE {} SET payment_status = $2 WHERE id = $1", tables.sales());
    sqlx::query(&sql)
        .bind(sale_id)
        .bind(status)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Status of one sale judged by the payments recorded against it.
async fn rederive_payment_status(
    tx: &mut Transaction<'_, Postgres>,
    tables: &TenantTables,
    sale_id: i64,
    total_amount: Decimal,
) -> Result<PaymentStatus, AppError> {
    let sql = format!(
        "SELECT COALESCE(SUM(amount), 0) FROM {} WHERE sale_id = $1",
        tables.sale_payments()
    );
    let paid: Decimal = sqlx::query_scalar(&sql)
        .bind(sale_id)
        .fetch_one(&mut **tx)
        .await?;

    let due = (total_amount - paid).max(Decimal::ZERO);
    let status = calc::payment_status(due, paid);
    set_payment_status(tx, tables, sale_id, status).await?;
    Ok(status)
}

struct NewPayment {
    sale_id: Option<i64>,
    party_type: PartyType,
    party_id: i64,
    payment_date: chrono::NaiveDate,
    amount: Decimal,
    method: PaymentMethod,
    remarks: Option<String>,
}

async fn insert_payment(
    tx: &mut Transaction<'_, Postgres>,
    tables: &TenantTables,
    payment: NewPayment,
) -> Result<SalePayment, AppError> {
    let (customer_id, vendor_id, farmer_id) = party_columns(payment.party_type, payment.party_id);
    let sql = format!(
        "INSERT INTO {} (sale_id, party_type, customer_id, vendor_id, farmer_id, payment_date, \
         amount, method, remarks) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
        tables.sale_payments(),
        PAYMENT_COLUMNS
    );
    let row = sqlx::query_as::<_, SalePayment>(&sql)
        .bind(payment.sale_id)
        .bind(payment.party_type)
        .bind(customer_id)
        .bind(vendor_id)
        .bind(farmer_id)
        .bind(payment.payment_date)
        .bind(payment.amount)
        .bind(payment.method)
        .bind(&payment.remarks)
        .fetch_one(&mut **tx)
        .await?;
    Ok(row)
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_bill_no_is_zero_padded() {
        assert_eq!(format_bill_no(1), "S-00001");
        assert_eq!(format_bill_no(123456), "S-123456");
    }

    #[test]
    fn test_generated_bill_no_race_is_retryable() {
        let raced = generated_bill_no_error(crate::test_support::db_error("23505"), true);
        assert!(matches!(raced, AppError::Retryable(_)));

        let manual = generated_bill_no_error(crate::test_support::db_error("23505"), false);
        assert!(matches!(manual, AppError::Conflict(_)));

        let other = generated_bill_no_error(crate::test_support::db_error("23514"), true);
        assert!(matches!(other, AppError::Conflict(_)));
    }
}
