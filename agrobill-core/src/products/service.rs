use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::product::{CreateProduct, Product};
use crate::validation::{non_negative, optional_text, percentage, require_text};

const SELECT_PRODUCT: &str = "SELECT p.id, p.category_id, c.name AS category_name, p.product_name, \
     p.size, p.purchase_rate, p.transport_charge, p.local_transport, p.packaging_cost, \
     p.packing_weight, p.hsn_code, p.value, p.discount_30, p.discount_25, p.discount_50, \
     p.total, p.gst, p.created_at, p.updated_at \
     FROM products p LEFT JOIN categories c ON c.id = p.category_id";

/// Adds a product to the shared catalogue.
///
/// `size` is the opening stock. After creation only documents move it.
#[instrument(skip(pool, input))]
pub async fn create_product(pool: &PgPool, input: &CreateProduct) -> Result<Product, AppError> {
    let name = require_text(input.product_name.as_deref(), "product_name")?;
    let opening_stock = non_negative(input.size, "size")?;
    let gst = percentage(input.gst, "gst")?;

    let amounts = [
        ("purchase_rate", input.purchase_rate),
        ("transport_charge", input.transport_charge),
        ("local_transport", input.local_transport),
        ("packaging_cost", input.packaging_cost),
        ("packing_weight", input.packing_weight),
        ("value", input.value),
        ("discount_30", input.discount_30),
        ("discount_25", input.discount_25),
        ("discount_50", input.discount_50),
        ("total", input.total),
    ];
    let mut checked: Vec<Decimal> = Vec::with_capacity(amounts.len());
    for (field, value) in amounts {
        checked.push(non_negative(value, field)?);
    }

    if let Some(category_id) = input.category_id {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM categories WHERE id = $1")
            .bind(category_id)
            .fetch_optional(pool)
            .await?;
        if exists.is_none() {
            return Err(AppError::not_found(format!("category {} not found", category_id)));
        }
    }

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO products (
            category_id, product_name, size, purchase_rate, transport_charge,
            local_transport, packaging_cost, packing_weight, hsn_code, value,
            discount_30, discount_25, discount_50, total, gst
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING id
        "#,
    )
    .bind(input.category_id)
    .bind(&name)
    .bind(opening_stock)
    .bind(checked[0])
    .bind(checked[1])
    .bind(checked[2])
    .bind(checked[3])
    .bind(checked[4])
    .bind(optional_text(input.hsn_code.as_deref()))
    .bind(checked[5])
    .bind(checked[6])
    .bind(checked[7])
    .bind(checked[8])
    .bind(checked[9])
    .bind(gst)
    .fetch_one(pool)
    .await?;

    info!(product_id = id, "Product created");
    get_product(pool, id).await
}

pub async fn get_product(pool: &PgPool, id: i64) -> Result<Product, AppError> {
    let sql = format!("{} WHERE p.id = $1", SELECT_PRODUCT);
    sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("product {} not found", id)))
}

pub async fn list_products(pool: &PgPool) -> Result<Vec<Product>, AppError> {
    let sql = format!("{} ORDER BY p.id DESC", SELECT_PRODUCT);
    let products = sqlx::query_as::<_, Product>(&sql).fetch_all(pool).await?;
    Ok(products)
}
