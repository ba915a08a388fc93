//! Line-item storage and pricing shared by sales and purchases.
//!
//! Everything here runs on the caller's transaction.

use rust_decimal::Decimal;
use shared::{line_total, LineItem, PriceTier, ProductPrices, TransactionKind};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

struct LineTables {
    header: &'static str,
    items: &'static str,
    parent: &'static str,
}

fn tables(kind: TransactionKind) -> LineTables {
    match kind {
        TransactionKind::Sale => LineTables {
            header: "sales",
            items: "sale_items",
            parent: "sale_id",
        },
        TransactionKind::Purchase => LineTables {
            header: "purchases",
            items: "purchase_items",
            parent: "purchase_id",
        },
    }
}

#[derive(FromRow)]
struct LineRow {
    product_id: Uuid,
    quantity: i32,
}

#[derive(FromRow)]
struct PricedLineRow {
    quantity: i32,
    price_factory: Decimal,
    price_wholesale: Decimal,
    price_retail: Decimal,
    price_supermarket: Decimal,
}

/// Current lines of a transaction, ordered by product
pub async fn load_lines(
    conn: &mut PgConnection,
    kind: TransactionKind,
    id: Uuid,
) -> AppResult<Vec<LineItem>> {
    let t = tables(kind);
    let sql = format!(
        "SELECT product_id, quantity FROM {} WHERE {} = $1 ORDER BY product_id",
        t.items, t.parent
    );
    let rows = sqlx::query_as::<_, LineRow>(&sql)
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|r| LineItem::new(r.product_id, r.quantity))
        .collect())
}

/// Replace every line of a transaction
pub async fn replace_lines(
    conn: &mut PgConnection,
    kind: TransactionKind,
    id: Uuid,
    lines: &[LineItem],
) -> AppResult<()> {
    let t = tables(kind);
    sqlx::query(&format!("DELETE FROM {} WHERE {} = $1", t.items, t.parent))
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if lines.is_empty() {
        return Ok(());
    }

    let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    let quantities: Vec<i32> = lines.iter().map(|l| l.quantity).collect();

    sqlx::query(&format!(
        "INSERT INTO {} ({}, product_id, quantity) \
         SELECT $1, product_id, quantity FROM UNNEST($2::uuid[], $3::int4[]) AS l(product_id, quantity)",
        t.items, t.parent
    ))
    .bind(id)
    .bind(&product_ids)
    .bind(&quantities)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Set one product's quantity on a transaction, removing the line when the
/// new quantity is not positive. Returns the previous quantity.
pub async fn set_line(
    conn: &mut PgConnection,
    kind: TransactionKind,
    id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> AppResult<i32> {
    let t = tables(kind);
    let old = sqlx::query_scalar::<_, i32>(&format!(
        "SELECT quantity FROM {} WHERE {} = $1 AND product_id = $2 FOR UPDATE",
        t.items, t.parent
    ))
    .bind(id)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?
    .unwrap_or(0);

    if quantity > 0 {
        sqlx::query(&format!(
            "INSERT INTO {items} ({parent}, product_id, quantity) VALUES ($1, $2, $3) \
             ON CONFLICT ({parent}, product_id) DO UPDATE SET quantity = EXCLUDED.quantity",
            items = t.items,
            parent = t.parent
        ))
        .bind(id)
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;
    } else {
        sqlx::query(&format!(
            "DELETE FROM {} WHERE {} = $1 AND product_id = $2",
            t.items, t.parent
        ))
        .bind(id)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(old)
}

/// 404 unless every product id exists
pub async fn ensure_products_exist(conn: &mut PgConnection, lines: &[LineItem]) -> AppResult<()> {
    if lines.is_empty() {
        return Ok(());
    }
    let mut ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let found = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE id = ANY($1)")
        .bind(&ids)
        .fetch_one(&mut *conn)
        .await?;

    if found != ids.len() as i64 {
        return Err(AppError::NotFound("Product".to_string()));
    }
    Ok(())
}

/// Recompute and store a transaction's total at the given price tier
pub async fn recalculate_total(
    conn: &mut PgConnection,
    kind: TransactionKind,
    id: Uuid,
    tier: PriceTier,
) -> AppResult<Decimal> {
    let t = tables(kind);
    let rows = sqlx::query_as::<_, PricedLineRow>(&format!(
        r#"
        SELECT i.quantity, p.price_factory, p.price_wholesale, p.price_retail, p.price_supermarket
        FROM {} i
        JOIN products p ON p.id = i.product_id
        WHERE i.{} = $1
        "#,
        t.items, t.parent
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let total = line_total(rows.iter().map(|r| {
        let prices = ProductPrices {
            factory: r.price_factory,
            wholesale: r.price_wholesale,
            retail: r.price_retail,
            supermarket: r.price_supermarket,
        };
        (prices.for_tier(tier), r.quantity)
    }));

    sqlx::query(&format!("UPDATE {} SET total_amount = $1 WHERE id = $2", t.header))
        .bind(total)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(total)
}
