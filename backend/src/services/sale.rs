//! Sales service: CRUD, the weekly matrix and per-cell edits.
//!
//! Every write locks the sale header, reads its current lines, writes and
//! reconciles stock on one transaction.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::calendar::{week_dates, WEEK_DAYS};
use shared::stock::{cell_delta, TransactionState};
use shared::{
    merge_lines, validate_line_quantity, LineItem, Page, Pagination, ProductPrices,
    TransactionKind, TransactionStatus, VendorType,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult, ValidateField};
use crate::services::filters::{id_filter, like_pattern, text_filter};
use crate::services::lines;
use crate::services::scope::AccessScope;
use crate::services::stock::StockLedger;

const KIND: TransactionKind = TransactionKind::Sale;

/// Sales service
#[derive(Clone)]
pub struct SaleService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Sale {
    pub id: Uuid,
    pub date: NaiveDate,
    pub distributor_id: Option<Uuid>,
    pub distributor_name: Option<String>,
    pub vendor_id: Uuid,
    pub vendor_name: String,
    #[sqlx(try_from = "String")]
    pub vendor_type: VendorType,
    pub supervisor_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

const SALE_SELECT: &str = r#"
    SELECT s.id, s.date, s.distributor_id, d.name AS distributor_name,
           s.vendor_id, v.first_name || ' ' || v.last_name AS vendor_name, v.vendor_type,
           s.supervisor_id, s.status, s.total_amount, s.created_at
    FROM sales s
    JOIN vendors v ON v.id = s.vendor_id
    LEFT JOIN distributors d ON d.id = s.distributor_id
"#;

/// One product line as shown to clients
#[derive(Debug, Clone, Serialize)]
pub struct SaleLine {
    pub product_id: Uuid,
    pub code: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleWithLines {
    #[serde(flatten)]
    pub sale: Sale,
    pub products: Vec<SaleLine>,
}

#[derive(FromRow)]
struct SaleLineRow {
    sale_id: Uuid,
    product_id: Uuid,
    code: String,
    name: String,
    quantity: i32,
    price_factory: Decimal,
    price_wholesale: Decimal,
    price_retail: Decimal,
    price_supermarket: Decimal,
}

impl SaleLineRow {
    fn prices(&self) -> ProductPrices {
        ProductPrices {
            factory: self.price_factory,
            wholesale: self.price_wholesale,
            retail: self.price_retail,
            supermarket: self.price_supermarket,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListSalesQuery {
    #[serde(alias = "startDate")]
    pub start_date: Option<NaiveDate>,
    #[serde(alias = "endDate")]
    pub end_date: Option<NaiveDate>,
    pub distributor_id: Option<String>,
    pub vendor_id: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSaleInput {
    pub date: NaiveDate,
    pub vendor_id: Uuid,
    pub status: Option<TransactionStatus>,
    #[serde(default)]
    pub products: Vec<LineItem>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSaleInput {
    pub date: Option<NaiveDate>,
    pub status: Option<TransactionStatus>,
    pub products: Option<Vec<LineItem>>,
}

#[derive(Debug, Deserialize)]
pub struct SalesMatrixQuery {
    pub vendor_id: Option<Uuid>,
    #[serde(alias = "startDate")]
    pub start_date: Option<NaiveDate>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub product_type: Option<String>,
    pub format: Option<String>,
    pub page: Option<i64>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesMatrixRow {
    pub product_id: Uuid,
    pub code: String,
    pub name: String,
    pub format: Option<String>,
    pub active: bool,
    pub unit_price: Decimal,
    pub days: [i32; WEEK_DAYS],
}

#[derive(Debug, Serialize)]
pub struct SalesMatrix {
    pub data: Vec<SalesMatrixRow>,
    pub total: i64,
    pub dates: [NaiveDate; WEEK_DAYS],
    pub statuses: BTreeMap<NaiveDate, TransactionStatus>,
}

#[derive(FromRow)]
struct MatrixProductRow {
    id: Uuid,
    code: String,
    name: String,
    format: Option<String>,
    active: bool,
    price_factory: Decimal,
    price_wholesale: Decimal,
    price_retail: Decimal,
    price_supermarket: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaleCellInput {
    pub vendor_id: Uuid,
    pub product_id: Uuid,
    pub date: NaiveDate,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct CellResult {
    pub success: bool,
    pub new_total: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct BulkCellInput {
    #[serde(default)]
    pub entries: Vec<SaleCellInput>,
}

#[derive(Debug, Serialize)]
pub struct BulkCellResult {
    pub success: bool,
    pub updated: usize,
}

#[derive(Debug, Deserialize)]
pub struct SaleStatusInput {
    pub vendor_id: Uuid,
    pub date: NaiveDate,
    pub status: TransactionStatus,
}

#[derive(Debug, Serialize)]
pub struct StatusChange {
    pub success: bool,
    pub message: String,
    pub sale_id: Uuid,
    pub status: TransactionStatus,
}

#[derive(FromRow)]
struct LockedSale {
    distributor_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    status: TransactionStatus,
    #[sqlx(try_from = "String")]
    vendor_type: VendorType,
}

#[derive(FromRow)]
struct VendorPlacement {
    distributor_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    vendor_type: VendorType,
}

fn ensure_covered(access: &AccessScope, distributor_id: Option<Uuid>) -> AppResult<()> {
    let allowed = match distributor_id {
        Some(id) => access.covers(id),
        None => access.is_national(),
    };
    if allowed {
        Ok(())
    } else {
        Err(AppError::forbidden("Sale is outside your scope"))
    }
}

fn check_quantities(lines: &[LineItem]) -> AppResult<()> {
    for line in lines {
        validate_line_quantity(line.quantity).on_field("products")?;
    }
    Ok(())
}

impl SaleService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ------------------------------------------------------------------------
    // Listing
    // ------------------------------------------------------------------------

    pub async fn list_sales(
        &self,
        access: &AccessScope,
        query: ListSalesQuery,
    ) -> AppResult<Page<SaleWithLines>> {
        let page = Pagination::new(query.page, query.page_size, shared::DEFAULT_PAGE_SIZE);
        let distributor_id = id_filter(query.distributor_id.as_deref(), "distributor_id")?;
        let vendor_id = id_filter(query.vendor_id.as_deref(), "vendor_id")?;
        let status = match text_filter(query.status.as_deref()) {
            None => None,
            Some(s) => Some(
                s.parse::<TransactionStatus>()
                    .map_err(|e| AppError::validation("status", e.to_string()))?,
            ),
        };
        let search = like_pattern(query.search.as_deref());

        let filter = r#"
            WHERE ($1::uuid[] IS NULL OR s.distributor_id = ANY($1))
              AND ($2::date IS NULL OR s.date >= $2)
              AND ($3::date IS NULL OR s.date <= $3)
              AND ($4::uuid IS NULL OR s.distributor_id = $4)
              AND ($5::uuid IS NULL OR s.vendor_id = $5)
              AND ($6::text IS NULL OR s.status = $6)
              AND ($7::text IS NULL OR d.name ILIKE $7
                   OR (v.first_name || ' ' || v.last_name) ILIKE $7
                   OR s.id::text ILIKE $7)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            r#"
            SELECT COUNT(*)
            FROM sales s
            JOIN vendors v ON v.id = s.vendor_id
            LEFT JOIN distributors d ON d.id = s.distributor_id
            {}
            "#,
            filter
        ))
        .bind(access.distributor_filter())
        .bind(query.start_date)
        .bind(query.end_date)
        .bind(distributor_id)
        .bind(vendor_id)
        .bind(status.map(|s| s.as_str()))
        .bind(&search)
        .fetch_one(&self.db)
        .await?;

        let sales = sqlx::query_as::<_, Sale>(&format!(
            "{} {} ORDER BY s.date DESC, s.created_at DESC, s.id DESC LIMIT $8 OFFSET $9",
            SALE_SELECT, filter
        ))
        .bind(access.distributor_filter())
        .bind(query.start_date)
        .bind(query.end_date)
        .bind(distributor_id)
        .bind(vendor_id)
        .bind(status.map(|s| s.as_str()))
        .bind(&search)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        let data = self.attach_lines(sales).await?;
        Ok(Page::new(data, total))
    }

    pub async fn get_sale(&self, access: &AccessScope, sale_id: Uuid) -> AppResult<SaleWithLines> {
        let sale = sqlx::query_as::<_, Sale>(&format!("{} WHERE s.id = $1", SALE_SELECT))
            .bind(sale_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Sale".to_string()))?;
        ensure_covered(access, sale.distributor_id)?;

        let mut with_lines = self.attach_lines(vec![sale]).await?;
        with_lines
            .pop()
            .ok_or_else(|| AppError::NotFound("Sale".to_string()))
    }

    async fn attach_lines(&self, sales: Vec<Sale>) -> AppResult<Vec<SaleWithLines>> {
        let ids: Vec<Uuid> = sales.iter().map(|s| s.id).collect();
        let rows = sqlx::query_as::<_, SaleLineRow>(
            r#"
            SELECT si.sale_id, si.product_id, p.code, p.name, si.quantity,
                   p.price_factory, p.price_wholesale, p.price_retail, p.price_supermarket
            FROM sale_items si
            JOIN products p ON p.id = si.product_id
            WHERE si.sale_id = ANY($1)
            ORDER BY p.name
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut by_sale: HashMap<Uuid, Vec<SaleLineRow>> = HashMap::new();
        for row in rows {
            by_sale.entry(row.sale_id).or_default().push(row);
        }

        Ok(sales
            .into_iter()
            .map(|sale| {
                let products = by_sale
                    .remove(&sale.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|r| SaleLine {
                        unit_price: r.prices().for_vendor(sale.vendor_type),
                        product_id: r.product_id,
                        code: r.code,
                        name: r.name,
                        quantity: r.quantity,
                    })
                    .collect();
                SaleWithLines { sale, products }
            })
            .collect())
    }

    // ------------------------------------------------------------------------
    // Create / update / delete
    // ------------------------------------------------------------------------

    pub async fn create_sale(
        &self,
        access: &AccessScope,
        input: CreateSaleInput,
    ) -> AppResult<SaleWithLines> {
        check_quantities(&input.products)?;
        let lines = merge_lines(&input.products);
        let status = input.status.unwrap_or_default();

        let mut tx = self.db.begin().await?;

        let vendor = vendor_placement(&mut tx, input.vendor_id).await?;
        ensure_covered(access, vendor.distributor_id)?;
        lines::ensure_products_exist(&mut tx, &lines).await?;

        let sale_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO sales (date, distributor_id, vendor_id, supervisor_id, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(input.date)
        .bind(vendor.distributor_id)
        .bind(input.vendor_id)
        .bind(access.user_id)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        lines::replace_lines(&mut tx, KIND, sale_id, &lines).await?;
        let after = TransactionState::new(vendor.distributor_id, status, lines);
        StockLedger::new(&mut tx).reconcile(KIND, None, Some(&after)).await?;
        lines::recalculate_total(&mut tx, KIND, sale_id, vendor.vendor_type.price_tier()).await?;

        tx.commit().await?;

        tracing::info!(%sale_id, vendor_id = %input.vendor_id, %status, "Created sale");
        self.get_sale(access, sale_id).await
    }

    pub async fn update_sale(
        &self,
        access: &AccessScope,
        sale_id: Uuid,
        input: UpdateSaleInput,
    ) -> AppResult<SaleWithLines> {
        if let Some(products) = &input.products {
            check_quantities(products)?;
        }

        let mut tx = self.db.begin().await?;

        let locked = lock_sale(&mut tx, sale_id).await?;
        ensure_covered(access, locked.distributor_id)?;

        let old_lines = lines::load_lines(&mut tx, KIND, sale_id).await?;
        let new_lines = match &input.products {
            Some(products) => {
                let merged = merge_lines(products);
                lines::ensure_products_exist(&mut tx, &merged).await?;
                lines::replace_lines(&mut tx, KIND, sale_id, &merged).await?;
                merged
            }
            None => old_lines.clone(),
        };
        let new_status = input.status.unwrap_or(locked.status);

        sqlx::query("UPDATE sales SET status = $1, date = COALESCE($2, date) WHERE id = $3")
            .bind(new_status.as_str())
            .bind(input.date)
            .bind(sale_id)
            .execute(&mut *tx)
            .await?;

        let before = TransactionState::new(locked.distributor_id, locked.status, old_lines);
        let after = TransactionState::new(locked.distributor_id, new_status, new_lines);
        StockLedger::new(&mut tx)
            .reconcile(KIND, Some(&before), Some(&after))
            .await?;
        lines::recalculate_total(&mut tx, KIND, sale_id, locked.vendor_type.price_tier()).await?;

        tx.commit().await?;

        tracing::info!(%sale_id, from = %locked.status, to = %new_status, "Updated sale");
        self.get_sale(access, sale_id).await
    }

    pub async fn delete_sale(&self, access: &AccessScope, sale_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let locked = lock_sale(&mut tx, sale_id).await?;
        ensure_covered(access, locked.distributor_id)?;

        let old_lines = lines::load_lines(&mut tx, KIND, sale_id).await?;
        let before = TransactionState::new(locked.distributor_id, locked.status, old_lines);
        StockLedger::new(&mut tx).reconcile(KIND, Some(&before), None).await?;

        sqlx::query("DELETE FROM sales WHERE id = $1")
            .bind(sale_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(%sale_id, status = %locked.status, "Deleted sale");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Weekly matrix
    // ------------------------------------------------------------------------

    /// Products by sales day for one vendor's week
    pub async fn weekly_matrix(
        &self,
        access: &AccessScope,
        query: SalesMatrixQuery,
    ) -> AppResult<SalesMatrix> {
        let vendor_id = query
            .vendor_id
            .ok_or_else(|| AppError::validation("vendor_id", "vendor_id is required"))?;
        let start_date = query
            .start_date
            .ok_or_else(|| AppError::validation("start_date", "start_date is required"))?;

        let page = Pagination::new(query.page, query.page_size, shared::MATRIX_PAGE_SIZE);
        let search = like_pattern(query.search.as_deref());
        let category = id_filter(query.category.as_deref(), "category")?;
        let product_type = id_filter(query.product_type.as_deref(), "product_type")?;
        let format = text_filter(query.format.as_deref());

        let mut conn = self.db.acquire().await?;
        let vendor = vendor_placement(&mut conn, vendor_id).await?;
        ensure_covered(access, vendor.distributor_id)?;

        let dates = week_dates(start_date);
        let (first, last) = (dates[0], dates[WEEK_DAYS - 1]);

        let filter = r#"
            WHERE (p.active OR p.id IN (SELECT product_id FROM week_lines))
              AND ($4::text IS NULL OR p.name ILIKE $4 OR p.code ILIKE $4)
              AND ($5::uuid IS NULL OR p.category_id = $5)
              AND ($6::uuid IS NULL OR p.type_id = $6)
              AND ($7::text IS NULL OR p.format = $7)
        "#;
        let week_lines = r#"
            WITH week_lines AS (
                SELECT DISTINCT si.product_id
                FROM sales s
                JOIN sale_items si ON si.sale_id = s.id
                WHERE s.vendor_id = $1 AND s.date BETWEEN $2 AND $3
            )
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "{} SELECT COUNT(*) FROM products p {}",
            week_lines, filter
        ))
        .bind(vendor_id)
        .bind(first)
        .bind(last)
        .bind(&search)
        .bind(category)
        .bind(product_type)
        .bind(&format)
        .fetch_one(&mut *conn)
        .await?;

        let products = sqlx::query_as::<_, MatrixProductRow>(&format!(
            r#"
            {}
            SELECT p.id, p.code, p.name, p.format, p.active,
                   p.price_factory, p.price_wholesale, p.price_retail, p.price_supermarket
            FROM products p
            {}
            ORDER BY (p.id IN (SELECT product_id FROM week_lines)) DESC, p.name ASC, p.id ASC
            LIMIT $8 OFFSET $9
            "#,
            week_lines, filter
        ))
        .bind(vendor_id)
        .bind(first)
        .bind(last)
        .bind(&search)
        .bind(category)
        .bind(product_type)
        .bind(&format)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

        let product_ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let cells = sqlx::query_as::<_, (NaiveDate, Uuid, i64)>(
            r#"
            SELECT s.date, si.product_id, SUM(si.quantity)::bigint
            FROM sales s
            JOIN sale_items si ON si.sale_id = s.id
            WHERE s.vendor_id = $1 AND s.date BETWEEN $2 AND $3
              AND si.product_id = ANY($4)
            GROUP BY s.date, si.product_id
            "#,
        )
        .bind(vendor_id)
        .bind(first)
        .bind(last)
        .bind(&product_ids)
        .fetch_all(&mut *conn)
        .await?;

        let statuses = sqlx::query_as::<_, (NaiveDate, String)>(
            r#"
            SELECT DISTINCT ON (date) date, status
            FROM sales
            WHERE vendor_id = $1 AND date BETWEEN $2 AND $3
            ORDER BY date, created_at
            "#,
        )
        .bind(vendor_id)
        .bind(first)
        .bind(last)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|(date, status)| {
            status
                .parse::<TransactionStatus>()
                .map(|s| (date, s))
                .map_err(|e| AppError::Internal(e.to_string()))
        })
        .collect::<AppResult<BTreeMap<_, _>>>()?;

        let mut quantities: HashMap<(Uuid, NaiveDate), i64> = HashMap::new();
        for (date, product_id, qty) in cells {
            quantities.insert((product_id, date), qty);
        }

        let data = products
            .into_iter()
            .map(|p| {
                let prices = ProductPrices {
                    factory: p.price_factory,
                    wholesale: p.price_wholesale,
                    retail: p.price_retail,
                    supermarket: p.price_supermarket,
                };
                let mut days = [0i32; WEEK_DAYS];
                for (i, date) in dates.iter().enumerate() {
                    let qty = quantities.get(&(p.id, *date)).copied().unwrap_or(0);
                    days[i] = i32::try_from(qty).unwrap_or(i32::MAX);
                }
                SalesMatrixRow {
                    product_id: p.id,
                    code: p.code,
                    name: p.name,
                    format: p.format,
                    active: p.active,
                    unit_price: prices.for_vendor(vendor.vendor_type),
                    days,
                }
            })
            .collect();

        Ok(SalesMatrix {
            data,
            total,
            dates,
            statuses,
        })
    }

    // ------------------------------------------------------------------------
    // Cell edits
    // ------------------------------------------------------------------------

    /// Set one (vendor, product, day) quantity
    pub async fn upsert_cell(&self, access: &AccessScope, input: SaleCellInput) -> AppResult<CellResult> {
        let mut tx = self.db.begin().await?;
        let new_total = apply_cell(&mut tx, access, &input).await?;
        tx.commit().await?;

        Ok(CellResult {
            success: true,
            new_total,
        })
    }

    /// Apply many cell edits atomically
    pub async fn bulk_upsert(&self, access: &AccessScope, input: BulkCellInput) -> AppResult<BulkCellResult> {
        if input.entries.is_empty() {
            return Err(AppError::validation("entries", "No entries to save"));
        }

        let mut tx = self.db.begin().await?;
        let days: BTreeSet<(Uuid, NaiveDate)> =
            input.entries.iter().map(|e| (e.vendor_id, e.date)).collect();
        for (vendor_id, date) in days {
            lock_vendor_day(&mut tx, vendor_id, date).await?;
        }
        for entry in &input.entries {
            apply_cell(&mut tx, access, entry).await?;
        }
        tx.commit().await?;

        tracing::info!(entries = input.entries.len(), "Bulk-saved sales cells");
        Ok(BulkCellResult {
            success: true,
            updated: input.entries.len(),
        })
    }

    /// Set the status of a vendor's sale for one day, creating the sale if
    /// there is none yet
    pub async fn set_status_by_date(
        &self,
        access: &AccessScope,
        input: SaleStatusInput,
    ) -> AppResult<StatusChange> {
        let mut tx = self.db.begin().await?;

        let vendor = vendor_placement(&mut tx, input.vendor_id).await?;
        ensure_covered(access, vendor.distributor_id)?;

        lock_vendor_day(&mut tx, input.vendor_id, input.date).await?;
        let existing = find_day_sale(&mut tx, input.vendor_id, input.date).await?;
        let (sale_id, message) = match existing {
            None => {
                let sale_id = insert_sale(
                    &mut tx,
                    access,
                    input.vendor_id,
                    vendor.distributor_id,
                    input.date,
                    input.status,
                )
                .await?;
                (sale_id, "Sale created".to_string())
            }
            Some((sale_id, _)) => {
                let locked = lock_sale(&mut tx, sale_id).await?;
                if locked.status == input.status {
                    (sale_id, "no change".to_string())
                } else {
                    let current = lines::load_lines(&mut tx, KIND, sale_id).await?;
                    sqlx::query("UPDATE sales SET status = $1 WHERE id = $2")
                        .bind(input.status.as_str())
                        .bind(sale_id)
                        .execute(&mut *tx)
                        .await?;

                    let before =
                        TransactionState::new(locked.distributor_id, locked.status, current.clone());
                    let after = TransactionState::new(locked.distributor_id, input.status, current);
                    StockLedger::new(&mut tx)
                        .reconcile(KIND, Some(&before), Some(&after))
                        .await?;

                    tracing::info!(%sale_id, from = %locked.status, to = %input.status, "Changed sale status");
                    (sale_id, "Status updated".to_string())
                }
            }
        };

        tx.commit().await?;

        Ok(StatusChange {
            success: true,
            message,
            sale_id,
            status: input.status,
        })
    }
}

async fn vendor_placement(conn: &mut PgConnection, vendor_id: Uuid) -> AppResult<VendorPlacement> {
    sqlx::query_as::<_, VendorPlacement>(
        "SELECT distributor_id, vendor_type FROM vendors WHERE id = $1",
    )
    .bind(vendor_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Vendor".to_string()))
}

async fn lock_sale(conn: &mut PgConnection, sale_id: Uuid) -> AppResult<LockedSale> {
    sqlx::query_as::<_, LockedSale>(
        r#"
        SELECT s.distributor_id, s.status, v.vendor_type
        FROM sales s
        JOIN vendors v ON v.id = s.vendor_id
        WHERE s.id = $1
        FOR UPDATE OF s
        "#,
    )
    .bind(sale_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Sale".to_string()))
}

/// Transaction-scoped lock on one vendor-day, released at commit or rollback.
/// Serializes finding or creating the day's sale. Bulk callers lock in key order.
async fn lock_vendor_day(conn: &mut PgConnection, vendor_id: Uuid, date: NaiveDate) -> AppResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text || '/' || $2::text, 0))")
        .bind(vendor_id)
        .bind(date)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// The vendor's sale for a day; the oldest one if several exist
async fn find_day_sale(
    conn: &mut PgConnection,
    vendor_id: Uuid,
    date: NaiveDate,
) -> AppResult<Option<(Uuid, TransactionStatus)>> {
    let row = sqlx::query_as::<_, (Uuid, String)>(
        r#"
        SELECT id, status FROM sales
        WHERE vendor_id = $1 AND date = $2
        ORDER BY created_at, id
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(vendor_id)
    .bind(date)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|(id, status)| {
        status
            .parse::<TransactionStatus>()
            .map(|s| (id, s))
            .map_err(|e| AppError::Internal(e.to_string()))
    })
    .transpose()
}

async fn insert_sale(
    conn: &mut PgConnection,
    access: &AccessScope,
    vendor_id: Uuid,
    distributor_id: Option<Uuid>,
    date: NaiveDate,
    status: TransactionStatus,
) -> AppResult<Uuid> {
    let sale_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO sales (date, distributor_id, vendor_id, supervisor_id, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(date)
    .bind(distributor_id)
    .bind(vendor_id)
    .bind(access.user_id)
    .bind(status.as_str())
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(%sale_id, %vendor_id, %date, %status, "Created sale");
    Ok(sale_id)
}

/// One cell edit on an open transaction; returns the sale's new total
async fn apply_cell(
    conn: &mut PgConnection,
    access: &AccessScope,
    input: &SaleCellInput,
) -> AppResult<Decimal> {
    let vendor = vendor_placement(conn, input.vendor_id).await?;
    ensure_covered(access, vendor.distributor_id)?;
    lines::ensure_products_exist(conn, &[LineItem::new(input.product_id, input.quantity)]).await?;

    lock_vendor_day(conn, input.vendor_id, input.date).await?;
    let sale_id = match find_day_sale(conn, input.vendor_id, input.date).await? {
        Some((id, _)) => id,
        None if input.quantity <= 0 => return Ok(Decimal::ZERO),
        None => {
            insert_sale(
                conn,
                access,
                input.vendor_id,
                vendor.distributor_id,
                input.date,
                TransactionStatus::Complete,
            )
            .await?
        }
    };

    let locked = lock_sale(conn, sale_id).await?;
    let old = lines::set_line(conn, KIND, sale_id, input.product_id, input.quantity).await?;

    let delta = cell_delta(KIND, locked.status, old, input.quantity);
    StockLedger::new(conn)
        .apply_delta(locked.distributor_id, Some(input.product_id), delta)
        .await?;

    lines::recalculate_total(conn, KIND, sale_id, locked.vendor_type.price_tier()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::{retail_price, seed_network, stock, Network};
    use tokio::task::JoinSet;
    use tokio_test::assert_ok;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn cell(net: &Network, product: usize, quantity: i32) -> SaleCellInput {
        SaleCellInput {
            vendor_id: net.vendor_id,
            product_id: net.products[product],
            date: monday(),
            quantity,
        }
    }

    async fn day_sales(pool: &PgPool, vendor_id: Uuid) -> Vec<(Uuid, String)> {
        sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, status FROM sales WHERE vendor_id = $1 AND date = $2",
        )
        .bind(vendor_id)
        .bind(monday())
        .fetch_all(pool)
        .await
        .unwrap()
    }

    async fn matrix_cell(service: &SaleService, net: &Network, product: usize) -> i32 {
        let matrix = assert_ok!(
            service
                .weekly_matrix(
                    &net.access,
                    SalesMatrixQuery {
                        vendor_id: Some(net.vendor_id),
                        start_date: Some(monday()),
                        search: None,
                        category: None,
                        product_type: None,
                        format: None,
                        page: None,
                        page_size: None,
                    },
                )
                .await
        );
        let day = matrix.dates.iter().position(|d| *d == monday()).unwrap();
        matrix
            .data
            .iter()
            .find(|row| row.product_id == net.products[product])
            .map_or(0, |row| row.days[day])
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_first_cell_creates_complete_sale_from_zero(pool: PgPool) {
        let net = seed_network(&pool).await;
        let service = SaleService::new(pool.clone());
        let (d, p) = (net.distributor_id, net.products[0]);

        let result = assert_ok!(service.upsert_cell(&net.access, cell(&net, 0, 10)).await);
        assert_eq!(result.new_total, retail_price() * Decimal::from(10));

        let sales = day_sales(&pool, net.vendor_id).await;
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].1, "complete");
        assert_eq!(stock(&pool, d, p).await, -10);

        assert_ok!(service.upsert_cell(&net.access, cell(&net, 0, 4)).await);
        assert_eq!(stock(&pool, d, p).await, -4);

        let result = assert_ok!(service.upsert_cell(&net.access, cell(&net, 0, 0)).await);
        assert_eq!(result.new_total, Decimal::ZERO);
        assert_eq!(stock(&pool, d, p).await, 0);
        assert_eq!(matrix_cell(&service, &net, 0).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_clearing_an_empty_cell_creates_nothing(pool: PgPool) {
        let net = seed_network(&pool).await;
        let service = SaleService::new(pool.clone());

        assert_ok!(service.upsert_cell(&net.access, cell(&net, 0, 0)).await);
        assert!(day_sales(&pool, net.vendor_id).await.is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_cell_edit_on_draft_sale_keeps_stock(pool: PgPool) {
        let net = seed_network(&pool).await;
        let service = SaleService::new(pool.clone());
        let status = |status| SaleStatusInput {
            vendor_id: net.vendor_id,
            date: monday(),
            status,
        };

        let created = assert_ok!(service.set_status_by_date(&net.access, status(TransactionStatus::EnCours)).await);
        assert_eq!(created.message, "Sale created");

        assert_ok!(service.upsert_cell(&net.access, cell(&net, 0, 5)).await);
        assert_ok!(service.upsert_cell(&net.access, cell(&net, 1, 2)).await);
        assert_eq!(stock(&pool, net.distributor_id, net.products[0]).await, 0);
        assert_eq!(matrix_cell(&service, &net, 0).await, 5);

        assert_ok!(service.set_status_by_date(&net.access, status(TransactionStatus::Complete)).await);
        assert_eq!(stock(&pool, net.distributor_id, net.products[0]).await, -5);
        assert_eq!(stock(&pool, net.distributor_id, net.products[1]).await, -2);

        assert_ok!(service.set_status_by_date(&net.access, status(TransactionStatus::Annule)).await);
        assert_eq!(stock(&pool, net.distributor_id, net.products[0]).await, 0);

        let unchanged = assert_ok!(service.set_status_by_date(&net.access, status(TransactionStatus::Annule)).await);
        assert_eq!(unchanged.message, "no change");
        assert_eq!(day_sales(&pool, net.vendor_id).await.len(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_concurrent_first_edits_share_one_sale(pool: PgPool) {
        let net = seed_network(&pool).await;
        let service = SaleService::new(pool.clone());

        let mut edits = JoinSet::new();
        for i in 0..8 {
            let service = service.clone();
            let access = net.access.clone();
            let input = cell(&net, i % 2, 5);
            edits.spawn(async move { service.upsert_cell(&access, input).await });
        }
        while let Some(joined) = edits.join_next().await {
            assert_ok!(joined.unwrap());
        }

        assert_eq!(day_sales(&pool, net.vendor_id).await.len(), 1);
        assert_eq!(stock(&pool, net.distributor_id, net.products[0]).await, -5);
        assert_eq!(stock(&pool, net.distributor_id, net.products[1]).await, -5);

        assert_ok!(service.upsert_cell(&net.access, cell(&net, 0, 1)).await);
        assert_eq!(matrix_cell(&service, &net, 0).await, 1);
        assert_eq!(stock(&pool, net.distributor_id, net.products[0]).await, -1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_concurrent_status_and_cell_share_one_sale(pool: PgPool) {
        let net = seed_network(&pool).await;
        let service = SaleService::new(pool.clone());

        let mut writes = JoinSet::new();
        for i in 0..6 {
            let service = service.clone();
            let access = net.access.clone();
            let vendor_id = net.vendor_id;
            let input = cell(&net, 0, 3);
            writes.spawn(async move {
                if i % 2 == 0 {
                    service.upsert_cell(&access, input).await.map(|_| ())
                } else {
                    service
                        .set_status_by_date(
                            &access,
                            SaleStatusInput {
                                vendor_id,
                                date: monday(),
                                status: TransactionStatus::Complete,
                            },
                        )
                        .await
                        .map(|_| ())
                }
            });
        }
        while let Some(joined) = writes.join_next().await {
            assert_ok!(joined.unwrap());
        }

        assert_eq!(day_sales(&pool, net.vendor_id).await.len(), 1);
        assert_eq!(stock(&pool, net.distributor_id, net.products[0]).await, -3);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_bulk_upsert_is_atomic(pool: PgPool) {
        let net = seed_network(&pool).await;
        let service = SaleService::new(pool.clone());

        let mut bad = cell(&net, 1, 4);
        bad.product_id = Uuid::new_v4();
        let input = BulkCellInput {
            entries: vec![cell(&net, 0, 6), bad],
        };
        assert!(service.bulk_upsert(&net.access, input).await.is_err());
        assert!(day_sales(&pool, net.vendor_id).await.is_empty());
        assert_eq!(stock(&pool, net.distributor_id, net.products[0]).await, 0);

        let input = BulkCellInput {
            entries: vec![cell(&net, 0, 6), cell(&net, 1, 4)],
        };
        let result = assert_ok!(service.bulk_upsert(&net.access, input).await);
        assert_eq!(result.updated, 2);
        assert_eq!(stock(&pool, net.distributor_id, net.products[1]).await, -4);
    }
}
