//! Inventory service: balances, manual adjustments, history, physical counts
//! and rebuilding balances from the movement ledger

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::stock::{StockBook, StockCorrection, StockDelta, StockKey};
use shared::{
    is_low_stock, validate_adjustment_note, validate_adjustment_quantity,
    validate_physical_count, MessageResponse, MovementType, Page, Pagination, StockVariance,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult, ValidateField};
use crate::services::filters::{id_filter, like_pattern};
use crate::services::scope::{AccessScope, ScopeService};
use crate::services::stock::StockLedger;

/// Inventory service
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
    low_stock_threshold: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockRow {
    pub product_id: Uuid,
    pub product_code: String,
    pub product_name: String,
    pub category: Option<String>,
    pub quantity: i32,
    pub physical_quantity: Option<i32>,
    pub last_updated: DateTime<Utc>,
    #[sqlx(skip)]
    pub low_stock: bool,
}

#[derive(Debug, Serialize)]
pub struct StockPage {
    pub data: Vec<StockRow>,
    pub total: i64,
    pub current_distributor: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StockQuery {
    pub distributor_id: Option<String>,
    pub search: Option<String>,
    /// `json` (default) or `csv`
    pub format: Option<String>,
    pub page: Option<i64>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockInput {
    pub distributor_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HistoryEntry {
    #[serde(rename = "id")]
    pub ref_id: Uuid,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub movement_type: MovementType,
    pub quantity: i32,
    #[serde(rename = "actor")]
    pub actor_name: String,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PhysicalCountInput {
    pub distributor_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct RefreshResult {
    pub message: String,
    pub corrected: usize,
    pub corrections: Vec<StockCorrection>,
}

#[derive(FromRow)]
struct BalanceRow {
    distributor_id: Uuid,
    product_id: Uuid,
    quantity: i64,
}

#[derive(FromRow)]
struct AdjustmentRow {
    distributor_id: Uuid,
    product_id: Uuid,
    quantity: i32,
}

impl InventoryService {
    pub fn new(db: PgPool, low_stock_threshold: i32) -> Self {
        Self {
            db,
            low_stock_threshold,
        }
    }

    /// Stock balances of one distributor.
    ///
    /// Supervisors without an explicit distributor get their first one.
    pub async fn stock(&self, access: &AccessScope, query: &StockQuery) -> AppResult<StockPage> {
        let requested = id_filter(query.distributor_id.as_deref(), "distributor_id")?;

        let distributor_id = match requested {
            Some(id) => {
                ScopeService::new(self.db.clone())
                    .ensure_distributor(access, id)
                    .await?;
                id
            }
            None if access.is_supervisor() => match access.first_distributor() {
                Some(id) => id,
                None => {
                    return Ok(StockPage {
                        data: Vec::new(),
                        total: 0,
                        current_distributor: None,
                        message: Some("No distributor assigned".to_string()),
                    })
                }
            },
            None => {
                return Err(AppError::validation(
                    "distributor_id",
                    "Select a distributor",
                ))
            }
        };

        let page = Pagination::new(query.page, query.page_size, shared::DEFAULT_PAGE_SIZE);
        let search = like_pattern(query.search.as_deref());

        let filter = r#"
            WHERE i.distributor_id = $1
              AND ($2::text IS NULL OR p.name ILIKE $2 OR p.code ILIKE $2)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM inventory i JOIN products p ON p.id = i.product_id {}",
            filter
        ))
        .bind(distributor_id)
        .bind(&search)
        .fetch_one(&self.db)
        .await?;

        let mut rows = sqlx::query_as::<_, StockRow>(&format!(
            r#"
            SELECT i.product_id, p.code AS product_code, p.name AS product_name,
                   c.name AS category, i.quantity, pi.quantity AS physical_quantity,
                   i.last_updated
            FROM inventory i
            JOIN products p ON p.id = i.product_id
            LEFT JOIN product_categories c ON c.id = p.category_id
            LEFT JOIN physical_inventory pi
                   ON pi.distributor_id = i.distributor_id AND pi.product_id = i.product_id
            {}
            ORDER BY p.name ASC, p.id ASC
            LIMIT $3 OFFSET $4
            "#,
            filter
        ))
        .bind(distributor_id)
        .bind(&search)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        for row in &mut rows {
            row.low_stock = is_low_stock(i64::from(row.quantity), self.low_stock_threshold);
        }

        Ok(StockPage {
            data: rows,
            total,
            current_distributor: Some(distributor_id),
            message: None,
        })
    }

    /// Render stock rows as CSV
    pub fn export_to_csv(rows: &[StockRow]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in rows {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }

    /// Record a signed manual correction and apply it to the balance
    pub async fn adjust(&self, access: &AccessScope, input: AdjustStockInput) -> AppResult<MessageResponse> {
        validate_adjustment_quantity(input.quantity).on_field("quantity")?;
        let note = input.note.trim();
        validate_adjustment_note(note).on_field("note")?;

        ScopeService::new(self.db.clone())
            .ensure_distributor(access, input.distributor_id)
            .await?;
        self.ensure_product(input.product_id).await?;

        let mut tx = self.db.begin().await?;

        let adjustment_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO stock_adjustments (date, distributor_id, product_id, supervisor_id, quantity, note)
            VALUES (CURRENT_DATE, $1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(input.distributor_id)
        .bind(input.product_id)
        .bind(access.user_id)
        .bind(input.quantity)
        .bind(note)
        .fetch_one(&mut *tx)
        .await?;

        StockLedger::new(&mut tx)
            .apply_delta(
                Some(input.distributor_id),
                Some(input.product_id),
                i64::from(input.quantity),
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            %adjustment_id,
            distributor_id = %input.distributor_id,
            product_id = %input.product_id,
            quantity = input.quantity,
            "Recorded stock adjustment"
        );
        Ok(MessageResponse::with_id("Adjustment recorded", adjustment_id))
    }

    /// Remove an adjustment and reverse its effect
    pub async fn delete_adjustment(&self, access: &AccessScope, adjustment_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let adjustment = sqlx::query_as::<_, AdjustmentRow>(
            "SELECT distributor_id, product_id, quantity FROM stock_adjustments WHERE id = $1 FOR UPDATE",
        )
        .bind(adjustment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Adjustment".to_string()))?;

        if !access.covers(adjustment.distributor_id) {
            return Err(AppError::forbidden("Adjustment is outside your scope"));
        }

        StockLedger::new(&mut tx)
            .apply_delta(
                Some(adjustment.distributor_id),
                Some(adjustment.product_id),
                -i64::from(adjustment.quantity),
            )
            .await?;

        sqlx::query("DELETE FROM stock_adjustments WHERE id = $1")
            .bind(adjustment_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(%adjustment_id, "Deleted stock adjustment");
        Ok(())
    }

    /// Movements of one product at one distributor, newest first
    pub async fn history(
        &self,
        access: &AccessScope,
        distributor_id: Uuid,
        product_id: Uuid,
        query: HistoryQuery,
    ) -> AppResult<Page<HistoryEntry>> {
        ScopeService::new(self.db.clone())
            .ensure_distributor(access, distributor_id)
            .await?;
        let page = Pagination::new(query.page, query.page_size, shared::DEFAULT_PAGE_SIZE);

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM inventory_history WHERE distributor_id = $1 AND product_id = $2",
        )
        .bind(distributor_id)
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        let entries = sqlx::query_as::<_, HistoryEntry>(
            r#"
            SELECT ref_id, date, movement_type, quantity, actor_name, note
            FROM inventory_history
            WHERE distributor_id = $1 AND product_id = $2
            ORDER BY date DESC, ref_id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(distributor_id)
        .bind(product_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Page::new(entries, total))
    }

    /// Rebuild every balance from the movement ledger and fix rows that drifted
    pub async fn refresh(&self) -> AppResult<RefreshResult> {
        let mut tx = self.db.begin().await?;

        let stored = sqlx::query_as::<_, BalanceRow>(
            "SELECT distributor_id, product_id, quantity::bigint AS quantity FROM inventory FOR UPDATE",
        )
        .fetch_all(&mut *tx)
        .await?;

        let ledger = sqlx::query_as::<_, BalanceRow>(
            r#"
            SELECT distributor_id, product_id, SUM(quantity)::bigint AS quantity
            FROM inventory_history
            GROUP BY distributor_id, product_id
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let mut current = StockBook::new();
        for row in stored {
            current.set(StockKey::new(row.distributor_id, row.product_id), row.quantity);
        }
        let mut expected = StockBook::new();
        for row in ledger {
            expected.set(StockKey::new(row.distributor_id, row.product_id), row.quantity);
        }

        let corrections = expected.corrections(&current);
        let deltas: Vec<StockDelta> = corrections
            .iter()
            .map(|c| {
                StockDelta::new(
                    StockKey::new(c.distributor_id, c.product_id),
                    c.expected - c.current,
                )
            })
            .collect();
        StockLedger::new(&mut tx).apply_all(&deltas).await?;

        tx.commit().await?;

        let corrected = corrections.len();
        if corrected > 0 {
            tracing::warn!(corrected, "Inventory drift corrected");
        } else {
            tracing::info!("Inventory matches its ledger");
        }

        Ok(RefreshResult {
            message: format!("Inventory refreshed, {} row(s) corrected", corrected),
            corrected,
            corrections,
        })
    }

    /// Store a physical count and compare it with the theoretical balance
    pub async fn record_physical(
        &self,
        access: &AccessScope,
        input: PhysicalCountInput,
    ) -> AppResult<StockVariance> {
        validate_physical_count(input.quantity).on_field("quantity")?;
        ScopeService::new(self.db.clone())
            .ensure_distributor(access, input.distributor_id)
            .await?;
        self.ensure_product(input.product_id).await?;

        sqlx::query(
            r#"
            INSERT INTO physical_inventory (distributor_id, product_id, quantity, counted_by, counted_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (distributor_id, product_id)
            DO UPDATE SET quantity = EXCLUDED.quantity,
                          counted_by = EXCLUDED.counted_by,
                          counted_at = NOW()
            "#,
        )
        .bind(input.distributor_id)
        .bind(input.product_id)
        .bind(input.quantity)
        .bind(access.user_id)
        .execute(&self.db)
        .await?;

        let theoretical = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM inventory WHERE distributor_id = $1 AND product_id = $2",
        )
        .bind(input.distributor_id)
        .bind(input.product_id)
        .fetch_optional(&self.db)
        .await?
        .unwrap_or(0);

        let variance = StockVariance::new(i64::from(theoretical), i64::from(input.quantity));
        tracing::info!(
            distributor_id = %input.distributor_id,
            product_id = %input.product_id,
            variance = variance.variance,
            "Recorded physical count"
        );
        Ok(variance)
    }

    async fn ensure_product(&self, product_id: Uuid) -> AppResult<()> {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_one(&self.db)
            .await?;
        if exists == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::{seed_network, stock, Network};
    use crate::services::sale::{SaleCellInput, SaleService};
    use tokio_test::assert_ok;

    #[test]
    fn test_csv_export_has_header_and_rows() {
        let row = StockRow {
            product_id: Uuid::nil(),
            product_code: "EAU-15".to_string(),
            product_name: "Eau 1.5L".to_string(),
            category: Some("Eau".to_string()),
            quantity: 3,
            physical_quantity: None,
            last_updated: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
            low_stock: true,
        };
        let csv = InventoryService::export_to_csv(&[row]).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("product_id,product_code,product_name"));
        assert!(lines.next().unwrap().contains("EAU-15"));
    }

    async fn cell(pool: &PgPool, net: &Network, product_id: Uuid, quantity: i32) {
        let input = SaleCellInput {
            vendor_id: net.vendor_id,
            product_id,
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            quantity,
        };
        assert_ok!(SaleService::new(pool.clone()).upsert_cell(&net.access, input).await);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_refresh_rebuilds_drifted_balance(pool: PgPool) {
        let net = seed_network(&pool).await;
        let service = InventoryService::new(pool.clone(), 5);
        let (d, p) = (net.distributor_id, net.products[0]);

        cell(&pool, &net, p, 7).await;
        assert_ok!(
            service
                .adjust(
                    &net.access,
                    AdjustStockInput {
                        distributor_id: d,
                        product_id: p,
                        quantity: 20,
                        note: "  opening count  ".to_string(),
                    },
                )
                .await
        );
        assert_eq!(stock(&pool, d, p).await, 13);

        sqlx::query("UPDATE inventory SET quantity = 99 WHERE distributor_id = $1 AND product_id = $2")
            .bind(d)
            .bind(p)
            .execute(&pool)
            .await
            .unwrap();

        let result = assert_ok!(service.refresh().await);
        assert_eq!(result.corrected, 1);
        assert_eq!(result.corrections[0].current, 99);
        assert_eq!(result.corrections[0].expected, 13);
        assert_eq!(stock(&pool, d, p).await, 13);

        let again = assert_ok!(service.refresh().await);
        assert_eq!(again.corrected, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_refresh_agrees_with_cell_edits(pool: PgPool) {
        let net = seed_network(&pool).await;
        let service = InventoryService::new(pool.clone(), 5);

        for qty in [12, 3, 9] {
            cell(&pool, &net, net.products[0], qty).await;
        }
        cell(&pool, &net, net.products[1], 4).await;
        cell(&pool, &net, net.products[1], 0).await;

        let result = assert_ok!(service.refresh().await);
        assert_eq!(result.corrected, 0);
        assert_eq!(stock(&pool, net.distributor_id, net.products[0]).await, -9);
        assert_eq!(stock(&pool, net.distributor_id, net.products[1]).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_deleting_adjustment_reverses_it(pool: PgPool) {
        let net = seed_network(&pool).await;
        let service = InventoryService::new(pool.clone(), 5);
        let (d, p) = (net.distributor_id, net.products[1]);

        let recorded = assert_ok!(
            service
                .adjust(
                    &net.access,
                    AdjustStockInput {
                        distributor_id: d,
                        product_id: p,
                        quantity: -6,
                        note: "broken pallet".to_string(),
                    },
                )
                .await
        );
        assert_eq!(stock(&pool, d, p).await, -6);

        assert_ok!(service.delete_adjustment(&net.access, recorded.id.unwrap()).await);
        assert_eq!(stock(&pool, d, p).await, 0);
        assert_eq!(assert_ok!(service.refresh().await).corrected, 0);
    }
}
