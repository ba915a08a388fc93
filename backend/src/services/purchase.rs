//! Purchase (distributor restocking) service

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::stock::TransactionState;
use shared::{merge_lines, LineItem, Page, Pagination, PriceTier, TransactionKind, TransactionStatus};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::filters::{id_filter, like_pattern, text_filter};
use crate::services::lines;
use crate::services::scope::{AccessScope, ScopeService};
use crate::services::stock::StockLedger;

const KIND: TransactionKind = TransactionKind::Purchase;

/// Purchase service
#[derive(Clone)]
pub struct PurchaseService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Purchase {
    pub id: Uuid,
    pub date: NaiveDate,
    pub distributor_id: Uuid,
    pub distributor_name: Option<String>,
    pub supervisor_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

const PURCHASE_SELECT: &str = r#"
    SELECT pu.id, pu.date, pu.distributor_id, d.name AS distributor_name,
           pu.supervisor_id, pu.status, pu.total_amount, pu.created_at
    FROM purchases pu
    LEFT JOIN distributors d ON d.id = pu.distributor_id
"#;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PurchaseLine {
    #[serde(skip)]
    pub purchase_id: Uuid,
    pub product_id: Uuid,
    pub code: String,
    pub name: String,
    pub quantity: i32,
    pub price_factory: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseWithLines {
    #[serde(flatten)]
    pub purchase: Purchase,
    pub products: Vec<PurchaseLine>,
}

#[derive(Debug, Deserialize)]
pub struct ListPurchasesQuery {
    #[serde(alias = "startDate")]
    pub start_date: Option<NaiveDate>,
    #[serde(alias = "endDate")]
    pub end_date: Option<NaiveDate>,
    pub distributor_id: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseInput {
    pub date: NaiveDate,
    pub distributor_id: Uuid,
    pub status: Option<TransactionStatus>,
    #[serde(default)]
    pub products: Vec<LineItem>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePurchaseInput {
    pub date: Option<NaiveDate>,
    pub distributor_id: Option<Uuid>,
    pub status: Option<TransactionStatus>,
    pub products: Option<Vec<LineItem>>,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseMatrixQuery {
    pub purchase_id: Option<String>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub product_type: Option<String>,
    pub page: Option<i64>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PurchaseMatrixRow {
    pub product_id: Uuid,
    pub code: String,
    pub name: String,
    pub format: Option<String>,
    pub category_name: Option<String>,
    pub price_factory: Decimal,
    pub quantity: i32,
}

#[derive(FromRow)]
struct LockedPurchase {
    distributor_id: Uuid,
    #[sqlx(try_from = "String")]
    status: TransactionStatus,
}

impl PurchaseService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_purchases(
        &self,
        access: &AccessScope,
        query: ListPurchasesQuery,
    ) -> AppResult<Page<PurchaseWithLines>> {
        let page = Pagination::new(query.page, query.page_size, shared::DEFAULT_PAGE_SIZE);
        let distributor_id = id_filter(query.distributor_id.as_deref(), "distributor_id")?;
        let status = match text_filter(query.status.as_deref()) {
            None => None,
            Some(s) => Some(
                s.parse::<TransactionStatus>()
                    .map_err(|e| AppError::validation("status", e.to_string()))?,
            ),
        };

        let filter = r#"
            WHERE ($1::uuid[] IS NULL OR pu.distributor_id = ANY($1))
              AND ($2::date IS NULL OR pu.date >= $2)
              AND ($3::date IS NULL OR pu.date <= $3)
              AND ($4::uuid IS NULL OR pu.distributor_id = $4)
              AND ($5::text IS NULL OR pu.status = $5)
        "#;

        let total =
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM purchases pu {}", filter))
                .bind(access.distributor_filter())
                .bind(query.start_date)
                .bind(query.end_date)
                .bind(distributor_id)
                .bind(status.map(|s| s.as_str()))
                .fetch_one(&self.db)
                .await?;

        let purchases = sqlx::query_as::<_, Purchase>(&format!(
            "{} {} ORDER BY pu.date DESC, pu.created_at DESC, pu.id DESC LIMIT $6 OFFSET $7",
            PURCHASE_SELECT, filter
        ))
        .bind(access.distributor_filter())
        .bind(query.start_date)
        .bind(query.end_date)
        .bind(distributor_id)
        .bind(status.map(|s| s.as_str()))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        let data = self.attach_lines(purchases).await?;
        Ok(Page::new(data, total))
    }

    pub async fn get_purchase(
        &self,
        access: &AccessScope,
        purchase_id: Uuid,
    ) -> AppResult<PurchaseWithLines> {
        let purchase =
            sqlx::query_as::<_, Purchase>(&format!("{} WHERE pu.id = $1", PURCHASE_SELECT))
                .bind(purchase_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Purchase".to_string()))?;
        ensure_covered(access, purchase.distributor_id)?;

        self.attach_lines(vec![purchase])
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound("Purchase".to_string()))
    }

    async fn attach_lines(&self, purchases: Vec<Purchase>) -> AppResult<Vec<PurchaseWithLines>> {
        let ids: Vec<Uuid> = purchases.iter().map(|p| p.id).collect();
        let rows = sqlx::query_as::<_, PurchaseLine>(
            r#"
            SELECT pi.purchase_id, pi.product_id, p.code, p.name, pi.quantity, p.price_factory
            FROM purchase_items pi
            JOIN products p ON p.id = pi.product_id
            WHERE pi.purchase_id = ANY($1)
            ORDER BY p.name
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut by_purchase: HashMap<Uuid, Vec<PurchaseLine>> = HashMap::new();
        for row in rows {
            by_purchase.entry(row.purchase_id).or_default().push(row);
        }

        Ok(purchases
            .into_iter()
            .map(|purchase| PurchaseWithLines {
                products: by_purchase.remove(&purchase.id).unwrap_or_default(),
                purchase,
            })
            .collect())
    }

    /// Record a purchase; lines with a non-positive quantity are skipped
    pub async fn create_purchase(
        &self,
        access: &AccessScope,
        input: CreatePurchaseInput,
    ) -> AppResult<PurchaseWithLines> {
        ScopeService::new(self.db.clone())
            .ensure_distributor(access, input.distributor_id)
            .await?;

        let lines = merge_lines(&input.products);
        let status = input.status.unwrap_or_default();

        let mut tx = self.db.begin().await?;
        lines::ensure_products_exist(&mut tx, &lines).await?;

        let purchase_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO purchases (date, distributor_id, supervisor_id, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(input.date)
        .bind(input.distributor_id)
        .bind(access.user_id)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        lines::replace_lines(&mut tx, KIND, purchase_id, &lines).await?;
        let after = TransactionState::new(Some(input.distributor_id), status, lines);
        StockLedger::new(&mut tx).reconcile(KIND, None, Some(&after)).await?;
        lines::recalculate_total(&mut tx, KIND, purchase_id, PriceTier::Factory).await?;

        tx.commit().await?;

        tracing::info!(%purchase_id, distributor_id = %input.distributor_id, %status, "Created purchase");
        self.get_purchase(access, purchase_id).await
    }

    pub async fn update_purchase(
        &self,
        access: &AccessScope,
        purchase_id: Uuid,
        input: UpdatePurchaseInput,
    ) -> AppResult<PurchaseWithLines> {
        if let Some(distributor_id) = input.distributor_id {
            ScopeService::new(self.db.clone())
                .ensure_distributor(access, distributor_id)
                .await?;
        }

        let mut tx = self.db.begin().await?;

        let locked = lock_purchase(&mut tx, purchase_id).await?;
        ensure_covered(access, locked.distributor_id)?;

        let old_lines = lines::load_lines(&mut tx, KIND, purchase_id).await?;
        let new_lines = match &input.products {
            Some(products) => {
                let merged = merge_lines(products);
                lines::ensure_products_exist(&mut tx, &merged).await?;
                lines::replace_lines(&mut tx, KIND, purchase_id, &merged).await?;
                merged
            }
            None => old_lines.clone(),
        };
        let new_status = input.status.unwrap_or(locked.status);
        let new_distributor = input.distributor_id.unwrap_or(locked.distributor_id);

        sqlx::query(
            "UPDATE purchases SET status = $1, date = COALESCE($2, date), distributor_id = $3 WHERE id = $4",
        )
        .bind(new_status.as_str())
        .bind(input.date)
        .bind(new_distributor)
        .bind(purchase_id)
        .execute(&mut *tx)
        .await?;

        let before = TransactionState::new(Some(locked.distributor_id), locked.status, old_lines);
        let after = TransactionState::new(Some(new_distributor), new_status, new_lines);
        StockLedger::new(&mut tx)
            .reconcile(KIND, Some(&before), Some(&after))
            .await?;
        lines::recalculate_total(&mut tx, KIND, purchase_id, PriceTier::Factory).await?;

        tx.commit().await?;

        tracing::info!(%purchase_id, from = %locked.status, to = %new_status, "Updated purchase");
        self.get_purchase(access, purchase_id).await
    }

    pub async fn delete_purchase(&self, access: &AccessScope, purchase_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let locked = lock_purchase(&mut tx, purchase_id).await?;
        ensure_covered(access, locked.distributor_id)?;

        let old_lines = lines::load_lines(&mut tx, KIND, purchase_id).await?;
        let before = TransactionState::new(Some(locked.distributor_id), locked.status, old_lines);
        StockLedger::new(&mut tx).reconcile(KIND, Some(&before), None).await?;

        sqlx::query("DELETE FROM purchases WHERE id = $1")
            .bind(purchase_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(%purchase_id, "Deleted purchase");
        Ok(())
    }

    /// Product grid for entering a purchase, with existing quantities
    pub async fn purchase_matrix(
        &self,
        access: &AccessScope,
        query: PurchaseMatrixQuery,
    ) -> AppResult<Page<PurchaseMatrixRow>> {
        let page = Pagination::new(query.page, query.page_size, shared::MATRIX_PAGE_SIZE);
        let purchase_id = id_filter(query.purchase_id.as_deref(), "purchase_id")?;
        let search = like_pattern(query.search.as_deref());
        let category = id_filter(query.category.as_deref(), "category")?;
        let product_type = id_filter(query.product_type.as_deref(), "product_type")?;

        if let Some(purchase_id) = purchase_id {
            let distributor_id = sqlx::query_scalar::<_, Uuid>(
                "SELECT distributor_id FROM purchases WHERE id = $1",
            )
            .bind(purchase_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Purchase".to_string()))?;
            ensure_covered(access, distributor_id)?;
        }

        let filter = r#"
            WHERE (p.active OR pi.product_id IS NOT NULL)
              AND ($2::text IS NULL OR p.name ILIKE $2 OR p.code ILIKE $2)
              AND ($3::uuid IS NULL OR p.category_id = $3)
              AND ($4::uuid IS NULL OR p.type_id = $4)
        "#;
        let from = r#"
            FROM products p
            LEFT JOIN product_categories c ON c.id = p.category_id
            LEFT JOIN purchase_items pi ON pi.product_id = p.id AND pi.purchase_id = $1
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) {} {}", from, filter))
            .bind(purchase_id)
            .bind(&search)
            .bind(category)
            .bind(product_type)
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, PurchaseMatrixRow>(&format!(
            r#"
            SELECT p.id AS product_id, p.code, p.name, p.format, c.name AS category_name,
                   p.price_factory, COALESCE(pi.quantity, 0) AS quantity
            {} {}
            ORDER BY (pi.product_id IS NOT NULL) DESC, p.name ASC, p.id ASC
            LIMIT $5 OFFSET $6
            "#,
            from, filter
        ))
        .bind(purchase_id)
        .bind(&search)
        .bind(category)
        .bind(product_type)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Page::new(rows, total))
    }
}

fn ensure_covered(access: &AccessScope, distributor_id: Uuid) -> AppResult<()> {
    if access.covers(distributor_id) {
        Ok(())
    } else {
        Err(AppError::forbidden("Purchase is outside your scope"))
    }
}

async fn lock_purchase(conn: &mut PgConnection, purchase_id: Uuid) -> AppResult<LockedPurchase> {
    sqlx::query_as::<_, LockedPurchase>(
        "SELECT distributor_id, status FROM purchases WHERE id = $1 FOR UPDATE",
    )
    .bind(purchase_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Purchase".to_string()))
}
