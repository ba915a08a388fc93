//! Daily vendor visit tracking

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shared::{validate_visit_value, Pagination, VendorType, VisitCounts, VisitField};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult, ValidateField};
use crate::services::filters::like_pattern;
use crate::services::scope::{AccessScope, ScopeService};

/// Visit service
#[derive(Clone)]
pub struct VisitService {
    db: PgPool,
}

#[derive(Debug, Deserialize)]
pub struct VisitMatrixQuery {
    pub distributor_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub search: Option<String>,
    pub vendor_type: Option<String>,
    pub page: Option<i64>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisitMatrixRow {
    pub vendor_id: Uuid,
    pub vendor_name: String,
    pub vendor_code: String,
    pub vendor_type: VendorType,
    pub active: bool,
    pub visit_id: Option<Uuid>,
    #[serde(flatten)]
    pub counts: VisitCounts,
}

#[derive(FromRow)]
struct VisitMatrixDbRow {
    vendor_id: Uuid,
    first_name: String,
    last_name: String,
    code: String,
    #[sqlx(try_from = "String")]
    vendor_type: VendorType,
    active: bool,
    visit_id: Option<Uuid>,
    planned_visits: Option<i32>,
    actual_visits: Option<i32>,
    invoice_count: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct VisitMatrix {
    pub data: Vec<VisitMatrixRow>,
    pub total: i64,
    pub current_distributor: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertVisitInput {
    pub vendor_id: Uuid,
    pub date: NaiveDate,
    pub field: String,
    #[serde(default)]
    pub value: i32,
}

#[derive(Debug, Serialize)]
pub struct UpsertVisitResult {
    pub success: bool,
    pub visit_id: Uuid,
    #[serde(flatten)]
    pub counts: VisitCounts,
}

#[derive(FromRow)]
struct VisitCountsRow {
    id: Uuid,
    planned_visits: i32,
    actual_visits: i32,
    invoice_count: i32,
}

impl VisitService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Vendors of one distributor with their visit counters for a day
    pub async fn matrix(&self, access: &AccessScope, query: VisitMatrixQuery) -> AppResult<VisitMatrix> {
        let date = query
            .date
            .ok_or_else(|| AppError::validation("date", "date is required"))?;

        if access.has_no_distributors() {
            return Ok(VisitMatrix {
                data: Vec::new(),
                total: 0,
                current_distributor: None,
                message: Some("No distributor assigned".to_string()),
            });
        }

        let distributor_id = match query.distributor_id {
            Some(id) => {
                ScopeService::new(self.db.clone())
                    .ensure_distributor(access, id)
                    .await?;
                id
            }
            None => access.first_distributor().ok_or_else(|| {
                AppError::validation("distributor_id", "Select a distributor")
            })?,
        };

        let vendor_type = match query.vendor_type.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(t) => Some(
                t.parse::<VendorType>()
                    .map_err(|e| AppError::validation("vendor_type", e.to_string()))?,
            ),
        };
        let search = like_pattern(query.search.as_deref());
        let page = Pagination::new(query.page, query.page_size, shared::DEFAULT_PAGE_SIZE);

        let from = r#"
            FROM vendors v
            LEFT JOIN visits vi ON vi.vendor_id = v.id AND vi.date = $2
            WHERE v.distributor_id = $1
              AND (v.active OR vi.id IS NOT NULL)
              AND ($3::text IS NULL OR v.last_name ILIKE $3 OR v.first_name ILIKE $3
                   OR v.code ILIKE $3)
              AND ($4::text IS NULL OR v.vendor_type = $4)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) {}", from))
            .bind(distributor_id)
            .bind(date)
            .bind(&search)
            .bind(vendor_type.map(|t| t.as_str()))
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, VisitMatrixDbRow>(&format!(
            r#"
            SELECT v.id AS vendor_id, v.first_name, v.last_name, v.code, v.vendor_type, v.active,
                   vi.id AS visit_id, vi.planned_visits, vi.actual_visits, vi.invoice_count
            {}
            ORDER BY v.last_name ASC, v.first_name ASC, v.id ASC
            LIMIT $5 OFFSET $6
            "#,
            from
        ))
        .bind(distributor_id)
        .bind(date)
        .bind(&search)
        .bind(vendor_type.map(|t| t.as_str()))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        let data = rows
            .into_iter()
            .map(|r| VisitMatrixRow {
                vendor_id: r.vendor_id,
                vendor_name: format!("{} {}", r.first_name, r.last_name),
                vendor_code: r.code,
                vendor_type: r.vendor_type,
                active: r.active,
                visit_id: r.visit_id,
                counts: VisitCounts {
                    planned: r.planned_visits.unwrap_or(0),
                    actual: r.actual_visits.unwrap_or(0),
                    invoices: r.invoice_count.unwrap_or(0),
                },
            })
            .collect();

        Ok(VisitMatrix {
            data,
            total,
            current_distributor: Some(distributor_id),
            message: None,
        })
    }

    /// Set one counter on a vendor's visit row, creating the row if needed
    pub async fn upsert(&self, access: &AccessScope, input: UpsertVisitInput) -> AppResult<UpsertVisitResult> {
        let field = input
            .field
            .parse::<VisitField>()
            .map_err(|e| AppError::validation("field", e.to_string()))?;
        validate_visit_value(input.value).on_field("value")?;

        let distributor_id = sqlx::query_scalar::<_, Option<Uuid>>(
            "SELECT distributor_id FROM vendors WHERE id = $1",
        )
        .bind(input.vendor_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Vendor".to_string()))?;

        let allowed = match distributor_id {
            Some(id) => access.covers(id),
            None => access.is_national(),
        };
        if !allowed {
            tracing::warn!(user_id = %access.user_id, vendor_id = %input.vendor_id, "Blocked visit update outside scope");
            return Err(AppError::forbidden("You do not supervise this vendor"));
        }

        // `column()` only yields fixed column names
        let column = field.column();
        let row = sqlx::query_as::<_, VisitCountsRow>(&format!(
            r#"
            INSERT INTO visits (date, distributor_id, vendor_id, supervisor_id, {col})
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (vendor_id, date) DO UPDATE SET {col} = EXCLUDED.{col}
            RETURNING id, planned_visits, actual_visits, invoice_count
            "#,
            col = column
        ))
        .bind(input.date)
        .bind(distributor_id)
        .bind(input.vendor_id)
        .bind(access.user_id)
        .bind(input.value)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(visit_id = %row.id, field = column, value = input.value, "Updated visit");

        Ok(UpsertVisitResult {
            success: true,
            visit_id: row.id,
            counts: VisitCounts {
                planned: row.planned_visits,
                actual: row.actual_visits,
                invoices: row.invoice_count,
            },
        })
    }
}
