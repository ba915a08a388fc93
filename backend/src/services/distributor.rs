//! Distributor service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{validate_email, validate_name, Page, Pagination, Role};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult, ValidateField};
use crate::services::filters::like_pattern;
use crate::services::scope::AccessScope;

/// Distributor service
#[derive(Clone)]
pub struct DistributorService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Distributor {
    pub id: Uuid,
    pub name: String,
    pub wilaya_id: Option<Uuid>,
    pub wilaya_name: Option<String>,
    pub supervisor_id: Option<Uuid>,
    pub supervisor_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

const DISTRIBUTOR_SELECT: &str = r#"
    SELECT d.id, d.name, d.wilaya_id, w.name AS wilaya_name,
           d.supervisor_id,
           CASE WHEN u.id IS NULL THEN NULL ELSE u.first_name || ' ' || u.last_name END
               AS supervisor_name,
           d.address, d.phone, d.email, d.active, d.created_at
    FROM distributors d
    LEFT JOIN wilayas w ON w.id = d.wilaya_id
    LEFT JOIN users u ON u.id = d.supervisor_id
"#;

#[derive(Debug, Deserialize)]
pub struct ListDistributorsQuery {
    pub search: Option<String>,
    /// `all`, `active` or `inactive`
    pub status: Option<String>,
    pub page: Option<i64>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DistributorInput {
    pub name: String,
    pub wilaya_id: Option<Uuid>,
    pub supervisor_id: Option<Uuid>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub email: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct BulkReassignInput {
    #[serde(default)]
    pub distributor_ids: Vec<Uuid>,
    pub supervisor_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct BulkReassignResult {
    pub message: String,
    pub updated: u64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SupervisorOption {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
}

impl DistributorService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List distributors visible to the caller
    pub async fn list_distributors(
        &self,
        access: &AccessScope,
        query: ListDistributorsQuery,
    ) -> AppResult<Page<Distributor>> {
        let page = Pagination::new(query.page, query.page_size, shared::DEFAULT_PAGE_SIZE);
        let search = like_pattern(query.search.as_deref());
        let active = match query.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some("active") => Some(true),
            Some("inactive") => Some(false),
            Some(other) => {
                return Err(AppError::validation(
                    "status",
                    format!("Unknown status filter '{}'", other),
                ))
            }
        };

        let filter = r#"
            WHERE ($1::uuid[] IS NULL OR d.id = ANY($1))
              AND ($2::text IS NULL OR d.name ILIKE $2 OR w.name ILIKE $2
                   OR d.phone ILIKE $2 OR d.email ILIKE $2)
              AND ($3::boolean IS NULL OR d.active = $3)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM distributors d LEFT JOIN wilayas w ON w.id = d.wilaya_id {}",
            filter
        ))
        .bind(access.distributor_filter())
        .bind(&search)
        .bind(active)
        .fetch_one(&self.db)
        .await?;

        let distributors = sqlx::query_as::<_, Distributor>(&format!(
            "{} {} ORDER BY d.name ASC, d.id ASC LIMIT $4 OFFSET $5",
            DISTRIBUTOR_SELECT, filter
        ))
        .bind(access.distributor_filter())
        .bind(&search)
        .bind(active)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Page::new(distributors, total))
    }

    pub async fn get_distributor(&self, distributor_id: Uuid) -> AppResult<Distributor> {
        sqlx::query_as::<_, Distributor>(&format!("{} WHERE d.id = $1", DISTRIBUTOR_SELECT))
            .bind(distributor_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Distributor".to_string()))
    }

    pub async fn create_distributor(&self, input: DistributorInput) -> AppResult<Distributor> {
        self.check_input(&input).await?;

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO distributors (name, wilaya_id, supervisor_id, address, phone, email, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(input.name.trim())
        .bind(input.wilaya_id)
        .bind(input.supervisor_id)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(input.active.unwrap_or(true))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(distributor_id = %id, "Created distributor");
        self.get_distributor(id).await
    }

    pub async fn update_distributor(
        &self,
        distributor_id: Uuid,
        input: DistributorInput,
    ) -> AppResult<Distributor> {
        self.check_input(&input).await?;

        let result = sqlx::query(
            r#"
            UPDATE distributors
            SET name = $1, wilaya_id = $2, supervisor_id = $3, address = $4,
                phone = $5, email = $6, active = COALESCE($7, active)
            WHERE id = $8
            "#,
        )
        .bind(input.name.trim())
        .bind(input.wilaya_id)
        .bind(input.supervisor_id)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(input.active)
        .bind(distributor_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Distributor".to_string()));
        }

        tracing::info!(%distributor_id, "Updated distributor");
        self.get_distributor(distributor_id).await
    }

    /// Delete a distributor with no vendors, transactions or stock
    pub async fn delete_distributor(&self, distributor_id: Uuid) -> AppResult<()> {
        self.get_distributor(distributor_id).await?;

        let (vendors, sales, purchases, adjustments) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                r#"
            SELECT
                (SELECT COUNT(*) FROM vendors WHERE distributor_id = $1),
                (SELECT COUNT(*) FROM sales WHERE distributor_id = $1),
                (SELECT COUNT(*) FROM purchases WHERE distributor_id = $1),
                (SELECT COUNT(*) FROM stock_adjustments WHERE distributor_id = $1)
            "#,
            )
            .bind(distributor_id)
            .fetch_one(&self.db)
            .await?;

        if let Some(err) = AppError::blocked_by(
            "Distributor",
            &[
                (vendors, "vendor(s)"),
                (sales, "sale(s)"),
                (purchases, "purchase(s)"),
                (adjustments, "stock adjustment(s)"),
            ],
        ) {
            return Err(err);
        }

        let mut tx = self.db.begin().await?;
        for table in ["inventory", "physical_inventory", "visits"] {
            sqlx::query(&format!("DELETE FROM {} WHERE distributor_id = $1", table))
                .bind(distributor_id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM distributors WHERE id = $1")
            .bind(distributor_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(%distributor_id, "Deleted distributor");
        Ok(())
    }

    /// Hand a set of distributors over to one supervisor
    pub async fn bulk_reassign(&self, input: BulkReassignInput) -> AppResult<BulkReassignResult> {
        let supervisor_id = input
            .supervisor_id
            .ok_or_else(|| AppError::validation("supervisor_id", "A supervisor is required"))?;
        if input.distributor_ids.is_empty() {
            return Err(AppError::validation(
                "distributor_ids",
                "Select at least one distributor",
            ));
        }

        let role = sqlx::query_scalar::<_, String>(
            "SELECT role FROM users WHERE id = $1 AND active = true",
        )
        .bind(supervisor_id)
        .fetch_optional(&self.db)
        .await?;

        match role.as_deref().map(str::parse::<Role>) {
            Some(Ok(Role::Superviseur)) => {}
            Some(_) => {
                return Err(AppError::validation(
                    "supervisor_id",
                    "The selected user is not a supervisor",
                ))
            }
            None => return Err(AppError::NotFound("Supervisor".to_string())),
        }

        let result = sqlx::query("UPDATE distributors SET supervisor_id = $1 WHERE id = ANY($2)")
            .bind(supervisor_id)
            .bind(&input.distributor_ids)
            .execute(&self.db)
            .await?;

        let updated = result.rows_affected();
        tracing::info!(%supervisor_id, updated, "Reassigned distributors");

        Ok(BulkReassignResult {
            message: format!("{} distributor(s) reassigned", updated),
            updated,
        })
    }

    /// Active supervisors that can own distributors
    pub async fn supervisors(&self) -> AppResult<Vec<SupervisorOption>> {
        Ok(sqlx::query_as::<_, SupervisorOption>(
            r#"
            SELECT id, first_name, last_name, username
            FROM users
            WHERE role = 'superviseur' AND active = true
            ORDER BY last_name, first_name
            "#,
        )
        .fetch_all(&self.db)
        .await?)
    }

    async fn check_input(&self, input: &DistributorInput) -> AppResult<()> {
        input.validate()?;
        validate_name(input.name.trim()).on_field("name")?;
        if let Some(email) = input.email.as_deref().filter(|e| !e.is_empty()) {
            validate_email(email).on_field("email")?;
        }

        if let Some(supervisor_id) = input.supervisor_id {
            let is_supervisor = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM users WHERE id = $1 AND role = 'superviseur'",
            )
            .bind(supervisor_id)
            .fetch_one(&self.db)
            .await?;

            if is_supervisor == 0 {
                return Err(AppError::validation(
                    "supervisor_id",
                    "The selected user is not a supervisor",
                ));
            }
        }
        Ok(())
    }
}
