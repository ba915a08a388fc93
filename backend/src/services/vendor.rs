//! Vendor (point of sale) service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{validate_code, validate_name, Page, Pagination, VendorType};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{map_unique_violation, AppError, AppResult, ValidateField};
use crate::services::filters::{id_filter, like_pattern};
use crate::services::scope::{AccessScope, ScopeService};

/// Vendor service
#[derive(Clone)]
pub struct VendorService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Vendor {
    pub id: Uuid,
    pub code: String,
    pub first_name: String,
    pub last_name: String,
    #[sqlx(try_from = "String")]
    pub vendor_type: VendorType,
    pub distributor_id: Option<Uuid>,
    pub distributor_name: Option<String>,
    pub supervisor_id: Option<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

const VENDOR_SELECT: &str = r#"
    SELECT v.id, v.code, v.first_name, v.last_name, v.vendor_type,
           v.distributor_id, d.name AS distributor_name, v.supervisor_id,
           v.active, v.created_at
    FROM vendors v
    LEFT JOIN distributors d ON d.id = v.distributor_id
"#;

#[derive(Debug, Deserialize)]
pub struct ListVendorsQuery {
    pub search: Option<String>,
    pub distributor_id: Option<String>,
    pub vendor_type: Option<String>,
    /// `all`, `active` or `inactive`
    pub active: Option<String>,
    pub page: Option<i64>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct VendorInput {
    pub code: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub vendor_type: VendorType,
    pub distributor_id: Option<Uuid>,
    pub supervisor_id: Option<Uuid>,
    pub active: Option<bool>,
}

impl VendorInput {
    fn check(&self) -> AppResult<()> {
        validate_code(self.code.trim()).on_field("code")?;
        validate_name(self.first_name.trim()).on_field("first_name")?;
        validate_name(self.last_name.trim()).on_field("last_name")?;
        Ok(())
    }
}

impl VendorService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_vendors(
        &self,
        access: &AccessScope,
        query: ListVendorsQuery,
    ) -> AppResult<Page<Vendor>> {
        let page = Pagination::new(query.page, query.page_size, shared::DEFAULT_PAGE_SIZE);
        let search = like_pattern(query.search.as_deref());
        let distributor_id = id_filter(query.distributor_id.as_deref(), "distributor_id")?;
        let vendor_type = match query.vendor_type.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(t) => Some(
                t.parse::<VendorType>()
                    .map_err(|e| AppError::validation("vendor_type", e.to_string()))?,
            ),
        };
        let active = match query.active.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some("active") | Some("true") => Some(true),
            Some("inactive") | Some("false") => Some(false),
            Some(other) => {
                return Err(AppError::validation(
                    "active",
                    format!("Unknown active filter '{}'", other),
                ))
            }
        };

        let filter = r#"
            WHERE ($1::uuid[] IS NULL OR v.distributor_id = ANY($1))
              AND ($2::uuid IS NULL OR v.distributor_id = $2)
              AND ($3::text IS NULL OR v.vendor_type = $3)
              AND ($4::text IS NULL OR v.code ILIKE $4 OR v.first_name ILIKE $4
                   OR v.last_name ILIKE $4 OR d.name ILIKE $4)
              AND ($5::boolean IS NULL OR v.active = $5)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM vendors v LEFT JOIN distributors d ON d.id = v.distributor_id {}",
            filter
        ))
        .bind(access.distributor_filter())
        .bind(distributor_id)
        .bind(vendor_type.map(|t| t.as_str()))
        .bind(&search)
        .bind(active)
        .fetch_one(&self.db)
        .await?;

        let vendors = sqlx::query_as::<_, Vendor>(&format!(
            "{} {} ORDER BY v.last_name ASC, v.first_name ASC, v.id ASC LIMIT $6 OFFSET $7",
            VENDOR_SELECT, filter
        ))
        .bind(access.distributor_filter())
        .bind(distributor_id)
        .bind(vendor_type.map(|t| t.as_str()))
        .bind(&search)
        .bind(active)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Page::new(vendors, total))
    }

    pub async fn get_vendor(&self, vendor_id: Uuid) -> AppResult<Vendor> {
        sqlx::query_as::<_, Vendor>(&format!("{} WHERE v.id = $1", VENDOR_SELECT))
            .bind(vendor_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Vendor".to_string()))
    }

    pub async fn create_vendor(&self, access: &AccessScope, input: VendorInput) -> AppResult<Vendor> {
        input.check()?;
        if let Some(distributor_id) = input.distributor_id {
            ScopeService::new(self.db.clone())
                .ensure_distributor(access, distributor_id)
                .await?;
        } else if !access.is_national() {
            return Err(AppError::validation(
                "distributor_id",
                "A distributor is required",
            ));
        }

        // A supervisor creating a vendor becomes its supervisor
        let supervisor_id = input
            .supervisor_id
            .or_else(|| access.is_supervisor().then_some(access.user_id));

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO vendors (code, first_name, last_name, vendor_type, distributor_id,
                                 supervisor_id, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(input.code.trim())
        .bind(input.first_name.trim())
        .bind(input.last_name.trim())
        .bind(input.vendor_type.as_str())
        .bind(input.distributor_id)
        .bind(supervisor_id)
        .bind(input.active.unwrap_or(true))
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "code"))?;

        tracing::info!(vendor_id = %id, vendor_type = %input.vendor_type, "Created vendor");
        self.get_vendor(id).await
    }

    pub async fn update_vendor(
        &self,
        access: &AccessScope,
        vendor_id: Uuid,
        input: VendorInput,
    ) -> AppResult<Vendor> {
        input.check()?;
        let existing = self.get_vendor(vendor_id).await?;
        Self::ensure_in_scope(access, &existing)?;

        let scope = ScopeService::new(self.db.clone());
        if let Some(distributor_id) = input.distributor_id {
            scope.ensure_distributor(access, distributor_id).await?;
        }

        sqlx::query(
            r#"
            UPDATE vendors
            SET code = $1, first_name = $2, last_name = $3, vendor_type = $4,
                distributor_id = $5, supervisor_id = COALESCE($6, supervisor_id),
                active = COALESCE($7, active)
            WHERE id = $8
            "#,
        )
        .bind(input.code.trim())
        .bind(input.first_name.trim())
        .bind(input.last_name.trim())
        .bind(input.vendor_type.as_str())
        .bind(input.distributor_id.or(existing.distributor_id))
        .bind(input.supervisor_id)
        .bind(input.active)
        .bind(vendor_id)
        .execute(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "code"))?;

        tracing::info!(%vendor_id, "Updated vendor");
        self.get_vendor(vendor_id).await
    }

    /// Delete a vendor with no sales or visits
    pub async fn delete_vendor(&self, access: &AccessScope, vendor_id: Uuid) -> AppResult<()> {
        let existing = self.get_vendor(vendor_id).await?;
        Self::ensure_in_scope(access, &existing)?;

        let (sales, visits) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM sales WHERE vendor_id = $1),
                (SELECT COUNT(*) FROM visits WHERE vendor_id = $1)
            "#,
        )
        .bind(vendor_id)
        .fetch_one(&self.db)
        .await?;

        if let Some(err) =
            AppError::blocked_by("Vendor", &[(sales, "sale(s)"), (visits, "visit(s)")])
        {
            return Err(err);
        }

        sqlx::query("DELETE FROM vendors WHERE id = $1")
            .bind(vendor_id)
            .execute(&self.db)
            .await?;

        tracing::info!(%vendor_id, "Deleted vendor");
        Ok(())
    }

    fn ensure_in_scope(access: &AccessScope, vendor: &Vendor) -> AppResult<()> {
        match vendor.distributor_id {
            Some(distributor_id) if !access.covers(distributor_id) => {
                Err(AppError::forbidden("Vendor is outside your scope"))
            }
            None if !access.is_national() => {
                Err(AppError::forbidden("Vendor is outside your scope"))
            }
            _ => Ok(()),
        }
    }
}
