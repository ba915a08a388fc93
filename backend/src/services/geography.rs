//! Geography service: regions, zones and wilayas

use serde::{Deserialize, Serialize};
use shared::validate_name;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult, ValidateField};

/// Geography service
#[derive(Clone)]
pub struct GeographyService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Region {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Zone {
    pub id: Uuid,
    pub name: String,
    pub region_id: Uuid,
    pub region_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Wilaya {
    pub id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub zone_id: Uuid,
    pub zone_name: Option<String>,
}

/// Flat lists of the whole hierarchy
#[derive(Debug, Serialize)]
pub struct GeographyTree {
    pub regions: Vec<Region>,
    pub zones: Vec<Zone>,
    pub wilayas: Vec<Wilaya>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRegionInput {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateZoneInput {
    pub name: String,
    pub region_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWilayaInput {
    pub name: String,
    #[validate(length(max = 10, message = "Wilaya code must be at most 10 characters"))]
    pub code: Option<String>,
    pub zone_id: Uuid,
}

impl GeographyService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ------------------------------------------------------------------------
    // Regions
    // ------------------------------------------------------------------------

    pub async fn list_regions(&self) -> AppResult<Vec<Region>> {
        Ok(
            sqlx::query_as::<_, Region>("SELECT id, name FROM regions ORDER BY name")
                .fetch_all(&self.db)
                .await?,
        )
    }

    pub async fn create_region(&self, input: CreateRegionInput) -> AppResult<Region> {
        let name = input.name.trim();
        validate_name(name).on_field("name")?;

        let duplicate = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM regions WHERE LOWER(name) = LOWER($1)",
        )
        .bind(name)
        .fetch_one(&self.db)
        .await?;

        if duplicate > 0 {
            return Err(AppError::Conflict(format!("Region '{}' already exists", name)));
        }

        let region = sqlx::query_as::<_, Region>(
            "INSERT INTO regions (name) VALUES ($1) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(region_id = %region.id, "Created region");
        Ok(region)
    }

    pub async fn delete_region(&self, region_id: Uuid) -> AppResult<()> {
        self.ensure_exists("regions", "Region", region_id).await?;

        let (zones, users) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM zones WHERE region_id = $1),
                (SELECT COUNT(*) FROM users WHERE region_id = $1)
            "#,
        )
        .bind(region_id)
        .fetch_one(&self.db)
        .await?;

        if let Some(err) =
            AppError::blocked_by("Region", &[(zones, "zone(s)"), (users, "user(s)")])
        {
            return Err(err);
        }

        sqlx::query("DELETE FROM regions WHERE id = $1")
            .bind(region_id)
            .execute(&self.db)
            .await?;

        tracing::info!(%region_id, "Deleted region");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Zones
    // ------------------------------------------------------------------------

    pub async fn list_zones(&self, region_id: Option<Uuid>) -> AppResult<Vec<Zone>> {
        Ok(sqlx::query_as::<_, Zone>(
            r#"
            SELECT z.id, z.name, z.region_id, r.name AS region_name
            FROM zones z
            LEFT JOIN regions r ON r.id = z.region_id
            WHERE ($1::uuid IS NULL OR z.region_id = $1)
            ORDER BY z.name
            "#,
        )
        .bind(region_id)
        .fetch_all(&self.db)
        .await?)
    }

    pub async fn create_zone(&self, input: CreateZoneInput) -> AppResult<Zone> {
        let name = input.name.trim();
        validate_name(name).on_field("name")?;
        self.ensure_exists("regions", "Region", input.region_id).await?;

        let zone = sqlx::query_as::<_, Zone>(
            r#"
            WITH inserted AS (
                INSERT INTO zones (name, region_id) VALUES ($1, $2)
                RETURNING id, name, region_id
            )
            SELECT i.id, i.name, i.region_id, r.name AS region_name
            FROM inserted i
            LEFT JOIN regions r ON r.id = i.region_id
            "#,
        )
        .bind(name)
        .bind(input.region_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(zone_id = %zone.id, region_id = %zone.region_id, "Created zone");
        Ok(zone)
    }

    pub async fn delete_zone(&self, zone_id: Uuid) -> AppResult<()> {
        self.ensure_exists("zones", "Zone", zone_id).await?;

        let (wilayas, users) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM wilayas WHERE zone_id = $1),
                (SELECT COUNT(*) FROM users WHERE zone_id = $1)
            "#,
        )
        .bind(zone_id)
        .fetch_one(&self.db)
        .await?;

        if let Some(err) =
            AppError::blocked_by("Zone", &[(wilayas, "wilaya(s)"), (users, "user(s)")])
        {
            return Err(err);
        }

        sqlx::query("DELETE FROM zones WHERE id = $1")
            .bind(zone_id)
            .execute(&self.db)
            .await?;

        tracing::info!(%zone_id, "Deleted zone");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Wilayas
    // ------------------------------------------------------------------------

    pub async fn list_wilayas(&self, zone_id: Option<Uuid>) -> AppResult<Vec<Wilaya>> {
        Ok(sqlx::query_as::<_, Wilaya>(
            r#"
            SELECT w.id, w.name, w.code, w.zone_id, z.name AS zone_name
            FROM wilayas w
            LEFT JOIN zones z ON z.id = w.zone_id
            WHERE ($1::uuid IS NULL OR w.zone_id = $1)
            ORDER BY w.code NULLS LAST, w.name
            "#,
        )
        .bind(zone_id)
        .fetch_all(&self.db)
        .await?)
    }

    pub async fn create_wilaya(&self, input: CreateWilayaInput) -> AppResult<Wilaya> {
        input.validate()?;
        let name = input.name.trim();
        validate_name(name).on_field("name")?;
        self.ensure_exists("zones", "Zone", input.zone_id).await?;

        let wilaya = sqlx::query_as::<_, Wilaya>(
            r#"
            WITH inserted AS (
                INSERT INTO wilayas (name, code, zone_id) VALUES ($1, $2, $3)
                RETURNING id, name, code, zone_id
            )
            SELECT i.id, i.name, i.code, i.zone_id, z.name AS zone_name
            FROM inserted i
            LEFT JOIN zones z ON z.id = i.zone_id
            "#,
        )
        .bind(name)
        .bind(input.code.as_deref().map(str::trim))
        .bind(input.zone_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(wilaya_id = %wilaya.id, zone_id = %wilaya.zone_id, "Created wilaya");
        Ok(wilaya)
    }

    pub async fn delete_wilaya(&self, wilaya_id: Uuid) -> AppResult<()> {
        self.ensure_exists("wilayas", "Wilaya", wilaya_id).await?;

        let (distributors, users) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM distributors WHERE wilaya_id = $1),
                (SELECT COUNT(*) FROM users WHERE wilaya_id = $1)
            "#,
        )
        .bind(wilaya_id)
        .fetch_one(&self.db)
        .await?;

        if let Some(err) = AppError::blocked_by(
            "Wilaya",
            &[(distributors, "distributor(s)"), (users, "supervisor(s)")],
        ) {
            return Err(err);
        }

        sqlx::query("DELETE FROM wilayas WHERE id = $1")
            .bind(wilaya_id)
            .execute(&self.db)
            .await?;

        tracing::info!(%wilaya_id, "Deleted wilaya");
        Ok(())
    }

    /// All three levels at once
    pub async fn tree(&self) -> AppResult<GeographyTree> {
        Ok(GeographyTree {
            regions: self.list_regions().await?,
            zones: self.list_zones(None).await?,
            wilayas: self.list_wilayas(None).await?,
        })
    }

    async fn ensure_exists(&self, table: &str, label: &str, id: Uuid) -> AppResult<()> {
        // `table` is always one of the literals above
        let sql = format!("SELECT COUNT(*) FROM {} WHERE id = $1", table);
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .bind(id)
            .fetch_one(&self.db)
            .await?;

        if count == 0 {
            return Err(AppError::NotFound(label.to_string()));
        }
        Ok(())
    }
}
