//! Dropdown data for the web clients

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use shared::VendorType;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::geography::{GeographyService, GeographyTree};
use crate::services::product::{NamedRef, ProductService};
use crate::services::scope::{AccessScope, ScopeService};

/// Lookup service
#[derive(Clone)]
pub struct LookupService {
    db: PgPool,
}

#[derive(Debug, Serialize)]
pub struct AdminMetadata {
    pub supervisors: Vec<NamedRef>,
    pub wilayas: Vec<NamedRef>,
    pub categories: Vec<NamedRef>,
    pub product_types: Vec<NamedRef>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DistributorOption {
    pub id: Uuid,
    pub name: String,
    pub wilaya: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductOption {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub format: Option<String>,
    pub price_factory: Decimal,
    pub price_wholesale: Decimal,
    pub price_retail: Decimal,
    pub price_supermarket: Decimal,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct VendorOption {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub vendor_type: VendorType,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryFormats {
    pub id: Uuid,
    pub name: String,
    pub formats: Vec<String>,
}

impl LookupService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn admin_metadata(&self) -> AppResult<AdminMetadata> {
        let supervisors = sqlx::query_as::<_, NamedRef>(
            r#"
            SELECT id, first_name || ' ' || last_name AS name
            FROM users
            WHERE role = 'superviseur' AND active = true
            ORDER BY last_name, first_name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let wilayas = sqlx::query_as::<_, NamedRef>("SELECT id, name FROM wilayas ORDER BY name")
            .fetch_all(&self.db)
            .await?;
        let products = ProductService::new(self.db.clone());
        let categories = products.categories().await?;
        let product_types = products.product_types().await?;

        Ok(AdminMetadata {
            supervisors,
            wilayas,
            categories,
            product_types,
        })
    }

    /// Active distributors the caller can reach
    pub async fn distributors(&self, access: &AccessScope) -> AppResult<Vec<DistributorOption>> {
        Ok(sqlx::query_as::<_, DistributorOption>(
            r#"
            SELECT d.id, d.name, w.name AS wilaya
            FROM distributors d
            LEFT JOIN wilayas w ON w.id = d.wilaya_id
            WHERE d.active = true AND ($1::uuid[] IS NULL OR d.id = ANY($1))
            ORDER BY d.name
            "#,
        )
        .bind(access.distributor_filter())
        .fetch_all(&self.db)
        .await?)
    }

    pub async fn products(&self) -> AppResult<Vec<ProductOption>> {
        Ok(sqlx::query_as::<_, ProductOption>(
            r#"
            SELECT p.id, p.code, p.name, p.format,
                   p.price_factory, p.price_wholesale, p.price_retail, p.price_supermarket,
                   c.name AS category
            FROM products p
            LEFT JOIN product_categories c ON c.id = p.category_id
            WHERE p.active = true
            ORDER BY p.name
            "#,
        )
        .fetch_all(&self.db)
        .await?)
    }

    /// Vendors of one distributor, active ones first
    pub async fn vendors_by_distributor(
        &self,
        access: &AccessScope,
        distributor_id: Uuid,
    ) -> AppResult<Vec<VendorOption>> {
        ScopeService::new(self.db.clone())
            .ensure_distributor(access, distributor_id)
            .await?;

        Ok(sqlx::query_as::<_, VendorOption>(
            r#"
            SELECT id, first_name || ' ' || last_name AS name, code, vendor_type, active
            FROM vendors
            WHERE distributor_id = $1
            ORDER BY active DESC, last_name, first_name
            "#,
        )
        .bind(distributor_id)
        .fetch_all(&self.db)
        .await?)
    }

    /// Categories with the distinct formats of their active products
    pub async fn categories_with_formats(&self) -> AppResult<Vec<CategoryFormats>> {
        let rows = sqlx::query_as::<_, (Uuid, String, Option<String>)>(
            r#"
            SELECT DISTINCT c.id, c.name, p.format
            FROM product_categories c
            JOIN products p ON p.category_id = c.id
            WHERE p.active = true
            ORDER BY c.name, p.format
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut by_category: BTreeMap<(String, Uuid), Vec<String>> = BTreeMap::new();
        for (id, name, format) in rows {
            let formats = by_category.entry((name, id)).or_default();
            if let Some(format) = format.filter(|f| !f.is_empty()) {
                if !formats.contains(&format) {
                    formats.push(format);
                }
            }
        }

        Ok(by_category
            .into_iter()
            .map(|((name, id), formats)| CategoryFormats { id, name, formats })
            .collect())
    }

    pub async fn geography(&self) -> AppResult<GeographyTree> {
        GeographyService::new(self.db.clone()).tree().await
    }
}
