//! Product catalogue service

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{validate_code, validate_name, Page, Pagination, ProductPrices};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{map_unique_violation, AppError, AppResult, ValidateField};
use crate::services::filters::{id_filter, like_pattern};

/// Product service
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub format: Option<String>,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub type_id: Option<Uuid>,
    pub type_name: Option<String>,
    pub active: bool,
    pub price_factory: Decimal,
    pub price_wholesale: Decimal,
    pub price_retail: Decimal,
    pub price_supermarket: Decimal,
}

impl Product {
    pub fn prices(&self) -> ProductPrices {
        ProductPrices {
            factory: self.price_factory,
            wholesale: self.price_wholesale,
            retail: self.price_retail,
            supermarket: self.price_supermarket,
        }
    }
}

pub(crate) const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.code, p.name, p.format,
           p.category_id, c.name AS category_name,
           p.type_id, t.name AS type_name,
           p.active, p.price_factory, p.price_wholesale, p.price_retail, p.price_supermarket
    FROM products p
    LEFT JOIN product_categories c ON c.id = p.category_id
    LEFT JOIN product_types t ON t.id = p.type_id
"#;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NamedRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    #[serde(alias = "type")]
    pub product_type: Option<String>,
    /// `all`, `active` or `inactive`
    pub active: Option<String>,
    pub page: Option<i64>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductInput {
    pub code: String,
    pub name: String,
    #[validate(length(max = 50))]
    pub format: Option<String>,
    pub category_id: Option<Uuid>,
    pub type_id: Option<Uuid>,
    pub active: Option<bool>,
    #[serde(default)]
    pub price_factory: Decimal,
    #[serde(default)]
    pub price_wholesale: Decimal,
    #[serde(default)]
    pub price_retail: Decimal,
    #[serde(default)]
    pub price_supermarket: Decimal,
}

impl ProductInput {
    fn check(&self) -> AppResult<()> {
        self.validate()?;
        validate_code(self.code.trim()).on_field("code")?;
        validate_name(self.name.trim()).on_field("name")?;
        for (field, price) in [
            ("price_factory", self.price_factory),
            ("price_wholesale", self.price_wholesale),
            ("price_retail", self.price_retail),
            ("price_supermarket", self.price_supermarket),
        ] {
            if price.is_sign_negative() {
                return Err(AppError::validation(field, "Prices cannot be negative"));
            }
        }
        Ok(())
    }
}

impl ProductService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_products(&self, query: ListProductsQuery) -> AppResult<Page<Product>> {
        let page = Pagination::new(query.page, query.page_size, shared::DEFAULT_PAGE_SIZE);
        let search = like_pattern(query.search.as_deref());
        let category = id_filter(query.category.as_deref(), "category")?;
        let product_type = id_filter(query.product_type.as_deref(), "product_type")?;
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
            WHERE ($1::text IS NULL OR p.name ILIKE $1 OR p.code ILIKE $1)
              AND ($2::uuid IS NULL OR p.category_id = $2)
              AND ($3::uuid IS NULL OR p.type_id = $3)
              AND ($4::boolean IS NULL OR p.active = $4)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM products p {}",
            filter
        ))
        .bind(&search)
        .bind(category)
        .bind(product_type)
        .bind(active)
        .fetch_one(&self.db)
        .await?;

        let products = sqlx::query_as::<_, Product>(&format!(
            "{} {} ORDER BY p.name ASC, p.id ASC LIMIT $5 OFFSET $6",
            PRODUCT_SELECT, filter
        ))
        .bind(&search)
        .bind(category)
        .bind(product_type)
        .bind(active)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Page::new(products, total))
    }

    pub async fn get_product(&self, product_id: Uuid) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(&format!("{} WHERE p.id = $1", PRODUCT_SELECT))
            .bind(product_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    pub async fn create_product(&self, input: ProductInput) -> AppResult<Product> {
        input.check()?;

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO products (code, name, format, category_id, type_id, active,
                                  price_factory, price_wholesale, price_retail, price_supermarket)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(input.code.trim())
        .bind(input.name.trim())
        .bind(input.format.as_deref().map(str::trim))
        .bind(input.category_id)
        .bind(input.type_id)
        .bind(input.active.unwrap_or(true))
        .bind(input.price_factory)
        .bind(input.price_wholesale)
        .bind(input.price_retail)
        .bind(input.price_supermarket)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "code"))?;

        tracing::info!(product_id = %id, code = %input.code.trim(), "Created product");
        self.get_product(id).await
    }

    pub async fn update_product(&self, product_id: Uuid, input: ProductInput) -> AppResult<Product> {
        input.check()?;

        let result = sqlx::query(
            r#"
            UPDATE products
            SET code = $1, name = $2, format = $3, category_id = $4, type_id = $5,
                active = COALESCE($6, active),
                price_factory = $7, price_wholesale = $8, price_retail = $9, price_supermarket = $10
            WHERE id = $11
            "#,
        )
        .bind(input.code.trim())
        .bind(input.name.trim())
        .bind(input.format.as_deref().map(str::trim))
        .bind(input.category_id)
        .bind(input.type_id)
        .bind(input.active)
        .bind(input.price_factory)
        .bind(input.price_wholesale)
        .bind(input.price_retail)
        .bind(input.price_supermarket)
        .bind(product_id)
        .execute(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "code"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }

        tracing::info!(%product_id, "Updated product");
        self.get_product(product_id).await
    }

    pub async fn categories(&self) -> AppResult<Vec<NamedRef>> {
        Ok(sqlx::query_as::<_, NamedRef>(
            "SELECT id, name FROM product_categories ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?)
    }

    pub async fn product_types(&self) -> AppResult<Vec<NamedRef>> {
        Ok(
            sqlx::query_as::<_, NamedRef>("SELECT id, name FROM product_types ORDER BY name")
                .fetch_all(&self.db)
                .await?,
        )
    }
}
