//! User administration service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{validate_password, validate_username, Page, Pagination, Role};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{map_unique_violation, AppError, AppResult, ValidateField};
use crate::services::auth::hash_password;
use crate::services::filters::like_pattern;

/// User service
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

/// Public view of a user account
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub phone: Option<String>,
    pub active: bool,
    pub region_id: Option<Uuid>,
    pub zone_id: Option<Uuid>,
    pub wilaya_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

const PROFILE_COLUMNS: &str = "id, username, first_name, last_name, role, phone, active, \
                               region_id, zone_id, wilaya_id, created_at";

impl UserProfile {
    pub async fn fetch(db: &PgPool, id: Uuid) -> AppResult<Option<Self>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", PROFILE_COLUMNS);
        Ok(sqlx::query_as::<_, UserProfile>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await?)
    }
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub search: Option<String>,
    pub role: Option<String>,
    pub page: Option<i64>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    pub username: String,
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    pub role: Role,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub region_id: Option<Uuid>,
    pub zone_id: Option<Uuid>,
    pub wilaya_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserInput {
    pub username: Option<String>,
    pub password: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    pub role: Option<Role>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub active: Option<bool>,
    pub region_id: Option<Uuid>,
    pub zone_id: Option<Uuid>,
    pub wilaya_id: Option<Uuid>,
}

impl UserService {
    /// Create a new UserService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List users, newest first
    pub async fn list_users(&self, query: ListUsersQuery) -> AppResult<Page<UserProfile>> {
        let page = Pagination::new(query.page, query.page_size, shared::DEFAULT_PAGE_SIZE);
        let search = like_pattern(query.search.as_deref());
        let role = match query.role.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(r) => Some(
                r.parse::<Role>()
                    .map_err(|e| AppError::validation("role", e.to_string()))?,
            ),
        };

        let filter = r#"
            WHERE ($1::text IS NULL
                   OR username ILIKE $1 OR first_name ILIKE $1
                   OR last_name ILIKE $1 OR phone ILIKE $1)
              AND ($2::text IS NULL OR role = $2)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM users {}", filter))
            .bind(&search)
            .bind(role.map(|r| r.as_str()))
            .fetch_one(&self.db)
            .await?;

        let users = sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {} FROM users {} ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4",
            PROFILE_COLUMNS, filter
        ))
        .bind(&search)
        .bind(role.map(|r| r.as_str()))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Page::new(users, total))
    }

    /// Create a user account
    pub async fn create_user(&self, input: CreateUserInput) -> AppResult<UserProfile> {
        input.validate()?;
        let username = input.username.trim().to_string();
        validate_username(&username).on_field("username")?;
        validate_password(&input.password).on_field("password")?;

        let password_hash = hash_password(&input.password)?;

        let sql = format!(
            r#"
            INSERT INTO users (username, password_hash, first_name, last_name, role, phone,
                               region_id, zone_id, wilaya_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );

        let user = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(&username)
            .bind(&password_hash)
            .bind(input.first_name.trim())
            .bind(input.last_name.trim())
            .bind(input.role.as_str())
            .bind(&input.phone)
            .bind(input.region_id)
            .bind(input.zone_id)
            .bind(input.wilaya_id)
            .fetch_one(&self.db)
            .await
            .map_err(|e| map_unique_violation(e, "username"))?;

        tracing::info!(user_id = %user.id, role = %user.role, "Created user");
        Ok(user)
    }

    /// Update a user account; absent fields keep their value
    pub async fn update_user(&self, user_id: Uuid, input: UpdateUserInput) -> AppResult<UserProfile> {
        input.validate()?;

        let existing = UserProfile::fetch(&self.db, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        let username = match input.username {
            Some(u) => {
                let u = u.trim().to_string();
                validate_username(&u).on_field("username")?;
                u
            }
            None => existing.username,
        };

        let password_hash = match input.password.as_deref() {
            Some(p) if !p.is_empty() => {
                validate_password(p).on_field("password")?;
                Some(hash_password(p)?)
            }
            _ => None,
        };

        let role = input.role.unwrap_or(existing.role);

        let sql = format!(
            r#"
            UPDATE users
            SET username = $1, first_name = $2, last_name = $3, role = $4, phone = $5,
                active = $6, region_id = $7, zone_id = $8, wilaya_id = $9,
                password_hash = COALESCE($10, password_hash)
            WHERE id = $11
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );

        let user = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(&username)
            .bind(input.first_name.unwrap_or(existing.first_name))
            .bind(input.last_name.unwrap_or(existing.last_name))
            .bind(role.as_str())
            .bind(input.phone.or(existing.phone))
            .bind(input.active.unwrap_or(existing.active))
            .bind(input.region_id.or(existing.region_id))
            .bind(input.zone_id.or(existing.zone_id))
            .bind(input.wilaya_id.or(existing.wilaya_id))
            .bind(password_hash)
            .bind(user_id)
            .fetch_one(&self.db)
            .await
            .map_err(|e| map_unique_violation(e, "username"))?;

        if password_hash_changed(&input.password) {
            // Force re-login everywhere after a password change
            sqlx::query("UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL")
                .bind(user_id)
                .execute(&self.db)
                .await?;
        }

        tracing::info!(%user_id, "Updated user");
        Ok(user)
    }

    /// Delete a user with no distributors or recorded sales
    pub async fn delete_user(&self, acting_user: Uuid, user_id: Uuid) -> AppResult<()> {
        if acting_user == user_id {
            return Err(AppError::validation("id", "You cannot delete your own account"));
        }

        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        if exists == 0 {
            return Err(AppError::NotFound("User".to_string()));
        }

        let (distributors, vendors, sales, purchases, visits, adjustments) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64)>(
                r#"
            SELECT
                (SELECT COUNT(*) FROM distributors WHERE supervisor_id = $1),
                (SELECT COUNT(*) FROM vendors WHERE supervisor_id = $1),
                (SELECT COUNT(*) FROM sales WHERE supervisor_id = $1),
                (SELECT COUNT(*) FROM purchases WHERE supervisor_id = $1),
                (SELECT COUNT(*) FROM visits WHERE supervisor_id = $1),
                (SELECT COUNT(*) FROM stock_adjustments WHERE supervisor_id = $1)
            "#,
            )
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        if let Some(err) = AppError::blocked_by(
            "User",
            &[
                (distributors, "distributor(s)"),
                (vendors, "vendor(s)"),
                (sales, "sale(s)"),
                (purchases, "purchase(s)"),
                (visits, "visit(s)"),
                (adjustments, "stock adjustment(s)"),
            ],
        ) {
            return Err(err);
        }

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        tracing::info!(%user_id, "Deleted user");
        Ok(())
    }

    /// Active supervisors, for assignment dropdowns
    pub async fn list_supervisors(&self) -> AppResult<Vec<UserProfile>> {
        let sql = format!(
            "SELECT {} FROM users WHERE role = 'superviseur' AND active = true ORDER BY last_name, first_name",
            PROFILE_COLUMNS
        );
        Ok(sqlx::query_as::<_, UserProfile>(&sql).fetch_all(&self.db).await?)
    }
}

fn password_hash_changed(password: &Option<String>) -> bool {
    matches!(password.as_deref(), Some(p) if !p.is_empty())
}
