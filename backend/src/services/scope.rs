//! Resolves a caller's row-level data scope

use shared::scope::{DataScope, DistributorPlacement};
use shared::Role;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;

/// A caller together with the distributors they can reach
#[derive(Debug, Clone)]
pub struct AccessScope {
    pub user_id: Uuid,
    pub role: Role,
    pub scope: DataScope,
    /// `None` means every distributor
    distributor_ids: Option<Vec<Uuid>>,
}

impl AccessScope {
    /// Value to bind as `$n::uuid[]` in `($n IS NULL OR x.distributor_id = ANY($n))`
    pub fn distributor_filter(&self) -> Option<Vec<Uuid>> {
        self.distributor_ids.clone()
    }

    pub fn is_national(&self) -> bool {
        self.distributor_ids.is_none()
    }

    pub fn is_supervisor(&self) -> bool {
        self.role == Role::Superviseur
    }

    pub fn covers(&self, distributor_id: Uuid) -> bool {
        self.distributor_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&distributor_id))
    }

    /// First reachable distributor, by name; `None` for national scope or an
    /// empty territory
    pub fn first_distributor(&self) -> Option<Uuid> {
        self.distributor_ids
            .as_ref()
            .and_then(|ids| ids.first().copied())
    }

    pub fn has_no_distributors(&self) -> bool {
        matches!(&self.distributor_ids, Some(ids) if ids.is_empty())
    }
}

#[cfg(test)]
impl AccessScope {
    /// Unrestricted caller for database tests
    pub(crate) fn national(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::Admin,
            scope: DataScope::National,
            distributor_ids: None,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ScopeUserRow {
    region_id: Option<Uuid>,
    zone_id: Option<Uuid>,
    active: bool,
}

#[derive(sqlx::FromRow)]
struct PlacementRow {
    supervisor_id: Option<Uuid>,
    zone_id: Option<Uuid>,
    region_id: Option<Uuid>,
}

/// Scope resolution service
#[derive(Clone)]
pub struct ScopeService {
    db: PgPool,
}

impl ScopeService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Resolve the caller's scope from their role and assigned territory
    pub async fn resolve(&self, user: &AuthUser) -> AppResult<AccessScope> {
        let row = sqlx::query_as::<_, ScopeUserRow>(
            "SELECT region_id, zone_id, active FROM users WHERE id = $1",
        )
        .bind(user.user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;

        if !row.active {
            return Err(AppError::Unauthorized("Account is disabled".to_string()));
        }

        let scope = DataScope::for_user(user.user_id, user.role, row.region_id, row.zone_id);

        let distributor_ids = if scope.is_national() {
            None
        } else {
            let filter = scope.filter();
            let ids = sqlx::query_scalar::<_, Uuid>(
                r#"
                SELECT d.id
                FROM distributors d
                LEFT JOIN wilayas w ON w.id = d.wilaya_id
                LEFT JOIN zones z ON z.id = w.zone_id
                WHERE NOT $1
                  AND ($2::uuid IS NULL OR d.supervisor_id = $2)
                  AND ($3::uuid IS NULL OR w.zone_id = $3)
                  AND ($4::uuid IS NULL OR z.region_id = $4)
                ORDER BY d.name ASC, d.id ASC
                "#,
            )
            .bind(filter.deny_all)
            .bind(filter.supervisor_id)
            .bind(filter.zone_id)
            .bind(filter.region_id)
            .fetch_all(&self.db)
            .await?;
            Some(ids)
        };

        Ok(AccessScope {
            user_id: user.user_id,
            role: user.role,
            scope,
            distributor_ids,
        })
    }

    /// 404 if the distributor does not exist, 403 if it is outside the scope
    pub async fn ensure_distributor(&self, access: &AccessScope, distributor_id: Uuid) -> AppResult<()> {
        let placement = sqlx::query_as::<_, PlacementRow>(
            r#"
            SELECT d.supervisor_id, w.zone_id, z.region_id
            FROM distributors d
            LEFT JOIN wilayas w ON w.id = d.wilaya_id
            LEFT JOIN zones z ON z.id = w.zone_id
            WHERE d.id = $1
            "#,
        )
        .bind(distributor_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Distributor".to_string()))?;

        let placement = DistributorPlacement {
            supervisor_id: placement.supervisor_id,
            zone_id: placement.zone_id,
            region_id: placement.region_id,
        };

        if access.scope.admits(&placement) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %access.user_id,
                %distributor_id,
                "Blocked access to distributor outside scope"
            );
            Err(AppError::forbidden("Distributor is outside your scope"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(ids: Option<Vec<Uuid>>) -> AccessScope {
        AccessScope {
            user_id: Uuid::new_v4(),
            role: Role::Superviseur,
            scope: DataScope::Empty,
            distributor_ids: ids,
        }
    }

    #[test]
    fn test_national_covers_everything() {
        let a = access(None);
        assert!(a.covers(Uuid::new_v4()));
        assert!(a.is_national());
        assert_eq!(a.first_distributor(), None);
    }

    #[test]
    fn test_restricted_scope() {
        let mine = Uuid::new_v4();
        let a = access(Some(vec![mine]));
        assert!(a.covers(mine));
        assert!(!a.covers(Uuid::new_v4()));
        assert_eq!(a.first_distributor(), Some(mine));
        assert!(access(Some(vec![])).has_no_distributors());
    }
}
