//! Row-level data scoping by role and geography.
//!
//! Every operational record hangs off a distributor, and a distributor sits in
//! a wilaya → zone → region chain and may have a supervising user. A user's
//! scope decides which distributors (and so which vendors, sales, purchases,
//! visits and stock rows) they can see or touch.

use serde::Serialize;
use uuid::Uuid;

use crate::models::Role;

/// What part of the distributor network a user can reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "level", content = "id", rename_all = "snake_case")]
pub enum DataScope {
    /// Every distributor
    National,
    /// Distributors in the given region
    Region(Uuid),
    /// Distributors in the given zone
    Zone(Uuid),
    /// Distributors supervised by the given user
    Supervisor(Uuid),
    /// Nothing; a regional or zone role with no territory assigned
    Empty,
}

/// Where a distributor sits in the hierarchy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DistributorPlacement {
    pub supervisor_id: Option<Uuid>,
    pub zone_id: Option<Uuid>,
    pub region_id: Option<Uuid>,
}

/// Optional equality filters equivalent to a scope, for use as query binds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeFilter {
    pub supervisor_id: Option<Uuid>,
    pub zone_id: Option<Uuid>,
    pub region_id: Option<Uuid>,
    /// Match nothing at all
    pub deny_all: bool,
}

impl DataScope {
    pub fn for_user(
        user_id: Uuid,
        role: Role,
        region_id: Option<Uuid>,
        zone_id: Option<Uuid>,
    ) -> Self {
        match role {
            Role::Admin | Role::Dg | Role::Dc => DataScope::National,
            Role::Regional => region_id.map_or(DataScope::Empty, DataScope::Region),
            Role::ChefZone => zone_id.map_or(DataScope::Empty, DataScope::Zone),
            Role::Superviseur => DataScope::Supervisor(user_id),
        }
    }

    pub fn is_national(&self) -> bool {
        matches!(self, DataScope::National)
    }

    pub fn admits(&self, placement: &DistributorPlacement) -> bool {
        match self {
            DataScope::National => true,
            DataScope::Region(id) => placement.region_id == Some(*id),
            DataScope::Zone(id) => placement.zone_id == Some(*id),
            DataScope::Supervisor(id) => placement.supervisor_id == Some(*id),
            DataScope::Empty => false,
        }
    }

    pub fn filter(&self) -> ScopeFilter {
        match self {
            DataScope::National => ScopeFilter::default(),
            DataScope::Region(id) => ScopeFilter {
                region_id: Some(*id),
                ..ScopeFilter::default()
            },
            DataScope::Zone(id) => ScopeFilter {
                zone_id: Some(*id),
                ..ScopeFilter::default()
            },
            DataScope::Supervisor(id) => ScopeFilter {
                supervisor_id: Some(*id),
                ..ScopeFilter::default()
            },
            DataScope::Empty => ScopeFilter {
                deny_all: true,
                ..ScopeFilter::default()
            },
        }
    }
}
