//! Access control and input validation tests
//!
//! Tests for:
//! - role to territory scope resolution
//! - login identifiers and account field validation
//! - list pagination bounds

use proptest::prelude::*;
use shared::scope::{DataScope, DistributorPlacement};
use shared::{
    coverage_percent, login_name, validate_adjustment_note, validate_adjustment_quantity,
    validate_code, validate_password, validate_username, validate_visit_value, GeoLevel,
    Pagination, Role, VisitField, DEFAULT_PAGE_SIZE, MATRIX_PAGE_SIZE, MAX_PAGE_SIZE,
};
use uuid::Uuid;

// ============================================================================
// Property Test Strategies
// ============================================================================

fn role_strategy() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

fn username_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9._-]{2,30}"
}

fn placement_strategy() -> impl Strategy<Value = DistributorPlacement> {
    (
        prop::option::of(any::<u128>()),
        prop::option::of(any::<u128>()),
        prop::option::of(any::<u128>()),
    )
        .prop_map(|(s, z, r)| DistributorPlacement {
            supervisor_id: s.map(Uuid::from_u128),
            zone_id: z.map(Uuid::from_u128),
            region_id: r.map(Uuid::from_u128),
        })
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod scope_tests {
    use super::*;

    #[test]
    fn test_national_roles() {
        for role in Role::ALL {
            let national = matches!(role, Role::Admin | Role::Dg | Role::Dc);
            assert_eq!(role.is_national(), national, "{role}");
        }
        assert!(Role::Admin.is_admin());
        assert!(!Role::Dg.is_admin());
    }

    #[test]
    fn test_geo_levels() {
        assert_eq!(Role::Regional.geo_level(), GeoLevel::Region);
        assert_eq!(Role::ChefZone.geo_level(), GeoLevel::Zone);
        assert_eq!(Role::Superviseur.geo_level(), GeoLevel::Wilaya);
    }

    #[test]
    fn test_chef_zone_without_zone_sees_nothing() {
        let me = Uuid::new_v4();
        let scope = DataScope::for_user(me, Role::ChefZone, Some(Uuid::new_v4()), None);
        assert_eq!(scope, DataScope::Empty);
    }

    #[test]
    fn test_supervisor_scope_ignores_territory_fields() {
        let me = Uuid::new_v4();
        let scope = DataScope::for_user(me, Role::Superviseur, Some(Uuid::new_v4()), Some(Uuid::new_v4()));
        assert_eq!(scope, DataScope::Supervisor(me));
        assert_eq!(scope.filter().supervisor_id, Some(me));
    }

    #[test]
    fn test_scope_serializes_level() {
        let json = serde_json::to_value(DataScope::National).unwrap();
        assert_eq!(json["level"], "national");
    }
}

#[cfg(test)]
mod account_tests {
    use super::*;

    #[test]
    fn test_login_name_from_email() {
        assert_eq!(login_name("sup.oran@example.dz"), "sup.oran");
        assert_eq!(login_name("  admin "), "admin");
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("chef zone").is_err());
        assert!(validate_username("chef_zone-1").is_ok());
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn test_codes_cannot_contain_spaces() {
        assert!(validate_code("PRD 01").is_err());
        assert!(validate_code("PRD-01").is_ok());
        assert!(validate_code("   ").is_err());
    }

    #[test]
    fn test_adjustment_rules() {
        assert!(validate_adjustment_quantity(0).is_err());
        assert!(validate_adjustment_quantity(-4).is_ok());
        assert!(validate_adjustment_note("ok").is_err());
        assert!(validate_adjustment_note("broken pallet").is_ok());
    }

    #[test]
    fn test_visit_fields() {
        assert_eq!("planned".parse::<VisitField>().unwrap().column(), "planned_visits");
        assert!("visits".parse::<VisitField>().is_err());
        assert!(validate_visit_value(-1).is_err());
        assert!(validate_visit_value(0).is_ok());
    }

    #[test]
    fn test_coverage() {
        assert_eq!(coverage_percent(0, 5), 0.0);
        assert_eq!(coverage_percent(3, 2), 66.7);
        assert_eq!(coverage_percent(4, 4), 100.0);
    }
}

#[cfg(test)]
mod pagination_tests {
    use super::*;

    #[test]
    fn test_matrix_default_page_size() {
        let p = Pagination::new(None, None, MATRIX_PAGE_SIZE);
        assert_eq!(p.limit(), MATRIX_PAGE_SIZE);
    }

    #[test]
    fn test_page_count() {
        let p = Pagination::new(Some(1), Some(20), DEFAULT_PAGE_SIZE);
        assert_eq!(p.pages(0), 0);
        assert_eq!(p.pages(20), 1);
        assert_eq!(p.pages(21), 2);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// National roles admit every distributor regardless of placement
    #[test]
    fn prop_national_admits_all(placement in placement_strategy()) {
        for role in [Role::Admin, Role::Dg, Role::Dc] {
            let scope = DataScope::for_user(Uuid::new_v4(), role, None, None);
            prop_assert!(scope.admits(&placement));
        }
    }

    /// A non-national scope admits a placement only through its own key
    #[test]
    fn prop_scope_admits_only_matching_key(
        role in role_strategy(),
        placement in placement_strategy(),
        me in any::<u128>(),
        region in prop::option::of(any::<u128>()),
        zone in prop::option::of(any::<u128>()),
    ) {
        let me = Uuid::from_u128(me);
        let region = region.map(Uuid::from_u128);
        let zone = zone.map(Uuid::from_u128);
        let scope = DataScope::for_user(me, role, region, zone);

        let expected = match role {
            Role::Admin | Role::Dg | Role::Dc => true,
            Role::Regional => region.is_some() && placement.region_id == region,
            Role::ChefZone => zone.is_some() && placement.zone_id == zone,
            Role::Superviseur => placement.supervisor_id == Some(me),
        };
        prop_assert_eq!(scope.admits(&placement), expected);
    }

    /// The e-mail local part is used as the username
    #[test]
    fn prop_login_name_strips_domain(user in username_strategy(), domain in "[a-z]{2,10}\\.[a-z]{2,3}") {
        let email = format!("{}@{}", user, domain);
        prop_assert_eq!(login_name(&email), user.as_str());
        prop_assert_eq!(login_name(&user), user.as_str());
    }

    /// Generated usernames pass validation
    #[test]
    fn prop_valid_usernames(user in username_strategy()) {
        prop_assert!(validate_username(&user).is_ok());
    }

    /// Pagination never produces a page below 1 or a size outside bounds
    #[test]
    fn prop_pagination_bounds(page in any::<Option<i64>>(), size in any::<Option<i64>>()) {
        let p = Pagination::new(page, size, DEFAULT_PAGE_SIZE);
        prop_assert!(p.page >= 1);
        prop_assert!(p.limit() >= 1 && p.limit() <= MAX_PAGE_SIZE);
        prop_assert!(p.offset() >= 0);
    }
}
