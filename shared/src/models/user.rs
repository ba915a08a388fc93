//! User and role models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::ParseEnumError;

/// Platform roles, from system administration down to field supervision
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    /// Directeur général
    Dg,
    /// Directeur commercial
    Dc,
    Regional,
    ChefZone,
    Superviseur,
}

/// Geographic level a role operates at
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GeoLevel {
    System,
    National,
    Region,
    Zone,
    Wilaya,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Dg,
        Role::Dc,
        Role::Regional,
        Role::ChefZone,
        Role::Superviseur,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Dg => "dg",
            Role::Dc => "dc",
            Role::Regional => "regional",
            Role::ChefZone => "chef_zone",
            Role::Superviseur => "superviseur",
        }
    }

    pub fn geo_level(&self) -> GeoLevel {
        match self {
            Role::Admin => GeoLevel::System,
            Role::Dg | Role::Dc => GeoLevel::National,
            Role::Regional => GeoLevel::Region,
            Role::ChefZone => GeoLevel::Zone,
            Role::Superviseur => GeoLevel::Wilaya,
        }
    }

    /// Roles that see every distributor
    pub fn is_national(&self) -> bool {
        matches!(self.geo_level(), GeoLevel::System | GeoLevel::National)
    }

    pub fn is_admin(&self) -> bool {
        *self == Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("role", s))
    }
}

impl TryFrom<String> for Role {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Derive the login name from a username or an e-mail address
pub fn login_name(identifier: &str) -> &str {
    let trimmed = identifier.trim();
    match trimmed.split_once('@') {
        Some((local, _)) => local,
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("manager".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_names() {
        assert_eq!(serde_json::to_string(&Role::ChefZone).unwrap(), "\"chef_zone\"");
        let r: Role = serde_json::from_str("\"superviseur\"").unwrap();
        assert_eq!(r, Role::Superviseur);
    }

    #[test]
    fn test_geo_levels() {
        assert_eq!(Role::Admin.geo_level(), GeoLevel::System);
        assert_eq!(Role::Dc.geo_level(), GeoLevel::National);
        assert_eq!(Role::Superviseur.geo_level(), GeoLevel::Wilaya);
        assert!(Role::Dg.is_national());
        assert!(!Role::Regional.is_national());
    }

    #[test]
    fn test_login_name_strips_domain() {
        assert_eq!(login_name("karim@example.dz"), "karim");
        assert_eq!(login_name("  karim "), "karim");
    }
}
