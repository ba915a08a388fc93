//! Inventory models

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::types::ParseEnumError;

/// Default quantity at or below which a stock row raises an alert
pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

/// Source of a line in a product's stock history
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Sale,
    Purchase,
    Adjustment,
}

impl FromStr for MovementType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(MovementType::Sale),
            "purchase" => Ok(MovementType::Purchase),
            "adjustment" => Ok(MovementType::Adjustment),
            other => Err(ParseEnumError::new("movement type", other)),
        }
    }
}

impl TryFrom<String> for MovementType {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Comparison of a physical count against the theoretical balance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockVariance {
    pub theoretical: i64,
    pub physical: i64,
    /// `physical - theoretical`; negative means shrinkage
    pub variance: i64,
}

impl StockVariance {
    pub fn new(theoretical: i64, physical: i64) -> Self {
        Self {
            theoretical,
            physical,
            variance: physical - theoretical,
        }
    }
}

pub fn is_low_stock(quantity: i64, threshold: i32) -> bool {
    quantity <= i64::from(threshold)
}
