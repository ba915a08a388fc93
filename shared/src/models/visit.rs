//! Field visit models

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::types::ParseEnumError;

/// Editable counter on a vendor's visit row.
///
/// Field names from both the French and English data-entry screens are
/// accepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisitField {
    Planned,
    Actual,
    Invoices,
}

impl VisitField {
    /// Database column backing this field
    pub fn column(&self) -> &'static str {
        match self {
            VisitField::Planned => "planned_visits",
            VisitField::Actual => "actual_visits",
            VisitField::Invoices => "invoice_count",
        }
    }
}

impl FromStr for VisitField {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" | "prog" => Ok(VisitField::Planned),
            "actual" | "done" => Ok(VisitField::Actual),
            "invoices" | "nb_factures" => Ok(VisitField::Invoices),
            other => Err(ParseEnumError::new("visit field", other)),
        }
    }
}

/// Visit counters for one vendor on one day
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct VisitCounts {
    pub planned: i32,
    pub actual: i32,
    pub invoices: i32,
}

impl VisitCounts {
    pub fn set(&mut self, field: VisitField, value: i32) {
        match field {
            VisitField::Planned => self.planned = value,
            VisitField::Actual => self.actual = value,
            VisitField::Invoices => self.invoices = value,
        }
    }
}

/// Visit coverage as a percentage rounded to one decimal, or 0 when nothing
/// was planned
pub fn coverage_percent(planned: i64, actual: i64) -> f64 {
    if planned <= 0 {
        return 0.0;
    }
    let pct = actual as f64 / planned as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}
