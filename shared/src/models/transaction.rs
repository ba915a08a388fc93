//! Sale and purchase transaction models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::types::ParseEnumError;

/// Lifecycle status shared by sales and purchases.
///
/// Only `Complete` transactions count towards inventory. Any status may move
/// to any other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Draft
    #[default]
    EnCours,
    Complete,
    /// Cancelled
    Annule,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 3] = [
        TransactionStatus::EnCours,
        TransactionStatus::Complete,
        TransactionStatus::Annule,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::EnCours => "en_cours",
            TransactionStatus::Complete => "complete",
            TransactionStatus::Annule => "annule",
        }
    }

    pub fn affects_stock(&self) -> bool {
        *self == TransactionStatus::Complete
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionStatus::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("status", s))
    }
}

impl TryFrom<String> for TransactionStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Direction of a stock-moving transaction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Sale,
    Purchase,
}

impl TransactionKind {
    /// +1 when the transaction brings stock in, -1 when it takes stock out
    pub fn sign(&self) -> i64 {
        match self {
            TransactionKind::Purchase => 1,
            TransactionKind::Sale => -1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Sale => "sale",
            TransactionKind::Purchase => "purchase",
        }
    }
}

/// One product line of a sale or purchase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

impl LineItem {
    pub fn new(product_id: Uuid, quantity: i32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Merge lines that name the same product, dropping non-positive quantities.
///
/// Order of first appearance is kept.
pub fn merge_lines(lines: &[LineItem]) -> Vec<LineItem> {
    let mut merged: Vec<LineItem> = Vec::with_capacity(lines.len());
    for line in lines.iter().filter(|l| l.quantity > 0) {
        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => merged.push(*line),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_status_parse() {
        assert_eq!("complete".parse::<TransactionStatus>().unwrap(), TransactionStatus::Complete);
        assert_eq!("annule".parse::<TransactionStatus>().unwrap(), TransactionStatus::Annule);
        assert!("done".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn test_only_complete_affects_stock() {
        assert!(TransactionStatus::Complete.affects_stock());
        assert!(!TransactionStatus::EnCours.affects_stock());
        assert!(!TransactionStatus::Annule.affects_stock());
    }

    #[test]
    fn test_kind_sign() {
        assert_eq!(TransactionKind::Purchase.sign(), 1);
        assert_eq!(TransactionKind::Sale.sign(), -1);
    }

    #[test]
    fn test_merge_lines() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let merged = merge_lines(&[
            LineItem::new(a, 3),
            LineItem::new(b, 0),
            LineItem::new(a, 2),
            LineItem::new(b, 1),
        ]);
        assert_eq!(merged, vec![LineItem::new(a, 5), LineItem::new(b, 1)]);
    }

    proptest! {
        #[test]
        fn prop_merge_keeps_positive_total(
            raw in prop::collection::vec((0usize..4, -20i32..200), 0..40)
        ) {
            let products: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
            let lines: Vec<LineItem> = raw
                .iter()
                .map(|(i, q)| LineItem::new(products[*i], *q))
                .collect();

            let merged = merge_lines(&lines);
            let expected: i64 = lines.iter().filter(|l| l.quantity > 0).map(|l| i64::from(l.quantity)).sum();
            let actual: i64 = merged.iter().map(|l| i64::from(l.quantity)).sum();

            prop_assert_eq!(actual, expected);
            prop_assert!(merged.iter().all(|l| l.quantity > 0));
            for (i, a) in merged.iter().enumerate() {
                prop_assert!(merged[i + 1..].iter().all(|b| b.product_id != a.product_id));
            }
        }
    }
}
