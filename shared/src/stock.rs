//! Stock reconciliation
//!
//! A sale or purchase moves stock only while it is `complete`. Every change to
//! a transaction (create, line edit, status change, delete) is planned as the
//! difference between its stock effect after the change and before it, so the
//! running balance of each (distributor, product) pair always equals the sum
//! over the transactions currently complete, plus manual adjustments.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::models::{LineItem, TransactionKind, TransactionStatus};

/// Inventory row identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StockKey {
    pub distributor_id: Uuid,
    pub product_id: Uuid,
}

impl StockKey {
    pub fn new(distributor_id: Uuid, product_id: Uuid) -> Self {
        Self {
            distributor_id,
            product_id,
        }
    }
}

/// Signed quantity to add to one inventory row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockDelta {
    pub distributor_id: Uuid,
    pub product_id: Uuid,
    pub delta: i64,
}

impl StockDelta {
    pub fn new(key: StockKey, delta: i64) -> Self {
        Self {
            distributor_id: key.distributor_id,
            product_id: key.product_id,
            delta,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.distributor_id, self.product_id)
    }

    pub fn is_noop(&self) -> bool {
        self.delta == 0
    }
}

/// The stock-relevant part of a sale or purchase at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionState {
    pub distributor_id: Option<Uuid>,
    pub status: TransactionStatus,
    pub lines: Vec<LineItem>,
}

impl TransactionState {
    pub fn new(distributor_id: Option<Uuid>, status: TransactionStatus, lines: Vec<LineItem>) -> Self {
        Self {
            distributor_id,
            status,
            lines,
        }
    }

    /// Net quantity this transaction contributes to each inventory row.
    ///
    /// Empty unless the transaction is complete and has a distributor.
    pub fn effect(&self, kind: TransactionKind) -> BTreeMap<StockKey, i64> {
        let mut effect = BTreeMap::new();
        let Some(distributor_id) = self.distributor_id else {
            return effect;
        };
        if !self.status.affects_stock() {
            return effect;
        }
        for line in &self.lines {
            *effect
                .entry(StockKey::new(distributor_id, line.product_id))
                .or_insert(0) += kind.sign() * i64::from(line.quantity);
        }
        effect
    }
}

/// Plan the inventory deltas for moving a transaction from `before` to `after`.
///
/// `None` on either side stands for "does not exist", so creation is
/// `(None, Some(new))` and deletion is `(Some(old), None)`. The result holds no
/// zero deltas and is sorted by key, which keeps row-lock order stable across
/// concurrent writers.
pub fn reconcile(
    kind: TransactionKind,
    before: Option<&TransactionState>,
    after: Option<&TransactionState>,
) -> Vec<StockDelta> {
    let mut net = after.map(|s| s.effect(kind)).unwrap_or_default();
    if let Some(before) = before {
        for (key, qty) in before.effect(kind) {
            *net.entry(key).or_insert(0) -= qty;
        }
    }
    net.into_iter()
        .filter(|(_, delta)| *delta != 0)
        .map(|(key, delta)| StockDelta::new(key, delta))
        .collect()
}

/// Planned delta for a single spreadsheet cell edit on a sale or purchase
pub fn cell_delta(
    kind: TransactionKind,
    status: TransactionStatus,
    old_quantity: i32,
    new_quantity: i32,
) -> i64 {
    if !status.affects_stock() {
        return 0;
    }
    kind.sign() * (i64::from(new_quantity.max(0)) - i64::from(old_quantity.max(0)))
}

/// A row whose stored balance disagrees with the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockCorrection {
    pub distributor_id: Uuid,
    pub product_id: Uuid,
    pub current: i64,
    pub expected: i64,
}

/// In-memory set of balances, used to rebuild inventory from its ledger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockBook {
    balances: BTreeMap<StockKey, i64>,
}

impl StockBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a delta to its row, creating the row if needed.
    ///
    /// Returns `false` and leaves the book untouched for a zero delta.
    pub fn apply(&mut self, delta: &StockDelta) -> bool {
        if delta.is_noop() {
            return false;
        }
        *self.balances.entry(delta.key()).or_insert(0) += delta.delta;
        true
    }

    /// Apply every delta, returning how many changed the book
    pub fn apply_all<'a, I>(&mut self, deltas: I) -> usize
    where
        I: IntoIterator<Item = &'a StockDelta>,
    {
        deltas.into_iter().filter(|d| self.apply(d)).count()
    }

    pub fn set(&mut self, key: StockKey, quantity: i64) {
        self.balances.insert(key, quantity);
    }

    pub fn quantity(&self, key: &StockKey) -> i64 {
        self.balances.get(key).copied().unwrap_or(0)
    }

    pub fn contains(&self, key: &StockKey) -> bool {
        self.balances.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StockKey, &i64)> {
        self.balances.iter()
    }

    /// Rows of `current` that must change to match this book.
    ///
    /// Rows missing from either side count as zero.
    pub fn corrections(&self, current: &StockBook) -> Vec<StockCorrection> {
        let mut keys: Vec<&StockKey> = self.balances.keys().chain(current.balances.keys()).collect();
        keys.sort();
        keys.dedup();

        keys.into_iter()
            .filter_map(|key| {
                let expected = self.quantity(key);
                let stored = current.quantity(key);
                (expected != stored).then_some(StockCorrection {
                    distributor_id: key.distributor_id,
                    product_id: key.product_id,
                    current: stored,
                    expected,
                })
            })
            .collect()
    }
}
