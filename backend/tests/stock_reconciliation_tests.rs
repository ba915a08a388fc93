//! Stock reconciliation tests
//!
//! Walks sales and purchases through their lifecycle and checks that the
//! running inventory balance always matches the sum of complete
//! transactions plus manual adjustments:
//! - purchase and sale lifecycle scenarios
//! - delete after any edit sequence nets to zero
//! - ledger rebuild agrees with incremental application

use proptest::prelude::*;
use shared::stock::{reconcile, StockBook, StockDelta, StockKey, TransactionState};
use shared::{LineItem, TransactionKind, TransactionStatus};
use uuid::Uuid;

use TransactionStatus::{Annule, Complete, EnCours};

fn single_line(distributor: Uuid, product: Uuid, status: TransactionStatus, qty: i32) -> TransactionState {
    TransactionState::new(Some(distributor), status, vec![LineItem::new(product, qty)])
}

/// Apply one lifecycle step to the book and return the new balance for `key`
fn step(
    book: &mut StockBook,
    kind: TransactionKind,
    before: Option<&TransactionState>,
    after: Option<&TransactionState>,
    key: StockKey,
) -> i64 {
    let deltas = reconcile(kind, before, after);
    book.apply_all(&deltas);
    book.quantity(&key)
}

// ============================================================================
// Lifecycle Scenarios
// ============================================================================

#[cfg(test)]
mod scenario_tests {
    use super::*;

    /// Purchase of 50 on top of an existing 100:
    /// complete → 150, raise to 80 → 180, cancel → 100, delete → 100
    #[test]
    fn test_purchase_lifecycle() {
        let (d, p) = (Uuid::new_v4(), Uuid::new_v4());
        let key = StockKey::new(d, p);
        let mut book = StockBook::new();
        book.set(key, 100);

        let created = single_line(d, p, Complete, 50);
        assert_eq!(step(&mut book, TransactionKind::Purchase, None, Some(&created), key), 150);

        let raised = single_line(d, p, Complete, 80);
        assert_eq!(
            step(&mut book, TransactionKind::Purchase, Some(&created), Some(&raised), key),
            180
        );

        let cancelled = single_line(d, p, Annule, 80);
        assert_eq!(
            step(&mut book, TransactionKind::Purchase, Some(&raised), Some(&cancelled), key),
            100
        );

        assert_eq!(step(&mut book, TransactionKind::Purchase, Some(&cancelled), None, key), 100);
    }

    /// Sale from an empty row: draft → 0, complete 10 → -10, edit to 4 → -4, delete → 0
    #[test]
    fn test_sale_lifecycle_from_empty_row() {
        let (d, p) = (Uuid::new_v4(), Uuid::new_v4());
        let key = StockKey::new(d, p);
        let mut book = StockBook::new();

        let draft = single_line(d, p, EnCours, 10);
        assert_eq!(step(&mut book, TransactionKind::Sale, None, Some(&draft), key), 0);
        assert!(!book.contains(&key));

        let completed = single_line(d, p, Complete, 10);
        assert_eq!(step(&mut book, TransactionKind::Sale, Some(&draft), Some(&completed), key), -10);

        let edited = single_line(d, p, Complete, 4);
        assert_eq!(step(&mut book, TransactionKind::Sale, Some(&completed), Some(&edited), key), -4);

        assert_eq!(step(&mut book, TransactionKind::Sale, Some(&edited), None, key), 0);
    }

    #[test]
    fn test_reopening_a_cancelled_sale_takes_stock_again() {
        let (d, p) = (Uuid::new_v4(), Uuid::new_v4());
        let key = StockKey::new(d, p);
        let mut book = StockBook::new();
        book.set(key, 30);

        let complete = single_line(d, p, Complete, 12);
        let cancelled = single_line(d, p, Annule, 12);

        assert_eq!(step(&mut book, TransactionKind::Sale, None, Some(&complete), key), 18);
        assert_eq!(step(&mut book, TransactionKind::Sale, Some(&complete), Some(&cancelled), key), 30);
        assert_eq!(step(&mut book, TransactionKind::Sale, Some(&cancelled), Some(&complete), key), 18);
    }

    #[test]
    fn test_unchanged_save_plans_nothing() {
        let (d, p) = (Uuid::new_v4(), Uuid::new_v4());
        let state = single_line(d, p, Complete, 7);
        assert!(reconcile(TransactionKind::Sale, Some(&state), Some(&state)).is_empty());
    }

    #[test]
    fn test_purchase_moved_between_distributors() {
        let (d1, d2, p) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut book = StockBook::new();

        let at_d1 = single_line(d1, p, Complete, 25);
        book.apply_all(&reconcile(TransactionKind::Purchase, None, Some(&at_d1)));

        let at_d2 = single_line(d2, p, Complete, 25);
        book.apply_all(&reconcile(TransactionKind::Purchase, Some(&at_d1), Some(&at_d2)));

        assert_eq!(book.quantity(&StockKey::new(d1, p)), 0);
        assert_eq!(book.quantity(&StockKey::new(d2, p)), 25);
    }

    #[test]
    fn test_manual_adjustment_and_reversal() {
        let (d, p) = (Uuid::new_v4(), Uuid::new_v4());
        let key = StockKey::new(d, p);
        let mut book = StockBook::new();
        book.set(key, 40);

        let adjustment = StockDelta::new(key, -6);
        book.apply(&adjustment);
        assert_eq!(book.quantity(&key), 34);

        book.apply(&StockDelta::new(key, -adjustment.delta));
        assert_eq!(book.quantity(&key), 40);
    }

    #[test]
    fn test_refresh_finds_drifted_rows() {
        let (d, p) = (Uuid::new_v4(), Uuid::new_v4());
        let key = StockKey::new(d, p);

        let purchase = single_line(d, p, Complete, 60);
        let sale = single_line(d, p, Complete, 15);

        let mut ledger = StockBook::new();
        ledger.apply_all(&reconcile(TransactionKind::Purchase, None, Some(&purchase)));
        ledger.apply_all(&reconcile(TransactionKind::Sale, None, Some(&sale)));
        assert_eq!(ledger.quantity(&key), 45);

        let mut stored = StockBook::new();
        stored.set(key, 50);

        let fixes = ledger.corrections(&stored);
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].current, 50);
        assert_eq!(fixes[0].expected, 45);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

fn status_strategy() -> impl Strategy<Value = TransactionStatus> {
    prop_oneof![Just(EnCours), Just(Complete), Just(Annule)]
}

fn kind_strategy() -> impl Strategy<Value = TransactionKind> {
    prop_oneof![Just(TransactionKind::Sale), Just(TransactionKind::Purchase)]
}

/// Edit sequence of (status, [quantity per product]) over a fixed set of products
fn history_strategy() -> impl Strategy<Value = Vec<(TransactionStatus, Vec<i32>)>> {
    prop::collection::vec(
        (status_strategy(), prop::collection::vec(0i32..500, 3)),
        1..12,
    )
}

fn to_state(distributor: Uuid, products: &[Uuid], status: TransactionStatus, qtys: &[i32]) -> TransactionState {
    let lines = products
        .iter()
        .zip(qtys)
        .filter(|(_, q)| **q > 0)
        .map(|(p, q)| LineItem::new(*p, *q))
        .collect();
    TransactionState::new(Some(distributor), status, lines)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any sequence of edits followed by delete leaves the stock untouched
    #[test]
    fn prop_delete_after_any_history_nets_to_zero(
        kind in kind_strategy(),
        history in history_strategy(),
        opening in -1000i64..1000,
    ) {
        let d = Uuid::new_v4();
        let products: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let mut book = StockBook::new();
        for p in &products {
            book.set(StockKey::new(d, *p), opening);
        }

        let mut previous: Option<TransactionState> = None;
        for (status, qtys) in &history {
            let next = to_state(d, &products, *status, qtys);
            book.apply_all(&reconcile(kind, previous.as_ref(), Some(&next)));
            previous = Some(next);
        }
        book.apply_all(&reconcile(kind, previous.as_ref(), None));

        for p in &products {
            prop_assert_eq!(book.quantity(&StockKey::new(d, *p)), opening);
        }
    }

    /// After every step the balance equals the effect of the current state alone
    #[test]
    fn prop_balance_tracks_current_state(
        kind in kind_strategy(),
        history in history_strategy(),
    ) {
        let d = Uuid::new_v4();
        let products: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let mut book = StockBook::new();

        let mut previous: Option<TransactionState> = None;
        for (status, qtys) in &history {
            let next = to_state(d, &products, *status, qtys);
            book.apply_all(&reconcile(kind, previous.as_ref(), Some(&next)));

            let effect = next.effect(kind);
            for p in &products {
                let key = StockKey::new(d, *p);
                prop_assert_eq!(book.quantity(&key), effect.get(&key).copied().unwrap_or(0));
            }
            previous = Some(next);
        }
    }

    /// Planned deltas never contain zeros and come out sorted by key
    #[test]
    fn prop_reconcile_output_is_sorted_and_nonzero(
        kind in kind_strategy(),
        before in (status_strategy(), prop::collection::vec(0i32..50, 3)),
        after in (status_strategy(), prop::collection::vec(0i32..50, 3)),
    ) {
        let d = Uuid::new_v4();
        let products: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let before = to_state(d, &products, before.0, &before.1);
        let after = to_state(d, &products, after.0, &after.1);

        let deltas = reconcile(kind, Some(&before), Some(&after));
        prop_assert!(deltas.iter().all(|x| x.delta != 0));
        prop_assert!(deltas.windows(2).all(|w| w[0].key() < w[1].key()));
    }

    /// Applying the same deltas in any order yields the same book
    #[test]
    fn prop_book_application_is_order_independent(
        deltas in prop::collection::vec((0usize..4, -100i64..100), 0..30),
    ) {
        let d = Uuid::new_v4();
        let products: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let deltas: Vec<StockDelta> = deltas
            .into_iter()
            .map(|(i, qty)| StockDelta::new(StockKey::new(d, products[i]), qty))
            .collect();

        let mut forward = StockBook::new();
        forward.apply_all(&deltas);
        let mut backward = StockBook::new();
        backward.apply_all(deltas.iter().rev());

        prop_assert_eq!(forward, backward);
    }
}
