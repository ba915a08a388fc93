//! The single write path for inventory balances.
//!
//! Every stock movement goes through [`StockLedger`] on the caller's open
//! transaction, so line reads, line writes and balance updates commit or roll
//! back together.

use shared::models::TransactionKind;
use shared::stock::{reconcile, StockDelta, TransactionState};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Inventory mutator bound to an open connection or transaction
pub struct StockLedger<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> StockLedger<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Add `delta` to the (distributor, product) balance, creating the row if
    /// absent. Does nothing for a zero delta or a missing id.
    ///
    /// Returns whether a row was written.
    pub async fn apply_delta(
        &mut self,
        distributor_id: Option<Uuid>,
        product_id: Option<Uuid>,
        delta: i64,
    ) -> AppResult<bool> {
        let (Some(distributor_id), Some(product_id)) = (distributor_id, product_id) else {
            return Ok(false);
        };
        if delta == 0 {
            return Ok(false);
        }

        let delta = i32::try_from(delta)
            .map_err(|_| AppError::validation("quantity", "Stock movement is out of range"))?;

        sqlx::query(
            r#"
            INSERT INTO inventory (distributor_id, product_id, quantity, last_updated)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (distributor_id, product_id)
            DO UPDATE SET quantity = inventory.quantity + EXCLUDED.quantity,
                          last_updated = NOW()
            "#,
        )
        .bind(distributor_id)
        .bind(product_id)
        .bind(delta)
        .execute(&mut *self.conn)
        .await?;

        tracing::debug!(%distributor_id, %product_id, delta, "Applied stock delta");
        Ok(true)
    }

    /// Apply planned deltas in order
    pub async fn apply_all(&mut self, deltas: &[StockDelta]) -> AppResult<usize> {
        let mut written = 0;
        for d in deltas {
            if self
                .apply_delta(Some(d.distributor_id), Some(d.product_id), d.delta)
                .await?
            {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Plan and apply the stock movement for a transaction going from
    /// `before` to `after`
    pub async fn reconcile(
        &mut self,
        kind: TransactionKind,
        before: Option<&TransactionState>,
        after: Option<&TransactionState>,
    ) -> AppResult<Vec<StockDelta>> {
        let deltas = reconcile(kind, before, after);
        self.apply_all(&deltas).await?;
        if !deltas.is_empty() {
            tracing::info!(
                kind = kind.as_str(),
                rows = deltas.len(),
                "Reconciled inventory"
            );
        }
        Ok(deltas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::{seed_network, stock, stock_row};
    use shared::{LineItem, TransactionStatus};
    use sqlx::PgPool;
    use tokio_test::assert_ok;

    #[sqlx::test(migrations = "./migrations")]
    async fn test_zero_delta_leaves_row_untouched(pool: PgPool) {
        let net = seed_network(&pool).await;
        let (d, p) = (net.distributor_id, net.products[0]);

        let mut tx = pool.begin().await.unwrap();
        assert!(assert_ok!(StockLedger::new(&mut tx).apply_delta(Some(d), Some(p), 10).await));
        tx.commit().await.unwrap();
        let before = stock_row(&pool, d, p).await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        let mut ledger = StockLedger::new(&mut tx);
        assert!(!assert_ok!(ledger.apply_delta(Some(d), Some(p), 0).await));
        assert!(!assert_ok!(ledger.apply_delta(None, Some(p), 5).await));
        assert!(!assert_ok!(ledger.apply_delta(Some(d), None, 5).await));
        tx.commit().await.unwrap();

        assert_eq!(stock_row(&pool, d, p).await.unwrap(), before);
        assert!(stock_row(&pool, d, net.products[1]).await.is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_delta_creates_then_accumulates(pool: PgPool) {
        let net = seed_network(&pool).await;
        let (d, p) = (net.distributor_id, net.products[0]);

        let mut tx = pool.begin().await.unwrap();
        let mut ledger = StockLedger::new(&mut tx);
        assert_ok!(ledger.apply_delta(Some(d), Some(p), -3).await);
        assert_ok!(ledger.apply_delta(Some(d), Some(p), 10).await);
        tx.commit().await.unwrap();

        assert_eq!(stock(&pool, d, p).await, 7);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_rolled_back_delta_is_discarded(pool: PgPool) {
        let net = seed_network(&pool).await;
        let (d, p) = (net.distributor_id, net.products[0]);

        let mut tx = pool.begin().await.unwrap();
        assert_ok!(StockLedger::new(&mut tx).apply_delta(Some(d), Some(p), 25).await);
        drop(tx);

        assert!(stock_row(&pool, d, p).await.is_none());
    }

    /// Purchase of 50 on a balance of 100: complete, raise to 80, cancel, delete
    #[sqlx::test(migrations = "./migrations")]
    async fn test_purchase_lifecycle_on_stored_balance(pool: PgPool) {
        let net = seed_network(&pool).await;
        let (d, p) = (net.distributor_id, net.products[0]);
        let state = |status, qty| TransactionState::new(Some(d), status, vec![LineItem::new(p, qty)]);

        let created = state(TransactionStatus::Complete, 50);
        let raised = state(TransactionStatus::Complete, 80);
        let cancelled = state(TransactionStatus::Annule, 80);
        let steps: [(Option<&TransactionState>, Option<&TransactionState>, i32); 4] = [
            (None, Some(&created), 150),
            (Some(&created), Some(&raised), 180),
            (Some(&raised), Some(&cancelled), 100),
            (Some(&cancelled), None, 100),
        ];

        let mut tx = pool.begin().await.unwrap();
        assert_ok!(StockLedger::new(&mut tx).apply_delta(Some(d), Some(p), 100).await);
        tx.commit().await.unwrap();

        for (before, after, expected) in steps {
            let mut tx = pool.begin().await.unwrap();
            assert_ok!(
                StockLedger::new(&mut tx)
                    .reconcile(TransactionKind::Purchase, before, after)
                    .await
            );
            tx.commit().await.unwrap();
            assert_eq!(stock(&pool, d, p).await, expected);
        }
    }
}
