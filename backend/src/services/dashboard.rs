//! Month-to-date dashboard

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::calendar::month_start;
use shared::coverage_percent;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::scope::AccessScope;

const TOP_N: i64 = 5;

/// Dashboard service
#[derive(Clone)]
pub struct DashboardService {
    db: PgPool,
    low_stock_threshold: i32,
}

#[derive(Debug, Default, Serialize)]
pub struct DashboardMetrics {
    pub sales: Decimal,
    pub purchases: Decimal,
    pub coverage: f64,
    #[serde(rename = "lowStockAlerts")]
    pub low_stock_alerts: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RankedVendor {
    pub name: String,
    pub value: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RankedProduct {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Default, Serialize)]
pub struct Rankings {
    pub vendors: Vec<RankedVendor>,
    pub products: Vec<RankedProduct>,
}

#[derive(Debug, Default, Serialize)]
pub struct DashboardStats {
    pub metrics: DashboardMetrics,
    pub rankings: Rankings,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub data: DashboardStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DashboardService {
    pub fn new(db: PgPool, low_stock_threshold: i32) -> Self {
        Self {
            db,
            low_stock_threshold,
        }
    }

    /// Stats for the current calendar month
    pub async fn stats(&self, access: &AccessScope) -> AppResult<DashboardResponse> {
        self.stats_since(access, month_start(Utc::now().date_naive()))
            .await
    }

    pub async fn stats_since(&self, access: &AccessScope, since: NaiveDate) -> AppResult<DashboardResponse> {
        let distributor_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM distributors WHERE active = true AND ($1::uuid[] IS NULL OR id = ANY($1))",
        )
        .bind(access.distributor_filter())
        .fetch_all(&self.db)
        .await?;

        if distributor_ids.is_empty() {
            return Ok(DashboardResponse {
                data: DashboardStats::default(),
                message: Some("No distributor assigned".to_string()),
            });
        }

        let (sales, purchases, planned, actual, low_stock_alerts) =
            sqlx::query_as::<_, (Decimal, Decimal, i64, i64, i64)>(
                r#"
            SELECT
                (SELECT COALESCE(SUM(total_amount), 0) FROM sales
                  WHERE distributor_id = ANY($1) AND date >= $2),
                (SELECT COALESCE(SUM(total_amount), 0) FROM purchases
                  WHERE distributor_id = ANY($1) AND date >= $2),
                (SELECT COALESCE(SUM(planned_visits), 0)::bigint FROM visits
                  WHERE distributor_id = ANY($1) AND date >= $2),
                (SELECT COALESCE(SUM(actual_visits), 0)::bigint FROM visits
                  WHERE distributor_id = ANY($1) AND date >= $2),
                (SELECT COUNT(*) FROM inventory
                  WHERE distributor_id = ANY($1) AND quantity <= $3)
            "#,
            )
            .bind(&distributor_ids)
            .bind(since)
            .bind(self.low_stock_threshold)
            .fetch_one(&self.db)
            .await?;

        let vendors = sqlx::query_as::<_, RankedVendor>(
            r#"
            SELECT v.first_name || ' ' || v.last_name AS name, SUM(s.total_amount) AS value
            FROM sales s
            JOIN vendors v ON v.id = s.vendor_id
            WHERE s.distributor_id = ANY($1) AND s.date >= $2
            GROUP BY v.id, v.first_name, v.last_name
            ORDER BY value DESC
            LIMIT $3
            "#,
        )
        .bind(&distributor_ids)
        .bind(since)
        .bind(TOP_N)
        .fetch_all(&self.db)
        .await?;

        let products = sqlx::query_as::<_, RankedProduct>(
            r#"
            SELECT p.name, SUM(si.quantity)::bigint AS value
            FROM sale_items si
            JOIN sales s ON s.id = si.sale_id
            JOIN products p ON p.id = si.product_id
            WHERE s.distributor_id = ANY($1) AND s.date >= $2
            GROUP BY p.id, p.name
            ORDER BY value DESC
            LIMIT $3
            "#,
        )
        .bind(&distributor_ids)
        .bind(since)
        .bind(TOP_N)
        .fetch_all(&self.db)
        .await?;

        Ok(DashboardResponse {
            data: DashboardStats {
                metrics: DashboardMetrics {
                    sales,
                    purchases,
                    coverage: coverage_percent(planned, actual),
                    low_stock_alerts,
                },
                rankings: Rankings { vendors, products },
            },
            message: None,
        })
    }
}
