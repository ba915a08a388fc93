//! Seed rows for database tests

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::services::scope::AccessScope;

/// One admin, one distributor, one detail vendor and two products
pub struct Network {
    pub access: AccessScope,
    pub distributor_id: Uuid,
    pub vendor_id: Uuid,
    pub products: [Uuid; 2],
}

/// Retail price of every seeded product
pub fn retail_price() -> Decimal {
    Decimal::new(12500, 2)
}

pub async fn seed_network(pool: &PgPool) -> Network {
    let user_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO users (username, password_hash, first_name, last_name, role)
        VALUES ('admin', 'x', 'Test', 'Admin', 'admin')
        RETURNING id
        "#,
    )
    .fetch_one(pool)
    .await
    .unwrap();

    let distributor_id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO distributors (name) VALUES ('Oran Distribution') RETURNING id",
    )
    .fetch_one(pool)
    .await
    .unwrap();

    let vendor_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO vendors (code, first_name, last_name, distributor_id)
        VALUES ('V-001', 'Karim', 'Benali', $1)
        RETURNING id
        "#,
    )
    .bind(distributor_id)
    .fetch_one(pool)
    .await
    .unwrap();

    let mut products = [Uuid::nil(); 2];
    for (i, code) in ["EAU-15", "JUS-1L"].iter().enumerate() {
        products[i] = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO products (code, name, price_factory, price_wholesale, price_retail, price_supermarket)
            VALUES ($1, $1, 95.00, 110.00, $2, 120.00)
            RETURNING id
            "#,
        )
        .bind(code)
        .bind(retail_price())
        .fetch_one(pool)
        .await
        .unwrap();
    }

    Network {
        access: AccessScope::national(user_id),
        distributor_id,
        vendor_id,
        products,
    }
}

/// Stored balance and its timestamp, `None` if there is no row
pub async fn stock_row(pool: &PgPool, distributor_id: Uuid, product_id: Uuid) -> Option<(i32, DateTime<Utc>)> {
    sqlx::query_as::<_, (i32, DateTime<Utc>)>(
        "SELECT quantity, last_updated FROM inventory WHERE distributor_id = $1 AND product_id = $2",
    )
    .bind(distributor_id)
    .bind(product_id)
    .fetch_optional(pool)
    .await
    .unwrap()
}

pub async fn stock(pool: &PgPool, distributor_id: Uuid, product_id: Uuid) -> i32 {
    stock_row(pool, distributor_id, product_id)
        .await
        .map_or(0, |(quantity, _)| quantity)
}
