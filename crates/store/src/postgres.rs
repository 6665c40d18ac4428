use async_trait::async_trait;
use domain::{Coffee, Order};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::store::{CoffeeStore, OrderStore, quantity_to_column};
use crate::{Result, StoreError};

/// PostgreSQL-backed cart store implementation.
#[derive(Clone)]
pub struct PostgresCartStore {
    pool: PgPool,
}

impl PostgresCartStore {
    /// Creates a new PostgreSQL cart store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool of at most `max_connections` to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let quantity: i32 = row.try_get("quantity")?;
        let quantity = u32::try_from(quantity).map_err(|_| StoreError::OutOfRange {
            column: "quantity",
            value: i64::from(quantity),
        })?;

        Ok(Order {
            id: Some(row.try_get("id")?),
            coffee: row.try_get("coffee")?,
            username: row.try_get("username")?,
            quantity,
        })
    }

    fn row_to_coffee(row: PgRow) -> Result<Coffee> {
        Ok(Coffee {
            id: Some(row.try_get("id")?),
            name: row.try_get("name")?,
        })
    }
}

#[async_trait]
impl OrderStore for PostgresCartStore {
    #[tracing::instrument(skip(self, order), fields(username = %order.username))]
    async fn save(&self, order: Order) -> Result<Order> {
        let quantity = quantity_to_column(order.quantity)?;

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO cafe_orders (coffee, username, quantity)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&order.coffee)
        .bind(&order.username)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await?;

        metrics::counter!("store_orders_saved_total").increment(1);
        Ok(order.with_id(id))
    }

    async fn find_all(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, coffee, username, quantity
            FROM cafe_orders
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }
}

#[async_trait]
impl CoffeeStore for PostgresCartStore {
    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cafe").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn save_all(&self, coffees: Vec<Coffee>) -> Result<Vec<Coffee>> {
        // Each insert is its own statement; a failure part-way leaves earlier rows in place.
        let mut saved = Vec::with_capacity(coffees.len());
        for coffee in coffees {
            let id: i32 = sqlx::query_scalar("INSERT INTO cafe (name) VALUES ($1) RETURNING id")
                .bind(&coffee.name)
                .fetch_one(&self.pool)
                .await?;
            saved.push(coffee.with_id(id));
        }
        Ok(saved)
    }

    async fn find_all(&self) -> Result<Vec<Coffee>> {
        let rows = sqlx::query("SELECT id, name FROM cafe ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_coffee).collect()
    }
}
