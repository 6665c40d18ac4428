use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use domain::{Coffee, Order};
use tokio::sync::RwLock;

use crate::store::{CoffeeStore, OrderStore, quantity_to_column};
use crate::{Result, StoreError};

struct Table<T> {
    rows: Vec<T>,
    next_id: i32,
}

// Manual impl: a derive would require `T: Default`.
impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            next_id: 0,
        }
    }
}

impl<T> Table<T> {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory cart store implementation for testing.
///
/// Provides the same interface as the PostgreSQL implementation, with
/// sequential ids per table. Ids are never reused, matching `SERIAL` columns.
#[derive(Clone, Default)]
pub struct InMemoryCartStore {
    orders: Arc<RwLock<Table<Order>>>,
    coffees: Arc<RwLock<Table<Coffee>>>,
    fail_on_save: Arc<AtomicBool>,
}

impl InMemoryCartStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail every subsequent write.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.fail_on_save.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.rows.len()
    }

    /// Returns the number of stored coffees.
    pub async fn coffee_count(&self) -> usize {
        self.coffees.read().await.rows.len()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_on_save.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryCartStore {
    async fn save(&self, order: Order) -> Result<Order> {
        self.check_writable()?;
        quantity_to_column(order.quantity)?;

        let mut table = self.orders.write().await;
        let saved = order.with_id(table.next_id());
        table.rows.push(saved.clone());
        Ok(saved)
    }

    async fn find_all(&self) -> Result<Vec<Order>> {
        Ok(self.orders.read().await.rows.clone())
    }
}

#[async_trait]
impl CoffeeStore for InMemoryCartStore {
    async fn delete_all(&self) -> Result<u64> {
        self.check_writable()?;
        let mut table = self.coffees.write().await;
        let removed = table.rows.len() as u64;
        table.rows.clear();
        Ok(removed)
    }

    async fn save_all(&self, coffees: Vec<Coffee>) -> Result<Vec<Coffee>> {
        self.check_writable()?;
        let mut table = self.coffees.write().await;
        let mut saved = Vec::with_capacity(coffees.len());
        for coffee in coffees {
            let coffee = coffee.with_id(table.next_id());
            table.rows.push(coffee.clone());
            saved.push(coffee);
        }
        Ok(saved)
    }

    async fn find_all(&self) -> Result<Vec<Coffee>> {
        Ok(self.coffees.read().await.rows.clone())
    }
}
