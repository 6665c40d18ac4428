use async_trait::async_trait;
use domain::{Coffee, Order};

use crate::Result;

/// Persistence for placed orders (`cafe_orders`).
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists an order and returns it with its assigned id.
    async fn save(&self, order: Order) -> Result<Order>;

    /// Returns every stored order in id order.
    async fn find_all(&self) -> Result<Vec<Order>>;
}

/// Persistence for the coffee menu (`cafe`).
#[async_trait]
pub trait CoffeeStore: Send + Sync {
    /// Removes every stored coffee.
    async fn delete_all(&self) -> Result<u64>;

    /// Persists the given coffees and returns them with their assigned ids.
    async fn save_all(&self, coffees: Vec<Coffee>) -> Result<Vec<Coffee>>;

    /// Returns every stored coffee in id order.
    async fn find_all(&self) -> Result<Vec<Coffee>>;
}

/// Converts an order quantity into the INTEGER column type.
pub(crate) fn quantity_to_column(quantity: u32) -> Result<i32> {
    i32::try_from(quantity).map_err(|_| crate::StoreError::OutOfRange {
        column: "quantity",
        value: i64::from(quantity),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_within_range_converts() {
        assert_eq!(quantity_to_column(42).unwrap(), 42);
    }

    #[test]
    fn quantity_beyond_integer_column_is_rejected() {
        let err = quantity_to_column(u32::MAX).unwrap_err();
        assert!(matches!(
            err,
            crate::StoreError::OutOfRange {
                column: "quantity",
                ..
            }
        ));
    }
}
