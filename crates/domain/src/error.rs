//! Domain error types.

use thiserror::Error;

/// Errors raised while building domain values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// A coffee name was empty after trimming.
    #[error("Coffee name must not be empty")]
    EmptyCoffeeName,

    /// The `cart.coffees` property is absent or contains no names.
    #[error("Menu configuration missing: property '{property}' is unset or blank")]
    MenuConfigMissing { property: &'static str },
}
