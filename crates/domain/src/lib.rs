//! Domain types for the cart service.
//!
//! This crate provides the data model shared by every other crate:
//! - [`Coffee`] menu entries, ordered and compared by name
//! - [`Order`] submissions and the [`PointsPayload`] derived from them
//! - [`parse_coffees`] for turning the `cart.coffees` property into a menu

pub mod coffee;
pub mod error;
pub mod order;

pub use coffee::{COFFEE_DELIMITER, COFFEES_PROPERTY, Coffee, Menu, parse_coffees};
pub use error::DomainError;
pub use order::{Order, PointsPayload};
