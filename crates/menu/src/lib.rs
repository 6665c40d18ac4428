//! Coffee menu publication and refresh.
//!
//! This crate provides:
//! - [`MenuState`], the atomically swapped menu snapshot served to readers
//! - [`PropertySource`] layers resolving the `cart.coffees` property at refresh time
//! - [`RefreshCoordinator`], which rebuilds the menu on [`RefreshEvent`]s and
//!   optionally mirrors it into a [`store::CoffeeStore`]

pub mod coordinator;
pub mod error;
pub mod source;
pub mod state;

pub use coordinator::{RefreshCoordinator, RefreshEvent, RefreshHandle};
pub use error::{MenuError, Result};
pub use source::{
    EnvPropertySource, JsonFilePropertySource, LayeredPropertySource, MapPropertySource,
    PropertySource,
};
pub use state::MenuState;
