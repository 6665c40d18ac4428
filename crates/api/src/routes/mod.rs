//! HTTP route handlers.

pub mod actuator;
pub mod coffees;
pub mod orders;

use std::sync::Arc;

use menu::{MenuState, RefreshHandle};
use points::{OrderService, PointsSink};
use store::OrderStore;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore, P: PointsSink> {
    pub order_service: OrderService<S, P>,
    pub menu: Arc<MenuState>,
    pub refresh: RefreshHandle,
}
