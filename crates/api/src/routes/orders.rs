//! Order placement endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use domain::Order;
use points::PointsSink;
use serde::Deserialize;
use store::OrderStore;

use super::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub coffee: String,
    pub username: String,
    pub quantity: u32,
}

/// POST /cart/orders: records the order and delivers its loyalty points.
///
/// Responds with an empty 200 once the order is saved and delivery has run;
/// delivery failures are never reported to the client.
#[tracing::instrument(skip(state, req), fields(username = %req.username))]
pub async fn place<S: OrderStore + 'static, P: PointsSink + 'static>(
    State(state): State<Arc<AppState<S, P>>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(), ApiError> {
    let order = Order::new(req.coffee, req.username, req.quantity);
    state.order_service.place_order(order).await?;
    Ok(())
}
