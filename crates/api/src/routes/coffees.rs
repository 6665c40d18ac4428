//! Menu endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use domain::Coffee;
use points::PointsSink;
use store::OrderStore;

use super::AppState;

/// GET /cart/coffees: the currently published menu.
#[tracing::instrument(skip(state))]
pub async fn list<S: OrderStore + 'static, P: PointsSink + 'static>(
    State(state): State<Arc<AppState<S, P>>>,
) -> Json<Vec<Coffee>> {
    let menu = state.menu.snapshot();
    Json(menu.iter().cloned().collect())
}
