use std::sync::Arc;

use domain::Order;
use store::{OrderStore, StoreError};

use crate::pipeline::{Delivery, OutboundPipeline};
use crate::sink::PointsSink;

/// Places orders: persist first, then deliver loyalty points.
pub struct OrderService<S, P>
where
    S: OrderStore,
    P: PointsSink,
{
    store: Arc<S>,
    pipeline: Arc<OutboundPipeline<P>>,
}

impl<S, P> Clone for OrderService<S, P>
where
    S: OrderStore,
    P: PointsSink,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            pipeline: self.pipeline.clone(),
        }
    }
}

impl<S, P> OrderService<S, P>
where
    S: OrderStore + 'static,
    P: PointsSink + 'static,
{
    /// Creates a new order service.
    pub fn new(store: Arc<S>, pipeline: Arc<OutboundPipeline<P>>) -> Self {
        Self { store, pipeline }
    }

    /// Persists `order` and delivers its points.
    ///
    /// Delivery runs on its own task, so it completes even if the caller is
    /// dropped once the order is saved. Only a persistence failure is returned.
    #[tracing::instrument(skip(self, order), fields(username = %order.username, coffee = %order.coffee))]
    pub async fn place_order(&self, order: Order) -> Result<Order, StoreError> {
        let saved = self.store.save(order).await?;
        metrics::counter!("cart_orders_placed_total").increment(1);
        tracing::info!(order_id = ?saved.id, quantity = saved.quantity, "order saved");

        let pipeline = self.pipeline.clone();
        let delivered = saved.clone();
        let handle = tokio::spawn(async move { pipeline.deliver(&delivered).await });

        match handle.await {
            Ok(Delivery::Delivered { attempts, .. }) => {
                tracing::debug!(order_id = ?saved.id, attempts, "points delivery complete");
            }
            Ok(Delivery::Swallowed { .. }) => {}
            Err(err) => {
                tracing::error!(order_id = ?saved.id, error = %err, "points delivery task failed");
            }
        }

        Ok(saved)
    }
}
