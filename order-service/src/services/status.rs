//! Staff-driven order status changes.

use crate::models::OrderStatus;
use crate::services::error::OrderError;
use crate::services::metrics::record_status_transition;
use crate::services::store::OrderStore;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct OrderStatusService {
    orders: Arc<dyn OrderStore>,
}

impl OrderStatusService {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }

    /// Kitchen finished the order: `preparing -> ready`.
    pub async fn mark_ready(&self, id: i64) -> Result<(), OrderError> {
        self.advance(id, OrderStatus::Preparing).await
    }

    /// Customer picked it up: `ready -> delivered`.
    pub async fn mark_delivered(&self, id: i64) -> Result<(), OrderError> {
        self.advance(id, OrderStatus::Ready).await
    }

    #[instrument(skip(self))]
    async fn advance(&self, id: i64, from: OrderStatus) -> Result<(), OrderError> {
        let to = from
            .next_for_staff()
            .ok_or_else(|| OrderError::InvalidTransition(format!("order status is not {}", from)))?;

        self.orders.transition_status(id, from, to).await?;

        record_status_transition(from.as_str(), to.as_str());
        info!(order_id = id, from = %from, to = %to, "Order status advanced");
        Ok(())
    }
}
