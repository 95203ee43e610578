//! Checkout: cart in, priced and authorized order out.

use crate::models::{NewOrder, Order, PendingOrder, Product};
use crate::services::error::OrderError;
use crate::services::gateway::GatewayRegistry;
use crate::services::metrics::record_order_created;
use crate::services::pricing::compute_total;
use crate::services::store::{OrderStore, ProductCatalog, TaxRuleSource};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct CheckoutService {
    catalog: Arc<dyn ProductCatalog>,
    tax_rules: Arc<dyn TaxRuleSource>,
    gateways: GatewayRegistry,
    orders: Arc<dyn OrderStore>,
}

impl CheckoutService {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        tax_rules: Arc<dyn TaxRuleSource>,
        gateways: GatewayRegistry,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        Self {
            catalog,
            tax_rules,
            gateways,
            orders,
        }
    }

    #[instrument(skip(self, new_order), fields(
        client_id = new_order.client_id,
        payment_method = %new_order.payment_method,
        items = new_order.items.len()
    ))]
    pub async fn place_order(&self, new_order: NewOrder) -> Result<Order, OrderError> {
        let ids: Vec<i64> = new_order
            .items
            .iter()
            .map(|item| item.product_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let products: HashMap<i64, Product> = self
            .catalog
            .products_by_ids(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let rules = self.tax_rules.active_tax_rules().await?;

        let priced = compute_total(
            &new_order.items,
            &products,
            &rules,
            new_order.payment_method,
        )
        .map_err(|e| OrderError::not_processable("order", e))?;

        let gateway = self
            .gateways
            .resolve(new_order.payment_method)
            .ok_or_else(|| {
                OrderError::UnsupportedPaymentMethod(new_order.payment_method.to_string())
            })?;

        let mut pending = PendingOrder::new(new_order.client_id, priced, new_order.payment_method);
        gateway
            .authorize(pending.payment_mut())
            .await
            .map_err(|e| OrderError::not_processable("payment", e))?;

        let order = self.orders.create_order(pending).await?;

        record_order_created(new_order.payment_method.as_str());
        info!(
            order_id = order.id,
            total = %order.payment.amount,
            "Order placed"
        );
        Ok(order)
    }
}
