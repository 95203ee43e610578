//! Order pricing engine.
//!
//! Pure computation: resolves each cart line against the catalog snapshot,
//! sums the base amount and compounds the applicable tax rules in the order
//! they were loaded.

use crate::models::{NewOrderItem, PaymentMethod, PricedItem, PricedOrder, Product, TaxAmountType, TaxRule};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("product {0} not found")]
    ProductNotFound(i64),
}

/// Price a cart.
///
/// QR-code payments are exempt from taxes. Card-scoped rules only apply to
/// card payments. Percentage rules multiply the running total, fixed rules
/// add to it, so the result depends on rule order. The final amount is
/// rounded to cents.
pub fn compute_total(
    items: &[NewOrderItem],
    products_by_id: &HashMap<i64, Product>,
    tax_rules: &[TaxRule],
    method: PaymentMethod,
) -> Result<PricedOrder, PricingError> {
    let mut priced = Vec::with_capacity(items.len());
    let mut total = Decimal::ZERO;

    for item in items {
        let product = products_by_id
            .get(&item.product_id)
            .ok_or(PricingError::ProductNotFound(item.product_id))?;

        total += product.price * Decimal::from(item.quantity);
        priced.push(PricedItem {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: product.price,
        });
    }

    if method != PaymentMethod::QrCode {
        for rule in tax_rules.iter().filter(|r| r.applies_to(method)) {
            total = match rule.amount_type {
                TaxAmountType::Percentage => {
                    total * (Decimal::ONE + rule.amount_value / Decimal::ONE_HUNDRED)
                }
                TaxAmountType::Fixed => total + rule.amount_value,
            };
        }
    }

    let total = total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    Ok(PricedOrder::new(priced, total))
}
