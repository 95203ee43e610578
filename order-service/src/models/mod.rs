//! Domain models for order-service.

pub mod client;
pub mod order;
pub mod payment;
pub mod product;
pub mod tax;

pub use client::{is_valid_cpf, normalize_cpf, Client, NewClient};
pub use order::{
    ClientRef, NewOrder, NewOrderItem, Order, OrderItem, OrderRow, OrderStatus, OrderSummary,
    OrderSummaryItem, OrderSummaryRow, PendingOrder, PricedItem, PricedOrder, SummaryPayment,
    SummaryProduct,
};
pub use payment::{Payment, PaymentDraft, PaymentMethod, PaymentRow, PaymentStatus};
pub use product::{NewProduct, Product, ProductChanges, ProductImage, ProductView};
pub use tax::{TaxAmountType, TaxRule, TaxRuleRow, TaxScope};

use thiserror::Error;

/// A persisted enum column held a value this service does not know.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
