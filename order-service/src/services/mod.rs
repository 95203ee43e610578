//! Services module for order-service.

pub mod checkout;
pub mod database;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod pricing;
pub mod reconciliation;
pub mod redis;
pub mod status;
pub mod store;

#[cfg(test)]
pub(crate) mod fakes;

pub use checkout::CheckoutService;
pub use database::Database;
pub use error::OrderError;
pub use gateway::{CreditCardGateway, GatewayRegistry, PaymentGateway, QrCodeGateway};
pub use metrics::{get_metrics, init_metrics, record_error};
pub use reconciliation::ReconciliationService;
pub use self::redis::{InMemoryLockStore, LockGuard, LockStore, RedisService};
pub use status::OrderStatusService;
pub use store::{
    ClientStore, OrderPage, OrderStore, PageRequest, PaymentOutcomeStore, ProductAdmin,
    ProductCatalog, ProductFilter, ProductPage, TaxRuleSource,
};
