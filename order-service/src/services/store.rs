//! Persistence seams used by the workflows. [`super::Database`] implements
//! all of them over Postgres.

use super::error::OrderError;
use crate::models::{
    Client, NewClient, NewProduct, Order, OrderStatus, OrderSummary, PaymentMethod,
    PaymentStatus, PendingOrder, Product, ProductChanges, ProductView, TaxRule,
};
use async_trait::async_trait;
use serde::Serialize;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of a listing. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Missing or zero values fall back to the defaults; oversized pages are
    /// capped.
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE),
            page_size: page_size
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .min(MAX_PAGE_SIZE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<OrderSummary>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub page: PageRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductView>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Live products among `ids`. Unknown or deleted ids are simply absent.
    async fn products_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>, OrderError>;

    async fn list_products(&self, filter: &ProductFilter) -> Result<ProductPage, OrderError>;
}

/// Catalog maintenance for the admin API.
#[async_trait]
pub trait ProductAdmin: Send + Sync {
    async fn create_product(&self, product: NewProduct) -> Result<ProductView, OrderError>;

    async fn update_product(
        &self,
        id: i64,
        changes: ProductChanges,
    ) -> Result<ProductView, OrderError>;

    /// Soft delete. Orders already placed keep referencing the product.
    async fn delete_product(&self, id: i64) -> Result<(), OrderError>;
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Register a client. A CPF already on file is rejected.
    async fn create_client(&self, client: NewClient) -> Result<Client, OrderError>;

    async fn client_by_cpf(&self, cpf: &str) -> Result<Client, OrderError>;
}

#[async_trait]
pub trait TaxRuleSource: Send + Sync {
    /// Active rules in application order.
    async fn active_tax_rules(&self) -> Result<Vec<TaxRule>, OrderError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist the order, its items and its payment atomically.
    async fn create_order(&self, order: PendingOrder) -> Result<Order, OrderError>;

    async fn get_order(&self, id: i64) -> Result<Order, OrderError>;

    /// Move the order from `from` to `to`, failing if it is no longer in
    /// `from`.
    async fn transition_status(
        &self,
        id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<(), OrderError>;

    async fn list_orders(&self, page: PageRequest) -> Result<OrderPage, OrderError>;

    async fn soft_delete_order(&self, id: i64) -> Result<(), OrderError>;
}

#[async_trait]
pub trait PaymentOutcomeStore: Send + Sync {
    /// Record the payment outcome for `(external_reference, method)` and move
    /// the owning order accordingly, in one transaction. Returns the order's
    /// new status.
    async fn apply_payment_outcome(
        &self,
        external_reference: &str,
        method: PaymentMethod,
        outcome: PaymentStatus,
    ) -> Result<OrderStatus, OrderError>;
}
