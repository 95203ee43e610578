//! Request and response bodies for the HTTP API.

use crate::models::{
    is_valid_cpf, normalize_cpf, NewClient, NewOrder, NewOrderItem, NewProduct, PaymentMethod,
    PaymentStatus, ProductChanges,
};
use crate::services::{OrderError, PageRequest, ProductFilter};
use serde::{Deserialize, Serialize};
use rust_decimal::Decimal;
use validator::{Validate, ValidateUrl, ValidationError};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CheckoutItemRequest {
    #[validate(range(min = 1, message = "product_id must be positive"))]
    pub product_id: i64,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutPaymentRequest {
    #[validate(length(min = 1, message = "payment method is required"))]
    pub method: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(range(min = 1, message = "client_id must be positive"))]
    pub client_id: i64,
    #[validate(length(min = 1, message = "at least one item is required"), nested)]
    pub items: Vec<CheckoutItemRequest>,
    #[validate(nested)]
    pub payment: CheckoutPaymentRequest,
}

impl TryFrom<CheckoutRequest> for NewOrder {
    type Error = OrderError;

    fn try_from(req: CheckoutRequest) -> Result<Self, Self::Error> {
        let payment_method: PaymentMethod = req
            .payment
            .method
            .parse()
            .map_err(|_| OrderError::UnsupportedPaymentMethod(req.payment.method.clone()))?;

        Ok(NewOrder {
            client_id: req.client_id,
            items: req
                .items
                .into_iter()
                .map(|item| NewOrderItem {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
            payment_method,
        })
    }
}

fn validate_settled_status(status: &str) -> Result<(), ValidationError> {
    match status {
        "approved" | "failed" => Ok(()),
        _ => Err(ValidationError::new("status")
            .with_message("status must be one of: approved, failed".into())),
    }
}

fn validate_payment_method(method: &str) -> Result<(), ValidationError> {
    method.parse::<PaymentMethod>().map(|_| ()).map_err(|_| {
        ValidationError::new("payment_method").with_message("unknown payment method".into())
    })
}

/// Payment provider notification.
#[derive(Debug, Deserialize, Validate)]
pub struct WebhookNotification {
    #[validate(length(min = 1, message = "external_reference is required"))]
    pub external_reference: String,
    #[validate(custom(function = "validate_payment_method"))]
    pub payment_method: String,
    #[validate(custom(function = "validate_settled_status"))]
    pub status: String,
}

impl WebhookNotification {
    /// Typed view of a notification that already passed `validate()`.
    pub fn parts(&self) -> Result<(PaymentMethod, PaymentStatus), OrderError> {
        let method = self
            .payment_method
            .parse()
            .map_err(|_| OrderError::UnsupportedPaymentMethod(self.payment_method.clone()))?;
        let status = self.status.parse().map_err(|_| {
            OrderError::not_processable("payment", format!("unknown status {}", self.status))
        })?;
        Ok((method, status))
    }
}

fn validate_cpf(cpf: &str) -> Result<(), ValidationError> {
    if is_valid_cpf(cpf) {
        Ok(())
    } else {
        Err(ValidationError::new("cpf").with_message("invalid cpf".into()))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
    pub name: String,
    #[validate(custom(function = "validate_cpf"))]
    pub cpf: String,
}

impl From<CreateClientRequest> for NewClient {
    fn from(req: CreateClientRequest) -> Self {
        NewClient {
            name: req.name,
            cpf: normalize_cpf(&req.cpf),
        }
    }
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price < Decimal::ZERO {
        return Err(ValidationError::new("price").with_message("price must not be negative".into()));
    }
    Ok(())
}

fn validate_image_urls(urls: &[String]) -> Result<(), ValidationError> {
    if urls.iter().all(|url| url.as_str().validate_url()) {
        Ok(())
    } else {
        Err(ValidationError::new("images").with_message("every image must be a valid url".into()))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 2, message = "name must have at least 2 characters"))]
    pub name: String,
    #[validate(custom(function = "validate_price"))]
    pub price: Decimal,
    #[validate(length(min = 10, message = "description must have at least 10 characters"))]
    pub description: String,
    /// Category handle.
    #[validate(length(min = 3, message = "category must have at least 3 characters"))]
    pub category: String,
    #[validate(
        length(min = 1, message = "at least one image is required"),
        custom(function = "validate_image_urls")
    )]
    pub images: Vec<String>,
}

impl From<CreateProductRequest> for NewProduct {
    fn from(req: CreateProductRequest) -> Self {
        NewProduct {
            name: req.name,
            description: req.description,
            price: req.price,
            category_handle: req.category,
            image_urls: req.images,
        }
    }
}

/// Partial product update; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 2, message = "name must have at least 2 characters"))]
    pub name: Option<String>,
    #[validate(custom(function = "validate_price"))]
    pub price: Option<Decimal>,
    #[validate(length(min = 10, message = "description must have at least 10 characters"))]
    pub description: Option<String>,
    #[validate(length(min = 3, message = "category must have at least 3 characters"))]
    pub category: Option<String>,
    #[validate(custom(function = "validate_image_urls"))]
    pub images: Option<Vec<String>>,
}

impl From<UpdateProductRequest> for ProductChanges {
    fn from(req: UpdateProductRequest) -> Self {
        ProductChanges {
            name: req.name,
            description: req.description,
            price: req.price,
            category_handle: req.category,
            image_urls: req.images,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<u32>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u32>,
}

impl From<PaginationQuery> for PageRequest {
    fn from(q: PaginationQuery) -> Self {
        PageRequest::new(q.page, q.page_size)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub page: Option<u32>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u32>,
}

impl From<ProductQuery> for ProductFilter {
    fn from(q: ProductQuery) -> Self {
        ProductFilter {
            category: q.category.filter(|c| !c.is_empty()),
            page: PageRequest::new(q.page, q.page_size),
        }
    }
}
