use super::payment::{Payment, PaymentDraft, PaymentMethod, PaymentStatus};
use super::UnknownVariant;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    Delivered,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Delivered => "delivered",
            Self::Canceled => "canceled",
        }
    }

    /// Status the order takes once its payment settles with `outcome`.
    pub fn after_payment(outcome: PaymentStatus) -> Self {
        match outcome {
            PaymentStatus::Approved => Self::Preparing,
            PaymentStatus::Pending | PaymentStatus::Failed => Self::Canceled,
        }
    }

    /// Only unsettled or freshly approved orders may take a payment outcome.
    /// `preparing` stays open so a redelivered approval is harmless.
    pub fn accepts_payment_outcome(&self) -> bool {
        matches!(self, Self::Pending | Self::Preparing)
    }

    /// The single forward step kitchen staff may take from this status.
    pub fn next_for_staff(&self) -> Option<Self> {
        match self {
            Self::Preparing => Some(Self::Ready),
            Self::Ready => Some(Self::Delivered),
            Self::Pending | Self::Delivered | Self::Canceled => None,
        }
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "preparing" => Ok(Self::Preparing),
            "ready" => Ok(Self::Ready),
            "delivered" => Ok(Self::Delivered),
            "canceled" => Ok(Self::Canceled),
            other => Err(UnknownVariant::new("order status", other)),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Checkout input and pricing output
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub client_id: i64,
    pub items: Vec<NewOrderItem>,
    pub payment_method: PaymentMethod,
}

/// A cart line with the unit price captured at pricing time.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedItem {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Result of a successful pricing run. Only the pricing engine builds one.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedOrder {
    items: Vec<PricedItem>,
    total: Decimal,
}

impl PricedOrder {
    pub(crate) fn new(items: Vec<PricedItem>, total: Decimal) -> Self {
        Self { items, total }
    }

    pub fn items(&self) -> &[PricedItem] {
        &self.items
    }

    pub fn total(&self) -> Decimal {
        self.total
    }
}

/// An order ready to be persisted. Its payment amount is always the
/// priced total.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOrder {
    client_id: i64,
    items: Vec<PricedItem>,
    payment: PaymentDraft,
}

impl PendingOrder {
    pub fn new(client_id: i64, priced: PricedOrder, method: PaymentMethod) -> Self {
        Self {
            client_id,
            payment: PaymentDraft::new(method, priced.total),
            items: priced.items,
        }
    }

    pub fn client_id(&self) -> i64 {
        self.client_id
    }

    pub fn status(&self) -> OrderStatus {
        OrderStatus::Pending
    }

    pub fn items(&self) -> &[PricedItem] {
        &self.items
    }

    pub fn payment(&self) -> &PaymentDraft {
        &self.payment
    }

    pub fn payment_mut(&mut self) -> &mut PaymentDraft {
        &mut self.payment
    }
}

// ============================================================================
// Persisted aggregate
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub client_id: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: i64,
    pub client_id: i64,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub payment: Payment,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn from_parts(
        row: OrderRow,
        items: Vec<OrderItem>,
        payment: Payment,
    ) -> Result<Self, UnknownVariant> {
        Ok(Self {
            id: row.id,
            client_id: row.client_id,
            status: row.status.parse()?,
            items,
            payment,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============================================================================
// Admin listing projection
// ============================================================================

/// One row of the listing join: an order line with its client, product,
/// category and payment columns repeated.
#[derive(Debug, Clone, FromRow)]
pub struct OrderSummaryRow {
    pub order_id: i64,
    pub client_id: i64,
    pub client_name: String,
    pub client_cpf: String,
    pub status: String,
    pub item_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub product_description: String,
    pub product_price: Decimal,
    pub category_handle: String,
    pub quantity: i32,
    pub item_price: Decimal,
    pub payment_id: i64,
    pub payment_status: String,
    pub payment_method: String,
    pub payment_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientRef {
    pub id: i64,
    pub name: String,
    pub cpf: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryProduct {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category_handle: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummaryItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product: SummaryProduct,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryPayment {
    pub id: i64,
    pub order_id: i64,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummary {
    pub id: i64,
    pub client_id: i64,
    pub client: ClientRef,
    pub status: OrderStatus,
    pub items: Vec<OrderSummaryItem>,
    pub payment: SummaryPayment,
}

impl OrderSummary {
    /// Fold listing rows into one summary per order, keeping the order in
    /// which each order id first appears.
    pub fn fold_rows(rows: Vec<OrderSummaryRow>) -> Result<Vec<Self>, UnknownVariant> {
        let mut summaries: Vec<Self> = Vec::new();
        let mut index_by_id = std::collections::HashMap::new();

        for row in rows {
            let item = OrderSummaryItem {
                id: row.item_id,
                order_id: row.order_id,
                product_id: row.product_id,
                product: SummaryProduct {
                    id: row.product_id,
                    name: row.product_name,
                    description: row.product_description,
                    price: row.product_price,
                    category_handle: row.category_handle,
                },
                quantity: row.quantity,
                price: row.item_price,
            };

            if let Some(&idx) = index_by_id.get(&row.order_id) {
                let summary: &mut Self = &mut summaries[idx];
                summary.items.push(item);
                continue;
            }

            index_by_id.insert(row.order_id, summaries.len());
            summaries.push(Self {
                id: row.order_id,
                client_id: row.client_id,
                client: ClientRef {
                    id: row.client_id,
                    name: row.client_name,
                    cpf: row.client_cpf,
                },
                status: row.status.parse()?,
                items: vec![item],
                payment: SummaryPayment {
                    id: row.payment_id,
                    order_id: row.order_id,
                    status: row.payment_status.parse()?,
                    method: row.payment_method.parse()?,
                    amount: row.payment_amount,
                },
            });
        }

        Ok(summaries)
    }
}
