//! In-memory stand-ins for the persistence seams, used by unit tests.

use crate::models::{
    Client, ClientRef, NewClient, NewProduct, Order, OrderItem, OrderStatus, OrderSummary, OrderSummaryItem, Payment,
    PaymentMethod, PaymentStatus, PendingOrder, Product, ProductChanges, ProductImage, ProductView, SummaryPayment,
    SummaryProduct, TaxRule,
};
use crate::services::error::OrderError;
use crate::services::store::{
    ClientStore, OrderPage, OrderStore, PageRequest, PaymentOutcomeStore, ProductAdmin,
    ProductCatalog, ProductFilter, ProductPage, TaxRuleSource,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub struct SeededOrder {
    pub id: i64,
    pub reference: String,
}

#[derive(Default)]
struct FakeState {
    next_id: i64,
    orders: BTreeMap<i64, Order>,
    deleted: HashSet<i64>,
    products: Vec<Product>,
    images: Vec<ProductImage>,
    clients: Vec<Client>,
}

impl FakeState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn live(&self, id: i64) -> Option<&Order> {
        self.orders.get(&id).filter(|_| !self.deleted.contains(&id))
    }
}

#[derive(Default)]
pub struct FakeStore {
    categories: Vec<String>,
    tax_rules: Vec<TaxRule>,
    known_clients: Option<HashSet<i64>>,
    outcome_delay: Option<Duration>,
    state: Mutex<FakeState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    create_calls: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(self, products: Vec<Product>) -> Self {
        self.state.lock().unwrap().products = products;
        self
    }

    pub fn with_categories(mut self, handles: &[&str]) -> Self {
        self.categories = handles.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn with_tax_rules(mut self, rules: Vec<TaxRule>) -> Self {
        self.tax_rules = rules;
        self
    }

    pub fn with_clients(mut self, ids: &[i64]) -> Self {
        self.known_clients = Some(ids.iter().copied().collect());
        self
    }

    pub fn with_outcome_delay(mut self, delay: Duration) -> Self {
        self.outcome_delay = Some(delay);
        self
    }

    pub fn product(id: i64, price: Decimal) -> Product {
        Product {
            id,
            name: format!("Product {}", id),
            description: String::new(),
            price,
            category_id: 1,
            category_handle: "burgers".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Insert an order with a single line and a pending payment.
    pub fn seed_order(&self, method: PaymentMethod, status: OrderStatus) -> SeededOrder {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let reference = format!("ref-{}", id);
        let now = Utc::now();

        state.orders.insert(
            id,
            Order {
                id,
                client_id: 1,
                status,
                items: vec![OrderItem {
                    id,
                    order_id: id,
                    product_id: 1,
                    quantity: 1,
                    price: Decimal::TEN,
                    created_at: now,
                    updated_at: now,
                }],
                payment: Payment {
                    id,
                    order_id: id,
                    status: PaymentStatus::Pending,
                    method,
                    amount: Decimal::TEN,
                    external_reference: Some(reference.clone()),
                    qr_data: None,
                    created_at: now,
                    updated_at: now,
                },
                created_at: now,
                updated_at: now,
            },
        );

        SeededOrder { id, reference }
    }

    pub fn order_status(&self, id: i64) -> OrderStatus {
        self.state.lock().unwrap().orders[&id].status
    }

    pub fn payment_status(&self, id: i64) -> PaymentStatus {
        self.state.lock().unwrap().orders[&id].payment.status
    }

    pub fn product_is_live(&self, id: i64) -> bool {
        self.state.lock().unwrap().products.iter().any(|p| p.id == id)
    }

    pub fn order_count(&self) -> usize {
        self.state.lock().unwrap().orders.len()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_outcomes(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductCatalog for FakeStore {
    async fn products_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>, OrderError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<ProductPage, OrderError> {
        let state = self.state.lock().unwrap();
        let matching: Vec<Product> = state
            .products
            .iter()
            .filter(|p| {
                filter
                    .category
                    .as_deref()
                    .map_or(true, |handle| p.category_handle == handle)
            })
            .cloned()
            .collect();
        let total = matching.len() as i64;
        let page: Vec<Product> = matching
            .into_iter()
            .skip(filter.page.offset() as usize)
            .take(filter.page.limit() as usize)
            .collect();

        Ok(ProductPage {
            products: ProductView::assemble(page, state.images.clone()),
            total,
            page: filter.page.page,
            page_size: filter.page.page_size,
        })
    }
}

impl FakeStore {
    fn category_id(&self, handle: &str) -> Result<i64, OrderError> {
        self.categories
            .iter()
            .position(|c| c == handle)
            .map(|idx| idx as i64 + 1)
            .ok_or_else(|| OrderError::not_found("category"))
    }
}

fn view_of(state: &FakeState, id: i64) -> Option<ProductView> {
    let product = state.products.iter().find(|p| p.id == id)?.clone();
    let images = state
        .images
        .iter()
        .filter(|i| i.product_id == id)
        .cloned()
        .collect();
    Some(ProductView { product, images })
}

fn attach_images(state: &mut FakeState, product_id: i64, urls: &[String]) {
    for url in urls {
        let id = state.images.iter().map(|i| i.id).max().unwrap_or(0) + 1;
        state.images.push(ProductImage {
            id,
            product_id,
            image_url: url.clone(),
        });
    }
}

#[async_trait]
impl ProductAdmin for FakeStore {
    async fn create_product(&self, product: NewProduct) -> Result<ProductView, OrderError> {
        let category_id = self.category_id(&product.category_handle)?;
        let mut state = self.state.lock().unwrap();
        let id = state.products.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let now = Utc::now();

        state.products.push(Product {
            id,
            name: product.name,
            description: product.description,
            price: product.price,
            category_id,
            category_handle: product.category_handle,
            created_at: now,
            updated_at: now,
        });
        attach_images(&mut state, id, &product.image_urls);

        view_of(&state, id).ok_or_else(|| OrderError::not_found("product"))
    }

    async fn update_product(
        &self,
        id: i64,
        changes: ProductChanges,
    ) -> Result<ProductView, OrderError> {
        let category_id = match changes.category_handle.as_deref() {
            Some(handle) => Some(self.category_id(handle)?),
            None => None,
        };

        let mut state = self.state.lock().unwrap();
        let product = state
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| OrderError::not_found("product"))?;

        if let Some(name) = changes.name {
            product.name = name;
        }
        if let Some(description) = changes.description {
            product.description = description;
        }
        if let Some(price) = changes.price {
            product.price = price;
        }
        if let (Some(category_id), Some(handle)) = (category_id, changes.category_handle) {
            product.category_id = category_id;
            product.category_handle = handle;
        }
        product.updated_at = Utc::now();

        if let Some(urls) = changes.image_urls {
            state.images.retain(|i| i.product_id != id);
            attach_images(&mut state, id, &urls);
        }

        view_of(&state, id).ok_or_else(|| OrderError::not_found("product"))
    }

    async fn delete_product(&self, id: i64) -> Result<(), OrderError> {
        let mut state = self.state.lock().unwrap();
        let before = state.products.len();
        state.products.retain(|p| p.id != id);
        if state.products.len() == before {
            return Err(OrderError::not_found("product"));
        }
        Ok(())
    }
}

#[async_trait]
impl ClientStore for FakeStore {
    async fn create_client(&self, client: NewClient) -> Result<Client, OrderError> {
        let mut state = self.state.lock().unwrap();
        if state.clients.iter().any(|c| c.cpf == client.cpf) {
            return Err(OrderError::not_processable(
                "client",
                "cpf already registered",
            ));
        }

        let now = Utc::now();
        let created = Client {
            id: state.clients.len() as i64 + 1,
            name: client.name,
            cpf: client.cpf,
            created_at: now,
            updated_at: now,
        };
        state.clients.push(created.clone());
        Ok(created)
    }

    async fn client_by_cpf(&self, cpf: &str) -> Result<Client, OrderError> {
        self.state
            .lock()
            .unwrap()
            .clients
            .iter()
            .find(|c| c.cpf == cpf)
            .cloned()
            .ok_or_else(|| OrderError::not_found("client"))
    }
}

#[async_trait]
impl TaxRuleSource for FakeStore {
    async fn active_tax_rules(&self) -> Result<Vec<TaxRule>, OrderError> {
        Ok(self.tax_rules.clone())
    }
}

#[async_trait]
impl OrderStore for FakeStore {
    async fn create_order(&self, order: PendingOrder) -> Result<Order, OrderError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(clients) = &self.known_clients {
            if !clients.contains(&order.client_id()) {
                return Err(OrderError::not_found("client"));
            }
        }

        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let now = Utc::now();

        let items = order
            .items()
            .iter()
            .enumerate()
            .map(|(idx, item)| OrderItem {
                id: id * 100 + idx as i64,
                order_id: id,
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.unit_price,
                created_at: now,
                updated_at: now,
            })
            .collect();

        let draft = order.payment();
        let created = Order {
            id,
            client_id: order.client_id(),
            status: order.status(),
            items,
            payment: Payment {
                id,
                order_id: id,
                status: draft.status,
                method: draft.method,
                amount: draft.amount,
                external_reference: draft.external_reference.clone(),
                qr_data: draft.provider_payload.clone(),
                created_at: now,
                updated_at: now,
            },
            created_at: now,
            updated_at: now,
        };

        state.orders.insert(id, created.clone());
        Ok(created)
    }

    async fn get_order(&self, id: i64) -> Result<Order, OrderError> {
        self.state
            .lock()
            .unwrap()
            .live(id)
            .cloned()
            .ok_or_else(|| OrderError::not_found("order"))
    }

    async fn transition_status(
        &self,
        id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<(), OrderError> {
        let mut state = self.state.lock().unwrap();
        if state.live(id).is_none() {
            return Err(OrderError::not_found("order"));
        }

        let order = state.orders.get_mut(&id).unwrap();
        if order.status != from {
            return Err(OrderError::InvalidTransition(format!(
                "order status is not {}",
                from
            )));
        }
        order.status = to;
        Ok(())
    }

    async fn list_orders(&self, page: PageRequest) -> Result<OrderPage, OrderError> {
        let state = self.state.lock().unwrap();
        let live: Vec<&Order> = state
            .orders
            .values()
            .filter(|o| !state.deleted.contains(&o.id))
            .collect();

        let orders = live
            .iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|o| OrderSummary {
                id: o.id,
                client_id: o.client_id,
                client: ClientRef {
                    id: o.client_id,
                    name: format!("Client {}", o.client_id),
                    cpf: String::new(),
                },
                status: o.status,
                items: o
                    .items
                    .iter()
                    .map(|i| OrderSummaryItem {
                        id: i.id,
                        order_id: i.order_id,
                        product_id: i.product_id,
                        product: SummaryProduct {
                            id: i.product_id,
                            name: format!("Product {}", i.product_id),
                            description: String::new(),
                            price: i.price,
                            category_handle: "burgers".to_string(),
                        },
                        quantity: i.quantity,
                        price: i.price,
                    })
                    .collect(),
                payment: SummaryPayment {
                    id: o.payment.id,
                    order_id: o.id,
                    status: o.payment.status,
                    method: o.payment.method,
                    amount: o.payment.amount,
                },
            })
            .collect();

        Ok(OrderPage {
            orders,
            total: live.len() as i64,
            page: page.page,
            page_size: page.page_size,
        })
    }

    async fn soft_delete_order(&self, id: i64) -> Result<(), OrderError> {
        let mut state = self.state.lock().unwrap();
        if state.live(id).is_none() {
            return Err(OrderError::not_found("order"));
        }
        state.deleted.insert(id);
        Ok(())
    }
}

#[async_trait]
impl PaymentOutcomeStore for FakeStore {
    async fn apply_payment_outcome(
        &self,
        external_reference: &str,
        method: PaymentMethod,
        outcome: PaymentStatus,
    ) -> Result<OrderStatus, OrderError> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if let Some(delay) = self.outcome_delay {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let mut state = self.state.lock().unwrap();
            let deleted = state.deleted.clone();
            match state.orders.values_mut().find(|o| {
                !deleted.contains(&o.id)
                    && o.payment.method == method
                    && o.payment.external_reference.as_deref() == Some(external_reference)
            }) {
                None => Err(OrderError::not_found("payment")),
                Some(order) if !order.status.accepts_payment_outcome() => {
                    Err(OrderError::InvalidTransition(format!(
                        "order status is {} and cannot take a payment outcome",
                        order.status
                    )))
                }
                Some(order) => {
                    let next = OrderStatus::after_payment(outcome);
                    order.payment.status = outcome;
                    order.status = next;
                    Ok(next)
                }
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
