//! Database service for order-service.

use crate::models::{
    Client, NewClient, NewProduct, Order, OrderItem, OrderRow, OrderStatus, OrderSummary, OrderSummaryRow, Payment,
    PaymentDraft, PaymentMethod, PaymentRow, PaymentStatus, PendingOrder, PricedItem, Product,
    ProductChanges, ProductImage, ProductView, TaxRule, TaxRuleRow,
};
use crate::services::error::OrderError;
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{
    ClientStore, OrderPage, OrderStore, PageRequest, PaymentOutcomeStore, ProductAdmin,
    ProductCatalog, ProductFilter, ProductPage, TaxRuleSource,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Executor, FromRow, Postgres};
use std::time::Duration;
use tracing::{info, instrument, warn};

const ORDER_CLIENT_FK: &str = "orders_client_id_fkey";
const CLIENT_CPF_UNIQUE: &str = "clients_cpf_key";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "order-service"))]
    pub async fn new(
        database_url: &Secret<String>,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url.expose_secret())
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // =========================================================================
    // Order aggregate reads
    // =========================================================================

    /// Read the order header, its items and its payment from one snapshot so a
    /// concurrent settlement is seen either entirely or not at all.
    async fn load_order(&self, id: i64) -> Result<Option<Order>, OrderError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let Some(row) = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, client_id, status, created_at, updated_at
            FROM orders
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, quantity, price, created_at, updated_at
            FROM order_items
            WHERE order_id = $1 AND deleted_at IS NULL
            ORDER BY id
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let payment = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, order_id, status, method, amount, external_reference, qr_data,
                   created_at, updated_at
            FROM payments
            WHERE order_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| OrderError::not_found("payment"))?;

        tx.commit().await?;

        Ok(Some(Order::from_parts(row, items, Payment::try_from(payment)?)?))
    }
}

// =============================================================================
// Executor-level statements
//
// These take any executor so callers pass either the pool or `&mut *tx`.
// =============================================================================

pub async fn insert_order_header(
    executor: impl Executor<'_, Database = Postgres>,
    client_id: i64,
    status: OrderStatus,
) -> Result<OrderRow, sqlx::Error> {
    sqlx::query_as::<_, OrderRow>(
        r#"
        INSERT INTO orders (client_id, status)
        VALUES ($1, $2)
        RETURNING id, client_id, status, created_at, updated_at
        "#,
    )
    .bind(client_id)
    .bind(status.as_str())
    .fetch_one(executor)
    .await
}

pub async fn insert_order_item(
    executor: impl Executor<'_, Database = Postgres>,
    order_id: i64,
    item: &PricedItem,
) -> Result<OrderItem, sqlx::Error> {
    sqlx::query_as::<_, OrderItem>(
        r#"
        INSERT INTO order_items (order_id, product_id, quantity, price)
        VALUES ($1, $2, $3, $4)
        RETURNING id, order_id, product_id, quantity, price, created_at, updated_at
        "#,
    )
    .bind(order_id)
    .bind(item.product_id)
    .bind(item.quantity)
    .bind(item.unit_price)
    .fetch_one(executor)
    .await
}

pub async fn insert_payment(
    executor: impl Executor<'_, Database = Postgres>,
    order_id: i64,
    payment: &PaymentDraft,
) -> Result<PaymentRow, sqlx::Error> {
    sqlx::query_as::<_, PaymentRow>(
        r#"
        INSERT INTO payments (order_id, status, method, amount, external_reference, qr_data)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, order_id, status, method, amount, external_reference, qr_data,
                  created_at, updated_at
        "#,
    )
    .bind(order_id)
    .bind(payment.status.as_str())
    .bind(payment.method.as_str())
    .bind(payment.amount)
    .bind(payment.external_reference.as_deref())
    .bind(payment.provider_payload.as_deref())
    .fetch_one(executor)
    .await
}

/// Unconditionally set an order's status. Returns the number of rows hit.
pub async fn update_order_status(
    executor: impl Executor<'_, Database = Postgres>,
    id: i64,
    status: OrderStatus,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = $1, updated_at = NOW()
        WHERE id = $2 AND deleted_at IS NULL
        "#,
    )
    .bind(status.as_str())
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Set an order's status only while it still equals `from`.
pub async fn compare_and_set_order_status(
    executor: impl Executor<'_, Database = Postgres>,
    id: i64,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = $1, updated_at = NOW()
        WHERE id = $2 AND status = $3 AND deleted_at IS NULL
        "#,
    )
    .bind(to.as_str())
    .bind(id)
    .bind(from.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

pub async fn update_payment_status(
    executor: impl Executor<'_, Database = Postgres>,
    payment_id: i64,
    status: PaymentStatus,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE payments
        SET status = $1, updated_at = NOW()
        WHERE id = $2 AND deleted_at IS NULL
        "#,
    )
    .bind(status.as_str())
    .bind(payment_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

pub async fn category_id_by_handle(
    executor: impl Executor<'_, Database = Postgres>,
    handle: &str,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT id FROM categories
        WHERE handle = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(handle)
    .fetch_optional(executor)
    .await
}

pub async fn insert_product_images(
    executor: impl Executor<'_, Database = Postgres>,
    product_id: i64,
    urls: &[String],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO products_images (product_id, image_url)
        SELECT $1, url FROM UNNEST($2::TEXT[]) AS url
        "#,
    )
    .bind(product_id)
    .bind(urls)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

pub async fn soft_delete_product_images(
    executor: impl Executor<'_, Database = Postgres>,
    product_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE products_images
        SET deleted_at = NOW(), updated_at = NOW()
        WHERE product_id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(product_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

pub async fn select_product(
    executor: impl Executor<'_, Database = Postgres>,
    id: i64,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        r#"
        SELECT p.id, p.name, p.description, p.price, p.category_id,
               c.handle AS category_handle, p.created_at, p.updated_at
        FROM products p
        JOIN categories c ON c.id = p.category_id
        WHERE p.id = $1 AND p.deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn select_product_images(
    executor: impl Executor<'_, Database = Postgres>,
    product_id: i64,
) -> Result<Vec<ProductImage>, sqlx::Error> {
    sqlx::query_as::<_, ProductImage>(
        r#"
        SELECT id, product_id, image_url
        FROM products_images
        WHERE product_id = $1 AND deleted_at IS NULL
        ORDER BY id
        "#,
    )
    .bind(product_id)
    .fetch_all(executor)
    .await
}

fn is_client_fk_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_foreign_key_violation() && db_err.constraint() == Some(ORDER_CLIENT_FK)
        }
        _ => false,
    }
}

fn is_duplicate_cpf(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.constraint() == Some(CLIENT_CPF_UNIQUE)
        }
        _ => false,
    }
}

/// Payment and order locked for settlement.
#[derive(Debug, FromRow)]
struct SettlementTarget {
    payment_id: i64,
    order_id: i64,
    order_status: String,
}

#[async_trait]
impl ProductCatalog for Database {
    #[instrument(skip(self))]
    async fn products_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>, OrderError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["products_by_ids"])
            .start_timer();

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT p.id, p.name, p.description, p.price, p.category_id,
                   c.handle AS category_handle, p.created_at, p.updated_at
            FROM products p
            JOIN categories c ON c.id = p.category_id
            WHERE p.deleted_at IS NULL AND p.id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(products)
    }

    #[instrument(skip(self))]
    async fn list_products(&self, filter: &ProductFilter) -> Result<ProductPage, OrderError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_products"])
            .start_timer();

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT p.id, p.name, p.description, p.price, p.category_id,
                   c.handle AS category_handle, p.created_at, p.updated_at
            FROM products p
            JOIN categories c ON c.id = p.category_id
            WHERE p.deleted_at IS NULL
              AND ($1::TEXT IS NULL OR c.handle = $1)
            ORDER BY p.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.category.as_deref())
        .bind(filter.page.limit())
        .bind(filter.page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM products p
            JOIN categories c ON c.id = p.category_id
            WHERE p.deleted_at IS NULL
              AND ($1::TEXT IS NULL OR c.handle = $1)
            "#,
        )
        .bind(filter.category.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let ids: Vec<i64> = products.iter().map(|p| p.id).collect();
        let images = sqlx::query_as::<_, ProductImage>(
            r#"
            SELECT id, product_id, image_url
            FROM products_images
            WHERE deleted_at IS NULL AND product_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(ProductPage {
            products: ProductView::assemble(products, images),
            total,
            page: filter.page.page,
            page_size: filter.page.page_size,
        })
    }
}

#[async_trait]
impl ProductAdmin for Database {
    #[instrument(skip(self, product), fields(category = %product.category_handle))]
    async fn create_product(&self, product: NewProduct) -> Result<ProductView, OrderError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_product"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let category_id = category_id_by_handle(&mut *tx, &product.category_handle)
            .await?
            .ok_or_else(|| OrderError::not_found("category"))?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO products (name, description, price, category_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(category_id)
        .fetch_one(&mut *tx)
        .await?;

        insert_product_images(&mut *tx, id, &product.image_urls).await?;

        let created = select_product(&mut *tx, id)
            .await?
            .ok_or_else(|| OrderError::not_found("product"))?;
        let images = select_product_images(&mut *tx, id).await?;

        tx.commit().await?;
        timer.observe_duration();

        info!(product_id = id, "Product created");
        Ok(ProductView {
            product: created,
            images,
        })
    }

    #[instrument(skip(self, changes))]
    async fn update_product(
        &self,
        id: i64,
        changes: ProductChanges,
    ) -> Result<ProductView, OrderError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_product"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let locked: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM products
            WHERE id = $1 AND deleted_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Err(OrderError::not_found("product"));
        }

        let category_id = match changes.category_handle.as_deref() {
            Some(handle) => Some(
                category_id_by_handle(&mut *tx, handle)
                    .await?
                    .ok_or_else(|| OrderError::not_found("category"))?,
            ),
            None => None,
        };

        sqlx::query(
            r#"
            UPDATE products
            SET name = COALESCE($1, name),
                description = COALESCE($2, description),
                price = COALESCE($3, price),
                category_id = COALESCE($4, category_id),
                updated_at = NOW()
            WHERE id = $5
            "#,
        )
        .bind(changes.name.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.price)
        .bind(category_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if let Some(urls) = &changes.image_urls {
            soft_delete_product_images(&mut *tx, id).await?;
            insert_product_images(&mut *tx, id, urls).await?;
        }

        let updated = select_product(&mut *tx, id)
            .await?
            .ok_or_else(|| OrderError::not_found("product"))?;
        let images = select_product_images(&mut *tx, id).await?;

        tx.commit().await?;
        timer.observe_duration();

        Ok(ProductView {
            product: updated,
            images,
        })
    }

    #[instrument(skip(self))]
    async fn delete_product(&self, id: i64) -> Result<(), OrderError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_product"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            return Err(OrderError::not_found("product"));
        }
        Ok(())
    }
}

#[async_trait]
impl ClientStore for Database {
    #[instrument(skip(self, client))]
    async fn create_client(&self, client: NewClient) -> Result<Client, OrderError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_client"])
            .start_timer();

        let created = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (name, cpf)
            VALUES ($1, $2)
            RETURNING id, name, cpf, created_at, updated_at
            "#,
        )
        .bind(&client.name)
        .bind(&client.cpf)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_duplicate_cpf(&e) {
                OrderError::not_processable("client", "cpf already registered")
            } else {
                OrderError::Database(e)
            }
        })?;

        timer.observe_duration();
        info!(client_id = created.id, "Client registered");
        Ok(created)
    }

    #[instrument(skip(self, cpf))]
    async fn client_by_cpf(&self, cpf: &str) -> Result<Client, OrderError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["client_by_cpf"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(
            r#"
            SELECT id, name, cpf, created_at, updated_at
            FROM clients
            WHERE cpf = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(cpf)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();
        client.ok_or_else(|| OrderError::not_found("client"))
    }
}

#[async_trait]
impl TaxRuleSource for Database {
    #[instrument(skip(self))]
    async fn active_tax_rules(&self) -> Result<Vec<TaxRule>, OrderError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["active_tax_rules"])
            .start_timer();

        let rows = sqlx::query_as::<_, TaxRuleRow>(
            r#"
            SELECT id, name, description, amount_type, amount_value, applicable_to
            FROM payment_tax_settings
            WHERE deleted_at IS NULL
            ORDER BY name, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();

        rows.into_iter()
            .map(|row| TaxRule::try_from(row).map_err(OrderError::from))
            .collect()
    }
}

#[async_trait]
impl OrderStore for Database {
    #[instrument(skip(self, order), fields(client_id = order.client_id()))]
    async fn create_order(&self, order: PendingOrder) -> Result<Order, OrderError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_order"])
            .start_timer();

        // Dropping `tx` on any early return rolls the whole aggregate back.
        let mut tx = self.pool.begin().await?;

        let header = insert_order_header(&mut *tx, order.client_id(), order.status())
            .await
            .map_err(|e| {
                if is_client_fk_violation(&e) {
                    OrderError::not_found("client")
                } else {
                    OrderError::Database(e)
                }
            })?;

        let mut items = Vec::with_capacity(order.items().len());
        for item in order.items() {
            items.push(insert_order_item(&mut *tx, header.id, item).await?);
        }

        let payment = insert_payment(&mut *tx, header.id, order.payment()).await?;

        tx.commit().await?;
        timer.observe_duration();

        let created = Order::from_parts(header, items, Payment::try_from(payment)?)?;
        info!(order_id = created.id, "Order created");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn get_order(&self, id: i64) -> Result<Order, OrderError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_order"])
            .start_timer();

        let order = self
            .load_order(id)
            .await?
            .ok_or_else(|| OrderError::not_found("order"))?;

        timer.observe_duration();
        Ok(order)
    }

    #[instrument(skip(self))]
    async fn transition_status(
        &self,
        id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<(), OrderError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["transition_status"])
            .start_timer();

        let updated = compare_and_set_order_status(&self.pool, id, from, to).await?;
        timer.observe_duration();

        if updated == 1 {
            return Ok(());
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if exists {
            Err(OrderError::InvalidTransition(format!(
                "order status is not {}",
                from
            )))
        } else {
            Err(OrderError::not_found("order"))
        }
    }

    #[instrument(skip(self))]
    async fn list_orders(&self, page: PageRequest) -> Result<OrderPage, OrderError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_orders"])
            .start_timer();

        // Paginate on orders first so a page never splits an order's lines.
        let rows = sqlx::query_as::<_, OrderSummaryRow>(
            r#"
            WITH page AS (
                SELECT id, created_at
                FROM orders
                WHERE deleted_at IS NULL
                ORDER BY created_at, id
                LIMIT $1 OFFSET $2
            )
            SELECT o.id AS order_id,
                   o.client_id,
                   c.name AS client_name,
                   c.cpf AS client_cpf,
                   o.status,
                   oi.id AS item_id,
                   oi.product_id,
                   p.name AS product_name,
                   p.description AS product_description,
                   p.price AS product_price,
                   cat.handle AS category_handle,
                   oi.quantity,
                   oi.price AS item_price,
                   pay.id AS payment_id,
                   pay.status AS payment_status,
                   pay.method AS payment_method,
                   pay.amount AS payment_amount
            FROM page
            JOIN orders o ON o.id = page.id
            JOIN clients c ON c.id = o.client_id
            JOIN order_items oi ON oi.order_id = o.id AND oi.deleted_at IS NULL
            JOIN products p ON p.id = oi.product_id
            JOIN categories cat ON cat.id = p.category_id
            JOIN payments pay ON pay.order_id = o.id AND pay.deleted_at IS NULL
            ORDER BY page.created_at, page.id, oi.id
            "#,
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        timer.observe_duration();

        Ok(OrderPage {
            orders: OrderSummary::fold_rows(rows)?,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }

    #[instrument(skip(self))]
    async fn soft_delete_order(&self, id: i64) -> Result<(), OrderError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["soft_delete_order"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            "UPDATE orders SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if deleted.rows_affected() == 0 {
            return Err(OrderError::not_found("order"));
        }

        sqlx::query(
            "UPDATE order_items SET deleted_at = NOW() WHERE order_id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE payments SET deleted_at = NOW() WHERE order_id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.observe_duration();

        info!(order_id = id, "Order soft-deleted");
        Ok(())
    }
}

#[async_trait]
impl PaymentOutcomeStore for Database {
    #[instrument(skip(self), fields(method = %method, outcome = %outcome))]
    async fn apply_payment_outcome(
        &self,
        external_reference: &str,
        method: PaymentMethod,
        outcome: PaymentStatus,
    ) -> Result<OrderStatus, OrderError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["apply_payment_outcome"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let target = sqlx::query_as::<_, SettlementTarget>(
            r#"
            SELECT p.id AS payment_id, o.id AS order_id, o.status AS order_status
            FROM payments p
            JOIN orders o ON o.id = p.order_id
            WHERE p.external_reference = $1
              AND p.method = $2
              AND p.deleted_at IS NULL
              AND o.deleted_at IS NULL
            FOR UPDATE OF p, o
            "#,
        )
        .bind(external_reference)
        .bind(method.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| OrderError::not_found("payment"))?;

        let current: OrderStatus = target.order_status.parse()?;
        if !current.accepts_payment_outcome() {
            warn!(
                order_id = target.order_id,
                status = %current,
                "Payment outcome arrived for a settled order"
            );
            return Err(OrderError::InvalidTransition(format!(
                "order status is {} and cannot take a payment outcome",
                current
            )));
        }

        let next = OrderStatus::after_payment(outcome);

        update_payment_status(&mut *tx, target.payment_id, outcome).await?;
        update_order_status(&mut *tx, target.order_id, next).await?;

        tx.commit().await?;
        timer.observe_duration();

        info!(
            order_id = target.order_id,
            from = %current,
            to = %next,
            "Payment outcome applied"
        );
        Ok(next)
    }
}
