//! Common test utilities for order-service integration tests.

use order_service::config::{DatabaseConfig, OrderServiceConfig, PaymentConfig, RedisConfig};
use order_service::services::Database;
use order_service::startup::Application;
use rust_decimal::Decimal;
use secrecy::Secret;
use service_core::config::Config as CommonConfig;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Once;
use std::time::Duration;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,order_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn test_config() -> OrderServiceConfig {
    let database_url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set to run integration tests");
    let redis_url =
        std::env::var("TEST_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

    OrderServiceConfig {
        common: CommonConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
        },
        service_name: "order-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: Secret::new(database_url),
            max_connections: 4,
            min_connections: 1,
        },
        redis: RedisConfig {
            url: Secret::new(redis_url),
        },
        payment: PaymentConfig {
            lock_ttl: Duration::from_secs(5),
            qr_merchant_url: "https://pay.test/checkout".to_string(),
        },
    }
}

/// Test application wrapper.
#[allow(dead_code)]
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub db: Database,
    pub client: reqwest::Client,
}

/// Spawn the service on a random port against the test database and Redis.
pub async fn spawn_app() -> TestApp {
    init_tracing();

    // Migrations take an advisory lock, so concurrent test binaries are safe
    let app = Application::build(test_config())
        .await
        .expect("Failed to build application");

    let port = app.port();
    let db = app.db().clone();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let client = reqwest::Client::new();
    let health_url = format!("{}/health", address);
    for _ in 0..50 {
        if client.get(&health_url).send().await.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    TestApp {
        address,
        port,
        db,
        client,
    }
}

/// Rows created for a single test. Handles and CPFs are unique per call so
/// tests can share one database.
#[allow(dead_code)]
pub struct Fixture {
    pub client_id: i64,
    pub category_handle: String,
    pub burger_id: i64,
    pub fries_id: i64,
}

#[allow(dead_code)]
impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// A client, a category and two products priced 10.00 and 5.00.
    pub async fn seed(&self) -> Fixture {
        let pool = self.db.pool();
        let suffix = Uuid::new_v4().simple().to_string();
        let category_handle = format!("burgers-{}", suffix);

        let client_id: i64 =
            sqlx::query_scalar("INSERT INTO clients (name, cpf) VALUES ($1, $2) RETURNING id")
                .bind("Test Client")
                .bind(&suffix)
                .fetch_one(pool)
                .await
                .expect("Failed to insert client");

        let category_id: i64 = sqlx::query_scalar(
            "INSERT INTO categories (name, handle) VALUES ($1, $2) RETURNING id",
        )
        .bind("Burgers")
        .bind(&category_handle)
        .fetch_one(pool)
        .await
        .expect("Failed to insert category");

        let burger_id = self
            .insert_product(category_id, "Burger", Decimal::new(1000, 2))
            .await;
        let fries_id = self
            .insert_product(category_id, "Fries", Decimal::new(500, 2))
            .await;

        Fixture {
            client_id,
            category_handle,
            burger_id,
            fries_id,
        }
    }

    async fn insert_product(&self, category_id: i64, name: &str, price: Decimal) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO products (name, description, price, category_id) VALUES ($1, '', $2, $3) RETURNING id",
        )
        .bind(name)
        .bind(price)
        .bind(category_id)
        .fetch_one(self.db.pool())
        .await
        .expect("Failed to insert product")
    }

    pub async fn count_orders_for(&self, client_id: i64) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE client_id = $1")
            .bind(client_id)
            .fetch_one(self.db.pool())
            .await
            .expect("Failed to count orders")
    }

    pub async fn count_items_for(&self, client_id: i64) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM order_items oi JOIN orders o ON o.id = oi.order_id WHERE o.client_id = $1",
        )
        .bind(client_id)
        .fetch_one(self.db.pool())
        .await
        .expect("Failed to count order items")
    }

    /// Place an order through the API and return the response body.
    pub async fn checkout(&self, fixture: &Fixture, method: &str) -> serde_json::Value {
        let response = self
            .client
            .post(self.url("/api/v1/checkout"))
            .json(&serde_json::json!({
                "client_id": fixture.client_id,
                "items": [
                    {"product_id": fixture.burger_id, "quantity": 2},
                    {"product_id": fixture.fries_id, "quantity": 1}
                ],
                "payment": {"method": method}
            }))
            .send()
            .await
            .expect("Failed to execute request");

        assert_eq!(response.status().as_u16(), 201);
        response.json().await.expect("Failed to parse JSON")
    }

    pub async fn notify(
        &self,
        reference: &str,
        method: &str,
        status: &str,
    ) -> reqwest::Response {
        self.client
            .post(self.url("/api/v1/webhooks/notifications"))
            .json(&serde_json::json!({
                "external_reference": reference,
                "payment_method": method,
                "status": status
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get_order(&self, id: i64) -> serde_json::Value {
        self.client
            .get(self.url(&format!("/api/v1/orders/{}", id)))
            .send()
            .await
            .expect("Failed to execute request")
            .json()
            .await
            .expect("Failed to parse JSON")
    }
}

/// A CPF with valid check digits that no other test has used.
#[allow(dead_code)]
pub fn unique_cpf() -> String {
    let seed = Uuid::new_v4().as_u128() % 1_000_000_000;
    let mut digits: Vec<u32> = format!("{:09}", seed)
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect();

    for len in [9, 10] {
        let sum: u32 = digits
            .iter()
            .enumerate()
            .map(|(i, d)| d * (len as u32 + 1 - i as u32))
            .sum();
        digits.push((sum * 10) % 11 % 10);
    }

    digits.iter().map(|d| d.to_string()).collect()
}
