//! Application startup and lifecycle management.

use crate::config::OrderServiceConfig;
use crate::handlers::{checkout, clients, orders, products, webhooks};
use crate::services::{
    get_metrics, init_metrics, CheckoutService, ClientStore, Database, GatewayRegistry,
    LockStore, OrderStatusService, OrderStore, ProductAdmin, ProductCatalog,
    ReconciliationService, RedisService,
};
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct AppState {
    pub checkout: CheckoutService,
    pub reconciliation: ReconciliationService,
    pub order_status: OrderStatusService,
    pub orders: Arc<dyn OrderStore>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub product_admin: Arc<dyn ProductAdmin>,
    pub clients: Arc<dyn ClientStore>,
}

/// State for health check endpoints.
#[derive(Clone)]
struct HealthState {
    db: Arc<Database>,
    locks: Arc<dyn LockStore>,
}

/// Routes of the public and admin API.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/products", get(products::list_products))
        .route("/api/v1/clients", post(clients::create_client))
        .route("/api/v1/clients/:cpf", get(clients::get_client_by_cpf))
        .route("/api/v1/checkout", post(checkout::create_order))
        .route("/api/v1/orders/:id", get(orders::get_order))
        .route(
            "/api/v1/webhooks/notifications",
            post(webhooks::payment_notification),
        )
        .route("/api/v1/admin/products", post(products::create_product))
        .route(
            "/api/v1/admin/products/:id",
            put(products::update_product).delete(products::delete_product),
        )
        .route("/api/v1/admin/orders", get(orders::list_orders))
        .route("/api/v1/admin/orders/:id", delete(orders::delete_order))
        .route("/api/v1/admin/orders/:id/ready", patch(orders::mark_ready))
        .route(
            "/api/v1/admin/orders/:id/delivered",
            patch(orders::mark_delivered),
        )
        .with_state(state)
}

/// Health check endpoint for liveness checks.
async fn health_check(State(state): State<HealthState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => {
            tracing::debug!("Health check passed");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "service": "order-service",
                    "version": env!("CARGO_PKG_VERSION")
                })),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "order-service",
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Readiness requires both PostgreSQL and the Redis lock store.
async fn readiness_check(State(state): State<HealthState>) -> impl IntoResponse {
    if let Err(e) = state.db.health_check().await {
        tracing::warn!(error = %e, "Readiness check failed - database unavailable");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    if let Err(e) = state.locks.health_check().await {
        tracing::warn!(error = %e, "Readiness check failed - redis unavailable");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    tracing::debug!("Readiness check passed");
    StatusCode::OK
}

/// Metrics endpoint for Prometheus scraping.
async fn metrics_handler() -> impl IntoResponse {
    let metrics = get_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        metrics,
    )
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    db: Arc<Database>,
    locks: Arc<dyn LockStore>,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: OrderServiceConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the test harness.
    pub async fn build_without_migrations(config: OrderServiceConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(
        config: OrderServiceConfig,
        run_migrations: bool,
    ) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        if run_migrations {
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        let db = Arc::new(db);

        let redis = RedisService::new(&config.redis.url).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to Redis");
            AppError::from(e)
        })?;
        let locks: Arc<dyn LockStore> = Arc::new(redis);

        let state = AppState {
            checkout: CheckoutService::new(
                db.clone(),
                db.clone(),
                GatewayRegistry::standard(&config.payment.qr_merchant_url),
                db.clone(),
            ),
            reconciliation: ReconciliationService::new(
                locks.clone(),
                db.clone(),
                config.payment.lock_ttl,
            ),
            order_status: OrderStatusService::new(db.clone()),
            orders: db.clone(),
            catalog: db.clone(),
            product_admin: db.clone(),
            clients: db.clone(),
        };

        let addr = config.common.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Order service listener bound");

        Ok(Self {
            port,
            listener,
            db,
            locks,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let health_state = HealthState {
            db: self.db.clone(),
            locks: self.locks.clone(),
        };

        let health_router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .route("/metrics", get(metrics_handler))
            .with_state(health_state);

        let router = api_router(self.state)
            .merge(health_router)
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(metrics_middleware))
            .layer(middleware::from_fn(request_id_middleware));

        tracing::info!(
            service = "order-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
