use super::{json_body, reject};
use crate::dtos::{MessageResponse, WebhookNotification};
use crate::startup::AppState;
use axum::extract::rejection::JsonRejection;
use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;
use validator::Validate;

/// Payment provider callback. Settles the payment and moves the order.
pub async fn payment_notification(
    State(state): State<AppState>,
    payload: Result<Json<WebhookNotification>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let notification = json_body(payload)?;
    notification.validate()?;

    let (method, outcome) = notification.parts().map_err(reject)?;
    state
        .reconciliation
        .reconcile(&notification.external_reference, method, outcome)
        .await
        .map_err(reject)?;

    Ok(Json(MessageResponse::new("Payment processed successfully")))
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::{app, send};
    use crate::models::{OrderStatus, PaymentMethod, PaymentStatus};
    use crate::services::fakes::FakeStore;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_approved_webhook_starts_preparation() {
        let store = Arc::new(FakeStore::new());
        let order = store.seed_order(PaymentMethod::QrCode, OrderStatus::Pending);

        let (status, body) = send(
            app(store.clone()),
            "POST",
            "/api/v1/webhooks/notifications",
            Some(json!({
                "external_reference": order.reference,
                "payment_method": "qr_code",
                "status": "approved"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Payment processed successfully");
        assert_eq!(store.order_status(order.id), OrderStatus::Preparing);
        assert_eq!(store.payment_status(order.id), PaymentStatus::Approved);
    }

    #[tokio::test]
    async fn test_unknown_reference_is_not_found_without_mutation() {
        let store = Arc::new(FakeStore::new());
        let order = store.seed_order(PaymentMethod::QrCode, OrderStatus::Pending);

        let (status, _) = send(
            app(store.clone()),
            "POST",
            "/api/v1/webhooks/notifications",
            Some(json!({
                "external_reference": "does-not-exist",
                "payment_method": "qr_code",
                "status": "approved"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(store.order_status(order.id), OrderStatus::Pending);
        assert_eq!(store.payment_status(order.id), PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_pending_status_is_rejected() {
        let store = Arc::new(FakeStore::new());
        let order = store.seed_order(PaymentMethod::QrCode, OrderStatus::Pending);

        let (status, _) = send(
            app(store.clone()),
            "POST",
            "/api/v1/webhooks/notifications",
            Some(json!({
                "external_reference": order.reference,
                "payment_method": "qr_code",
                "status": "pending"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(store.order_status(order.id), OrderStatus::Pending);
    }
}
