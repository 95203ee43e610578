//! Error kinds raised by the order workflows.

use crate::models::UnknownVariant;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{entity} could not be processed: {reason}")]
    EntityNotProcessable {
        entity: &'static str,
        reason: String,
    },

    #[error("unsupported payment method: {0}")]
    UnsupportedPaymentMethod(String),

    #[error("payment processing is already in progress for {0}")]
    ConcurrentProcessing(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored record is invalid: {0}")]
    CorruptRecord(#[from] UnknownVariant),

    #[error("lock service error: {0}")]
    LockService(anyhow::Error),
}

impl OrderError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn not_processable(entity: &'static str, reason: impl ToString) -> Self {
        Self::EntityNotProcessable {
            entity,
            reason: reason.to_string(),
        }
    }

    /// Short label for the error metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::EntityNotProcessable { .. } => "not_processable",
            Self::UnsupportedPaymentMethod(_) => "unsupported_payment_method",
            Self::ConcurrentProcessing(_) => "concurrent_processing",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Database(_) => "database",
            Self::CorruptRecord(_) => "corrupt_record",
            Self::LockService(_) => "lock_service",
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        let message = err.to_string();
        match err {
            OrderError::NotFound { .. } => AppError::NotFound(anyhow::anyhow!(message)),
            OrderError::EntityNotProcessable { .. }
            | OrderError::UnsupportedPaymentMethod(_)
            | OrderError::InvalidTransition(_) => AppError::BadRequest(anyhow::anyhow!(message)),
            OrderError::ConcurrentProcessing(_) => AppError::Conflict(anyhow::anyhow!(message)),
            OrderError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            OrderError::CorruptRecord(e) => AppError::InternalError(anyhow::Error::new(e)),
            OrderError::LockService(e) => AppError::InternalError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_business_errors_map_to_client_status() {
        let cases = [
            (OrderError::not_found("order"), StatusCode::NOT_FOUND),
            (
                OrderError::not_processable("order", "product 9 not found"),
                StatusCode::BAD_REQUEST,
            ),
            (
                OrderError::UnsupportedPaymentMethod("billet".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                OrderError::InvalidTransition("order status is not ready".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                OrderError::ConcurrentProcessing("ref-1".to_string()),
                StatusCode::CONFLICT,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status_code(), expected);
        }
    }

    #[test]
    fn test_faults_map_to_internal_error() {
        let db = AppError::from(OrderError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(db.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let lock = AppError::from(OrderError::LockService(anyhow::anyhow!("redis down")));
        assert_eq!(lock.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_messages_name_the_entity() {
        assert_eq!(OrderError::not_found("client").to_string(), "client not found");
        assert_eq!(
            OrderError::ConcurrentProcessing("abc".to_string()).to_string(),
            "payment processing is already in progress for abc"
        );
    }
}
