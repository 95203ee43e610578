//! Settles payment webhooks against their orders.

use crate::models::{OrderStatus, PaymentMethod, PaymentStatus};
use crate::services::error::OrderError;
use crate::services::metrics::{record_lock_contention, record_reconciliation};
use crate::services::redis::{LockGuard, LockStore};
use crate::services::store::PaymentOutcomeStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub fn payment_lock_key(external_reference: &str) -> String {
    format!("lock:payment:{}", external_reference)
}

#[derive(Clone)]
pub struct ReconciliationService {
    locks: Arc<dyn LockStore>,
    payments: Arc<dyn PaymentOutcomeStore>,
    lock_ttl: Duration,
}

impl ReconciliationService {
    pub fn new(
        locks: Arc<dyn LockStore>,
        payments: Arc<dyn PaymentOutcomeStore>,
        lock_ttl: Duration,
    ) -> Self {
        Self {
            locks,
            payments,
            lock_ttl,
        }
    }

    /// Apply a provider's payment outcome. At most one delivery per
    /// reference is processed at a time; a concurrent delivery is rejected
    /// rather than queued.
    #[instrument(skip(self), fields(method = %method, outcome = %outcome))]
    pub async fn reconcile(
        &self,
        external_reference: &str,
        method: PaymentMethod,
        outcome: PaymentStatus,
    ) -> Result<OrderStatus, OrderError> {
        let key = payment_lock_key(external_reference);

        let guard = LockGuard::acquire(self.locks.clone(), key, self.lock_ttl)
            .await
            .map_err(OrderError::LockService)?
            .ok_or_else(|| {
                record_lock_contention("payment");
                OrderError::ConcurrentProcessing(external_reference.to_string())
            })?;

        let result = self
            .payments
            .apply_payment_outcome(external_reference, method, outcome)
            .await;

        if let Err(e) = guard.release().await {
            warn!(error = %e, "Failed to release payment lock; it will expire by TTL");
        }

        match &result {
            Ok(status) => {
                record_reconciliation(status.as_str());
                info!(order_status = %status, "Payment reconciled");
            }
            Err(e) => record_reconciliation(e.kind()),
        }

        result
    }
}
