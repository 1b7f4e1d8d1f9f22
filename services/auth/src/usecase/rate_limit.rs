use std::sync::Arc;

use tollgate_domain::clock::Clock;

use crate::domain::repository::BucketStore;
use crate::domain::types::{Consumption, RateLimitAction};
use crate::error::AuthServiceError;

/// Per-identifier token-bucket gate in front of OTP and passkey flows.
pub struct RateLimiter<B: BucketStore> {
    pub store: B,
    pub clock: Arc<dyn Clock>,
}

impl<B: BucketStore> RateLimiter<B> {
    /// Take one token or fail with [`AuthServiceError::RateLimited`].
    ///
    /// Store failures propagate: the gate fails closed.
    pub async fn check_and_consume(
        &self,
        action: RateLimitAction,
        identifier: &str,
    ) -> Result<(), AuthServiceError> {
        let key = action.bucket_key(identifier);
        let now_ms = self.clock.now().timestamp_millis();
        match self.store.try_consume(&key, &action.policy(), now_ms).await? {
            Consumption::Allowed { .. } => Ok(()),
            Consumption::Denied { retry_after_ms } => {
                let retry_after_secs = retry_after_ms.div_ceil(1000).max(1);
                tracing::info!(?action, retry_after_secs, "rate limit exceeded");
                Err(AuthServiceError::RateLimited { retry_after_secs })
            }
        }
    }

    /// Refill the bucket. Failures are logged and swallowed; the caller has already
    /// succeeded.
    pub async fn reset(&self, action: RateLimitAction, identifier: &str) {
        let key = action.bucket_key(identifier);
        let now_ms = self.clock.now().timestamp_millis();
        if let Err(e) = self.store.reset(&key, &action.policy(), now_ms).await {
            tracing::warn!(?action, error = %e, "failed to reset rate limit bucket");
        }
    }
}
