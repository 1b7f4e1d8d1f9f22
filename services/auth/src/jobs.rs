use std::time::Duration;

use tokio::task::JoinHandle;

use crate::state::AppState;
use crate::usecase::cleanup::CleanupUseCase;

/// Periodically deletes expired refresh tokens and spent OTPs.
///
/// The first sweep runs one period after start. A failed sweep is logged and retried on
/// the next tick. Abort the handle to stop it.
pub fn spawn_sweeper(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            interval.tick().await;
            let usecase = CleanupUseCase {
                otps: state.otp_store(),
                issuer: state.token_issuer(),
            };
            if let Err(e) = usecase.execute().await {
                tracing::warn!(error = %e, "scheduled cleanup failed");
            }
        }
    })
}
