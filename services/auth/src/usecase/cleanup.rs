use crate::domain::repository::{OtpRepository, RefreshTokenRepository};
use crate::error::AuthServiceError;
use crate::usecase::otp::OtpStore;
use crate::usecase::token::TokenIssuer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanupReport {
    pub deleted_tokens: u64,
    pub deleted_otps: u64,
}

/// Deletes expired refresh tokens and spent or expired OTPs.
pub struct CleanupUseCase<O: OtpRepository, R: RefreshTokenRepository> {
    pub otps: OtpStore<O>,
    pub issuer: TokenIssuer<R>,
}

impl<O: OtpRepository, R: RefreshTokenRepository> CleanupUseCase<O, R> {
    pub async fn execute(&self) -> Result<CleanupReport, AuthServiceError> {
        let deleted_tokens = self.issuer.sweep().await?;
        let deleted_otps = self.otps.sweep().await?;
        tracing::info!(deleted_tokens, deleted_otps, "cleanup finished");
        Ok(CleanupReport {
            deleted_tokens,
            deleted_otps,
        })
    }
}
