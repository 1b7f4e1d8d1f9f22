//! sea-orm entities for the auth service database.

pub mod audit_logs;
pub mod otp_codes;
pub mod refresh_tokens;
pub mod users;
