pub mod audit;
pub mod cleanup;
pub mod identity;
pub mod otp;
pub mod passkey;
pub mod rate_limit;
pub mod token;
pub mod user;
