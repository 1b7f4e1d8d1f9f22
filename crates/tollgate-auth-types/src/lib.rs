//! Auth types shared across Tollgate services.
//!
//! Provides JWT claim shapes, token validation, and the `AuthenticatedUser` extractor.

pub mod identity;
pub mod token;
