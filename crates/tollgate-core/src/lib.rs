//! Service plumbing shared by Tollgate binaries: config loading, tracing, request ids,
//! health endpoints.

pub mod config;
pub mod health;
pub mod middleware;
pub mod serde;
pub mod tracing;
