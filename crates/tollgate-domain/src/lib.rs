//! Domain types shared across Tollgate crates.
//!
//! This crate contains only pure types with no framework dependencies.
//! Import in `usecase/` and `domain/` layers; never in `infra/` or `handlers/`.

pub mod clock;
pub mod contact;
pub mod id;
pub mod user;
