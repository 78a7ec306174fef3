//! Web framework integrations.
//!
//! # Available Integrations
//!
//! | Framework | Feature Flag | Module |
//! |-----------|--------------|--------|
//! | Axum | `axum-integration` | `axum` |
//!
//! The `server` feature (on by default) enables `axum-integration` and
//! builds the `media-resolver` binary on top of it.

#[cfg(feature = "axum-integration")]
pub mod axum;
