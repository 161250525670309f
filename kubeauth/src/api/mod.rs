//! HTTP surface: the TokenReview webhook and the health check.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: TokenReview request/response documents

pub mod handlers;
pub mod models;
