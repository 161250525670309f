//! HTTP request handlers.
//!
//! - [`token_review`]: the authentication webhook, served on the webhook port at `/`
//! - [`health`]: liveness endpoint, served on the health check port at `/healthcheck`

pub mod health;
pub mod token_review;
