//! # attache-http
//!
//! Thin axum glue over `attache-files`: error mapping, streaming response
//! conversion, Accept-header parsing, and the file handlers/router.
//!
//! Authentication, multi-tenant disk provisioning, and arbitrary query
//! mechanics are the host application's concern.

pub mod error;
pub mod handlers;
pub mod respond;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use handlers::AppState;
pub use respond::{parse_accept, Negotiated};
pub use routes::router;
