//! rusty-forum/crates/api-adapters/src/lib.rs
//!
//! Transport layer. The JSON envelope is always available; the axum server
//! lives behind the `web-axum` feature.

pub mod envelope;
#[cfg(feature = "web-axum")]
pub mod web;

pub use envelope::{CommentsPayload, Failure, Success};
#[cfg(feature = "web-axum")]
pub use web::{build_router, AppState, Metrics, RouterConfig};
