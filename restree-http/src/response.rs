//! Response types.

pub use axum::response::{IntoResponse, Response};
