//! HTTP vocabulary for the restree workspace.
//!
//! Every other crate in the workspace speaks HTTP through this one; it is
//! the only crate that depends on `axum` directly. Swapping the underlying
//! HTTP stack means touching this crate alone.

pub mod body;
pub mod header;
pub mod response;

pub use axum::{serve, Json, Router as AxumRouter};
pub use axum::http::Uri;
pub use bytes::Bytes;
pub use http::request::Parts;
pub use http::Request;

pub use self::body::Body;
pub use self::header::{
    HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
    // Common header constants
    ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, HOST, LOCATION, USER_AGENT,
};
pub use self::response::{IntoResponse, Response};
