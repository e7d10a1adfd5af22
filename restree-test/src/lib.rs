//! Test support for restree applications.

mod app;

pub use app::{TestApp, TestResponse};
