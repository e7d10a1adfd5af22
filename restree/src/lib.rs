//! restree — a resource-tree REST framework.
//!
//! Declare your API as a hierarchy of plain values, and restree turns it
//! into an HTTP dispatcher: field names become URL segments, operation
//! names carry their HTTP verbs (`"GET"`, `"GETMessage"`), and every
//! operation's parameters are injected per request — resources from the
//! tree, identifiers from the URL, faults from failed constructors.
//!
//! ```ignore
//! use restree::prelude::*;
//!
//! #[derive(Clone, Default, serde::Serialize)]
//! struct Api {
//!     gophers: Gophers,
//! }
//!
//! impl Resource for Api {
//!     fn schema(s: &mut Schema<Self>) {
//!         s.child("gophers", |a| &a.gophers);
//!     }
//! }
//!
//! # async fn run(api: Api) -> std::io::Result<()> {
//! Router::new(api)?.serve("0.0.0.0:3000").await
//! # }
//! ```

pub extern crate restree_http;

// Re-export everything from restree-core at the top level.
pub use restree_core::*;

/// Install a formatted `tracing` subscriber honoring `RUST_LOG`, falling
/// back to `info` level.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".parse().expect("static filter parses")),
        )
        .init();
}
