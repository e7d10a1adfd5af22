//! HTTP vocabulary, re-exported from `restree-http`.

pub use restree_http::*;
