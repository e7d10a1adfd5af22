//! restree prelude — import everything you need with a single `use`.
//!
//! ```ignore
//! use restree_core::prelude::*;
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
//! ```

pub use crate::context::RequestCx;
pub use crate::error::{BuildError, Fault};
pub use crate::id::Id;
pub use crate::method::Verb;
pub use crate::outputs::{IntoOutputs, Output};
pub use crate::params::{Cap, Errs, FirstErr, HandlerParam, Req, Res, Resp};
pub use crate::resource::{Resource, Schema};
pub use crate::router::{RouteInfo, Router};
pub use crate::types::{shared, type_label, Shared};

// ── HTTP re-exports ─────────────────────────────────────────────────────────

pub use crate::http::{Body, HeaderMap, Json, Request, Response, StatusCode};
