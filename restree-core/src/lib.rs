//! Core runtime for the restree web framework.
//!
//! restree maps a hierarchy of *resources* — plain Rust values whose
//! [`Resource`] impls declare children, operations, and constructors — onto
//! an HTTP dispatcher. At build time the framework assembles the resource
//! tree, resolves every operation's dependency plan, and rejects anything
//! structurally unsound (name clashes, type cycles, circular constructors).
//! At request time it walks the URL, instantiates the declared dependencies
//! at most once each, invokes the operation, and renders its return values
//! as JSON.

pub mod context;
pub mod error;
pub mod http;
pub mod id;
pub mod method;
pub mod outputs;
pub mod params;
pub mod prelude;
pub mod resource;
pub mod router;
pub mod types;

mod dependency;
mod route;

pub use context::RequestCx;
pub use error::{BuildError, Fault};
pub use id::Id;
pub use method::{CtorOutput, MethodSpec, Operation, Verb};
pub use outputs::{IntoOutputs, OutPart, Output};
pub use params::{Cap, ContextKind, Errs, FirstErr, HandlerParam, ParamSpec, Req, Res, Resp};
pub use resource::{Resource, Schema};
pub use router::{RouteInfo, Router};
pub use types::{shared, type_label, Shared};
