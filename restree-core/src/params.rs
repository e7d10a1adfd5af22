//! Operation parameters.
//!
//! Every parameter of a routed operation or constructor is a type
//! implementing [`HandlerParam`]. A parameter contributes two things: a
//! plan-time [`ParamSpec`] telling the planner what the operation needs,
//! and a request-time extraction pulling the value out of the
//! [`RequestCx`](crate::context::RequestCx).
//!
//! Context parameters ([`Req`], [`Resp`], [`Id`], [`FirstErr`], [`Errs`])
//! are supplied by the framework directly and never resolved against the
//! resource tree. [`Res`] and [`Cap`] are dependencies: the planner locates
//! them in the tree at build time and the context instantiates them on
//! first use.

use std::any::TypeId;
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError};

use restree_http::{HeaderMap, HeaderName, HeaderValue, Method, Parts, StatusCode, Uri};

use crate::context::RequestCx;
use crate::dependency::DepSeed;
use crate::error::Fault;
use crate::id::Id;
use crate::resource::{seed_for, Resource};
use crate::types::{key_of, read_lock, type_label, write_lock, Shared};

// ── Plan-time parameter description ─────────────────────────────────────────

/// What the planner knows about one parameter.
#[derive(Clone)]
pub enum ParamSpec {
    /// Supplied by the request context; skipped by the planner.
    Context(ContextKind),
    /// A resource dependency, resolved against the tree.
    Resource(ResourceSpec),
    /// A capability dependency, resolved to whichever resource in scope
    /// declares it.
    Capability(CapabilitySpec),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextKind {
    Request,
    Response,
    Identifier,
    FirstFault,
    FaultList,
}

#[derive(Clone)]
pub struct ResourceSpec {
    pub(crate) key: TypeId,
    pub(crate) label: String,
    /// Produces a zero-valued dependency when nothing in the tree matches.
    pub(crate) fabricate: fn() -> DepSeed,
}

#[derive(Clone)]
pub struct CapabilitySpec {
    pub(crate) key: TypeId,
    pub(crate) label: String,
}

/// A value the framework can hand to an operation.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be used as an operation parameter",
    label = "not an extractable parameter",
    note = "operation parameters are `Res<T>`, `Cap<C>`, `Id`, `Req`, `Resp`, `FirstErr`, or `Errs`"
)]
pub trait HandlerParam: Sized + 'static {
    /// Plan-time description, used to build the dependency plan.
    fn spec() -> ParamSpec;

    /// Request-time extraction. `requester` is the type on whose behalf the
    /// parameter is being resolved (the operation's owner, or the resource
    /// under construction), which identifier lookup keys on.
    fn extract(cx: &mut RequestCx, requester: TypeId) -> Self;
}

// ── Res: a resource dependency ──────────────────────────────────────────────

/// The per-request instance of a resource.
///
/// Handing out `Res<T>` instead of `T` keeps the instance addressable: a
/// constructor can replace the value, and every other operation in the same
/// request observes the replacement. Snapshot with [`get`](Res::get),
/// mutate in place with [`with_mut`](Res::with_mut).
pub struct Res<T> {
    inner: Shared<T>,
}

impl<T> Clone for Res<T> {
    fn clone(&self) -> Self {
        Res {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Resource> Res<T> {
    pub(crate) fn from_shared(inner: Shared<T>) -> Self {
        Res { inner }
    }

    /// Clone the current value out of the shared slot.
    pub fn get(&self) -> T {
        read_lock(&self.inner).clone()
    }

    /// Replace the current value.
    pub fn set(&self, value: T) {
        *write_lock(&self.inner) = value;
    }

    /// Run a closure against a borrow of the current value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&read_lock(&self.inner))
    }

    /// Run a closure against a mutable borrow of the current value.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut write_lock(&self.inner))
    }

    /// The underlying shared handle.
    pub fn shared(&self) -> Shared<T> {
        self.inner.clone()
    }
}

impl<T: Resource> HandlerParam for Res<T> {
    fn spec() -> ParamSpec {
        ParamSpec::Resource(ResourceSpec {
            key: key_of::<T>(),
            label: type_label::<T>(),
            fabricate: seed_for::<T>,
        })
    }

    fn extract(cx: &mut RequestCx, _requester: TypeId) -> Self {
        Res::from_shared(cx.resource::<T>())
    }
}

// ── Cap: a capability dependency ────────────────────────────────────────────

/// A capability value provided by some resource in scope.
///
/// The providing resource is chosen at build time by walking the tree
/// upward from the operation's resource; see
/// [`Schema::implements`](crate::Schema::implements).
pub struct Cap<C>(pub C);

impl<C> Deref for Cap<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.0
    }
}

impl<C: Clone + Send + Sync + 'static> HandlerParam for Cap<C> {
    fn spec() -> ParamSpec {
        ParamSpec::Capability(CapabilitySpec {
            key: key_of::<C>(),
            label: type_label::<C>(),
        })
    }

    fn extract(cx: &mut RequestCx, _requester: TypeId) -> Self {
        Cap(cx.capability::<C>())
    }
}

// ── Context parameters ──────────────────────────────────────────────────────

impl HandlerParam for Id {
    fn spec() -> ParamSpec {
        ParamSpec::Context(ContextKind::Identifier)
    }

    fn extract(cx: &mut RequestCx, requester: TypeId) -> Self {
        cx.identifier(requester)
    }
}

/// Read-only view of the incoming request.
#[derive(Clone)]
pub struct Req {
    parts: Arc<Parts>,
}

impl Req {
    pub(crate) fn new(parts: Arc<Parts>) -> Self {
        Req { parts }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }
}

impl HandlerParam for Req {
    fn spec() -> ParamSpec {
        ParamSpec::Context(ContextKind::Request)
    }

    fn extract(cx: &mut RequestCx, _requester: TypeId) -> Self {
        Req::new(cx.request())
    }
}

/// Handle for shaping the outgoing response.
///
/// The framework renders the operation's return values as the body; this
/// handle overrides the status code and adds headers.
#[derive(Clone, Default)]
pub struct Resp {
    state: Arc<Mutex<RespState>>,
}

#[derive(Clone, Default, Debug)]
pub(crate) struct RespState {
    pub(crate) status: Option<StatusCode>,
    pub(crate) headers: HeaderMap,
}

impl Resp {
    pub fn set_status(&self, status: StatusCode) {
        self.lock().status = Some(status);
    }

    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        self.lock().headers.insert(name, value);
    }

    pub(crate) fn snapshot(&self) -> RespState {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RespState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HandlerParam for Resp {
    fn spec() -> ParamSpec {
        ParamSpec::Context(ContextKind::Response)
    }

    fn extract(cx: &mut RequestCx, _requester: TypeId) -> Self {
        cx.response()
    }
}

/// The first fault recorded by any constructor so far, if any.
///
/// An operation whose dependencies can fail declares this parameter (or
/// [`Errs`]) to observe the failure; operations that declare neither still
/// run.
#[derive(Clone, Debug)]
pub struct FirstErr(pub Option<Fault>);

impl FirstErr {
    pub fn is_some(&self) -> bool {
        self.0.is_some()
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.0.as_ref()
    }
}

impl HandlerParam for FirstErr {
    fn spec() -> ParamSpec {
        ParamSpec::Context(ContextKind::FirstFault)
    }

    fn extract(cx: &mut RequestCx, _requester: TypeId) -> Self {
        FirstErr(cx.first_fault())
    }
}

/// A snapshot of every fault recorded so far, in order.
#[derive(Clone, Debug, Default)]
pub struct Errs(pub Vec<Fault>);

impl Errs {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Fault> {
        self.0.iter()
    }
}

impl HandlerParam for Errs {
    fn spec() -> ParamSpec {
        ParamSpec::Context(ContextKind::FaultList)
    }

    fn extract(cx: &mut RequestCx, _requester: TypeId) -> Self {
        Errs(cx.fault_list())
    }
}
