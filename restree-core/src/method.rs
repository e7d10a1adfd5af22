//! Operation descriptors.
//!
//! A routed operation is registered under a name carrying its own HTTP
//! binding: the name starts with a verb, and whatever follows (lowercased)
//! is the action segment — `"GET"` is the primary read, `"GETMessage"`
//! serves `GET …/message`. [`MethodSpec`] captures the parsed descriptor
//! together with a type-erased invoker.
//!
//! Constructors go through the same [`Operation`] plumbing but apply their
//! result to the dependency slot instead of producing a response.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use restree_http::Method;

use crate::context::RequestCx;
use crate::error::{BuildError, Fault};
use crate::outputs::{IntoOutputs, OutPart};
use crate::params::{HandlerParam, ParamSpec};
use crate::resource::Resource;
use crate::types::{downcast_shared, type_label, write_lock, AnyShared, Shared};

// ── Verbs ───────────────────────────────────────────────────────────────────

/// The HTTP verbs an operation name may start with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verb {
    Get,
    Put,
    Post,
    Delete,
    Head,
}

impl Verb {
    const ALL: [Verb; 5] = [Verb::Get, Verb::Put, Verb::Post, Verb::Delete, Verb::Head];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Put => "PUT",
            Verb::Post => "POST",
            Verb::Delete => "DELETE",
            Verb::Head => "HEAD",
        }
    }

    /// Split an operation name into its verb prefix and lowercased action.
    pub(crate) fn split(name: &str) -> Option<(Verb, String)> {
        Verb::ALL.iter().find_map(|verb| {
            name.strip_prefix(verb.as_str())
                .map(|action| (*verb, action.to_ascii_lowercase()))
        })
    }

    pub(crate) fn from_method(method: &Method) -> Option<Verb> {
        match method.as_str() {
            "GET" => Some(Verb::Get),
            "PUT" => Some(Verb::Put),
            "POST" => Some(Verb::Post),
            "DELETE" => Some(Verb::Delete),
            "HEAD" => Some(Verb::Head),
            _ => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Operations ──────────────────────────────────────────────────────────────

/// A function usable as a routed operation or constructor.
///
/// Implemented for plain functions of up to six [`HandlerParam`] arguments.
/// The phantom `P` parameter pins down the argument tuple so that inference
/// can pick the right impl.
pub trait Operation<P, O>: Send + Sync + 'static {
    fn param_specs() -> Vec<ParamSpec>;

    fn call(&self, cx: &mut RequestCx, requester: TypeId) -> O;
}

macro_rules! impl_operation {
    ( $( $P:ident ),* ) => {
        impl<Func, O, $( $P, )*> Operation<( $( $P, )* ), O> for Func
        where
            Func: Fn( $( $P ),* ) -> O + Send + Sync + 'static,
            $( $P: HandlerParam, )*
        {
            fn param_specs() -> Vec<ParamSpec> {
                vec![ $( $P::spec() ),* ]
            }

            #[allow(non_snake_case, unused_variables)]
            fn call(&self, cx: &mut RequestCx, requester: TypeId) -> O {
                $( let $P = $P::extract(cx, requester); )*
                (self)( $( $P ),* )
            }
        }
    };
}

impl_operation!();
impl_operation!(P1);
impl_operation!(P1, P2);
impl_operation!(P1, P2, P3);
impl_operation!(P1, P2, P3, P4);
impl_operation!(P1, P2, P3, P4, P5);
impl_operation!(P1, P2, P3, P4, P5, P6);

// ── Routed method descriptor ────────────────────────────────────────────────

pub(crate) type OpInvoke = dyn Fn(&mut RequestCx) -> serde_json::Result<Vec<OutPart>> + Send + Sync;

/// One routable operation: owner, verb, action, parameter specs, and the
/// erased invoker that extracts parameters and renders outputs.
#[derive(Clone)]
pub struct MethodSpec {
    pub(crate) name: String,
    pub(crate) verb: Verb,
    pub(crate) action: String,
    pub(crate) owner: TypeId,
    pub(crate) owner_label: String,
    pub(crate) params: Vec<ParamSpec>,
    pub(crate) invoke: Arc<OpInvoke>,
}

impl MethodSpec {
    pub(crate) fn new<T, F, P, O>(name: &str, f: F) -> Result<Self, BuildError>
    where
        T: Resource,
        F: Operation<P, O>,
        O: IntoOutputs,
        P: 'static,
        O: 'static,
    {
        let (verb, action) = Verb::split(name).ok_or_else(|| BuildError::InvalidOperationName {
            resource: type_label::<T>(),
            name: name.to_string(),
        })?;
        let owner = TypeId::of::<T>();
        Ok(MethodSpec {
            name: name.to_string(),
            verb,
            action,
            owner,
            owner_label: type_label::<T>(),
            params: F::param_specs(),
            invoke: Arc::new(move |cx| f.call(cx, owner).into_outputs()),
        })
    }

    /// The registered operation name, e.g. `"GETMessage"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// The action segment; empty for primary operations.
    pub fn action(&self) -> &str {
        &self.action
    }
}

impl fmt::Debug for MethodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSpec")
            .field("name", &self.name)
            .field("owner", &self.owner_label)
            .field("verb", &self.verb)
            .field("action", &self.action)
            .field("params", &self.params.len())
            .finish()
    }
}

// ── Constructors ────────────────────────────────────────────────────────────

pub(crate) type CtorInvoke = dyn Fn(&mut RequestCx, &AnyShared) + Send + Sync;

/// The constructor attached to a resource type: parameter specs plus an
/// erased invoker that applies the result to the freshly allocated slot.
#[derive(Clone)]
pub(crate) struct ConstructorSpec {
    pub(crate) owner_label: String,
    pub(crate) params: Vec<ParamSpec>,
    pub(crate) invoke: Arc<CtorInvoke>,
}

impl ConstructorSpec {
    pub(crate) fn new<T, F, P, O>(f: F) -> Self
    where
        T: Resource,
        F: Operation<P, O>,
        O: CtorOutput<T>,
        P: 'static,
    {
        let owner = TypeId::of::<T>();
        ConstructorSpec {
            owner_label: type_label::<T>(),
            params: F::param_specs(),
            invoke: Arc::new(move |cx, slot| {
                let slot: Shared<T> = downcast_shared::<T>(slot);
                f.call(cx, owner).apply(&slot, cx);
            }),
        }
    }
}

impl fmt::Debug for ConstructorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorSpec")
            .field("owner", &self.owner_label)
            .field("params", &self.params.len())
            .finish()
    }
}

/// Accepted constructor return shapes.
///
/// A constructor may produce the resource value, a fault, or both. Faults
/// are recorded on the context and never replace the slot's value; a
/// produced value always does.
pub trait CtorOutput<T: Resource>: 'static {
    fn apply(self, slot: &Shared<T>, cx: &mut RequestCx);
}

impl<T: Resource> CtorOutput<T> for T {
    fn apply(self, slot: &Shared<T>, _cx: &mut RequestCx) {
        *write_lock(slot) = self;
    }
}

impl<T: Resource> CtorOutput<T> for Result<T, Fault> {
    fn apply(self, slot: &Shared<T>, cx: &mut RequestCx) {
        match self {
            Ok(value) => *write_lock(slot) = value,
            Err(fault) => cx.push_fault(fault),
        }
    }
}

impl<T: Resource> CtorOutput<T> for (T, Option<Fault>) {
    fn apply(self, slot: &Shared<T>, cx: &mut RequestCx) {
        let (value, fault) = self;
        *write_lock(slot) = value;
        if let Some(fault) = fault {
            cx.push_fault(fault);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ContextKind, FirstErr};

    #[test]
    fn split_primary_name() {
        assert_eq!(Verb::split("GET"), Some((Verb::Get, String::new())));
        assert_eq!(Verb::split("DELETE"), Some((Verb::Delete, String::new())));
    }

    #[test]
    fn split_action_name_lowercases() {
        assert_eq!(
            Verb::split("GETMessage"),
            Some((Verb::Get, "message".to_string()))
        );
        assert_eq!(
            Verb::split("POSTDogBark"),
            Some((Verb::Post, "dogbark".to_string()))
        );
    }

    #[test]
    fn split_rejects_unprefixed_names() {
        assert_eq!(Verb::split("Fetch"), None);
        assert_eq!(Verb::split("getLower"), None);
    }

    #[test]
    fn from_http_method() {
        assert_eq!(Verb::from_method(&Method::GET), Some(Verb::Get));
        assert_eq!(Verb::from_method(&Method::PATCH), None);
    }

    #[test]
    fn operation_collects_param_specs_in_order() {
        fn op(_err: FirstErr) -> String {
            String::new()
        }

        let specs = <fn(FirstErr) -> String as Operation<(FirstErr,), String>>::param_specs();
        assert_eq!(specs.len(), 1);
        assert!(matches!(
            specs[0],
            ParamSpec::Context(ContextKind::FirstFault)
        ));
        let _ = op;
    }
}
