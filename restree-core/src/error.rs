//! Error types.
//!
//! Two very different kinds of failure live here. [`BuildError`] is fatal
//! and happens exactly once, while the router is being assembled from the
//! user's resource hierarchy. [`Fault`] is a per-request value: constructors
//! and handlers produce faults as *data*, the context accumulates them, and
//! downstream operations opt in to receiving them as parameters.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

/// Errors detected while assembling a router from a resource hierarchy.
///
/// All variants carry enough path context to locate the offending resource
/// or operation. None of them can occur after [`Router::new`] has returned
/// `Ok`: the served tree is immutable.
///
/// [`Router::new`]: crate::Router::new
#[derive(Debug)]
pub enum BuildError {
    /// A resource's type equals one of its ancestors' types.
    StructuralCycle {
        type_name: String,
        path: String,
        ancestor: String,
    },
    /// Two children of the same resource share a name.
    DuplicateChildName { parent: String, name: String },
    /// A sequence resource declared children of its own; nested resources
    /// belong on the element type.
    SequenceWithChildren { resource: String },
    /// A resource registered more than one constructor.
    DuplicateConstructor { resource: String },
    /// A routed operation's name does not start with an HTTP verb.
    InvalidOperationName { resource: String, name: String },
    /// Two operations on one route share a verb/action pair.
    DuplicateHandler {
        route: String,
        verb: &'static str,
        action: String,
    },
    /// A route has a child and an action with the same name, which would
    /// make the URL ambiguous.
    ChildActionConflict { route: String, name: String },
    /// A capability parameter has no providing resource in scope.
    MissingImplementation { capability: String, scope: String },
    /// A constructor chain depends on itself.
    DependencyCycle { chain: String },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::StructuralCycle {
                type_name,
                path,
                ancestor,
            } => write!(
                f,
                "resource type '{type_name}' at '{path}' is already present at ancestor '{ancestor}'"
            ),
            BuildError::DuplicateChildName { parent, name } => {
                write!(f, "two children of '{parent}' share the name '{name}'")
            }
            BuildError::SequenceWithChildren { resource } => write!(
                f,
                "sequence resource '{resource}' cannot declare children; declare them on the element type"
            ),
            BuildError::DuplicateConstructor { resource } => {
                write!(f, "resource '{resource}' registered two constructors")
            }
            BuildError::InvalidOperationName { resource, name } => write!(
                f,
                "operation '{name}' on '{resource}' must start with one of GET, PUT, POST, DELETE, HEAD"
            ),
            BuildError::DuplicateHandler {
                route,
                verb,
                action,
            } => {
                if action.is_empty() {
                    write!(f, "route '{route}' registered {verb} twice")
                } else {
                    write!(f, "route '{route}' registered {verb} '{action}' twice")
                }
            }
            BuildError::ChildActionConflict { route, name } => write!(
                f,
                "route '{route}' has both a child and an action named '{name}'"
            ),
            BuildError::MissingImplementation { capability, scope } => write!(
                f,
                "no resource in scope of '{scope}' implements the capability '{capability}'"
            ),
            BuildError::DependencyCycle { chain } => {
                write!(f, "circular dependency: {chain}")
            }
        }
    }
}

impl std::error::Error for BuildError {}

/// A request-scoped error value.
///
/// Faults are never thrown; they flow through the dependency graph
/// alongside ordinary values. Cloning is cheap (the message is shared),
/// so one fault can reach every operation that asked for it.
#[derive(Clone, PartialEq, Eq)]
pub struct Fault {
    message: Arc<str>,
}

impl Fault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into().into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fault({:?})", &*self.message)
    }
}

impl std::error::Error for Fault {}

impl From<String> for Fault {
    fn from(message: String) -> Self {
        Fault::new(message)
    }
}

impl From<&str> for Fault {
    fn from(message: &str) -> Self {
        Fault::new(message)
    }
}

/// Faults serialize as their message string, which is how they appear in
/// response envelopes.
impl Serialize for Fault {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.message)
    }
}
