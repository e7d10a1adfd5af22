//! The route tree and dispatch walk.
//!
//! Routes mirror the non-embedded shape of the resource tree. Each route
//! holds its handlers keyed by verb and action; an embedded record's
//! operations surface on the route of the resource that contains it.
//! Subtrees without a single handler are pruned, since no URL could ever
//! reach them.
//!
//! Dispatch walks the remaining segments: a trailing segment is first tried
//! as an action, a sequence route captures the next segment as an
//! identifier before descending into its element, and anything else must
//! name a child route.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::dependency::DepPlan;
use crate::error::BuildError;
use crate::id::{Id, IdMap};
use crate::method::{MethodSpec, Verb};
use crate::resource::Tree;

/// A routed operation together with its resolved dependency plan.
pub(crate) struct Handler {
    pub(crate) spec: MethodSpec,
    pub(crate) plan: Arc<DepPlan>,
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler {{ plan: {:?} }}", self.plan)
    }
}

pub(crate) struct RouteNode {
    pub(crate) name: String,
    pub(crate) is_sequence: bool,
    /// The element type a captured identifier is keyed by.
    pub(crate) element_key: Option<TypeId>,
    pub(crate) handlers: HashMap<(Verb, String), Handler>,
    pub(crate) children: HashMap<String, RouteNode>,
    pub(crate) element: Option<Box<RouteNode>>,
}

impl fmt::Debug for RouteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RouteNode {{ name: {:?} }}", self.name)
    }
}

/// Why a request failed to reach a handler.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum DispatchError {
    NotFound { segment: String },
    MethodNotAllowed { verb: Verb, route: String },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::NotFound { segment } => {
                write!(f, "no route matches segment '{segment}'")
            }
            DispatchError::MethodNotAllowed { verb, route } => {
                write!(f, "method {verb} not allowed on '{route}'")
            }
        }
    }
}

/// Mirror the resource tree into URL space. The root route always exists,
/// even when it serves nothing.
pub(crate) fn build_route_tree(tree: &Tree) -> Result<RouteNode, BuildError> {
    Ok(build_node(tree, 0, "")?.unwrap_or_else(|| RouteNode {
        name: tree.nodes[0].name.clone(),
        is_sequence: tree.nodes[0].is_sequence,
        element_key: None,
        handlers: HashMap::new(),
        children: HashMap::new(),
        element: None,
    }))
}

fn build_node(
    tree: &Tree,
    idx: usize,
    parent_path: &str,
) -> Result<Option<RouteNode>, BuildError> {
    let node = &tree.nodes[idx];
    let path = if parent_path.is_empty() {
        node.name.clone()
    } else {
        format!("{parent_path}/{}", node.name)
    };

    // The route serves its own operations plus everything its embedded
    // records contribute.
    let mut handlers: HashMap<(Verb, String), Handler> = HashMap::new();
    let mut specs: Vec<MethodSpec> = node.handlers.clone();
    for &extend in &node.extends {
        specs.extend(tree.nodes[extend].handlers.iter().cloned());
    }
    for spec in specs {
        let key = (spec.verb, spec.action.clone());
        if handlers.contains_key(&key) {
            return Err(BuildError::DuplicateHandler {
                route: path,
                verb: spec.verb.as_str(),
                action: spec.action,
            });
        }
        let plan = DepPlan::build(&spec.params, tree, idx)?;
        handlers.insert(
            key,
            Handler {
                spec,
                plan: Arc::new(plan),
            },
        );
    }

    let mut children: HashMap<String, RouteNode> = HashMap::new();
    for &child in &node.children {
        if let Some(route) = build_node(tree, child, &path)? {
            if handlers.keys().any(|(_, action)| *action == route.name) {
                return Err(BuildError::ChildActionConflict {
                    route: path,
                    name: route.name,
                });
            }
            children.insert(route.name.clone(), route);
        }
    }

    let element = match node.element {
        Some(el) => build_node(tree, el, &path)?.map(Box::new),
        None => None,
    };

    if handlers.is_empty() && children.is_empty() && element.is_none() {
        return Ok(None);
    }

    Ok(Some(RouteNode {
        name: node.name.clone(),
        is_sequence: node.is_sequence,
        element_key: node.element.map(|el| tree.nodes[el].key),
        handlers,
        children,
        element,
    }))
}

impl RouteNode {
    /// Resolve the remaining path segments to a handler, capturing
    /// identifiers along the way.
    pub(crate) fn find<'a>(
        &'a self,
        verb: Verb,
        segments: &[&str],
        ids: &mut IdMap,
    ) -> Result<&'a Handler, DispatchError> {
        if segments.is_empty() {
            return self
                .handlers
                .get(&(verb, String::new()))
                .ok_or_else(|| DispatchError::MethodNotAllowed {
                    verb,
                    route: self.name.clone(),
                });
        }

        // A single trailing segment may name an action on this route.
        if segments.len() == 1 {
            if let Some(handler) = self.handlers.get(&(verb, segments[0].to_string())) {
                return Ok(handler);
            }
        }

        if self.is_sequence {
            if let (Some(element), Some(key)) = (self.element.as_deref(), self.element_key) {
                ids.insert(key, Id::new(segments[0]));
                return element.find(verb, &segments[1..], ids);
            }
            return Err(DispatchError::NotFound {
                segment: segments[0].to_string(),
            });
        }

        match self.children.get(segments[0]) {
            Some(child) => child.find(verb, &segments[1..], ids),
            None => Err(DispatchError::NotFound {
                segment: segments[0].to_string(),
            }),
        }
    }
}
