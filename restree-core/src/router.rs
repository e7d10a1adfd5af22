//! The router: build once, dispatch forever.
//!
//! [`Router::new`] turns a root resource value into an immutable route
//! tree, failing loudly on any structural problem. The built router is a
//! [`tower::Service`], so it can be driven by `axum::serve`, nested inside
//! a larger axum application, or exercised in-process with
//! `tower::ServiceExt::oneshot`.

use std::convert::Infallible;
use std::fmt;
use std::future::{ready, Ready};
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tracing::{debug, info};

use restree_http::{Body, Request, Response, StatusCode};

use crate::context::RequestCx;
use crate::error::BuildError;
use crate::id::IdMap;
use crate::method::Verb;
use crate::outputs::{error_response, respond};
use crate::resource::{Resource, TreeBuilder};
use crate::route::{build_route_tree, RouteNode};

/// An HTTP dispatcher over a resource hierarchy.
///
/// Cloning is cheap; all clones share the same immutable route tree.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    root: RouteNode,
}

impl Router {
    /// Build a router rooted at `root`, named after the root's type.
    pub fn new<R: Resource>(root: R) -> Result<Router, BuildError> {
        Self::build(root, None, None)
    }

    /// Build a router with an explicit root name (lowercased into the URL)
    /// and optional tag metadata.
    pub fn with_name<R: Resource>(
        root: R,
        name: &str,
        tag: Option<&str>,
    ) -> Result<Router, BuildError> {
        Self::build(root, Some(name.to_string()), tag.map(str::to_string))
    }

    fn build<R: Resource>(
        root: R,
        name: Option<String>,
        tag: Option<String>,
    ) -> Result<Router, BuildError> {
        let tree = TreeBuilder::build(root, name, tag)?;
        let root = build_route_tree(&tree)?;
        info!(root = %root.name, "resource router built");
        Ok(Router {
            inner: Arc::new(RouterInner { root }),
        })
    }

    /// Dispatch one request synchronously.
    ///
    /// The URL's first segment must name the root resource; the remaining
    /// segments walk the route tree. Request bodies are ignored.
    pub fn handle(&self, request: Request<Body>) -> Response {
        let (parts, _body) = request.into_parts();
        let path = parts.uri.path().to_string();

        let Some(verb) = Verb::from_method(&parts.method) else {
            return error_response(
                StatusCode::NOT_FOUND,
                format!("method {} is not routable", parts.method),
            );
        };
        debug!(method = %parts.method, path = %path, "dispatching");

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let root = &self.inner.root;
        if segments.first().copied() != Some(root.name.as_str()) {
            return error_response(StatusCode::NOT_FOUND, format!("resource not found: {path}"));
        }

        let mut ids = IdMap::new();
        let handler = match root.find(verb, &segments[1..], &mut ids) {
            Ok(handler) => handler,
            Err(err) => return error_response(StatusCode::NOT_FOUND, err.to_string()),
        };

        let mut cx = RequestCx::new(Arc::new(parts), ids, handler.plan.clone());
        match (handler.spec.invoke)(&mut cx) {
            Ok(outputs) => respond(outputs, &cx.response_state()),
            Err(err) => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("response encoding failed: {err}"),
            ),
        }
    }

    /// Bind `addr` and serve until the task is cancelled.
    pub async fn serve(self, addr: &str) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "listening");
        let app = restree_http::AxumRouter::new().fallback_service(self);
        restree_http::serve(listener, app).await
    }

    /// Introspect the served route tree.
    pub fn root(&self) -> RouteInfo<'_> {
        RouteInfo {
            node: &self.inner.root,
        }
    }
}

impl Service<Request<Body>> for Router {
    type Response = Response;
    type Error = Infallible;
    type Future = Ready<Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        ready(Ok(self.handle(request)))
    }
}

// ── Introspection ───────────────────────────────────────────────────────────

/// Read-only view of one route.
#[derive(Clone, Copy)]
pub struct RouteInfo<'a> {
    node: &'a RouteNode,
}

impl<'a> RouteInfo<'a> {
    pub fn name(&self) -> &'a str {
        &self.node.name
    }

    pub fn is_sequence(&self) -> bool {
        self.node.is_sequence
    }

    /// Registered operation names, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .node
            .handlers
            .values()
            .map(|h| h.spec.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Child routes, with a sequence's element listed first.
    pub fn children(&self) -> Vec<RouteInfo<'a>> {
        let mut children: Vec<RouteInfo<'a>> = Vec::new();
        if let Some(element) = self.node.element.as_deref() {
            children.push(RouteInfo { node: element });
        }
        let mut named: Vec<&RouteNode> = self.node.children.values().collect();
        named.sort_by(|a, b| a.name.cmp(&b.name));
        children.extend(named.into_iter().map(|node| RouteInfo { node }));
        children
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Router")
    }
}

impl fmt::Display for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_node(f: &mut fmt::Formatter<'_>, info: RouteInfo<'_>, depth: usize) -> fmt::Result {
            let indent = "  ".repeat(depth);
            let marker = if info.is_sequence() { "[]" } else { "" };
            write!(f, "{indent}{marker}[{}]", info.name())?;
            let methods = info.methods();
            if !methods.is_empty() {
                write!(f, " {}", methods.join(", "))?;
            }
            writeln!(f)?;
            for child in info.children() {
                write_node(f, child, depth + 1)?;
            }
            Ok(())
        }
        write_node(f, self.root(), 0)
    }
}
