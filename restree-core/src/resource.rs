//! Resource declarations and the resource tree.
//!
//! The user hands the framework one root value whose [`Resource`] impl
//! declares, through a [`Schema`], everything the router needs to know:
//! named children, embedded records, sequence elements, routed operations,
//! an optional constructor, and any capabilities the resource provides.
//! [`TreeBuilder`] walks those declarations depth-first into an immutable
//! arena of [`ResourceNode`]s.
//!
//! The tree is also the lexical scope for dependency lookup: a type
//! requested by an operation is searched among the children of the
//! operation's node, then upward through its ancestors, and finally against
//! the root itself. The search never crosses into sibling subtrees.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::dependency::DepSeed;
use crate::error::BuildError;
use crate::method::{ConstructorSpec, CtorOutput, MethodSpec, Operation};
use crate::outputs::IntoOutputs;
use crate::params::Res;
use crate::types::{
    downcast_shared, read_lock, shared, template_maker, type_label, AnyShared,
};

/// A record (or sequence newtype) that can take part in a resource
/// hierarchy.
///
/// `Default` supplies the zero value used when a dependency is requested
/// but absent from the tree; `Clone` supplies the per-request copy of the
/// initial state.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a resource",
    label = "this type has no schema",
    note = "implement `Resource` and declare children, operations, and constructors in `schema`"
)]
pub trait Resource: Clone + Default + Send + Sync + 'static {
    /// Declare this resource's shape and operations.
    fn schema(s: &mut Schema<Self>);
}

// ── Schema declarations ─────────────────────────────────────────────────────

pub(crate) type CapCast = Arc<dyn Fn(&AnyShared) -> AnyShared + Send + Sync>;

/// A capability registration: this resource can stand in for values of the
/// capability type `key`.
#[derive(Clone)]
pub(crate) struct CapabilityDecl {
    pub(crate) key: TypeId,
    pub(crate) label: String,
    pub(crate) cast: CapCast,
}

type BuildFn = Box<dyn Fn(&AnyShared, &mut TreeBuilder, usize) -> Result<usize, BuildError>>;

struct ChildDecl {
    build: BuildFn,
}

struct SequenceDecl {
    build: BuildFn,
}

#[derive(Default)]
pub(crate) struct SchemaDecls {
    children: Vec<ChildDecl>,
    embeds: Vec<ChildDecl>,
    sequence: Option<SequenceDecl>,
    pub(crate) constructor: Option<ConstructorSpec>,
    handlers: Vec<MethodSpec>,
    pub(crate) capabilities: Vec<CapabilityDecl>,
    errors: Vec<BuildError>,
}

pub(crate) fn collect_schema<T: Resource>() -> SchemaDecls {
    let mut schema = Schema {
        decls: SchemaDecls::default(),
        _marker: PhantomData,
    };
    T::schema(&mut schema);
    schema.decls
}

/// Zero-valued dependency seed for a type nothing in the tree provides.
pub(crate) fn seed_for<T: Resource>() -> DepSeed {
    let decls = collect_schema::<T>();
    DepSeed {
        key: TypeId::of::<T>(),
        label: type_label::<T>(),
        make: template_maker(shared(T::default())),
        constructor: decls.constructor,
        capabilities: decls.capabilities,
    }
}

/// Declaration surface handed to [`Resource::schema`].
pub struct Schema<T: Resource> {
    decls: SchemaDecls,
    _marker: PhantomData<fn(T) -> T>,
}

impl<T: Resource> Schema<T> {
    /// Declare a named child resource, projected out of this resource's
    /// initial value. The name becomes a URL segment.
    pub fn child<C: Resource>(&mut self, name: &str, project: fn(&T) -> &C) -> &mut Self {
        self.named_child(name, None, project)
    }

    /// Like [`child`](Schema::child), with opaque tag metadata attached.
    pub fn child_tagged<C: Resource>(
        &mut self,
        name: &str,
        tag: &str,
        project: fn(&T) -> &C,
    ) -> &mut Self {
        self.named_child(name, Some(tag.to_string()), project)
    }

    fn named_child<C: Resource>(
        &mut self,
        name: &str,
        tag: Option<String>,
        project: fn(&T) -> &C,
    ) -> &mut Self {
        let name = name.to_ascii_lowercase();
        self.decls.children.push(ChildDecl {
            build: Box::new(move |template, builder, parent| {
                let template = downcast_shared::<T>(template);
                let initial = project(&read_lock(&template)).clone();
                builder.build_node::<C>(initial, name.clone(), tag.clone(), Slot::Child, Some(parent))
            }),
        });
        self
    }

    /// Declare an embedded record. It gets no URL segment of its own: its
    /// operations and children are lifted into the first non-embedded
    /// resource that contains it.
    pub fn embed<C: Resource>(&mut self, project: fn(&T) -> &C) -> &mut Self {
        self.decls.embeds.push(ChildDecl {
            build: Box::new(move |template, builder, parent| {
                let template = downcast_shared::<T>(template);
                let initial = project(&read_lock(&template)).clone();
                builder.build_node::<C>(
                    initial,
                    type_label::<C>(),
                    None,
                    Slot::Embed,
                    Some(parent),
                )
            }),
        });
        self
    }

    /// Mark this resource as an ordered sequence of `E`. The element type
    /// becomes the node's sole child; URL walks through this resource
    /// capture an identifier before descending into the element.
    ///
    /// The element's initial state is the first entry of the initial
    /// sequence, or `E::default()` when the sequence starts empty.
    pub fn elements<E: Resource>(&mut self, slice: fn(&T) -> &[E]) -> &mut Self {
        self.decls.sequence = Some(SequenceDecl {
            build: Box::new(move |template, builder, parent| {
                let template = downcast_shared::<T>(template);
                let initial = slice(&read_lock(&template)).first().cloned().unwrap_or_default();
                builder.build_node::<E>(
                    initial,
                    type_label::<E>(),
                    None,
                    Slot::Element,
                    Some(parent),
                )
            }),
        });
        self
    }

    /// Register the constructor invoked to produce this resource's
    /// per-request instance. At most one constructor is allowed; it is not
    /// routable.
    pub fn constructor<F, P, O>(&mut self, f: F) -> &mut Self
    where
        F: Operation<P, O>,
        O: CtorOutput<T>,
        P: 'static,
    {
        if self.decls.constructor.is_some() {
            self.decls.errors.push(BuildError::DuplicateConstructor {
                resource: type_label::<T>(),
            });
            return self;
        }
        self.decls.constructor = Some(ConstructorSpec::new::<T, F, P, O>(f));
        self
    }

    /// Register a routed operation. The name must start with one of
    /// `GET|PUT|POST|DELETE|HEAD`; the remainder, lowercased, is the action
    /// URL segment (`"GETMessage"` serves `GET …/message`).
    pub fn route<F, P, O>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Operation<P, O>,
        O: IntoOutputs + 'static,
        P: 'static,
    {
        match MethodSpec::new::<T, F, P, O>(name, f) {
            Ok(method) => self.decls.handlers.push(method),
            Err(err) => self.decls.errors.push(err),
        }
        self
    }

    /// Declare that this resource provides capability `C`. Operations in
    /// scope asking for `Cap<C>` receive `cast` applied to this resource's
    /// per-request instance.
    pub fn implements<C: Clone + Send + Sync + 'static>(
        &mut self,
        cast: fn(Res<T>) -> C,
    ) -> &mut Self {
        self.decls.capabilities.push(CapabilityDecl {
            key: TypeId::of::<C>(),
            label: type_label::<C>(),
            cast: Arc::new(move |any| {
                let instance = downcast_shared::<T>(any);
                Arc::new(cast(Res::from_shared(instance))) as AnyShared
            }),
        });
        self
    }
}

// ── Tree ────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq)]
enum Slot {
    Root,
    Child,
    Embed,
    Element,
}

/// One resource positioned in the hierarchy.
pub(crate) struct ResourceNode {
    pub(crate) name: String,
    #[allow(dead_code)]
    pub(crate) tag: Option<String>,
    pub(crate) label: String,
    pub(crate) key: TypeId,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    pub(crate) extends: Vec<usize>,
    pub(crate) anonymous: bool,
    pub(crate) is_sequence: bool,
    pub(crate) element: Option<usize>,
    /// Produces a fresh per-request instance cloned from the template.
    pub(crate) make: Arc<dyn Fn() -> AnyShared + Send + Sync>,
    pub(crate) constructor: Option<ConstructorSpec>,
    pub(crate) handlers: Vec<MethodSpec>,
    pub(crate) capabilities: Vec<CapabilityDecl>,
}

/// The immutable arena of resource nodes; index 0 is the root.
pub(crate) struct Tree {
    pub(crate) nodes: Vec<ResourceNode>,
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tree {{ nodes: {} }}", self.nodes.len())
    }
}

pub(crate) struct TreeBuilder {
    nodes: Vec<ResourceNode>,
}

impl TreeBuilder {
    pub(crate) fn build<R: Resource>(
        initial: R,
        name: Option<String>,
        tag: Option<String>,
    ) -> Result<Tree, BuildError> {
        let mut builder = TreeBuilder { nodes: Vec::new() };
        let name = name
            .map(|n| n.to_ascii_lowercase())
            .unwrap_or_else(type_label::<R>);
        builder.build_node::<R>(initial, name, tag, Slot::Root, None)?;
        Ok(Tree {
            nodes: builder.nodes,
        })
    }

    fn build_node<T: Resource>(
        &mut self,
        initial: T,
        name: String,
        tag: Option<String>,
        slot: Slot,
        parent: Option<usize>,
    ) -> Result<usize, BuildError> {
        let key = TypeId::of::<T>();
        let label = type_label::<T>();

        // No node may repeat an ancestor's type; the walk would never end.
        let mut cursor = parent;
        while let Some(i) = cursor {
            if self.nodes[i].key == key {
                let parent_path = parent.map(|p| path_in(&self.nodes, p)).unwrap_or_default();
                return Err(BuildError::StructuralCycle {
                    type_name: label,
                    path: format!("{parent_path}/{name}"),
                    ancestor: path_in(&self.nodes, i),
                });
            }
            cursor = self.nodes[i].parent;
        }

        let mut decls = collect_schema::<T>();
        if !decls.errors.is_empty() {
            return Err(decls.errors.remove(0));
        }
        if decls.sequence.is_some() && (!decls.children.is_empty() || !decls.embeds.is_empty()) {
            return Err(BuildError::SequenceWithChildren { resource: label });
        }

        let template = shared(initial);
        let template_any: AnyShared = template.clone();
        let idx = self.nodes.len();
        self.nodes.push(ResourceNode {
            name,
            tag,
            label,
            key,
            parent,
            children: Vec::new(),
            extends: Vec::new(),
            anonymous: slot == Slot::Embed,
            is_sequence: decls.sequence.is_some(),
            element: None,
            make: template_maker(template),
            constructor: decls.constructor.take(),
            handlers: std::mem::take(&mut decls.handlers),
            capabilities: std::mem::take(&mut decls.capabilities),
        });
        if let Some(p) = parent {
            self.attach(p, idx, slot)?;
        }

        if let Some(sequence) = &decls.sequence {
            let element = (sequence.build)(&template_any, self, idx)?;
            self.nodes[idx].element = Some(element);
        } else {
            for child in &decls.children {
                (child.build)(&template_any, self, idx)?;
            }
            for embedded in &decls.embeds {
                (embedded.build)(&template_any, self, idx)?;
            }
        }

        Ok(idx)
    }

    /// Attach a freshly built node to its parent.
    ///
    /// Children of an embedded node belong to the first non-embedded
    /// ancestor; embedded nodes themselves land on that ancestor's extends
    /// list instead of its children.
    fn attach(&mut self, parent: usize, child: usize, slot: Slot) -> Result<(), BuildError> {
        if slot == Slot::Element {
            return Ok(()); // recorded on the sequence node's element field
        }

        let mut target = parent;
        while self.nodes[target].anonymous {
            match self.nodes[target].parent {
                Some(p) => target = p,
                None => break,
            }
        }

        if self.nodes[child].anonymous {
            self.nodes[target].extends.push(child);
            return Ok(());
        }

        let name = self.nodes[child].name.clone();
        if self.nodes[target]
            .children
            .iter()
            .any(|&c| self.nodes[c].name == name)
        {
            return Err(BuildError::DuplicateChildName {
                parent: path_in(&self.nodes, target),
                name,
            });
        }
        self.nodes[target].children.push(child);
        Ok(())
    }
}

fn path_in(nodes: &[ResourceNode], idx: usize) -> String {
    let mut names = Vec::new();
    let mut cursor = Some(idx);
    while let Some(i) = cursor {
        names.push(nodes[i].name.clone());
        cursor = nodes[i].parent;
    }
    names.reverse();
    names.join("/")
}

impl Tree {
    pub(crate) fn path_of(&self, idx: usize) -> String {
        path_in(&self.nodes, idx)
    }

    /// Does the node at `idx` (or its sequence element) carry type `key`?
    fn matches_resource(&self, idx: usize, key: TypeId) -> Option<usize> {
        if self.nodes[idx].key == key {
            return Some(idx);
        }
        if let Some(element) = self.nodes[idx].element {
            if self.nodes[element].key == key {
                return Some(element);
            }
        }
        None
    }

    fn matches_capability(&self, idx: usize, key: TypeId) -> Option<(usize, CapabilityDecl)> {
        if let Some(decl) = self.nodes[idx].capabilities.iter().find(|d| d.key == key) {
            return Some((idx, decl.clone()));
        }
        if let Some(element) = self.nodes[idx].element {
            if let Some(decl) = self.nodes[element].capabilities.iter().find(|d| d.key == key) {
                return Some((element, decl.clone()));
            }
        }
        None
    }

    /// The children visible from a node's scope. A sequence node exposes
    /// its element's children, since the element shares its URL position.
    fn scope_children(&self, idx: usize) -> &[usize] {
        match self.nodes[idx].element {
            Some(element) if self.nodes[idx].is_sequence => &self.nodes[element].children,
            _ => &self.nodes[idx].children,
        }
    }

    /// Resolve a resource type lexically: children first, then each
    /// ancestor's children, finally the root itself.
    pub(crate) fn value_of_resource(&self, from: usize, key: TypeId) -> Option<usize> {
        let mut cursor = from;
        loop {
            for &child in self.scope_children(cursor) {
                if let Some(found) = self.matches_resource(child, key) {
                    return Some(found);
                }
            }
            match self.nodes[cursor].parent {
                Some(parent) => cursor = parent,
                None => break,
            }
        }
        self.matches_resource(0, key)
    }

    /// Resolve a capability the same way resources resolve.
    pub(crate) fn value_of_capability(
        &self,
        from: usize,
        key: TypeId,
    ) -> Option<(usize, CapabilityDecl)> {
        let mut cursor = from;
        loop {
            for &child in self.scope_children(cursor) {
                if let Some(found) = self.matches_capability(child, key) {
                    return Some(found);
                }
            }
            match self.nodes[cursor].parent {
                Some(parent) => cursor = parent,
                None => break,
            }
        }
        self.matches_capability(0, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::read_lock;

    #[derive(Clone, Default)]
    struct Api {
        gophers: Gophers,
        version: Version,
    }

    impl Resource for Api {
        fn schema(s: &mut Schema<Self>) {
            s.child("gophers", |a| &a.gophers);
            s.child("version", |a| &a.version);
        }
    }

    #[derive(Clone, Default)]
    struct Gophers(Vec<Gopher>);

    impl Resource for Gophers {
        fn schema(s: &mut Schema<Self>) {
            s.elements(|g| &g.0);
        }
    }

    #[derive(Clone, Default, PartialEq, Debug)]
    struct Gopher {
        id: i64,
    }

    impl Resource for Gopher {
        fn schema(_s: &mut Schema<Self>) {}
    }

    #[derive(Clone, Default)]
    struct Version;

    impl Resource for Version {
        fn schema(_s: &mut Schema<Self>) {}
    }

    fn sample() -> Api {
        Api {
            gophers: Gophers(vec![Gopher { id: 1 }, Gopher { id: 2 }]),
            version: Version,
        }
    }

    #[test]
    fn builds_named_children_in_order() {
        let tree = TreeBuilder::build(sample(), None, None).unwrap();
        let root = &tree.nodes[0];
        assert_eq!(root.name, "api");
        let names: Vec<_> = root
            .children
            .iter()
            .map(|&c| tree.nodes[c].name.as_str())
            .collect();
        assert_eq!(names, ["gophers", "version"]);
    }

    #[test]
    fn root_name_override_is_lowercased() {
        let tree = TreeBuilder::build(sample(), Some("MyApi".into()), None).unwrap();
        assert_eq!(tree.nodes[0].name, "myapi");
    }

    #[test]
    fn sequence_gets_sole_element_child() {
        let tree = TreeBuilder::build(sample(), None, None).unwrap();
        let gophers = &tree.nodes[tree.nodes[0].children[0]];
        assert!(gophers.is_sequence);
        assert!(gophers.children.is_empty());
        let element = gophers.element.unwrap();
        assert_eq!(tree.nodes[element].name, "gopher");
    }

    #[test]
    fn element_template_is_first_entry() {
        let tree = TreeBuilder::build(sample(), None, None).unwrap();
        let gophers = tree.nodes[0].children[0];
        let element = tree.nodes[gophers].element.unwrap();
        let instance = (tree.nodes[element].make)();
        let instance = crate::types::downcast_shared::<Gopher>(&instance);
        assert_eq!(read_lock(&instance).id, 1);
    }

    #[test]
    fn empty_sequence_fabricates_default_element() {
        let api = Api {
            gophers: Gophers(Vec::new()),
            version: Version,
        };
        let tree = TreeBuilder::build(api, None, None).unwrap();
        let gophers = tree.nodes[0].children[0];
        let element = tree.nodes[gophers].element.unwrap();
        let instance = (tree.nodes[element].make)();
        let instance = crate::types::downcast_shared::<Gopher>(&instance);
        assert_eq!(*read_lock(&instance), Gopher::default());
    }

    // ── duplicate names ────────────────────────────────────────────────────

    #[derive(Clone, Default)]
    struct Doubled {
        first: Version,
        second: Version,
    }

    impl Resource for Doubled {
        fn schema(s: &mut Schema<Self>) {
            s.child("twin", |d| &d.first);
            s.child("twin", |d| &d.second);
        }
    }

    #[test]
    fn duplicate_sibling_names_rejected() {
        let err = TreeBuilder::build(Doubled::default(), None, None).unwrap_err();
        assert!(matches!(err, BuildError::DuplicateChildName { name, .. } if name == "twin"));
    }

    // ── structural cycles ──────────────────────────────────────────────────

    #[derive(Clone, Default)]
    struct Outer {
        inner: Inner,
    }

    #[derive(Clone, Default)]
    struct Inner;

    impl Resource for Outer {
        fn schema(s: &mut Schema<Self>) {
            s.child("inner", |o| &o.inner);
        }
    }

    impl Resource for Inner {
        fn schema(s: &mut Schema<Self>) {
            s.child("outer", |_| &*LOOP);
        }
    }

    static LOOP: std::sync::LazyLock<Outer> = std::sync::LazyLock::new(Outer::default);

    #[test]
    fn ancestor_type_repeat_rejected() {
        let err = TreeBuilder::build(Outer::default(), None, None).unwrap_err();
        match err {
            BuildError::StructuralCycle { type_name, .. } => assert_eq!(type_name, "outer"),
            other => panic!("expected StructuralCycle, got {other}"),
        }
    }

    // ── embeds ─────────────────────────────────────────────────────────────

    #[derive(Clone, Default)]
    struct WithMixin {
        mixin: Mixin,
    }

    #[derive(Clone, Default)]
    struct Mixin {
        version: Version,
    }

    impl Resource for WithMixin {
        fn schema(s: &mut Schema<Self>) {
            s.embed(|w| &w.mixin);
        }
    }

    impl Resource for Mixin {
        fn schema(s: &mut Schema<Self>) {
            s.child("version", |m| &m.version);
        }
    }

    #[test]
    fn embedded_children_lift_to_container() {
        let tree = TreeBuilder::build(WithMixin::default(), None, None).unwrap();
        let root = &tree.nodes[0];
        assert_eq!(root.extends.len(), 1);
        assert!(tree.nodes[root.extends[0]].anonymous);
        // The mixin's child hangs off the container, not the mixin.
        assert_eq!(root.children.len(), 1);
        assert_eq!(tree.nodes[root.children[0]].name, "version");
        assert!(tree.nodes[root.extends[0]].children.is_empty());
    }

    // ── lexical lookup ─────────────────────────────────────────────────────

    #[test]
    fn value_of_finds_sibling_then_ancestor_then_root() {
        let tree = TreeBuilder::build(sample(), None, None).unwrap();
        let gophers = tree.nodes[0].children[0];
        let element = tree.nodes[gophers].element.unwrap();

        // From the element, the collection resolves through the root's children.
        let found = tree.value_of_resource(element, TypeId::of::<Gophers>()).unwrap();
        assert_eq!(found, gophers);

        // A sequence child also answers for its element type.
        let found = tree.value_of_resource(0, TypeId::of::<Gopher>()).unwrap();
        assert_eq!(found, element);

        // The root itself is the last candidate.
        let found = tree.value_of_resource(element, TypeId::of::<Api>()).unwrap();
        assert_eq!(found, 0);

        // Unknown types are not in the tree at all.
        assert!(tree.value_of_resource(element, TypeId::of::<Doubled>()).is_none());
    }
}
