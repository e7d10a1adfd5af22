//! Dependency planning.
//!
//! For every routed operation the planner walks the parameter list and
//! produces a [`DepPlan`]: one [`Dep`] per distinct resource the operation
//! (or any constructor it pulls in, transitively) needs, plus an alias
//! table so that capabilities and repeated requests land on the same entry.
//! Each entry is installed *before* its constructor's parameters are
//! scanned, which is what makes self-referential constructors legal.
//!
//! Planning happens once, at build time; requests only ever read the plan.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::BuildError;
use crate::method::ConstructorSpec;
use crate::params::ParamSpec;
use crate::resource::{CapCast, CapabilityDecl, Tree};
use crate::types::AnyShared;

/// One resolvable dependency: where instances come from and how they are
/// constructed.
pub(crate) struct Dep {
    pub(crate) key: TypeId,
    pub(crate) label: String,
    /// Allocates a fresh per-request instance from the initial-value
    /// template.
    pub(crate) make: Arc<dyn Fn() -> AnyShared + Send + Sync>,
    pub(crate) constructor: Option<ConstructorSpec>,
    pub(crate) capabilities: Vec<CapabilityDecl>,
}

/// A zero-valued [`Dep`] fabricated for a type the tree does not provide.
pub(crate) type DepSeed = Dep;

/// An alias-table entry: which dependency answers for a requested type,
/// and the capability cast to apply, if any.
#[derive(Clone)]
pub(crate) struct PlanEntry {
    pub(crate) dep: usize,
    pub(crate) cast: Option<CapCast>,
}

/// The resolved dependency plan of one routed operation.
pub(crate) struct DepPlan {
    entries: HashMap<TypeId, PlanEntry>,
    deps: Vec<Dep>,
}

impl fmt::Debug for DepPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DepPlan {{ deps: {} }}", self.deps.len())
    }
}

impl DepPlan {
    pub(crate) fn build(
        params: &[ParamSpec],
        tree: &Tree,
        scope: usize,
    ) -> Result<DepPlan, BuildError> {
        let mut plan = DepPlan {
            entries: HashMap::new(),
            deps: Vec::new(),
        };
        for param in params {
            plan.scan(param, tree, scope)?;
        }
        plan.check_cycles()?;
        Ok(plan)
    }

    pub(crate) fn entry(&self, key: TypeId) -> Option<&PlanEntry> {
        self.entries.get(&key)
    }

    pub(crate) fn dep(&self, idx: usize) -> &Dep {
        &self.deps[idx]
    }

    fn scan(&mut self, param: &ParamSpec, tree: &Tree, scope: usize) -> Result<(), BuildError> {
        match param {
            ParamSpec::Context(_) => Ok(()),
            ParamSpec::Resource(spec) => {
                if self.entries.contains_key(&spec.key) {
                    return Ok(());
                }
                let dep = match tree.value_of_resource(scope, spec.key) {
                    Some(node) => dep_from_node(tree, node),
                    None => (spec.fabricate)(),
                };
                self.install(dep, None, tree, scope)
            }
            ParamSpec::Capability(spec) => {
                if self.entries.contains_key(&spec.key) {
                    return Ok(());
                }
                // A dependency already installed may provide the capability;
                // index it under the new key instead of searching again.
                if let Some((idx, cast)) = self.find_provider(spec.key) {
                    self.entries.insert(
                        spec.key,
                        PlanEntry {
                            dep: idx,
                            cast: Some(cast),
                        },
                    );
                    return Ok(());
                }
                let (node, decl) = tree.value_of_capability(scope, spec.key).ok_or_else(|| {
                    BuildError::MissingImplementation {
                        capability: spec.label.clone(),
                        scope: tree.path_of(scope),
                    }
                })?;
                let concrete = tree.nodes[node].key;
                if let Some(existing) = self.entries.get(&concrete) {
                    let dep = existing.dep;
                    self.entries.insert(
                        spec.key,
                        PlanEntry {
                            dep,
                            cast: Some(decl.cast.clone()),
                        },
                    );
                    return Ok(());
                }
                let dep = dep_from_node(tree, node);
                self.install(dep, Some((spec.key, decl.cast.clone())), tree, scope)
            }
        }
    }

    /// Register a dependency (and optional capability alias), then scan its
    /// constructor's parameters. Installation comes first so a constructor
    /// asking for its own resource resolves to the entry just added.
    fn install(
        &mut self,
        dep: Dep,
        alias: Option<(TypeId, CapCast)>,
        tree: &Tree,
        scope: usize,
    ) -> Result<(), BuildError> {
        let ctor_params: Vec<ParamSpec> = dep
            .constructor
            .as_ref()
            .map(|c| c.params.clone())
            .unwrap_or_default();
        let idx = self.deps.len();
        self.entries.insert(dep.key, PlanEntry { dep: idx, cast: None });
        if let Some((cap_key, cast)) = alias {
            self.entries.insert(
                cap_key,
                PlanEntry {
                    dep: idx,
                    cast: Some(cast),
                },
            );
        }
        self.deps.push(dep);
        for param in &ctor_params {
            self.scan(param, tree, scope)?;
        }
        Ok(())
    }

    fn find_provider(&self, key: TypeId) -> Option<(usize, CapCast)> {
        self.deps.iter().enumerate().find_map(|(idx, dep)| {
            dep.capabilities
                .iter()
                .find(|c| c.key == key)
                .map(|c| (idx, c.cast.clone()))
        })
    }

    // ── cycle detection ────────────────────────────────────────────────────

    /// Depth-first walk over constructor edges. A dependency reappearing in
    /// the active chain is fatal; a constructor taking its own resource is
    /// not a cycle.
    fn check_cycles(&self) -> Result<(), BuildError> {
        let mut done = vec![false; self.deps.len()];
        let mut stack = Vec::new();
        for idx in 0..self.deps.len() {
            self.visit(idx, &mut stack, &mut done)?;
        }
        Ok(())
    }

    fn visit(
        &self,
        idx: usize,
        stack: &mut Vec<usize>,
        done: &mut [bool],
    ) -> Result<(), BuildError> {
        if done[idx] {
            return Ok(());
        }
        if let Some(pos) = stack.iter().position(|&s| s == idx) {
            let mut labels: Vec<&str> = stack[pos..]
                .iter()
                .map(|&s| self.deps[s].label.as_str())
                .collect();
            labels.push(self.deps[idx].label.as_str());
            let chain = format!(
                "{} depends on {}",
                labels[0],
                labels[1..].join(" that depends on ")
            );
            return Err(BuildError::DependencyCycle { chain });
        }
        stack.push(idx);
        if let Some(ctor) = &self.deps[idx].constructor {
            for param in &ctor.params {
                let key = match param {
                    ParamSpec::Context(_) => continue,
                    ParamSpec::Resource(r) => r.key,
                    ParamSpec::Capability(c) => c.key,
                };
                let Some(entry) = self.entries.get(&key) else {
                    continue;
                };
                if entry.dep == idx {
                    continue;
                }
                self.visit(entry.dep, stack, done)?;
            }
        }
        stack.pop();
        done[idx] = true;
        Ok(())
    }
}

fn dep_from_node(tree: &Tree, idx: usize) -> Dep {
    let node = &tree.nodes[idx];
    Dep {
        key: node.key,
        label: node.label.clone(),
        make: node.make.clone(),
        constructor: node.constructor.clone(),
        capabilities: node.capabilities.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Fault;
    use crate::params::{Cap, HandlerParam, Res};
    use crate::resource::{Resource, Schema, TreeBuilder};
    use std::sync::Arc as StdArc;

    #[derive(Clone, Default)]
    struct Root {
        left: Left,
        right: Right,
        barker: Barker,
    }

    impl Resource for Root {
        fn schema(s: &mut Schema<Self>) {
            s.child("left", |r| &r.left);
            s.child("right", |r| &r.right);
            s.child("barker", |r| &r.barker);
        }
    }

    #[derive(Clone, Default)]
    struct Left;

    fn left_new(_right: Res<Right>) -> Left {
        Left
    }

    impl Resource for Left {
        fn schema(s: &mut Schema<Self>) {
            s.constructor(left_new);
        }
    }

    #[derive(Clone, Default)]
    struct Right;

    impl Resource for Right {
        fn schema(_s: &mut Schema<Self>) {}
    }

    trait Noise: Send + Sync {
        fn noise(&self) -> String;
    }

    #[derive(Clone, Default)]
    struct Barker;

    impl Noise for Barker {
        fn noise(&self) -> String {
            "yap-yap".into()
        }
    }

    type NoiseCap = StdArc<dyn Noise>;

    impl Resource for Barker {
        fn schema(s: &mut Schema<Self>) {
            s.implements(|b: Res<Barker>| -> NoiseCap { StdArc::new(b.get()) });
        }
    }

    fn plan_for(params: &[ParamSpec]) -> Result<DepPlan, BuildError> {
        let tree = TreeBuilder::build(Root::default(), None, None).unwrap();
        DepPlan::build(params, &tree, 0)
    }

    #[test]
    fn constructor_dependencies_are_pulled_in_transitively() {
        let plan = plan_for(&[Res::<Left>::spec()]).unwrap();
        assert!(plan.entry(TypeId::of::<Left>()).is_some());
        assert!(plan.entry(TypeId::of::<Right>()).is_some());
        assert_eq!(plan.deps.len(), 2);
    }

    #[test]
    fn repeated_requests_share_one_dependency() {
        let plan = plan_for(&[Res::<Right>::spec(), Res::<Left>::spec()]).unwrap();
        assert_eq!(plan.deps.len(), 2);
    }

    #[test]
    fn capability_aliases_the_providing_resource() {
        let plan = plan_for(&[Res::<Barker>::spec(), Cap::<NoiseCap>::spec()]).unwrap();
        assert_eq!(plan.deps.len(), 1);
        let concrete = plan.entry(TypeId::of::<Barker>()).unwrap();
        let cap = plan.entry(TypeId::of::<NoiseCap>()).unwrap();
        assert_eq!(concrete.dep, cap.dep);
        assert!(concrete.cast.is_none());
        assert!(cap.cast.is_some());
    }

    #[test]
    fn capability_found_by_tree_search() {
        let plan = plan_for(&[Cap::<NoiseCap>::spec()]).unwrap();
        assert_eq!(plan.deps.len(), 1);
        assert!(plan.entry(TypeId::of::<NoiseCap>()).unwrap().cast.is_some());
    }

    #[test]
    fn missing_capability_is_rejected() {
        type Missing = StdArc<dyn Fn() + Send + Sync>;
        let err = plan_for(&[Cap::<Missing>::spec()]).unwrap_err();
        assert!(matches!(err, BuildError::MissingImplementation { .. }));
    }

    #[test]
    fn absent_resource_is_fabricated() {
        #[derive(Clone, Default)]
        struct Orphan;
        impl Resource for Orphan {
            fn schema(_s: &mut Schema<Self>) {}
        }

        let plan = plan_for(&[Res::<Orphan>::spec()]).unwrap();
        assert!(plan.entry(TypeId::of::<Orphan>()).is_some());
    }

    // ── cycles ─────────────────────────────────────────────────────────────

    #[derive(Clone, Default)]
    struct Ping;

    #[derive(Clone, Default)]
    struct Pong;

    fn ping_new(_pong: Res<Pong>) -> Result<Ping, Fault> {
        Ok(Ping)
    }

    fn pong_new(_ping: Res<Ping>) -> Result<Pong, Fault> {
        Ok(Pong)
    }

    impl Resource for Ping {
        fn schema(s: &mut Schema<Self>) {
            s.constructor(ping_new);
        }
    }

    impl Resource for Pong {
        fn schema(s: &mut Schema<Self>) {
            s.constructor(pong_new);
        }
    }

    #[test]
    fn mutual_constructors_are_a_cycle() {
        let err = plan_for(&[Res::<Ping>::spec()]).unwrap_err();
        match err {
            BuildError::DependencyCycle { chain } => {
                assert_eq!(chain, "ping depends on pong that depends on ping");
            }
            other => panic!("expected DependencyCycle, got {other}"),
        }
    }

    #[test]
    fn self_reference_is_not_a_cycle() {
        #[derive(Clone, Default)]
        struct Selfish;

        fn selfish_new(this: Res<Selfish>) -> Selfish {
            this.get()
        }

        impl Resource for Selfish {
            fn schema(s: &mut Schema<Self>) {
                s.constructor(selfish_new);
            }
        }

        let plan = plan_for(&[Res::<Selfish>::spec()]).unwrap();
        assert_eq!(plan.deps.len(), 1);
    }
}
