//! The per-request context.
//!
//! One [`RequestCx`] lives for exactly one dispatched request. It memoizes
//! dependency instances (each constructor runs at most once per request),
//! accumulates constructor faults, and carries the identifiers captured
//! during the dispatch walk. It is never shared across requests; the
//! route tree it reads from is.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use restree_http::Parts;

use crate::dependency::DepPlan;
use crate::error::Fault;
use crate::id::{Id, IdMap};
use crate::params::{Resp, RespState};
use crate::resource::Resource;
use crate::types::{downcast_shared, key_of, type_label, AnyShared, Shared};

pub struct RequestCx {
    req: Arc<Parts>,
    resp: Resp,
    /// Memoized instances, keyed by resource or capability type.
    values: HashMap<TypeId, AnyShared>,
    faults: Vec<Fault>,
    ids: IdMap,
    plan: Arc<DepPlan>,
}

impl RequestCx {
    pub(crate) fn new(req: Arc<Parts>, ids: IdMap, plan: Arc<DepPlan>) -> Self {
        RequestCx {
            req,
            resp: Resp::default(),
            values: HashMap::new(),
            faults: Vec::new(),
            ids,
            plan,
        }
    }

    /// The per-request instance of resource `T`, constructed on first use.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not covered by the active dependency plan. The
    /// planner installs an entry for every parameter reachable from the
    /// operation, so this fires only on a framework bug.
    pub fn resource<T: Resource>(&mut self) -> Shared<T> {
        let key = key_of::<T>();
        if let Some(existing) = self.values.get(&key) {
            return downcast_shared::<T>(existing);
        }
        let value = self.instantiate(key, &type_label::<T>());
        downcast_shared::<T>(&value)
    }

    /// The capability value for `C`, constructing its providing resource on
    /// first use.
    pub fn capability<C: Clone + Send + Sync + 'static>(&mut self) -> C {
        let key = key_of::<C>();
        let value = match self.values.get(&key) {
            Some(existing) => existing.clone(),
            None => self.instantiate(key, &type_label::<C>()),
        };
        value.downcast_ref::<C>().cloned().unwrap_or_else(|| {
            panic!(
                "capability `{}` stored with an unexpected runtime type",
                type_label::<C>()
            )
        })
    }

    fn instantiate(&mut self, key: TypeId, label: &str) -> AnyShared {
        let plan = self.plan.clone();
        let entry = plan.entry(key).unwrap_or_else(|| {
            panic!("dependency `{label}` requested at runtime but absent from the plan")
        });
        let dep = plan.dep(entry.dep);
        let concrete = match self.values.get(&dep.key) {
            Some(existing) => existing.clone(),
            None => {
                debug!(dependency = %dep.label, "constructing dependency");
                let instance = (dep.make)();
                // Installed before the constructor runs, so a constructor
                // asking for its own resource gets this very slot.
                self.values.insert(dep.key, instance.clone());
                if let Some(ctor) = &dep.constructor {
                    (ctor.invoke)(self, &instance);
                }
                instance
            }
        };
        match &entry.cast {
            Some(cast) => {
                let capability = cast(&concrete);
                self.values.insert(key, capability.clone());
                capability
            }
            None => concrete,
        }
    }

    /// The identifier captured for `requester`'s type, or the empty
    /// sentinel when the request addressed a collection.
    pub fn identifier(&self, requester: TypeId) -> Id {
        self.ids.get(requester).cloned().unwrap_or_else(Id::none)
    }

    /// Record a constructor fault.
    pub fn push_fault(&mut self, fault: Fault) {
        self.faults.push(fault);
    }

    pub fn first_fault(&self) -> Option<Fault> {
        self.faults.first().cloned()
    }

    pub fn fault_list(&self) -> Vec<Fault> {
        self.faults.clone()
    }

    pub fn request(&self) -> Arc<Parts> {
        self.req.clone()
    }

    pub fn response(&self) -> Resp {
        self.resp.clone()
    }

    pub(crate) fn response_state(&self) -> RespState {
        self.resp.snapshot()
    }
}
