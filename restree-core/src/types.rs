//! Shared-value plumbing and type labels.
//!
//! Every resource the framework stores is kept behind a [`Shared`] handle so
//! that per-request instances stay mutable, addressable, and cheap to hand
//! out. Type labels are the lowercased short names used for tree nodes,
//! JSON keys, and diagnostics.

use std::any::{Any, TypeId};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The canonical stored form of a resource value: shared, mutable, owned.
pub type Shared<T> = Arc<RwLock<T>>;

/// A type-erased [`Shared`] handle, keyed elsewhere by [`TypeId`].
pub(crate) type AnyShared = Arc<dyn Any + Send + Sync>;

/// Wrap a value in fresh shared storage.
pub fn shared<T>(value: T) -> Shared<T> {
    Arc::new(RwLock::new(value))
}

/// Read-lock without propagating poison: a panicked writer leaves the value
/// in whatever state it reached, which is the same contract `tokio::sync`
/// locks offer.
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// The lowercased short name of a type: last path segment, generics
/// stripped. `demo::Gopher` becomes `"gopher"`, `String` becomes
/// `"string"`, `i64` stays `"i64"`.
pub fn type_label<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    let seg = base.rsplit("::").next().unwrap_or(base);
    seg.to_ascii_lowercase()
}

/// Build a closure producing fresh per-request instances from a template.
///
/// Each call clones the template's pointee into brand-new shared storage,
/// so requests never observe each other's mutations.
pub(crate) fn template_maker<T: Clone + Send + Sync + 'static>(
    template: Shared<T>,
) -> Arc<dyn Fn() -> AnyShared + Send + Sync> {
    Arc::new(move || {
        let value = read_lock(&template).clone();
        Arc::new(RwLock::new(value)) as AnyShared
    })
}

/// Recover the typed handle from an erased one.
///
/// # Panics
///
/// Panics if the erased value was stored under the wrong key; the builder
/// keys every entry by the pointee's [`TypeId`], so this indicates a bug in
/// the framework rather than in user code.
pub(crate) fn downcast_shared<T: Send + Sync + 'static>(any: &AnyShared) -> Shared<T> {
    any.clone().downcast::<RwLock<T>>().unwrap_or_else(|_| {
        panic!(
            "value stored for `{}` has an unexpected runtime type",
            type_label::<T>()
        )
    })
}

/// `TypeId` shorthand used throughout the planner.
pub(crate) fn key_of<T: 'static>() -> TypeId {
    TypeId::of::<T>()
}
