//! URL-captured identifiers.
//!
//! When the dispatch walk crosses a sequence route, the next path segment is
//! captured as an [`Id`] and keyed by the sequence's element type. A
//! constructor (or handler) on that element asks for the identifier simply
//! by declaring an `Id` parameter; an operation addressed at the collection
//! itself receives the empty identifier instead.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use crate::error::Fault;

/// An opaque identifier captured from one URL path segment.
///
/// `Id` distinguishes "no segment was captured" from an empty capture: the
/// former is the [`Id::none`] sentinel handed to operations addressed at a
/// collection rather than an element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Id(Option<String>);

impl Id {
    pub fn new(segment: impl Into<String>) -> Self {
        Id(Some(segment.into()))
    }

    /// The sentinel returned when no identifier was captured.
    pub fn none() -> Self {
        Id(None)
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// The raw string form; empty for the sentinel.
    pub fn as_str(&self) -> &str {
        self.0.as_deref().unwrap_or("")
    }

    /// Parse the identifier as a signed integer.
    pub fn int(&self) -> Result<i64, Fault> {
        match &self.0 {
            None => Err(Fault::new("no identifier captured in the request path")),
            Some(raw) => raw
                .parse()
                .map_err(|_| Fault::new(format!("identifier '{raw}' is not an integer"))),
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request map from element type to the identifier captured just before
/// descending into that element. Written only by the dispatch walk.
#[derive(Debug, Default, Clone)]
pub(crate) struct IdMap(HashMap<TypeId, Id>);

impl IdMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, element: TypeId, id: Id) {
        self.0.insert(element, id);
    }

    pub(crate) fn get(&self, element: TypeId) -> Option<&Id> {
        self.0.get(&element)
    }
}
