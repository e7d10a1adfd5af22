//! The demo resource hierarchy.
//!
//! `/api` is the root; `gophers` is a collection whose constructor sneaks
//! an extra entry into every request's state, `version` validates its
//! initial value, and `maltese` provides the [`Speaker`] capability used by
//! the root's `dogbark` action.

use std::sync::Arc;

use restree::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Default)]
pub struct Api {
    pub gophers: Gophers,
    pub version: Version,
    pub maltese: Maltese,
}

fn api_dog_bark(Cap(dog): Cap<Speaker>) -> String {
    dog.bark()
}

impl Resource for Api {
    fn schema(s: &mut Schema<Self>) {
        s.child("gophers", |a| &a.gophers);
        s.child("version", |a| &a.version);
        s.child("maltese", |a| &a.maltese);
        s.route("GETDogBark", api_dog_bark);
    }
}

pub fn initial() -> Api {
    Api {
        gophers: Gophers(vec![
            Gopher {
                id: 1,
                message: "I love you".into(),
            },
            Gopher {
                id: 2,
                message: "I still love programming".into(),
            },
            Gopher {
                id: 3,
                message: "You so cute".into(),
            },
        ]),
        version: Version {
            number: 1,
            message: "API version:".into(),
        },
        maltese: Maltese,
    }
}

// ── Gophers ─────────────────────────────────────────────────────────────────

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gophers(pub Vec<Gopher>);

fn gophers_init(current: Res<Gophers>) -> Result<Gophers, Fault> {
    let mut gophers = current.get();
    if gophers.0.len() != 3 {
        return Err(Fault::new("initial gopher state not received"));
    }
    gophers.0.push(Gopher {
        id: 4,
        message: "Intruder".into(),
    });
    Ok(gophers)
}

fn gophers_get(gophers: Res<Gophers>, err: FirstErr) -> (Res<Gophers>, FirstErr) {
    (gophers, err)
}

impl Resource for Gophers {
    fn schema(s: &mut Schema<Self>) {
        s.elements(|g| &g.0);
        s.constructor(gophers_init);
        s.route("GET", gophers_get);
    }
}

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Debug)]
pub struct Gopher {
    pub id: i64,
    pub message: String,
}

// Locates the addressed element in the collection state by the identifier
// captured from the URL.
fn gopher_new(gophers: Res<Gophers>, id: Id) -> Result<Gopher, Fault> {
    let wanted = id.int()?;
    gophers
        .get()
        .0
        .into_iter()
        .find(|g| g.id == wanted)
        .ok_or_else(|| Fault::new(format!("Id {wanted} not found in gophers list")))
}

fn gopher_get(gopher: Res<Gopher>) -> Res<Gopher> {
    gopher
}

fn gopher_message(gopher: Res<Gopher>, err: FirstErr) -> (String, FirstErr) {
    if err.is_some() {
        return (String::new(), err);
    }
    (gopher.get().message, err)
}

impl Resource for Gopher {
    fn schema(s: &mut Schema<Self>) {
        s.constructor(gopher_new);
        s.route("GET", gopher_get);
        s.route("GETMessage", gopher_message);
    }
}

// ── Version ─────────────────────────────────────────────────────────────────

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Version {
    pub number: i64,
    pub message: String,
}

fn version_init(current: Res<Version>) -> Result<Version, Fault> {
    let mut version = current.get();
    if version.number != 1 {
        return Err(Fault::new("initial value of version not received"));
    }
    version.message = format!("{} {}", version.message, version.number);
    Ok(version)
}

fn version_get(version: Res<Version>, err: FirstErr) -> (Res<Version>, FirstErr) {
    (version, err)
}

impl Resource for Version {
    fn schema(s: &mut Schema<Self>) {
        s.constructor(version_init);
        s.route("GET", version_get);
    }
}

// ── Maltese ─────────────────────────────────────────────────────────────────

/// Anything that can bark on request.
pub trait Bark: Send + Sync {
    fn bark(&self) -> String;
}

pub type Speaker = Arc<dyn Bark>;

#[derive(Clone, Default)]
pub struct Maltese;

impl Bark for Maltese {
    fn bark(&self) -> String {
        "yap-yap".into()
    }
}

impl Resource for Maltese {
    fn schema(s: &mut Schema<Self>) {
        s.implements(|m: Res<Maltese>| -> Speaker { Arc::new(m.get()) });
    }
}
