use std::sync::Arc;

use restree::prelude::*;
use restree_test::TestApp;
use serde::{Deserialize, Serialize};

// Re-declare the demo hierarchy inline since we can't import from a binary
// crate.

#[derive(Clone, Default)]
struct Api {
    gophers: Gophers,
    version: Version,
    maltese: Maltese,
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

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct Gophers(Vec<Gopher>);

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
struct Gopher {
    id: i64,
    message: String,
}

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

#[derive(Clone, Default, Serialize, Deserialize)]
struct Version {
    number: i64,
    message: String,
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

trait Bark: Send + Sync {
    fn bark(&self) -> String;
}

type Speaker = Arc<dyn Bark>;

#[derive(Clone, Default)]
struct Maltese;

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

fn initial() -> Api {
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

fn app() -> TestApp {
    TestApp::new(Router::new(initial()).unwrap())
}

#[tokio::test]
async fn collection_get_includes_the_intruder() {
    let resp = app().get("/api/gophers").await.assert_ok();
    let gophers: Vec<Gopher> = resp.json();
    let ids: Vec<i64> = gophers.iter().map(|g| g.id).collect();
    assert_eq!(ids, [1, 2, 3, 4]);
    assert_eq!(gophers[3].message, "Intruder");
}

#[tokio::test]
async fn element_get_by_identifier() {
    let resp = app().get("/api/gophers/2").await.assert_ok();
    let gopher: Gopher = resp.json();
    assert_eq!(
        gopher,
        Gopher {
            id: 2,
            message: "I still love programming".into()
        }
    );
}

#[tokio::test]
async fn message_action_returns_bare_string() {
    let resp = app().get("/api/gophers/2/message").await.assert_ok();
    let message: String = resp.json();
    assert_eq!(message, "I still love programming");
}

#[tokio::test]
async fn missing_element_surfaces_constructor_fault() {
    let resp = app().get("/api/gophers/99/message").await.assert_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["string"], "");
    assert_eq!(body["error"], "Id 99 not found in gophers list");
}

#[tokio::test]
async fn version_constructor_sees_initial_state() {
    let resp = app().get("/api/version").await.assert_ok();
    let version: Version = resp.json();
    assert_eq!(version.message, "API version: 1");
}

#[tokio::test]
async fn capability_action_on_root() {
    let resp = app().get("/api/dogbark").await.assert_ok();
    let noise: String = resp.json();
    assert_eq!(noise, "yap-yap");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let resp = app().get("/api/unknown").await.assert_not_found();
    let body: serde_json::Value = resp.json();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn requests_are_isolated_from_each_other() {
    let app = app();
    for _ in 0..3 {
        let resp = app.get("/api/gophers").await.assert_ok();
        let gophers: Vec<Gopher> = resp.json();
        // Each request re-runs the constructor against a fresh clone of
        // the initial state, so the intruder never accumulates.
        assert_eq!(gophers.len(), 4);
    }
}

// ── structural rejection ───────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Looping {
    nested: Nested,
}

#[derive(Clone, Default)]
struct Nested;

impl Resource for Looping {
    fn schema(s: &mut Schema<Self>) {
        s.child("nested", |l| &l.nested);
    }
}

static LOOPING: std::sync::LazyLock<Looping> = std::sync::LazyLock::new(Looping::default);

impl Resource for Nested {
    fn schema(s: &mut Schema<Self>) {
        s.child("looping", |_| &*LOOPING);
    }
}

#[tokio::test]
async fn type_cycles_never_build() {
    let err = Router::new(Looping::default()).unwrap_err();
    assert!(matches!(err, BuildError::StructuralCycle { .. }));
}
