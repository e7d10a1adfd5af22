use restree_core::prelude::*;
use restree_test::TestApp;

#[derive(Clone, Default, serde::Serialize)]
struct Api {
    greeting: Greeting,
}

impl Resource for Api {
    fn schema(s: &mut Schema<Self>) {
        s.child("greeting", |a| &a.greeting);
    }
}

#[derive(Clone, Default, serde::Serialize)]
#[serde(transparent)]
struct Greeting(String);

fn greeting_get(g: Res<Greeting>) -> Res<Greeting> {
    g
}

fn greeting_clear() {}

impl Resource for Greeting {
    fn schema(s: &mut Schema<Self>) {
        s.route("GET", greeting_get);
        s.route("DELETE", greeting_clear);
    }
}

fn app() -> TestApp {
    let api = Api {
        greeting: Greeting("hello".into()),
    };
    TestApp::new(Router::new(api).unwrap())
}

#[tokio::test]
async fn get_returns_json_body() {
    let resp = app().get("/api/greeting").await.assert_ok();
    let body: String = resp.json();
    assert_eq!(body, "hello");
}

#[tokio::test]
async fn missing_route_asserts_not_found() {
    app().get("/api/nowhere").await.assert_not_found();
}

#[tokio::test]
async fn empty_operation_is_no_content() {
    let resp = app().delete("/api/greeting").await.assert_no_content();
    assert!(resp.text().is_empty());
}
