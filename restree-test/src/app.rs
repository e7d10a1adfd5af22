use bytes::Bytes;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use restree_core::http::Body;
use restree_core::Router;
use serde::de::DeserializeOwned;
use tower::util::ServiceExt;

/// In-process HTTP test client wrapping a restree [`Router`].
///
/// Uses `tower::ServiceExt::oneshot` to dispatch requests without binding
/// to a TCP port.
pub struct TestApp {
    router: Router,
}

impl TestApp {
    /// Create a `TestApp` from a built `Router`.
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    /// Send an arbitrary request.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("failed to send request");

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("failed to read response body")
            .to_bytes();

        TestResponse { status, body }
    }

    /// Send a GET request to the given path.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.bodyless(Method::GET, path).await
    }

    /// Send a POST request to the given path.
    pub async fn post(&self, path: &str) -> TestResponse {
        self.bodyless(Method::POST, path).await
    }

    /// Send a PUT request to the given path.
    pub async fn put(&self, path: &str) -> TestResponse {
        self.bodyless(Method::PUT, path).await
    }

    /// Send a DELETE request to the given path.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.bodyless(Method::DELETE, path).await
    }

    /// Send a HEAD request to the given path.
    pub async fn head(&self, path: &str) -> TestResponse {
        self.bodyless(Method::HEAD, path).await
    }

    async fn bodyless(&self, method: Method, path: &str) -> TestResponse {
        let req = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }
}

/// Response wrapper with assertion helpers.
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl TestResponse {
    /// Assert status is 200 OK. Returns `self` for chaining.
    pub fn assert_ok(self) -> Self {
        assert_eq!(self.status, StatusCode::OK, "Expected 200 OK, got {}", self.status);
        self
    }

    /// Assert status is 204 No Content.
    pub fn assert_no_content(self) -> Self {
        assert_eq!(
            self.status,
            StatusCode::NO_CONTENT,
            "Expected 204 No Content, got {}",
            self.status
        );
        self
    }

    /// Assert status is 404 Not Found.
    pub fn assert_not_found(self) -> Self {
        assert_eq!(
            self.status,
            StatusCode::NOT_FOUND,
            "Expected 404 Not Found, got {}",
            self.status
        );
        self
    }

    /// Assert the response has a specific status code.
    pub fn assert_status(self, expected: StatusCode) -> Self {
        assert_eq!(self.status, expected, "Expected {expected}, got {}", self.status);
        self
    }

    /// Deserialize the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|e| panic!("Failed to parse JSON: {e}\nBody: {}", self.text()))
    }

    /// Return the response body as a UTF-8 string.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}
