//! Header names, values, and the method/status vocabulary.

pub use http::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, HOST, LOCATION,
    USER_AGENT,
};
pub use http::{Method, StatusCode};
