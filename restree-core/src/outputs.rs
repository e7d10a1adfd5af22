//! Output rendering.
//!
//! An operation's return value is turned into a list of labeled JSON parts.
//! Absent parts (a `None` resource, an empty error slot) are dropped first;
//! then zero remaining parts answer `204 No Content`, one part is
//! serialized bare, and several parts become an object keyed by their
//! labels. Fault parts always serialize as their message string under the
//! `"error"`/`"errors"` keys.

use serde::Serialize;
use serde_json::Value;

use restree_http::{Body, HeaderValue, Json, Response, StatusCode, CONTENT_TYPE};

use crate::error::Fault;
use crate::params::{Errs, FirstErr, RespState, Res};
use crate::resource::Resource;
use crate::types::type_label;

/// One labeled response fragment.
pub struct OutPart {
    pub label: String,
    pub value: Value,
    /// Absent parts vanish from the response instead of rendering `null`.
    pub omit: bool,
}

/// A single output value of an operation.
pub trait Output {
    fn into_part(self) -> serde_json::Result<OutPart>;
}

macro_rules! impl_value_output {
    ( $( $t:ty ),* $(,)? ) => {
        $(
            impl Output for $t {
                fn into_part(self) -> serde_json::Result<OutPart> {
                    Ok(OutPart {
                        label: type_label::<$t>(),
                        value: serde_json::to_value(self)?,
                        omit: false,
                    })
                }
            }
        )*
    };
}

impl_value_output!(String, bool, i32, i64, u32, u64, usize, f64);

impl Output for Value {
    fn into_part(self) -> serde_json::Result<OutPart> {
        Ok(OutPart {
            label: "value".to_string(),
            value: self,
            omit: false,
        })
    }
}

/// Arbitrary serializable payloads, labeled by their type.
impl<T: Serialize + 'static> Output for Json<T> {
    fn into_part(self) -> serde_json::Result<OutPart> {
        Ok(OutPart {
            label: type_label::<T>(),
            value: serde_json::to_value(self.0)?,
            omit: false,
        })
    }
}

impl Output for Fault {
    fn into_part(self) -> serde_json::Result<OutPart> {
        Ok(OutPart {
            label: "error".to_string(),
            value: Value::String(self.message().to_string()),
            omit: false,
        })
    }
}

impl Output for Option<Fault> {
    fn into_part(self) -> serde_json::Result<OutPart> {
        match self {
            Some(fault) => fault.into_part(),
            None => Ok(OutPart {
                label: "error".to_string(),
                value: Value::Null,
                omit: true,
            }),
        }
    }
}

impl Output for FirstErr {
    fn into_part(self) -> serde_json::Result<OutPart> {
        self.0.into_part()
    }
}

impl Output for Errs {
    fn into_part(self) -> serde_json::Result<OutPart> {
        let messages: Vec<Value> = self
            .0
            .iter()
            .map(|f| Value::String(f.message().to_string()))
            .collect();
        Ok(OutPart {
            label: "errors".to_string(),
            value: Value::Array(messages),
            omit: false,
        })
    }
}

/// The live per-request instance, serialized as it stands after the
/// operation ran.
impl<T: Resource + Serialize> Output for Res<T> {
    fn into_part(self) -> serde_json::Result<OutPart> {
        Ok(OutPart {
            label: type_label::<T>(),
            value: serde_json::to_value(self.get())?,
            omit: false,
        })
    }
}

impl<T: Resource + Serialize> Output for Option<Res<T>> {
    fn into_part(self) -> serde_json::Result<OutPart> {
        match self {
            Some(res) => res.into_part(),
            None => Ok(OutPart {
                label: type_label::<T>(),
                value: Value::Null,
                omit: true,
            }),
        }
    }
}

// ── Return-type shapes ──────────────────────────────────────────────────────

/// A complete operation return value.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be returned from a routed operation",
    label = "not a renderable return type",
    note = "return a single `Output` value, a tuple of up to four of them, or `()`"
)]
pub trait IntoOutputs {
    fn into_outputs(self) -> serde_json::Result<Vec<OutPart>>;
}

impl IntoOutputs for () {
    fn into_outputs(self) -> serde_json::Result<Vec<OutPart>> {
        Ok(Vec::new())
    }
}

macro_rules! impl_single_into_outputs {
    ( $( $t:ty ),* $(,)? ) => {
        $(
            impl IntoOutputs for $t {
                fn into_outputs(self) -> serde_json::Result<Vec<OutPart>> {
                    Ok(vec![Output::into_part(self)?])
                }
            }
        )*
    };
}

impl_single_into_outputs!(
    String,
    bool,
    i32,
    i64,
    u32,
    u64,
    usize,
    f64,
    Value,
    Fault,
    Option<Fault>,
    FirstErr,
    Errs,
);

impl<T: Resource + Serialize> IntoOutputs for Res<T> {
    fn into_outputs(self) -> serde_json::Result<Vec<OutPart>> {
        Ok(vec![self.into_part()?])
    }
}

impl<T: Resource + Serialize> IntoOutputs for Option<Res<T>> {
    fn into_outputs(self) -> serde_json::Result<Vec<OutPart>> {
        Ok(vec![self.into_part()?])
    }
}

impl<T: Serialize + 'static> IntoOutputs for Json<T> {
    fn into_outputs(self) -> serde_json::Result<Vec<OutPart>> {
        Ok(vec![self.into_part()?])
    }
}

macro_rules! impl_tuple_into_outputs {
    ( $( $P:ident ),+ ) => {
        impl< $( $P: Output ),+ > IntoOutputs for ( $( $P, )+ ) {
            fn into_outputs(self) -> serde_json::Result<Vec<OutPart>> {
                #[allow(non_snake_case)]
                let ( $( $P, )+ ) = self;
                Ok(vec![ $( Output::into_part($P)? ),+ ])
            }
        }
    };
}

impl_tuple_into_outputs!(A, B);
impl_tuple_into_outputs!(A, B, C);
impl_tuple_into_outputs!(A, B, C, D);

// ── Response assembly ───────────────────────────────────────────────────────

fn json_response(status: StatusCode, body: String) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Standard `{"error": …}` body used for dispatch and encoding failures.
pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": message.into() });
    let text = serde_json::to_string_pretty(&body).unwrap_or_else(|_| String::from("{}"));
    json_response(status, text)
}

/// Assemble the final response from an operation's rendered parts.
pub(crate) fn respond(parts: Vec<OutPart>, overrides: &RespState) -> Response {
    let mut kept: Vec<OutPart> = parts.into_iter().filter(|p| !p.omit).collect();

    let (status, body) = if kept.is_empty() {
        (StatusCode::NO_CONTENT, String::new())
    } else {
        let value = if kept.len() == 1 {
            kept.remove(0).value
        } else {
            let mut map = serde_json::Map::new();
            for part in kept {
                map.insert(part.label, part.value);
            }
            Value::Object(map)
        };
        match serde_json::to_string_pretty(&value) {
            Ok(text) => (StatusCode::OK, text),
            Err(err) => {
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("response encoding failed: {err}"),
                )
            }
        }
    };

    let mut response = json_response(status, body);
    if let Some(forced) = overrides.status {
        *response.status_mut() = forced;
    }
    for (name, value) in &overrides.headers {
        response.headers_mut().insert(name.clone(), value.clone());
    }
    response
}
