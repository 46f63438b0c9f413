//! Metadata sinks: where drive, file and delivery records are submitted.
//!
//! The backend speaks plain JSON over `GET`/`POST` against one endpoint per
//! entity kind. A sink returns the decoded response body; callers decide
//! whether a falsy body counts as a rejection.

use crate::models::EntityKind;
use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

pub mod http;
pub mod memory;

/// HTTP methods the backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request to the metadata backend.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRequest {
    method: HttpMethod,
    entity: EntityKind,
    body: Option<Value>,
    params: Vec<(String, String)>,
}

impl MetadataRequest {
    /// `POST` a serialized record (or list of records) of `entity`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if `payload` does not serialize to JSON.
    pub fn post<T: Serialize + ?Sized>(entity: EntityKind, payload: &T) -> Result<Self> {
        let body = serde_json::to_value(payload)
            .map_err(|e| Error::InvalidInput(format!("cannot serialize {entity} payload: {e}")))?;
        Ok(Self {
            method: HttpMethod::Post,
            entity,
            body: Some(body),
            params: Vec::new(),
        })
    }

    /// `GET` `entity` filtered by query parameters.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if a parameter is not a queryable
    /// attribute of `entity`.
    pub fn get<K, V>(entity: EntityKind, params: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let params: Vec<(String, String)> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let allowed = entity.attributes();
        if let Some((bad, _)) = params.iter().find(|(k, _)| !allowed.contains(&k.as_str())) {
            return Err(Error::InvalidInput(format!(
                "'{bad}' is not a queryable attribute of {entity}"
            )));
        }

        Ok(Self {
            method: HttpMethod::Get,
            entity,
            body: None,
            params,
        })
    }

    #[must_use]
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    #[must_use]
    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Endpoint path relative to the backend root.
    #[must_use]
    pub fn endpoint(&self) -> String {
        self.entity.endpoint()
    }
}

/// Destination for metadata requests.
pub trait MetadataSink {
    /// Send one request and return the decoded response body.
    ///
    /// # Errors
    /// Transport and decoding failures. A reachable backend that answers with
    /// an empty body is not an error; see [`is_truthy`].
    fn send(&self, request: &MetadataRequest) -> Result<Value>;
}

impl<S: MetadataSink + ?Sized> MetadataSink for &S {
    fn send(&self, request: &MetadataRequest) -> Result<Value> {
        (**self).send(request)
    }
}

/// Whether a response body signals success: not null, `false`, zero or empty.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}
