//! In-memory sink recording every request, for dry runs and tests.

use super::{HttpMethod, MetadataRequest, MetadataSink};
use crate::models::EntityKind;
use crate::{Error, Result};
use serde_json::{Value, json};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// Behaviour configured for one entity kind.
#[derive(Debug, Clone, PartialEq)]
enum Reply {
    /// Answer with an empty body, as a backend does when it rejects a record.
    Reject,
    /// Fail at the transport level.
    Disconnect,
}

/// Sink that accepts everything unless told otherwise.
///
/// POSTs echo the body back with an `id` assigned to each object. GETs
/// answer with the canned response registered for the entity, or `[]`.
#[derive(Debug, Default)]
pub struct MemorySink {
    requests: RefCell<Vec<MetadataRequest>>,
    replies: HashMap<EntityKind, Reply>,
    responses: HashMap<EntityKind, Value>,
    next_id: Cell<i64>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer POSTs of `entity` with an empty body.
    #[must_use]
    pub fn rejecting(mut self, entity: EntityKind) -> Self {
        self.replies.insert(entity, Reply::Reject);
        self
    }

    /// Fail every request for `entity` with a connection error.
    #[must_use]
    pub fn disconnected(mut self, entity: EntityKind) -> Self {
        self.replies.insert(entity, Reply::Disconnect);
        self
    }

    /// Canned body for GETs of `entity`.
    #[must_use]
    pub fn with_response(mut self, entity: EntityKind, body: Value) -> Self {
        self.responses.insert(entity, body);
        self
    }

    /// Every request received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<MetadataRequest> {
        self.requests.borrow().clone()
    }

    /// Bodies of the POSTs received for `entity`.
    #[must_use]
    pub fn posted(&self, entity: EntityKind) -> Vec<Value> {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.method() == HttpMethod::Post && r.entity() == entity)
            .filter_map(|r| r.body().cloned())
            .collect()
    }

    fn assign_id(&self, mut value: Value) -> Value {
        match &mut value {
            Value::Object(fields) => {
                let id = self.next_id.get() + 1;
                self.next_id.set(id);
                fields.insert("id".to_string(), json!(id));
            }
            Value::Array(items) => {
                for item in items.iter_mut() {
                    let taken = std::mem::take(item);
                    *item = self.assign_id(taken);
                }
            }
            _ => {}
        }
        value
    }
}

impl MetadataSink for MemorySink {
    fn send(&self, request: &MetadataRequest) -> Result<Value> {
        self.requests.borrow_mut().push(request.clone());
        log::debug!(
            "MemorySink received {} {} ({} params)",
            request.method(),
            request.endpoint(),
            request.params().len()
        );

        match self.replies.get(&request.entity()) {
            Some(Reply::Disconnect) => {
                return Err(Error::Connection(format!(
                    "{} is unavailable",
                    request.endpoint()
                )));
            }
            Some(Reply::Reject) if request.method() == HttpMethod::Post => {
                return Ok(Value::String(String::new()));
            }
            _ => {}
        }

        Ok(match request.method() {
            HttpMethod::Get => self
                .responses
                .get(&request.entity())
                .cloned()
                .unwrap_or_else(|| json!([])),
            HttpMethod::Post => self.assign_id(request.body().cloned().unwrap_or(Value::Null)),
        })
    }
}
