//! In-process stand-in for a REST collection.
//!
//! Honors the same contract as the HTTP endpoints: list (bare array, or a
//! paged envelope when a `page` parameter is present), create assigns an
//! integer id, update and delete address `{base}/{id}`. Failures can be
//! queued per operation. Pages are 1-based unless built with
//! [`MemoryTransport::zero_based`].

use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::TransportError;
use crate::resource::ResourceId;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Create,
    Update,
    Delete,
}

/// One request as seen by the fake server.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub operation: Operation,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: Vec<Value>,
    next_id: i64,
    failures: VecDeque<(Operation, TransportError)>,
    requests: Vec<Request>,
    zero_based: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed records. Records without an id get one.
    pub fn with_records(records: Vec<Value>) -> Self {
        let transport = Self::new();
        {
            let mut state = transport.lock();
            for record in records {
                let record = assign_id(&mut state, record);
                state.records.push(record);
            }
        }
        transport
    }

    /// Read the `page` parameter as 0-based, to pair with `PageConfig::zero_based`.
    pub fn zero_based(self) -> Self {
        self.lock().zero_based = true;
        self
    }

    /// Make the next `operation` fail with `error`.
    pub fn fail_next(&self, operation: Operation, error: TransportError) {
        self.lock().failures.push_back((operation, error));
    }

    pub fn records(&self) -> Vec<Value> {
        self.lock().records.clone()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self, operation: Operation) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.operation == operation)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Log the request and pop a queued failure for it, if any.
    fn begin(
        &self,
        operation: Operation,
        url: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<MutexGuard<'_, MemoryState>, TransportError> {
        let mut state = self.lock();
        state.requests.push(Request {
            operation,
            url: url.to_string(),
            query: query.to_vec(),
            body: body.cloned(),
        });
        if let Some(pos) = state.failures.iter().position(|(op, _)| *op == operation) {
            if let Some((_, error)) = state.failures.remove(pos) {
                return Err(error);
            }
        }
        Ok(state)
    }
}

fn assign_id(state: &mut MemoryState, record: Value) -> Value {
    let mut record = match record {
        Value::Object(map) => map,
        other => return other,
    };
    match record.get("id").and_then(ResourceId::from_value) {
        Some(ResourceId::Int(n)) => state.next_id = state.next_id.max(n),
        Some(ResourceId::Text(_)) => {}
        None => {
            state.next_id += 1;
            record.insert("id".to_string(), json!(state.next_id));
        }
    }
    Value::Object(record)
}

fn id_from_url(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or("")
}

fn matches_id(record: &Value, id: &str) -> bool {
    record
        .get("id")
        .and_then(ResourceId::from_value)
        .map(|rid| rid.to_string() == id)
        .unwrap_or(false)
}

fn not_found(id: &str) -> TransportError {
    TransportError::Status {
        status: 404,
        body: json!({"error": format!("No resource with id {id}.")}),
    }
}

fn query_number(query: &[(String, String)], key: &str) -> Option<usize> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| v.parse().ok())
}

impl Transport for MemoryTransport {
    async fn list(&self, url: &str, query: &[(String, String)]) -> Result<Value, TransportError> {
        let state = self.begin(Operation::List, url, query, None)?;
        let Some(page) = query_number(query, "page") else {
            return Ok(Value::Array(state.records.clone()));
        };
        let page_size = query_number(query, "page_size").unwrap_or(20).max(1);
        let count = state.records.len();
        let num_pages = count.div_ceil(page_size).max(1);
        let index = if state.zero_based {
            page
        } else {
            page.saturating_sub(1)
        };
        let results: Vec<Value> = state
            .records
            .iter()
            .skip(index * page_size)
            .take(page_size)
            .cloned()
            .collect();
        Ok(json!({
            "results": results,
            "count": count,
            "num_pages": num_pages,
            "current_page": page,
        }))
    }

    async fn create(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        let mut state = self.begin(Operation::Create, url, &[], Some(body))?;
        let mut record = body.clone();
        if let Value::Object(map) = &mut record {
            map.remove("id");
        }
        let record = assign_id(&mut state, record);
        state.records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        let mut state = self.begin(Operation::Update, url, &[], Some(body))?;
        let id = id_from_url(url);
        let record = state
            .records
            .iter_mut()
            .find(|r| matches_id(r, id))
            .ok_or_else(|| not_found(id))?;
        if let (Value::Object(existing), Value::Object(changes)) = (&mut *record, body) {
            for (key, value) in changes {
                if key == "id" {
                    continue;
                }
                if value.is_null() {
                    existing.remove(key);
                } else {
                    existing.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(record.clone())
    }

    async fn delete(&self, url: &str) -> Result<(), TransportError> {
        let mut state = self.begin(Operation::Delete, url, &[], None)?;
        let id = id_from_url(url);
        let pos = state
            .records
            .iter()
            .position(|r| matches_id(r, id))
            .ok_or_else(|| not_found(id))?;
        state.records.remove(pos);
        Ok(())
    }
}
