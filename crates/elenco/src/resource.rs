use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;
use uuid::Uuid;

use crate::error::TransportError;

/// Field name to JSON value.
pub type Attributes = Map<String, Value>;

/// Identifier assigned by the server on first save.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Int(i64),
    Text(String),
}

impl ResourceId {
    /// Read an id out of a JSON value. `null`, empty strings and other shapes are not ids.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(ResourceId::Int),
            Value::String(s) if !s.is_empty() => Some(ResourceId::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ResourceId::Int(n) => Value::from(*n),
            ResourceId::Text(s) => Value::from(s.clone()),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Int(n) => write!(f, "{n}"),
            ResourceId::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for ResourceId {
    fn from(n: i64) -> Self {
        ResourceId::Int(n)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        ResourceId::Text(s.to_string())
    }
}

/// Client-side handle for a resource. Stable for the resource's whole
/// in-memory life, including before the server assigns an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0.simple())
    }
}

/// One server-backed item.
///
/// `attributes` hold explicit values only; `defaults` show through for any
/// field without an explicit value. `synced` is the explicit state at load or
/// last successful save and is what dirty tracking compares against.
#[derive(Debug, Clone)]
pub struct Resource {
    cid: ClientId,
    id: Option<ResourceId>,
    attributes: Attributes,
    synced: Attributes,
    defaults: Attributes,
    editing: bool,
}

impl Resource {
    /// A new, unsaved resource.
    pub fn new(attributes: Attributes) -> Self {
        let mut attributes = attributes;
        attributes.remove("id");
        Self {
            cid: ClientId::new(),
            id: None,
            attributes,
            synced: Attributes::new(),
            defaults: Attributes::new(),
            editing: false,
        }
    }

    /// Build a persisted resource from a server payload.
    pub fn from_server(payload: Value) -> Result<Self, TransportError> {
        let Value::Object(mut attributes) = payload else {
            return Err(TransportError::Decode(
                "expected a JSON object for a resource".to_string(),
            ));
        };
        let id = attributes
            .remove("id")
            .as_ref()
            .and_then(ResourceId::from_value);
        Ok(Self {
            cid: ClientId::new(),
            id,
            synced: attributes.clone(),
            attributes,
            defaults: Attributes::new(),
            editing: false,
        })
    }

    pub fn with_defaults(mut self, defaults: Attributes) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn cid(&self) -> ClientId {
        self.cid
    }

    pub fn id(&self) -> Option<&ResourceId> {
        self.id.as_ref()
    }

    /// True until the first successful save.
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Effective value: explicit value, else the inherited default.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.attributes
            .get(field)
            .or_else(|| self.defaults.get(field))
    }

    /// Effective value as a string slice, if it is a string.
    pub fn str_value(&self, field: &str) -> Option<&str> {
        self.value(field).and_then(Value::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        if field == "id" {
            warn!(cid = %self.cid, "Ignoring attempt to set id as an attribute");
            return;
        }
        self.attributes.insert(field, value);
    }

    pub fn set_all(&mut self, values: Attributes) {
        for (field, value) in values {
            self.set(field, value);
        }
    }

    /// Explicit values only.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Defaults overlaid with explicit values.
    pub fn effective_attributes(&self) -> Attributes {
        let mut merged = self.defaults.clone();
        for (k, v) in &self.attributes {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }

    pub fn is_explicitly_set(&self, field: &str) -> bool {
        self.attributes.contains_key(field)
    }

    /// Drop the explicit value so the default shows through again.
    pub fn clear(&mut self, field: &str) -> Option<Value> {
        self.attributes.remove(field)
    }

    /// Value as last synced with the server, falling back to the default.
    pub fn original_value(&self, field: &str) -> Option<&Value> {
        self.synced.get(field).or_else(|| self.defaults.get(field))
    }

    pub fn is_dirty(&self) -> bool {
        self.attributes != self.synced
    }

    pub fn is_modified(&self, field: &str) -> bool {
        self.attributes.get(field) != self.synced.get(field)
    }

    /// Throw away unsaved edits.
    pub fn revert(&mut self) {
        self.attributes = self.synced.clone();
    }

    pub fn editing(&self) -> bool {
        self.editing
    }

    pub fn set_editing(&mut self, editing: bool) {
        self.editing = editing;
    }

    /// True when every listed field is blank.
    pub fn is_blank<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> bool {
        fields
            .into_iter()
            .all(|f| self.value(f).map(is_blank_value).unwrap_or(true))
    }

    /// Payload for the server. Never carries UI state.
    ///
    /// A field that was explicit at last sync and has since been cleared is
    /// sent as `null` so the server drops the override.
    pub fn to_json(&self) -> Value {
        let mut out = self.attributes.clone();
        for field in self.synced.keys() {
            if !out.contains_key(field) {
                out.insert(field.clone(), Value::Null);
            }
        }
        if let Some(id) = &self.id {
            out.insert("id".to_string(), id.to_value());
        }
        Value::Object(out)
    }

    /// Take the server's view of this resource after a successful save.
    pub fn apply_server_state(&mut self, payload: Value) -> Result<(), TransportError> {
        let Value::Object(mut attributes) = payload else {
            return Err(TransportError::Decode(
                "expected a JSON object for a saved resource".to_string(),
            ));
        };
        let server_id = attributes
            .remove("id")
            .as_ref()
            .and_then(ResourceId::from_value);
        if let Some(current) = &self.id {
            if let Some(other) = server_id.filter(|other| other != current) {
                warn!(
                    current = %current,
                    returned = %other,
                    "Server returned a different id; keeping the original"
                );
            }
        } else {
            let Some(id) = server_id else {
                return Err(TransportError::Decode(
                    "server did not assign an id to the new resource".to_string(),
                ));
            };
            self.id = Some(id);
        }
        self.attributes = attributes;
        self.synced = self.attributes.clone();
        Ok(())
    }
}

/// Blank means nothing a user typed: null, whitespace-only strings, and
/// arrays or objects whose members are all blank.
pub fn is_blank_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.iter().all(is_blank_value),
        Value::Object(map) => map.values().all(is_blank_value),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Render a value for read-only display.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(item_label)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

/// Display text for one member of a list field: its `name` or `title` when
/// it is an object.
pub fn item_label(item: &Value) -> String {
    match item {
        Value::Object(map) => map
            .get("name")
            .or_else(|| map.get("title"))
            .map(display_value)
            .unwrap_or_default(),
        other => display_value(other),
    }
}
