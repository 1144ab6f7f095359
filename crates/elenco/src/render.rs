//! Rendering hooks a resource type can override.
//!
//! Views ask these traits for template names and template contexts. The
//! defaults cover every built-in kind; a resource that needs different
//! markup overrides one hook and keeps the rest.

use serde_json::{json, Value};

use crate::error::ValidationErrors;
use crate::kind::{FieldInput, ResourceKind};
use crate::resource::{display_value, item_label, Attributes, Resource};
use crate::templates::names;

pub trait ItemRenderable: Send + Sync {
    fn details_template(&self) -> &str {
        names::ITEM_DETAILS
    }

    fn editor_template(&self) -> &str {
        names::ITEM_EDITOR
    }

    fn details_context(&self, kind: &dyn ResourceKind, resource: &Resource) -> Value {
        let fields: Vec<Value> = kind
            .fields()
            .iter()
            .map(|field| {
                json!({
                    "name": field.name,
                    "label": field.label,
                    "value": resource.value(&field.name).map(display_value).unwrap_or_default(),
                    "explicit": resource.is_explicitly_set(&field.name),
                })
            })
            .collect();
        json!({
            "cid": resource.cid().to_string(),
            "id": resource.id().map(|id| id.to_value()),
            "kind": kind.name(),
            "label": label(kind, resource),
            "fields": fields,
        })
    }

    fn editor_context(
        &self,
        kind: &dyn ResourceKind,
        resource: &Resource,
        draft: &Attributes,
        errors: &ValidationErrors,
    ) -> Value {
        let fields: Vec<Value> = kind
            .fields()
            .iter()
            .map(|field| {
                let value = draft.get(&field.name).or_else(|| resource.value(&field.name));
                let shown = match (field.input, value) {
                    (FieldInput::List, Some(Value::Array(items))) => items
                        .iter()
                        .map(item_label)
                        .filter(|s| !s.is_empty())
                        .collect::<Vec<_>>()
                        .join("\n"),
                    (_, Some(v)) => display_value(v),
                    (_, None) => String::new(),
                };
                json!({
                    "name": field.name,
                    "label": field.label,
                    "input": field.input.as_str(),
                    "required": field.required,
                    "value": shown,
                    "checked": value.and_then(Value::as_bool).unwrap_or(false),
                    "error": errors.get(&field.name),
                })
            })
            .collect();
        let form_errors: Vec<&str> = errors
            .iter()
            .filter(|(key, _)| !kind.fields().iter().any(|f| f.name == *key))
            .map(|(_, message)| message)
            .collect();
        json!({
            "cid": resource.cid().to_string(),
            "id": resource.id().map(|id| id.to_value()),
            "kind": kind.name(),
            "is_new": resource.is_new(),
            "label": label(kind, resource),
            "fields": fields,
            "form_errors": form_errors,
        })
    }
}

pub trait ListRenderable: Send + Sync {
    fn list_template(&self) -> &str {
        names::LIST
    }

    fn empty_template(&self) -> &str {
        names::LIST_EMPTY
    }

    /// `items` are already-rendered item fragments, in set order.
    fn list_context(&self, kind: &dyn ResourceKind, items: Vec<String>, can_add: bool) -> Value {
        json!({
            "kind": kind.name(),
            "title": format!("{}s", kind.title()),
            "item_title": kind.title(),
            "items": items,
            "can_add": can_add,
        })
    }
}

/// Renderer with every hook at its default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRenderer;

impl ItemRenderable for DefaultRenderer {}

impl ListRenderable for DefaultRenderer {}

/// Heading for an item: its label field, or a placeholder while blank.
pub fn label(kind: &dyn ResourceKind, resource: &Resource) -> String {
    match resource.str_value(kind.label_field()).map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ if resource.is_new() => format!("New {}", kind.title()),
        _ => format!("Untitled {}", kind.title()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind;

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_label_placeholder() {
        let kind = kind::certificate();
        let resource = Resource::new(Attributes::new());
        assert_eq!(label(&kind, &resource), "New Certificate");

        let resource = Resource::from_server(json!({"id": 1, "name": " "})).unwrap();
        assert_eq!(label(&kind, &resource), "Untitled Certificate");

        let resource = Resource::from_server(json!({"id": 1, "name": "Honor"})).unwrap();
        assert_eq!(label(&kind, &resource), "Honor");
    }

    #[test]
    fn test_details_context_marks_defaults() {
        let kind = kind::certificate();
        let resource = Resource::from_server(json!({"id": 2, "name": "Honor"}))
            .unwrap()
            .with_defaults(kind.defaults());
        let ctx = DefaultRenderer.details_context(&kind, &resource);

        assert_eq!(ctx["id"], json!(2));
        let active = ctx["fields"]
            .as_array()
            .unwrap()
            .iter()
            .find(|f| f["name"] == "is_active")
            .unwrap();
        assert_eq!(active["value"], json!("No"));
        assert_eq!(active["explicit"], json!(false));
    }

    #[test]
    fn test_editor_context_prefers_draft_and_collects_form_errors() {
        let kind = kind::group_configuration();
        let resource = Resource::from_server(json!({"id": 3, "name": "A/B"})).unwrap();
        let draft = attrs(json!({"name": "A/B test", "groups": [{"name": "A"}, {"name": "B"}]}));
        let mut errors = ValidationErrors::new();
        errors.add("name", "Too long");
        errors.add("scheme", "Unknown scheme");

        let ctx = DefaultRenderer.editor_context(&kind, &resource, &draft, &errors);
        let fields = ctx["fields"].as_array().unwrap();
        assert_eq!(fields[0]["value"], json!("A/B test"));
        assert_eq!(fields[0]["error"], json!("Too long"));
        assert_eq!(fields[2]["value"], json!("A\nB"));
        assert_eq!(ctx["form_errors"], json!(["Unknown scheme"]));
        assert_eq!(ctx["is_new"], json!(false));
    }

    #[test]
    fn test_list_context() {
        let ctx = DefaultRenderer.list_context(&kind::textbook(), vec!["<p>x</p>".into()], true);
        assert_eq!(ctx["title"], json!("Textbooks"));
        assert_eq!(ctx["items"], json!(["<p>x</p>"]));
    }
}
