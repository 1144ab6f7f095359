//! Named templates and the default markup for lists, items and editors.
//!
//! Views only ever call [`TemplateRegistry::render`] with a JSON context;
//! replace any entry to change the markup.

use maud::{html, Markup, PreEscaped, DOCTYPE};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::error::{ElencoError, ElencoResult};
use crate::resource::display_value;

pub mod names {
    pub const LIST: &str = "list";
    pub const LIST_EMPTY: &str = "list-empty";
    pub const ITEM_DETAILS: &str = "item-details";
    pub const ITEM_EDITOR: &str = "item-editor";
    pub const NOTIFICATION: &str = "notification";
    pub const PAGINATION: &str = "pagination";
}

pub type Template = Box<dyn Fn(&Value) -> Markup + Send + Sync>;

#[derive(Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, Template>,
}

impl fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.templates.keys().collect();
        keys.sort();
        f.debug_struct("TemplateRegistry").field("templates", &keys).finish()
    }
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in templates.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(names::LIST, list);
        registry.register(names::LIST_EMPTY, list_empty);
        registry.register(names::ITEM_DETAILS, item_details);
        registry.register(names::ITEM_EDITOR, item_editor);
        registry.register(names::NOTIFICATION, notification);
        registry.register(names::PAGINATION, pagination);
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, template: F) -> &mut Self
    where
        F: Fn(&Value) -> Markup + Send + Sync + 'static,
    {
        self.templates.insert(name.into(), Box::new(template));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn render(&self, name: &str, context: &Value) -> ElencoResult<String> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| ElencoError::MissingTemplate(name.to_string()))?;
        Ok(template(context).into_string())
    }
}

fn text(ctx: &Value, key: &str) -> String {
    ctx.get(key).map(display_value).unwrap_or_default()
}

fn flag(ctx: &Value, key: &str) -> bool {
    ctx.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn items<'a>(ctx: &'a Value, key: &str) -> &'a [Value] {
    ctx.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Pre-rendered fragment stored under `key`.
fn fragment(ctx: &Value, key: &str) -> Markup {
    PreEscaped(
        ctx.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    )
}

fn list(ctx: &Value) -> Markup {
    html! {
        section.resource-list data-kind=(text(ctx, "kind")) {
            header.list-header {
                h2 { (text(ctx, "title")) }
                @if flag(ctx, "can_add") {
                    button.action-add type="button" { "New " (text(ctx, "item_title")) }
                }
            }
            (fragment(ctx, "notification"))
            ol.list-items {
                @for item in items(ctx, "items") {
                    li.list-item { (PreEscaped(item.as_str().unwrap_or_default())) }
                }
            }
            (fragment(ctx, "pagination"))
        }
    }
}

fn list_empty(ctx: &Value) -> Markup {
    html! {
        section.resource-list.is-empty data-kind=(text(ctx, "kind")) {
            (fragment(ctx, "notification"))
            div.no-content {
                p { "You have not added any " (text(ctx, "item_title").to_lowercase()) " yet." }
                @if flag(ctx, "can_add") {
                    button.action-add.new-button type="button" {
                        "Add your first " (text(ctx, "item_title").to_lowercase())
                    }
                }
            }
            @if !items(ctx, "items").is_empty() {
                ol.list-items {
                    @for item in items(ctx, "items") {
                        li.list-item { (PreEscaped(item.as_str().unwrap_or_default())) }
                    }
                }
            }
        }
    }
}

fn item_details(ctx: &Value) -> Markup {
    html! {
        article.item-details data-cid=(text(ctx, "cid")) data-id=(text(ctx, "id")) {
            header {
                h3.item-title { (text(ctx, "label")) }
            }
            (fragment(ctx, "notification"))
            dl.item-fields {
                @for field in items(ctx, "fields") {
                    dt { (text(field, "label")) }
                    dd.is-default[!flag(field, "explicit")] { (text(field, "value")) }
                }
            }
            div.actions {
                button.action-edit type="button" { "Edit" }
                button.action-delete type="button" { "Delete" }
            }
        }
    }
}

fn item_editor(ctx: &Value) -> Markup {
    html! {
        form.item-editor data-cid=(text(ctx, "cid")) {
            h3.item-title { (text(ctx, "label")) }
            (fragment(ctx, "notification"))
            @if !items(ctx, "form_errors").is_empty() {
                ul.form-errors {
                    @for message in items(ctx, "form_errors") {
                        li { (display_value(message)) }
                    }
                }
            }
            @for field in items(ctx, "fields") {
                @let name = text(field, "name");
                @let widget = text(field, "input");
                @let error = field.get("error").and_then(Value::as_str);
                div.field.has-error[error.is_some()] {
                    label for={"field-" (name)} {
                        (text(field, "label"))
                        @if flag(field, "required") { " *" }
                    }
                    @match widget.as_str() {
                        "checkbox" => {
                            input type="checkbox" id={"field-" (name)} name=(name) checked[flag(field, "checked")];
                        },
                        "textarea" | "list" => {
                            textarea id={"field-" (name)} name=(name) { (text(field, "value")) }
                        },
                        "number" => {
                            input type="number" id={"field-" (name)} name=(name) value=(text(field, "value"));
                        },
                        _ => {
                            input type="text" id={"field-" (name)} name=(name) value=(text(field, "value"));
                        },
                    }
                    @if let Some(error) = error {
                        span.field-error { (error) }
                    }
                }
            }
            div.actions {
                button.action-primary type="submit" {
                    @if flag(ctx, "is_new") { "Create" } @else { "Save" }
                }
                button.action-cancel type="button" { "Cancel" }
            }
        }
    }
}

fn notification(ctx: &Value) -> Markup {
    html! {
        div class={"notification notification-" (text(ctx, "level"))} role="alert" {
            p { (text(ctx, "message")) }
        }
    }
}

fn pagination(ctx: &Value) -> Markup {
    html! {
        nav.pagination {
            @if flag(ctx, "has_previous") {
                button.previous-page type="button" { "Previous" }
            }
            span.page-number { "Page " (text(ctx, "current")) " of " (text(ctx, "total")) }
            @if let (Some(count), Some(last)) = (
                ctx.get("count").and_then(Value::as_u64),
                ctx.get("last").and_then(Value::as_u64),
            ) {
                span.total-count { " (" (text(ctx, "first")) "-" (last) " of " (count) ")" }
            }
            @if flag(ctx, "has_next") {
                button.next-page type="button" { "Next" }
            }
        }
    }
}

/// Standalone HTML page around a rendered list.
pub fn render_document(title: &str, body: &str) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(CSS)) }
            }
            body {
                main.container {
                    (PreEscaped(body))
                }
            }
        }
    }
}

const CSS: &str = r#"
* {
    margin: 0;
    padding: 0;
    box-sizing: border-box;
}

body {
    font-family: -apple-system, BlinkMacSystemFont, sans-serif;
    background: #f5f5f5;
    color: #222;
    line-height: 1.4;
}

.container {
    max-width: 960px;
    margin: 0 auto;
    padding: 40px 24px 60px;
}

.list-header {
    display: flex;
    justify-content: space-between;
    align-items: center;
    margin-bottom: 24px;
}

.list-items {
    list-style: none;
    display: grid;
    gap: 16px;
}

.item-details, .item-editor {
    background: #fff;
    border: 1px solid #ddd;
    padding: 20px;
}

.item-fields {
    display: grid;
    grid-template-columns: max-content 1fr;
    gap: 4px 16px;
    margin: 12px 0;
}

.item-fields dt {
    font-weight: 700;
}

.is-default {
    color: #888;
    font-style: italic;
}

.field {
    margin-bottom: 12px;
}

.field label {
    display: block;
    font-weight: 700;
}

.has-error input, .has-error textarea {
    border-color: #c00;
}

.field-error, .form-errors {
    color: #c00;
    font-size: 0.85em;
}

.notification {
    padding: 8px 12px;
    margin-bottom: 12px;
}

.notification-error {
    background: #fde8e8;
    border-left: 4px solid #c00;
}

.notification-info {
    background: #e8f1fd;
    border-left: 4px solid #0a58ca;
}

.no-content {
    padding: 60px 20px;
    text-align: center;
    color: #666;
}

.pagination {
    display: flex;
    gap: 12px;
    align-items: center;
    margin-top: 24px;
}
"#;
