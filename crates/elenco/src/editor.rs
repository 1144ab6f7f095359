//! Read-only and form renderings of one resource.

use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::{ElencoResult, ValidationErrors};
use crate::kind::ResourceKind;
use crate::render::ItemRenderable;
use crate::resource::{Attributes, ClientId, Resource};
use crate::templates::TemplateRegistry;

/// What a sub-view needs to turn a resource into HTML.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub kind: &'a dyn ResourceKind,
    pub renderer: &'a dyn ItemRenderable,
    pub templates: &'a TemplateRegistry,
}

fn with_notification(mut context: Value, notification: Option<&str>) -> Value {
    if let (Value::Object(map), Some(html)) = (&mut context, notification) {
        map.insert("notification".to_string(), Value::from(html));
    }
    context
}

#[derive(Debug, Clone)]
pub struct DetailsView {
    cid: ClientId,
    html: String,
}

impl DetailsView {
    pub fn new(cid: ClientId) -> Self {
        Self {
            cid,
            html: String::new(),
        }
    }

    pub fn cid(&self) -> ClientId {
        self.cid
    }

    pub fn render(
        &mut self,
        resource: &Resource,
        ctx: &RenderContext<'_>,
        notification: Option<&str>,
    ) -> ElencoResult<&mut Self> {
        let context = ctx.renderer.details_context(ctx.kind, resource);
        let context = with_notification(context, notification);
        self.html = ctx.templates.render(ctx.renderer.details_template(), &context)?;
        Ok(self)
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

/// Form over a draft of one resource's fields.
///
/// The draft is never written to the resource until [`EditorView::commit`],
/// so abandoning the form leaves the resource untouched.
#[derive(Debug, Clone)]
pub struct EditorView {
    cid: ClientId,
    draft: Attributes,
    cleared: BTreeSet<String>,
    errors: ValidationErrors,
    html: String,
}

impl EditorView {
    pub fn new(resource: &Resource, kind: &dyn ResourceKind) -> Self {
        let draft = kind
            .fields()
            .iter()
            .filter_map(|field| {
                resource
                    .value(&field.name)
                    .map(|value| (field.name.clone(), value.clone()))
            })
            .collect();
        Self {
            cid: resource.cid(),
            draft,
            cleared: BTreeSet::new(),
            errors: ValidationErrors::new(),
            html: String::new(),
        }
    }

    pub fn cid(&self) -> ClientId {
        self.cid
    }

    /// Current form values.
    pub fn get_values(&self) -> &Attributes {
        &self.draft
    }

    pub fn set_values(&mut self, values: Attributes) {
        for (field, value) in values {
            self.set_value(field, value);
        }
    }

    pub fn set_value(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        self.cleared.remove(&field);
        self.draft.insert(field, value.into());
    }

    /// Empty the field so the kind's default applies again on commit.
    pub fn clear_value(&mut self, field: &str) {
        self.draft.remove(field);
        self.cleared.insert(field.to_string());
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn set_errors(&mut self, errors: ValidationErrors) {
        self.errors = errors;
    }

    pub fn clear_errors(&mut self) {
        self.errors = ValidationErrors::new();
    }

    /// Draft entries that differ from the resource's effective values.
    pub fn changes(&self, resource: &Resource) -> Attributes {
        self.draft
            .iter()
            .filter(|(field, value)| resource.value(field) != Some(*value))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }

    pub fn has_changes(&self, resource: &Resource) -> bool {
        !self.changes(resource).is_empty()
            || self.cleared.iter().any(|f| resource.is_explicitly_set(f))
    }

    /// Write the draft into the resource.
    pub fn commit(&self, resource: &mut Resource) {
        for field in &self.cleared {
            resource.clear(field);
        }
        let changes = self.changes(resource);
        resource.set_all(changes);
    }

    /// The resource as it would be after [`EditorView::commit`].
    pub fn preview(&self, resource: &Resource) -> Resource {
        let mut preview = resource.clone();
        self.commit(&mut preview);
        preview
    }

    /// Effective attributes after commit; what validation should look at.
    pub fn candidate(&self, resource: &Resource) -> Attributes {
        self.preview(resource).effective_attributes()
    }

    pub fn render(
        &mut self,
        resource: &Resource,
        ctx: &RenderContext<'_>,
        notification: Option<&str>,
    ) -> ElencoResult<&mut Self> {
        let preview = self.preview(resource);
        let context = ctx
            .renderer
            .editor_context(ctx.kind, &preview, &self.draft, &self.errors);
        let context = with_notification(context, notification);
        self.html = ctx.templates.render(ctx.renderer.editor_template(), &context)?;
        Ok(self)
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}
