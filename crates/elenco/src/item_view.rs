//! One row of a list: details or editor, and the lifecycle between them.

use std::sync::Arc;
use tracing::{debug, info};

use crate::collection::ResourceSet;
use crate::editor::{DetailsView, EditorView, RenderContext};
use crate::error::{ElencoError, ElencoResult, TransportError, ValidationErrors};
use crate::notification::Notification;
use crate::render::{label, ItemRenderable};
use crate::resource::{ClientId, Resource};
use crate::templates::{names, TemplateRegistry};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Details,
    Editing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Saved,
    /// Nothing was sent; the errors are shown in the form.
    Invalid(ValidationErrors),
    /// The server refused or could not be reached; the form stays open.
    Failed(TransportError),
    NotEditing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The resource was never saved and has left the set.
    Removed,
    /// Unsaved edits were thrown away.
    Reverted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Deleted,
    Declined,
    /// The resource is back in the set and shows an error.
    Failed(TransportError),
    /// Deleting is only offered from the details state.
    NotAllowed,
}

/// Asks the user to confirm a destructive action.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

pub struct ItemView {
    cid: ClientId,
    renderer: Arc<dyn ItemRenderable>,
    templates: Arc<TemplateRegistry>,
    details: DetailsView,
    editor: Option<EditorView>,
    notification: Option<Notification>,
}

impl ItemView {
    /// A view for `resource`, opening the editor if the resource is being edited.
    pub fn new<T: Transport>(
        set: &ResourceSet<T>,
        cid: ClientId,
        renderer: Arc<dyn ItemRenderable>,
        templates: Arc<TemplateRegistry>,
    ) -> ElencoResult<Self> {
        let resource = lookup(set, cid)?;
        let editor = resource
            .editing()
            .then(|| EditorView::new(resource, set.kind()));
        Ok(Self {
            cid,
            renderer,
            templates,
            details: DetailsView::new(cid),
            editor,
            notification: None,
        })
    }

    pub fn cid(&self) -> ClientId {
        self.cid
    }

    pub fn state(&self) -> ItemState {
        if self.editor.is_some() {
            ItemState::Editing
        } else {
            ItemState::Details
        }
    }

    pub fn editor(&self) -> Option<&EditorView> {
        self.editor.as_ref()
    }

    pub fn editor_mut(&mut self) -> Option<&mut EditorView> {
        self.editor.as_mut()
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn dismiss_notification(&mut self) {
        self.notification = None;
    }

    /// HTML from the last render.
    pub fn html(&self) -> &str {
        match &self.editor {
            Some(editor) => editor.html(),
            None => self.details.html(),
        }
    }

    pub fn render<T: Transport>(&mut self, set: &ResourceSet<T>) -> ElencoResult<&str> {
        let resource = lookup(set, self.cid)?;
        let notification = match &self.notification {
            Some(note) => Some(self.templates.render(names::NOTIFICATION, &note.to_context())?),
            None => None,
        };
        let ctx = RenderContext {
            kind: set.kind(),
            renderer: &*self.renderer,
            templates: &self.templates,
        };
        let html = match &mut self.editor {
            Some(editor) => editor.render(resource, &ctx, notification.as_deref())?.html(),
            None => self
                .details
                .render(resource, &ctx, notification.as_deref())?
                .html(),
        };
        Ok(html)
    }

    /// Details to Editing.
    pub fn edit<T: Transport>(&mut self, set: &mut ResourceSet<T>) -> ElencoResult<()> {
        if self.editor.is_none() {
            let editor = EditorView::new(lookup(set, self.cid)?, set.kind());
            lookup_mut(set, self.cid)?.set_editing(true);
            self.editor = Some(editor);
            self.notification = None;
        }
        self.render(set)?;
        Ok(())
    }

    /// Leave the editor. A resource that was never saved leaves the set.
    pub async fn cancel<T: Transport>(
        &mut self,
        set: &mut ResourceSet<T>,
    ) -> ElencoResult<CancelOutcome> {
        if lookup(set, self.cid)?.is_new() {
            set.remove(self.cid).await?;
            self.editor = None;
            debug!(cid = %self.cid, "Cancelled add");
            return Ok(CancelOutcome::Removed);
        }

        let resource = lookup_mut(set, self.cid)?;
        resource.revert();
        resource.set_editing(false);
        self.editor = None;
        self.notification = None;
        self.render(set)?;
        Ok(CancelOutcome::Reverted)
    }

    /// Validate the form, commit it and save. Editing to Details on success.
    pub async fn submit<T: Transport>(
        &mut self,
        set: &mut ResourceSet<T>,
    ) -> ElencoResult<SubmitOutcome> {
        let Some(editor) = self.editor.as_mut() else {
            return Ok(SubmitOutcome::NotEditing);
        };

        let candidate = editor.candidate(lookup(set, self.cid)?);
        if let Err(errors) = set.validate_attributes(&candidate) {
            return self.show_invalid(set, errors);
        }
        editor.clear_errors();
        editor.commit(lookup_mut(set, self.cid)?);

        match set.save(self.cid).await {
            Ok(()) => {
                lookup_mut(set, self.cid)?.set_editing(false);
                self.editor = None;
                self.notification = None;
                self.render(set)?;
                Ok(SubmitOutcome::Saved)
            }
            Err(ElencoError::Validation(errors)) => self.show_invalid(set, errors),
            Err(err) => {
                let source = err.into_transport()?;
                self.notification = Some(Notification::from_transport(&source));
                self.render(set)?;
                Ok(SubmitOutcome::Failed(source))
            }
        }
    }

    fn show_invalid<T: Transport>(
        &mut self,
        set: &ResourceSet<T>,
        errors: ValidationErrors,
    ) -> ElencoResult<SubmitOutcome> {
        debug!(cid = %self.cid, errors = %errors, "Form is invalid");
        if let Some(editor) = self.editor.as_mut() {
            editor.set_errors(errors.clone());
        }
        self.render(set)?;
        Ok(SubmitOutcome::Invalid(errors))
    }

    /// Delete after confirmation. Only from the details state.
    pub async fn delete<T: Transport>(
        &mut self,
        set: &mut ResourceSet<T>,
        confirm: &impl Confirm,
    ) -> ElencoResult<DeleteOutcome> {
        if self.editor.is_some() {
            return Ok(DeleteOutcome::NotAllowed);
        }
        let prompt = format!(
            "Delete \"{}\"? This action cannot be undone.",
            label(set.kind(), lookup(set, self.cid)?)
        );
        if !confirm.confirm(&prompt) {
            return Ok(DeleteOutcome::Declined);
        }

        match set.remove(self.cid).await {
            Ok(_) => {
                info!(cid = %self.cid, "Item deleted");
                Ok(DeleteOutcome::Deleted)
            }
            Err(err) => {
                let source = err.into_transport()?;
                self.notification = Some(Notification::from_transport(&source));
                self.render(set)?;
                Ok(DeleteOutcome::Failed(source))
            }
        }
    }
}

fn lookup<T: Transport>(set: &ResourceSet<T>, cid: ClientId) -> ElencoResult<&Resource> {
    set.get(cid).ok_or(ElencoError::UnknownResource(cid))
}

fn lookup_mut<T: Transport>(
    set: &mut ResourceSet<T>,
    cid: ClientId,
) -> ElencoResult<&mut Resource> {
    set.get_mut(cid).ok_or(ElencoError::UnknownResource(cid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind;
    use crate::memory::{MemoryTransport, Operation};
    use crate::render::DefaultRenderer;
    use crate::transport::Endpoint;
    use serde_json::json;

    fn certificates(transport: &MemoryTransport) -> ResourceSet<MemoryTransport> {
        ResourceSet::new(
            Arc::new(kind::certificate()),
            Endpoint::new("/api/certificates"),
            Arc::new(transport.clone()),
        )
    }

    fn view(set: &ResourceSet<MemoryTransport>, cid: ClientId) -> ItemView {
        ItemView::new(
            set,
            cid,
            Arc::new(DefaultRenderer),
            Arc::new(TemplateRegistry::with_defaults()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_edit_then_cancel_reverts() {
        let transport = MemoryTransport::new();
        let mut set = certificates(&transport);
        set.reset(vec![json!({"id": 1, "name": "Honor"})]).unwrap();
        let cid = set.iter().next().unwrap().cid();
        let mut item = view(&set, cid);
        assert_eq!(item.state(), ItemState::Details);

        item.edit(&mut set).unwrap();
        assert!(set.get(cid).unwrap().editing());
        item.editor_mut().unwrap().set_value("name", "Changed");

        assert_eq!(item.cancel(&mut set).await.unwrap(), CancelOutcome::Reverted);
        assert_eq!(item.state(), ItemState::Details);
        assert_eq!(set.get(cid).unwrap().str_value("name"), Some("Honor"));
        assert!(item.html().contains("Honor"));
    }

    #[tokio::test]
    async fn test_submit_invalid_sends_nothing() {
        let transport = MemoryTransport::new();
        let mut set = certificates(&transport);
        let cid = set.add(Default::default()).unwrap();
        let mut item = view(&set, cid);
        assert_eq!(item.state(), ItemState::Editing);

        let outcome = item.submit(&mut set).await.unwrap();
        let SubmitOutcome::Invalid(errors) = outcome else {
            panic!("expected invalid, got {outcome:?}");
        };
        assert_eq!(errors.get("name"), Some("Certificate name is required."));
        assert!(transport.requests().is_empty());
        assert!(item.html().contains("Certificate name is required."));
    }

    #[tokio::test]
    async fn test_submit_failure_keeps_editor_open() {
        let transport = MemoryTransport::new();
        let mut set = certificates(&transport);
        let cid = set.add(Default::default()).unwrap();
        let mut item = view(&set, cid);
        item.editor_mut().unwrap().set_value("name", "Midterm");
        transport.fail_next(
            Operation::Create,
            TransportError::Status {
                status: 400,
                body: json!({"error": "Name already taken"}),
            },
        );

        let outcome = item.submit(&mut set).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Failed(_)));
        assert_eq!(item.state(), ItemState::Editing);
        assert_eq!(item.notification().unwrap().message, "Name already taken");
        assert!(item.html().contains("Name already taken"));

        assert_eq!(item.submit(&mut set).await.unwrap(), SubmitOutcome::Saved);
        assert_eq!(item.state(), ItemState::Details);
        assert!(item.notification().is_none());
        assert!(set.get(cid).unwrap().id().is_some());
    }

    #[tokio::test]
    async fn test_delete_confirmation() {
        let transport = MemoryTransport::with_records(vec![json!({"name": "Honor"})]);
        let mut set = certificates(&transport);
        set.fetch().await.unwrap();
        let cid = set.iter().next().unwrap().cid();
        let mut item = view(&set, cid);

        let declined = item.delete(&mut set, &|_: &str| false).await.unwrap();
        assert_eq!(declined, DeleteOutcome::Declined);
        assert_eq!(transport.request_count(Operation::Delete), 0);

        let asked = std::cell::RefCell::new(String::new());
        let confirm = |prompt: &str| {
            asked.replace(prompt.to_string());
            true
        };
        assert_eq!(item.delete(&mut set, &confirm).await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(asked.borrow().as_str(), "Delete \"Honor\"? This action cannot be undone.");
        assert_eq!(set.len(), 0);
    }

    #[tokio::test]
    async fn test_delete_not_allowed_while_editing() {
        let transport = MemoryTransport::new();
        let mut set = certificates(&transport);
        set.reset(vec![json!({"id": 1, "name": "Honor"})]).unwrap();
        let cid = set.iter().next().unwrap().cid();
        let mut item = view(&set, cid);
        item.edit(&mut set).unwrap();

        let outcome = item.delete(&mut set, &|_: &str| true).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::NotAllowed);
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn test_render_unknown_resource() {
        let transport = MemoryTransport::new();
        let mut set = certificates(&transport);
        set.reset(vec![json!({"id": 1, "name": "Honor"})]).unwrap();
        let cid = set.iter().next().unwrap().cid();
        let mut item = view(&set, cid);
        set.reset(Vec::new()).unwrap();

        assert!(matches!(
            item.render(&set),
            Err(ElencoError::UnknownResource(_))
        ));
    }
}
