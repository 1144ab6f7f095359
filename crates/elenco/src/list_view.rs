//! A whole set rendered as a list of item views.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::collection::{FetchStatus, ResourceSet};
use crate::error::{ElencoError, ElencoResult, TransportError};
use crate::events::{SetEvent, Subscription};
use crate::item_view::{CancelOutcome, Confirm, DeleteOutcome, ItemView, SubmitOutcome};
use crate::notification::Notification;
use crate::pagination::PageState;
use crate::render::{DefaultRenderer, ItemRenderable, ListRenderable};
use crate::resource::{Attributes, ClientId, Resource};
use crate::templates::{names, TemplateRegistry};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListState {
    /// Nothing but blank items; the "add your first" prompt shows.
    Empty,
    Populated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded,
    /// Superseded by a later request.
    Stale,
    OutOfRange,
    /// The list kept its previous contents and shows an error.
    Failed(TransportError),
}

pub struct ListView {
    renderer: Arc<dyn ListRenderable>,
    item_renderer: Arc<dyn ItemRenderable>,
    templates: Arc<TemplateRegistry>,
    subscription: Option<Subscription>,
    items: Vec<ItemView>,
    notification: Option<Notification>,
    state: ListState,
    html: String,
}

impl ListView {
    /// Subscribe to `set`. Call [`ListView::render`] for the first paint.
    pub fn new<T: Transport>(set: &ResourceSet<T>, templates: Arc<TemplateRegistry>) -> Self {
        Self {
            renderer: Arc::new(DefaultRenderer),
            item_renderer: Arc::new(DefaultRenderer),
            templates,
            subscription: Some(set.subscribe()),
            items: Vec::new(),
            notification: None,
            state: ListState::Empty,
            html: String::new(),
        }
    }

    pub fn with_renderers(
        mut self,
        renderer: Arc<dyn ListRenderable>,
        item_renderer: Arc<dyn ItemRenderable>,
    ) -> Self {
        self.renderer = renderer;
        self.item_renderer = item_renderer;
        self
    }

    pub fn state(&self) -> ListState {
        self.state
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemView> {
        self.items.iter()
    }

    pub fn item(&self, cid: ClientId) -> Option<&ItemView> {
        self.items.iter().find(|item| item.cid() == cid)
    }

    pub fn item_mut(&mut self, cid: ClientId) -> Option<&mut ItemView> {
        self.items.iter_mut().find(|item| item.cid() == cid)
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn dismiss_notification(&mut self) {
        self.notification = None;
    }

    /// Full re-render: one item view per resource, in set order.
    ///
    /// Item views are matched by client id so an item keeps its editor draft
    /// and notification across re-renders.
    pub fn render<T: Transport>(&mut self, set: &ResourceSet<T>) -> ElencoResult<&str> {
        let mut previous = std::mem::take(&mut self.items);
        for cid in set.iter().map(Resource::cid) {
            let item = match previous.iter().position(|item| item.cid() == cid) {
                Some(index) => previous.swap_remove(index),
                None => ItemView::new(
                    set,
                    cid,
                    Arc::clone(&self.item_renderer),
                    Arc::clone(&self.templates),
                )?,
            };
            self.items.push(item);
        }

        let empty = set.is_empty();
        for item in &mut self.items {
            if is_shown(set, item.cid(), empty) {
                item.render(set)?;
            }
        }
        self.compose(set)
    }

    /// Assemble the list from the items' last renders.
    fn compose<T: Transport>(&mut self, set: &ResourceSet<T>) -> ElencoResult<&str> {
        let empty = set.is_empty();
        self.state = if empty {
            ListState::Empty
        } else {
            ListState::Populated
        };

        let mut fragments = Vec::new();
        for item in &mut self.items {
            if !is_shown(set, item.cid(), empty) {
                continue;
            }
            if item.html().is_empty() {
                item.render(set)?;
            }
            fragments.push(item.html().to_string());
        }

        let mut context = self
            .renderer
            .list_context(set.kind(), fragments, !set.has_unsaved());
        if let Value::Object(map) = &mut context {
            if let Some(note) = &self.notification {
                let html = self.templates.render(names::NOTIFICATION, &note.to_context())?;
                map.insert("notification".to_string(), Value::from(html));
            }
            if let (false, Some(state)) = (empty, set.page_state()) {
                let html = self
                    .templates
                    .render(names::PAGINATION, &pagination_context(state))?;
                map.insert("pagination".to_string(), Value::from(html));
            }
        }

        let template = if empty {
            self.renderer.empty_template()
        } else {
            self.renderer.list_template()
        };
        self.html = self.templates.render(template, &context)?;
        Ok(&self.html)
    }

    /// Apply whatever the set published since the last call.
    ///
    /// Membership and order changes re-render everything; a saved item
    /// re-renders alone. Returns whether anything was pending. A detached
    /// view always returns `false`.
    pub fn sync<T: Transport>(&mut self, set: &ResourceSet<T>) -> ElencoResult<bool> {
        let Some(subscription) = self.subscription.as_mut() else {
            return Ok(false);
        };
        let events = subscription.drain();
        if events.is_empty() {
            return Ok(false);
        }

        let mut structural = false;
        let mut changed = Vec::new();
        for event in events {
            match event {
                SetEvent::Error { cid: None, message } => {
                    if self.notification.is_none() {
                        self.notification = Some(Notification::error(message));
                    }
                }
                // Item errors are shown by the item itself.
                SetEvent::Error { cid: Some(_), .. } => {}
                SetEvent::Change(cid) => changed.push(cid),
                other => structural |= other.is_structural(),
            }
        }

        if structural {
            self.render(set)?;
        } else {
            for cid in changed {
                if let Some(item) = self.item_mut(cid) {
                    item.render(set)?;
                }
            }
            self.compose(set)?;
        }
        Ok(true)
    }

    /// Sync, or recompose when the set published nothing.
    fn refresh<T: Transport>(&mut self, set: &ResourceSet<T>) -> ElencoResult<()> {
        if !self.sync(set)? && self.is_attached() {
            self.compose(set)?;
        }
        Ok(())
    }

    /// Open an editor for a new item. Does nothing while another one is open.
    pub fn add_new<T: Transport>(
        &mut self,
        set: &mut ResourceSet<T>,
    ) -> ElencoResult<Option<ClientId>> {
        if set.has_unsaved() {
            debug!(kind = set.kind().name(), "Add ignored; an unsaved item is open");
            return Ok(None);
        }
        let cid = set.add(Attributes::new())?;
        self.refresh(set)?;
        Ok(Some(cid))
    }

    pub async fn fetch<T: Transport>(
        &mut self,
        set: &mut ResourceSet<T>,
    ) -> ElencoResult<LoadOutcome> {
        let result = set.fetch().await;
        self.finish_load(set, result)
    }

    pub async fn go_to_page<T: Transport>(
        &mut self,
        set: &mut ResourceSet<T>,
        page: u32,
    ) -> ElencoResult<LoadOutcome> {
        let result = set.fetch_page(page).await;
        self.finish_load(set, result)
    }

    pub async fn next_page<T: Transport>(
        &mut self,
        set: &mut ResourceSet<T>,
    ) -> ElencoResult<LoadOutcome> {
        let result = set.next_page().await;
        self.finish_load(set, result)
    }

    pub async fn previous_page<T: Transport>(
        &mut self,
        set: &mut ResourceSet<T>,
    ) -> ElencoResult<LoadOutcome> {
        let result = set.previous_page().await;
        self.finish_load(set, result)
    }

    fn finish_load<T: Transport>(
        &mut self,
        set: &ResourceSet<T>,
        result: ElencoResult<FetchStatus>,
    ) -> ElencoResult<LoadOutcome> {
        let outcome = match result {
            Ok(FetchStatus::Applied) => {
                self.notification = None;
                LoadOutcome::Loaded
            }
            Ok(FetchStatus::Stale) => LoadOutcome::Stale,
            Ok(FetchStatus::OutOfRange) => LoadOutcome::OutOfRange,
            Err(err) => {
                let source = err.into_transport()?;
                warn!(kind = set.kind().name(), error = %source, "Showing load failure");
                self.notification = Some(Notification::from_transport(&source));
                LoadOutcome::Failed(source)
            }
        };
        self.refresh(set)?;
        Ok(outcome)
    }

    fn item_view(&mut self, cid: ClientId) -> ElencoResult<&mut ItemView> {
        self.item_mut(cid).ok_or(ElencoError::UnknownResource(cid))
    }

    pub fn edit<T: Transport>(&mut self, set: &mut ResourceSet<T>, cid: ClientId) -> ElencoResult<()> {
        self.item_view(cid)?.edit(set)?;
        self.refresh(set)
    }

    pub async fn cancel<T: Transport>(
        &mut self,
        set: &mut ResourceSet<T>,
        cid: ClientId,
    ) -> ElencoResult<CancelOutcome> {
        let outcome = self.item_view(cid)?.cancel(set).await?;
        self.refresh(set)?;
        Ok(outcome)
    }

    pub async fn submit<T: Transport>(
        &mut self,
        set: &mut ResourceSet<T>,
        cid: ClientId,
    ) -> ElencoResult<SubmitOutcome> {
        let outcome = self.item_view(cid)?.submit(set).await?;
        self.refresh(set)?;
        Ok(outcome)
    }

    pub async fn delete<T: Transport>(
        &mut self,
        set: &mut ResourceSet<T>,
        cid: ClientId,
        confirm: &impl Confirm,
    ) -> ElencoResult<DeleteOutcome> {
        let outcome = self.item_view(cid)?.delete(set, confirm).await?;
        self.refresh(set)?;
        Ok(outcome)
    }

    /// Anything in the set or an open form that a reload would lose.
    pub fn has_unsaved_changes<T: Transport>(&self, set: &ResourceSet<T>) -> bool {
        set.has_unsaved_changes()
            || self.items.iter().any(|item| {
                match (item.editor(), set.get(item.cid())) {
                    (Some(editor), Some(resource)) => editor.has_changes(resource),
                    _ => false,
                }
            })
    }

    /// Stop listening to the set. Later syncs do nothing.
    pub fn detach(&mut self) {
        self.subscription = None;
    }
}

/// While the list is empty the prompt stays up, with the open add form and
/// anything the server already holds beneath it.
fn is_shown<T: Transport>(set: &ResourceSet<T>, cid: ClientId, empty: bool) -> bool {
    !empty
        || set
            .get(cid)
            .map(|resource| resource.editing() || !resource.is_new())
            .unwrap_or(false)
}

fn pagination_context(state: &PageState) -> Value {
    let first = state.first_index();
    let last = state
        .count
        .map(|count| count.min(first + u64::from(state.page_size) - 1));
    json!({
        "current": state.current_page,
        "total": state.total_pages,
        "count": state.count,
        "first": first,
        "last": last,
        "has_previous": state.has_previous(),
        "has_next": state.has_next(),
    })
}
