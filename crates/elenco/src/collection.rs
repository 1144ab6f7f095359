//! The client-side set of resources behind one list.

use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{ElencoError, ElencoResult, TransportError, ValidationErrors};
use crate::events::{EventBus, SetEvent, Subscription};
use crate::kind::{Comparator, ReservedKeys, ResourceKind};
use crate::pagination::{ListPayload, PageConfig, PageState};
use crate::resource::{Attributes, ClientId, Resource, ResourceId};
use crate::transport::{Endpoint, Query, Transport};

/// Result of a list request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Applied,
    /// A newer request was issued after this one; the response was dropped.
    Stale,
    /// The requested page does not exist; nothing was requested.
    OutOfRange,
}

/// A list request that has been issued a token but not sent yet.
pub struct FetchRequest<T> {
    token: u64,
    page: Option<u32>,
    url: String,
    query: Query,
    transport: Arc<T>,
}

impl<T: Transport> FetchRequest<T> {
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Perform the request. Does not touch the set.
    pub async fn send(self) -> FetchResponse {
        let result = self.transport.list(&self.url, &self.query).await;
        FetchResponse {
            token: self.token,
            page: self.page,
            result,
        }
    }
}

/// A completed list request, to be handed to [`ResourceSet::apply_fetch`].
#[derive(Debug)]
pub struct FetchResponse {
    token: u64,
    page: Option<u32>,
    result: Result<Value, TransportError>,
}

impl FetchResponse {
    pub fn token(&self) -> u64 {
        self.token
    }
}

struct Paging {
    config: PageConfig,
    state: PageState,
    loaded: bool,
}

/// Ordered resources bound to one REST endpoint.
pub struct ResourceSet<T> {
    kind: Arc<dyn ResourceKind>,
    endpoint: Endpoint,
    transport: Arc<T>,
    resources: Vec<Resource>,
    comparator: Comparator,
    paging: Option<Paging>,
    reserved: Arc<ReservedKeys>,
    issued_fetch: u64,
    events: EventBus,
}

impl<T: Transport> ResourceSet<T> {
    pub fn new(kind: Arc<dyn ResourceKind>, endpoint: Endpoint, transport: Arc<T>) -> Self {
        let comparator = kind.comparator();
        Self {
            kind,
            endpoint,
            transport,
            resources: Vec::new(),
            comparator,
            paging: None,
            reserved: Arc::new(ReservedKeys::new()),
            issued_fetch: 0,
            events: EventBus::new(),
        }
    }

    pub fn with_pagination(mut self, config: PageConfig) -> Self {
        let state = PageState::new(config.page_size);
        self.paging = Some(Paging {
            config,
            state,
            loaded: false,
        });
        self
    }

    pub fn with_reserved(mut self, reserved: Arc<ReservedKeys>) -> Self {
        self.reserved = reserved;
        self
    }

    pub fn kind(&self) -> &dyn ResourceKind {
        &*self.kind
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// No resources, or nothing but blank ones.
    ///
    /// A freshly added item the user has not filled in yet does not count
    /// as content.
    pub fn is_empty(&self) -> bool {
        self.resources.iter().all(|r| self.kind.is_blank(r))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    pub fn get(&self, cid: ClientId) -> Option<&Resource> {
        self.resources.iter().find(|r| r.cid() == cid)
    }

    pub fn get_mut(&mut self, cid: ClientId) -> Option<&mut Resource> {
        self.resources.iter_mut().find(|r| r.cid() == cid)
    }

    pub fn find_by_id(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id() == Some(id))
    }

    pub fn position(&self, cid: ClientId) -> Option<usize> {
        self.resources.iter().position(|r| r.cid() == cid)
    }

    /// An add flow is open.
    pub fn has_unsaved(&self) -> bool {
        self.resources.iter().any(Resource::is_new)
    }

    /// Something would be lost by navigating away.
    pub fn has_unsaved_changes(&self) -> bool {
        self.resources
            .iter()
            .any(|r| r.is_dirty() || (r.is_new() && !self.kind.is_blank(r)))
    }

    pub fn page_state(&self) -> Option<&PageState> {
        self.paging.as_ref().map(|p| &p.state)
    }

    pub fn comparator(&self) -> &Comparator {
        &self.comparator
    }

    fn index_of(&self, cid: ClientId) -> ElencoResult<usize> {
        self.position(cid).ok_or(ElencoError::UnknownResource(cid))
    }

    fn issue(&mut self, page: Option<u32>) -> FetchRequest<T> {
        self.issued_fetch += 1;
        let mut query = self.endpoint.static_query().to_vec();
        if let (Some(paging), Some(page)) = (&self.paging, page) {
            query.extend(paging.config.query(page));
        }
        FetchRequest {
            token: self.issued_fetch,
            page,
            url: self.endpoint.url().to_string(),
            query,
            transport: Arc::clone(&self.transport),
        }
    }

    /// Issue a request for the current page.
    pub fn begin_fetch(&mut self) -> FetchRequest<T> {
        let page = self.paging.as_ref().map(|p| p.state.current_page);
        self.issue(page)
    }

    /// Issue a request for `page`, or `None` when that page does not exist.
    ///
    /// Before the first load the page count is unknown and any page from 1
    /// up is accepted.
    pub fn begin_fetch_page(&mut self, page: u32) -> Option<FetchRequest<T>> {
        let target = match &self.paging {
            None => (page == 1).then_some(None)?,
            Some(paging) if !paging.loaded => (page >= 1).then_some(Some(page))?,
            Some(paging) => Some(paging.state.clamp(page)?),
        };
        Some(self.issue(target))
    }

    /// Take a completed list response, unless a newer one has been issued.
    ///
    /// On failure the current contents stay as they were.
    pub fn apply_fetch(&mut self, response: FetchResponse) -> ElencoResult<FetchStatus> {
        if response.token < self.issued_fetch {
            debug!(
                kind = self.kind.name(),
                token = response.token,
                latest = self.issued_fetch,
                "Dropping stale list response"
            );
            return Ok(FetchStatus::Stale);
        }

        let body = response.result.map_err(|source| self.fetch_failed(source))?;
        let payload = ListPayload::parse(body).map_err(|source| self.fetch_failed(source))?;
        let requested = response.page.unwrap_or(1);
        let (results, count, num_pages) = match payload {
            ListPayload::Plain(items) => {
                let count = items.len() as u64;
                (items, Some(count), Some(1))
            }
            ListPayload::Paged {
                results,
                count,
                num_pages,
            } => (results, count, num_pages),
        };

        if let Some(paging) = &mut self.paging {
            let total_pages = num_pages
                .or_else(|| count.map(|count| paging.state.pages_for(count)))
                .unwrap_or(requested);
            paging.loaded = true;
            paging.state.total_pages = total_pages;
            paging.state.count = count;
            if requested > total_pages {
                debug!(
                    kind = self.kind.name(),
                    page = requested,
                    total_pages,
                    "Server has fewer pages than requested"
                );
                paging.state.current_page = paging.state.current_page.min(total_pages);
                return Ok(FetchStatus::OutOfRange);
            }
        }

        self.replace_contents(results)
            .map_err(|source| self.fetch_failed(source))?;

        if let Some(paging) = &mut self.paging {
            paging.state.current_page = requested;
        }

        info!(
            kind = self.kind.name(),
            count = self.resources.len(),
            "Loaded resources"
        );
        self.events.emit(SetEvent::Reset);
        Ok(FetchStatus::Applied)
    }

    fn fetch_failed(&self, source: TransportError) -> ElencoError {
        warn!(
            kind = self.kind.name(),
            endpoint = self.endpoint.url(),
            error = %source,
            "List request failed; keeping current contents"
        );
        self.events.emit(SetEvent::Error {
            cid: None,
            message: source.user_message(),
        });
        ElencoError::Fetch {
            endpoint: self.endpoint.url().to_string(),
            source,
        }
    }

    /// Load the current page (or the whole list when not paginated).
    pub async fn fetch(&mut self) -> ElencoResult<FetchStatus> {
        let request = self.begin_fetch();
        let response = request.send().await;
        self.apply_fetch(response)
    }

    pub async fn fetch_page(&mut self, page: u32) -> ElencoResult<FetchStatus> {
        let Some(request) = self.begin_fetch_page(page) else {
            debug!(kind = self.kind.name(), page, "Requested page out of range");
            return Ok(FetchStatus::OutOfRange);
        };
        let response = request.send().await;
        self.apply_fetch(response)
    }

    pub async fn next_page(&mut self) -> ElencoResult<FetchStatus> {
        let current = self.page_state().map(|s| s.current_page).unwrap_or(1);
        self.fetch_page(current.saturating_add(1)).await
    }

    pub async fn previous_page(&mut self) -> ElencoResult<FetchStatus> {
        let current = self.page_state().map(|s| s.current_page).unwrap_or(1);
        self.fetch_page(current.saturating_sub(1)).await
    }

    /// Replace contents from server payloads without a request.
    pub fn reset(&mut self, payloads: Vec<Value>) -> ElencoResult<()> {
        self.replace_contents(payloads)
            .map_err(|source| self.fetch_failed(source))?;
        self.events.emit(SetEvent::Reset);
        Ok(())
    }

    /// All-or-nothing: a payload that fails to decode leaves the set untouched.
    fn replace_contents(&mut self, payloads: Vec<Value>) -> Result<(), TransportError> {
        let defaults = self.kind.defaults();
        let mut resources = payloads
            .into_iter()
            .map(|p| Resource::from_server(p).map(|r| r.with_defaults(defaults.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        let comparator = &self.comparator;
        resources.sort_by(|a, b| comparator.compare(a, b));
        if self.has_unsaved() {
            debug!(kind = self.kind.name(), "Dropping unsaved resource on reload");
        }
        self.resources = resources;
        Ok(())
    }

    /// Start an add flow with a new, unsaved resource in editing state.
    pub fn add(&mut self, attributes: Attributes) -> ElencoResult<ClientId> {
        if self.has_unsaved() {
            return Err(ElencoError::AddInProgress(self.kind.name().to_string()));
        }
        let mut resource = Resource::new(attributes).with_defaults(self.kind.defaults());
        resource.set_editing(true);
        let cid = resource.cid();
        let index = self.insertion_index(&resource);
        self.resources.insert(index, resource);
        debug!(kind = self.kind.name(), cid = %cid, index, "Added unsaved resource");
        self.events.emit(SetEvent::Add(cid));
        Ok(cid)
    }

    fn insertion_index(&self, resource: &Resource) -> usize {
        match self.comparator {
            Comparator::Insertion => self.resources.len(),
            _ => self
                .resources
                .iter()
                .position(|r| self.comparator.compare(resource, r) == Ordering::Less)
                .unwrap_or(self.resources.len()),
        }
    }

    pub fn validate_attributes(&self, attributes: &Attributes) -> Result<(), ValidationErrors> {
        self.kind.validate(attributes, &self.reserved)
    }

    pub fn validate(&self, cid: ClientId) -> ElencoResult<()> {
        let index = self.index_of(cid)?;
        self.validate_attributes(&self.resources[index].effective_attributes())
            .map_err(ElencoError::Validation)
    }

    /// Persist one resource: POST when new, update otherwise.
    ///
    /// Validation runs first and a failure never reaches the network.
    pub async fn save(&mut self, cid: ClientId) -> ElencoResult<()> {
        let index = self.index_of(cid)?;
        self.validate(cid)?;

        let resource = &self.resources[index];
        let result = match resource.id() {
            None => {
                let body = Value::Object(resource.effective_attributes());
                self.transport.create(self.endpoint.url(), &body).await
            }
            Some(id) => {
                let url = self.endpoint.item_url(id);
                let body = resource.to_json();
                self.transport
                    .update(&url, &body)
                    .await
                    .map(|payload| match payload {
                        Value::Null => Value::Object(resource.attributes().clone()),
                        other => other,
                    })
            }
        };

        let applied = result.and_then(|payload| self.resources[index].apply_server_state(payload));
        if let Err(source) = applied {
            warn!(kind = self.kind.name(), cid = %cid, error = %source, "Save failed");
            self.events.emit(SetEvent::Error {
                cid: Some(cid),
                message: source.user_message(),
            });
            return Err(ElencoError::Save(source));
        }

        info!(
            kind = self.kind.name(),
            id = %self.resources[index].id().map(ToString::to_string).unwrap_or_default(),
            "Saved resource"
        );
        self.events.emit(SetEvent::Change(cid));
        if self.comparator != Comparator::Insertion {
            self.sort();
        }
        Ok(())
    }

    /// Remove a resource. Persisted resources are deleted on the server too;
    /// if that fails the resource goes back where it was.
    pub async fn remove(&mut self, cid: ClientId) -> ElencoResult<Resource> {
        let index = self.index_of(cid)?;
        let resource = self.resources.remove(index);
        self.events.emit(SetEvent::Remove(cid));

        let Some(id) = resource.id().cloned() else {
            debug!(kind = self.kind.name(), cid = %cid, "Discarded unsaved resource");
            return Ok(resource);
        };

        match self.transport.delete(&self.endpoint.item_url(&id)).await {
            Ok(()) => {
                if let Some(count) = self.paging.as_mut().and_then(|p| p.state.count.as_mut()) {
                    *count = count.saturating_sub(1);
                }
                info!(kind = self.kind.name(), id = %id, "Deleted resource");
                Ok(resource)
            }
            Err(source) => {
                warn!(kind = self.kind.name(), id = %id, error = %source, "Delete failed; restoring");
                let index = index.min(self.resources.len());
                self.resources.insert(index, resource);
                self.events.emit(SetEvent::Add(cid));
                self.events.emit(SetEvent::Error {
                    cid: Some(cid),
                    message: source.user_message(),
                });
                Err(ElencoError::Delete { id, source })
            }
        }
    }

    pub fn set_comparator(&mut self, comparator: Comparator) {
        self.comparator = comparator;
        self.sort();
    }

    /// Stable sort by the current comparator.
    pub fn sort(&mut self) {
        let comparator = &self.comparator;
        self.resources.sort_by(|a, b| comparator.compare(a, b));
        self.events.emit(SetEvent::Sort);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{self, FieldSpec, Schema};
    use crate::memory::{MemoryTransport, Operation};
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn certificates(transport: MemoryTransport) -> ResourceSet<MemoryTransport> {
        ResourceSet::new(
            Arc::new(kind::certificate()),
            Endpoint::new("/api/certificates"),
            Arc::new(transport),
        )
    }

    fn ordered_kind() -> Arc<dyn ResourceKind> {
        Arc::new(
            Schema::new("chapter", "chapters")
                .field(FieldSpec::text("name", "Name").required().content())
                .comparator(Comparator::Ascending("order".to_string())),
        )
    }

    #[tokio::test]
    async fn test_fetch_replaces_contents() {
        let transport = MemoryTransport::with_records(vec![json!({"name": "Honor"}), json!({"name": "Verified"})]);
        let mut set = certificates(transport);
        let mut sub = set.subscribe();

        assert_eq!(set.fetch().await.unwrap(), FetchStatus::Applied);
        assert_eq!(set.len(), 2);
        assert_eq!(sub.drain(), vec![SetEvent::Reset]);
        // Defaults from the kind show through.
        assert_eq!(set.iter().next().unwrap().value("is_active"), Some(&json!(false)));
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_stale_contents() {
        let transport = MemoryTransport::with_records(vec![json!({"name": "Honor"})]);
        let mut set = certificates(transport.clone());
        set.fetch().await.unwrap();

        transport.fail_next(Operation::List, TransportError::Network("offline".into()));
        let err = set.fetch().await.unwrap_err();
        assert!(matches!(err, ElencoError::Fetch { .. }));
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_fetch_is_dropped() {
        let transport = MemoryTransport::with_records(vec![json!({"name": "Honor"})]);
        let mut set = certificates(transport.clone());

        let first = set.begin_fetch();
        transport.create("/api/certificates", &json!({"name": "Verified"})).await.unwrap();
        let second = set.begin_fetch();
        assert!(second.token() > first.token());

        let second = second.send().await;
        let first = first.send().await;

        assert_eq!(set.apply_fetch(second).unwrap(), FetchStatus::Applied);
        assert_eq!(set.apply_fetch(first).unwrap(), FetchStatus::Stale);
        assert_eq!(set.len(), 2);
    }

    #[tokio::test]
    async fn test_pagination_clamps() {
        let records = (1..=5).map(|i| json!({"name": format!("Cert {i}")})).collect();
        let transport = MemoryTransport::with_records(records);
        let mut set = certificates(transport.clone()).with_pagination(PageConfig::default().with_page_size(2));

        set.fetch().await.unwrap();
        let state = set.page_state().unwrap().clone();
        assert_eq!((state.current_page, state.total_pages, state.count), (1, 3, Some(5)));

        assert_eq!(set.next_page().await.unwrap(), FetchStatus::Applied);
        assert_eq!(set.page_state().unwrap().current_page, 2);
        assert_eq!(set.iter().next().unwrap().str_value("name"), Some("Cert 3"));

        let before = transport.request_count(Operation::List);
        assert_eq!(set.fetch_page(9).await.unwrap(), FetchStatus::OutOfRange);
        assert_eq!(set.fetch_page(0).await.unwrap(), FetchStatus::OutOfRange);
        assert_eq!(transport.request_count(Operation::List), before);
        assert_eq!(set.page_state().unwrap().current_page, 2);
    }

    /// Answers lists the way page-number APIs often do: `count` and no `num_pages`.
    struct CountOnly(MemoryTransport);

    impl Transport for CountOnly {
        async fn list(&self, url: &str, query: &[(String, String)]) -> Result<Value, TransportError> {
            let mut body = self.0.list(url, query).await?;
            if let Value::Object(map) = &mut body {
                map.remove("num_pages");
            }
            Ok(body)
        }

        async fn create(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
            self.0.create(url, body).await
        }

        async fn update(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
            self.0.update(url, body).await
        }

        async fn delete(&self, url: &str) -> Result<(), TransportError> {
            self.0.delete(url).await
        }
    }

    #[tokio::test]
    async fn test_page_count_derived_from_count() {
        let records = (1..=5).map(|i| json!({"name": format!("Cert {i}")})).collect();
        let mut set = ResourceSet::new(
            Arc::new(kind::certificate()),
            Endpoint::new("/api/certificates"),
            Arc::new(CountOnly(MemoryTransport::with_records(records))),
        )
        .with_pagination(PageConfig::default().with_page_size(2));

        set.fetch().await.unwrap();
        assert_eq!(set.page_state().unwrap().total_pages, 3);

        assert_eq!(set.next_page().await.unwrap(), FetchStatus::Applied);
        assert_eq!(set.next_page().await.unwrap(), FetchStatus::Applied);
        assert_eq!(set.page_state().unwrap().current_page, 3);
        assert_eq!(set.iter().next().unwrap().str_value("name"), Some("Cert 5"));
        assert_eq!(set.next_page().await.unwrap(), FetchStatus::OutOfRange);
    }

    #[tokio::test]
    async fn test_first_load_beyond_last_page() {
        let transport = MemoryTransport::with_records(vec![json!({"name": "Honor"})]);
        let mut set = certificates(transport).with_pagination(PageConfig::default().with_page_size(2));
        let mut sub = set.subscribe();

        assert_eq!(set.fetch_page(7).await.unwrap(), FetchStatus::OutOfRange);
        let state = set.page_state().unwrap();
        assert_eq!((state.current_page, state.total_pages, state.count), (1, 1, Some(1)));
        assert_eq!(set.len(), 0);
        assert!(sub.drain().is_empty());

        assert_eq!(set.fetch_page(7).await.unwrap(), FetchStatus::OutOfRange);
        assert_eq!(set.fetch_page(1).await.unwrap(), FetchStatus::Applied);
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_based_wire_pages() {
        let records = (1..=3).map(|i| json!({"name": format!("Cert {i}")})).collect();
        let transport = MemoryTransport::with_records(records).zero_based();
        let mut set = certificates(transport.clone())
            .with_pagination(PageConfig::default().with_page_size(2).zero_based());

        set.fetch().await.unwrap();
        assert_eq!(set.next_page().await.unwrap(), FetchStatus::Applied);
        assert_eq!(set.page_state().unwrap().current_page, 2);
        assert_eq!(set.iter().next().unwrap().str_value("name"), Some("Cert 3"));
        assert_eq!(transport.requests()[1].query[0], ("page".to_string(), "1".to_string()));
    }

    #[tokio::test]
    async fn test_static_query_is_sent() {
        let transport = MemoryTransport::new();
        let mut set = ResourceSet::new(
            Arc::new(kind::textbook()),
            Endpoint::new("/api/textbooks").with_param("course_id", "course-v1:X+Y+Z"),
            Arc::new(transport.clone()),
        );
        set.fetch().await.unwrap();
        assert_eq!(
            transport.requests()[0].query,
            vec![("course_id".to_string(), "course-v1:X+Y+Z".to_string())]
        );
    }

    #[test]
    fn test_only_one_unsaved_at_a_time() {
        let mut set = certificates(MemoryTransport::new());
        let cid = set.add(Attributes::new()).unwrap();
        assert!(set.get(cid).unwrap().editing());
        assert!(matches!(
            set.add(Attributes::new()),
            Err(ElencoError::AddInProgress(_))
        ));
    }

    #[test]
    fn test_is_empty_dual_condition() {
        let mut set = certificates(MemoryTransport::new());
        assert!(set.is_empty());

        let cid = set.add(attrs(json!({"name": ""}))).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.is_empty());

        set.get_mut(cid).unwrap().set("name", json!("Midterm"));
        assert!(!set.is_empty());
    }

    #[tokio::test]
    async fn test_save_validation_blocks_network() {
        let transport = MemoryTransport::new();
        let mut set = certificates(transport.clone());
        let cid = set.add(Attributes::new()).unwrap();

        let err = set.save(cid).await.unwrap_err();
        assert!(matches!(err, ElencoError::Validation(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_save_create_then_update() {
        let transport = MemoryTransport::new();
        let mut set = certificates(transport.clone());
        let cid = set.add(attrs(json!({"name": "Midterm"}))).unwrap();

        set.save(cid).await.unwrap();
        let id = set.get(cid).unwrap().id().cloned().unwrap();
        assert_eq!(transport.records()[0]["is_active"], json!(false));

        set.get_mut(cid).unwrap().set("name", json!("Final"));
        set.save(cid).await.unwrap();
        assert_eq!(set.get(cid).unwrap().id(), Some(&id));
        assert_eq!(transport.records()[0]["name"], json!("Final"));
        assert!(!set.get(cid).unwrap().is_dirty());
    }

    #[tokio::test]
    async fn test_save_failure_keeps_payload() {
        let transport = MemoryTransport::new();
        let mut set = certificates(transport.clone());
        let cid = set.add(attrs(json!({"name": "Midterm"}))).unwrap();
        let payload = json!({"error": "Duplicate certificate name"});
        transport.fail_next(
            Operation::Create,
            TransportError::Status {
                status: 400,
                body: payload.clone(),
            },
        );

        let err = set.save(cid).await.unwrap_err();
        assert_eq!(err.transport().and_then(TransportError::payload), Some(&payload));
        assert!(set.get(cid).unwrap().is_new());
    }

    #[tokio::test]
    async fn test_remove_rollback_on_failure() {
        let transport = MemoryTransport::with_records(vec![
            json!({"name": "A"}),
            json!({"name": "B"}),
            json!({"name": "C"}),
        ]);
        let mut set = certificates(transport.clone());
        set.fetch().await.unwrap();
        let cid = set.iter().nth(1).unwrap().cid();

        transport.fail_next(
            Operation::Delete,
            TransportError::Status {
                status: 500,
                body: json!("boom"),
            },
        );
        let err = set.remove(cid).await.unwrap_err();
        assert!(matches!(err, ElencoError::Delete { .. }));
        assert_eq!(set.position(cid), Some(1));
        assert_eq!(set.len(), 3);
    }

    #[tokio::test]
    async fn test_remove_unsaved_skips_network() {
        let transport = MemoryTransport::new();
        let mut set = certificates(transport.clone());
        let cid = set.add(Attributes::new()).unwrap();

        set.remove(cid).await.unwrap();
        assert_eq!(set.len(), 0);
        assert_eq!(transport.request_count(Operation::Delete), 0);
    }

    #[tokio::test]
    async fn test_remove_keeps_order_without_renumbering() {
        let transport = MemoryTransport::with_records(vec![
            json!({"name": "three", "order": 3}),
            json!({"name": "one", "order": 1}),
            json!({"name": "two", "order": 2}),
        ]);
        let mut set = ResourceSet::new(ordered_kind(), Endpoint::new("/chapters"), Arc::new(transport));
        set.fetch().await.unwrap();
        let middle = set.iter().nth(1).unwrap().cid();

        set.remove(middle).await.unwrap();
        let orders: Vec<_> = set.iter().map(|r| r.value("order").cloned().unwrap()).collect();
        assert_eq!(orders, vec![json!(1), json!(3)]);
    }

    #[test]
    fn test_add_respects_comparator() {
        let mut set = ResourceSet::new(ordered_kind(), Endpoint::new("/chapters"), Arc::new(MemoryTransport::new()));
        set.reset(vec![json!({"id": 1, "order": 1}), json!({"id": 3, "order": 3})])
            .unwrap();
        let cid = set.add(attrs(json!({"order": 2}))).unwrap();
        assert_eq!(set.position(cid), Some(1));
    }

    #[test]
    fn test_set_comparator_resorts() {
        let mut set = certificates(MemoryTransport::new());
        set.reset(vec![
            json!({"id": 1, "name": "beta"}),
            json!({"id": 2, "name": "Alpha"}),
        ])
        .unwrap();
        let mut sub = set.subscribe();

        set.set_comparator(Comparator::Ascending("name".to_string()));
        let names: Vec<_> = set.iter().filter_map(|r| r.str_value("name")).collect();
        assert_eq!(names, vec!["Alpha", "beta"]);
        assert_eq!(sub.drain(), vec![SetEvent::Sort]);
    }

    #[test]
    fn test_reset_is_all_or_nothing() {
        let mut set = certificates(MemoryTransport::new());
        set.reset(vec![json!({"id": 1, "name": "A"})]).unwrap();
        assert!(set.reset(vec![json!({"id": 2}), json!(7)]).is_err());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_unsaved_changes() {
        let mut set = certificates(MemoryTransport::new());
        set.reset(vec![json!({"id": 1, "name": "A"})]).unwrap();
        assert!(!set.has_unsaved_changes());

        let cid = set.iter().next().unwrap().cid();
        set.get_mut(cid).unwrap().set("name", json!("B"));
        assert!(set.has_unsaved_changes());
    }
}
