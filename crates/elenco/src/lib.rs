//! Paginated list and editor components for REST-backed course resources.
//!
//! A [`ResourceSet`] owns the resources behind one endpoint and talks to the
//! server through a [`Transport`]. A [`ListView`] renders the set as one
//! [`ItemView`] per resource; each item shows either its details or an
//! editor. Views produce HTML through a [`TemplateRegistry`].

pub mod collection;
pub mod editor;
pub mod error;
pub mod events;
pub mod item_view;
pub mod kind;
pub mod list_view;
pub mod memory;
pub mod notification;
pub mod pagination;
pub mod render;
pub mod resource;
pub mod templates;
pub mod transport;

pub use collection::{FetchStatus, ResourceSet};
pub use editor::{DetailsView, EditorView};
pub use error::{ElencoError, ElencoResult, TransportError, ValidationErrors};
pub use events::SetEvent;
pub use item_view::{CancelOutcome, Confirm, DeleteOutcome, ItemState, ItemView, SubmitOutcome};
pub use kind::{Comparator, FieldInput, FieldSpec, ReservedKeys, ResourceKind, Schema};
pub use list_view::{ListState, ListView, LoadOutcome};
pub use memory::MemoryTransport;
pub use notification::Notification;
pub use pagination::PageConfig;
pub use render::{DefaultRenderer, ItemRenderable, ListRenderable};
pub use resource::{Attributes, ClientId, Resource, ResourceId};
pub use templates::TemplateRegistry;
pub use transport::{Endpoint, HttpTransport, Transport, UpdateMethod};
