//! Schema-driven hypermedia: transition catalogs and Collection+JSON documents.
//!
//! Nothing in here touches the database or HTTP. Handlers hand in entities,
//! catalogs and href resolvers; they get back a [`CollectionDocument`] that
//! can be serialized as Collection+JSON or rendered as HTML.

pub mod catalog;
pub mod collection_json;
pub mod descriptor;
pub mod error;
pub mod representor;
pub mod schema;

pub use catalog::{Catalog, CatalogBuilder, CatalogContext, DEFAULT_TEXTAREA_THRESHOLD};
pub use collection_json::{CollectionJson, MEDIA_TYPE, TemplateWrite};
pub use descriptor::{
    CollectionDocument, FieldDescriptor, FieldValue, InputKind, InvalidField, ItemDescriptor,
    LinkDescriptor, Method, QueryDescriptor, RenderHint, TemplateDescriptor,
};
pub use error::RepresentationError;
pub use representor::{
    ActionTemplate, DocumentSpec, HrefResolver, QueryTarget, Representable, TemplateTarget,
    represent_list, represent_single,
};
pub use schema::{DATE_TIME_PATTERN, DeclaredType, EntitySchema, FieldMeta};
