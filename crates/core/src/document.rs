//! The `Document` abstraction every resource implements.
//!
//! A resource is a flat JSON document in its own collection. The trait carries
//! the per-resource knobs the generic list/create/update/delete machinery in
//! [`crate::collection`] needs, plus lifecycle hooks for the handful of
//! resources whose writes touch other documents (bed occupancy, pharmacy
//! stock, sequence numbers).

use crate::store::DocumentStore;
use crate::ClinicResult;
use chrono::{DateTime, Utc};
use clinic_uuid::DocumentId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Server-managed identity and timestamps shared by every document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DocumentMeta {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl DocumentMeta {
    /// Fresh metadata for a document about to be created.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: DocumentId::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for DocumentMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON keys owned by the server; clients cannot set them.
pub const RESERVED_FIELDS: [&str; 3] = ["_id", "createdAt", "updatedAt"];

/// A reference from a document field to another collection.
///
/// `path` is a dotted path; a segment that lands on an array applies to each
/// element, so `items.item` reaches the `item` field of every sale line.
#[derive(Clone, Copy, Debug)]
pub struct Reference {
    pub path: &'static str,
    pub collection: &'static str,
}

impl Reference {
    pub const fn new(path: &'static str, collection: &'static str) -> Self {
        Self { path, collection }
    }
}

pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection (directory and URL segment) name.
    const COLLECTION: &'static str;
    /// Human label used in messages.
    const LABEL: &'static str;
    /// Fields searched by the `search` list parameter.
    const SEARCH_FIELDS: &'static [&'static str] = &[];
    /// Field the `from`/`to` list parameters filter on.
    const DATE_FIELD: &'static str = "createdAt";
    /// Fields resolved by populate.
    const REFERENCES: &'static [Reference] = &[];
    /// Field that receives uploaded file paths, if the resource takes uploads.
    const ATTACHMENT_FIELD: Option<&'static str> = None;

    fn meta(&self) -> &DocumentMeta;
    fn meta_mut(&mut self) -> &mut DocumentMeta;

    fn id(&self) -> &DocumentId {
        &self.meta().id
    }

    /// Checks the document in isolation.
    fn validate(&self) -> ClinicResult<()> {
        Ok(())
    }

    /// Runs before a new document is written; may fill derived fields.
    fn before_create(&mut self, _store: &DocumentStore) -> ClinicResult<()> {
        Ok(())
    }

    fn after_create(&self, _store: &DocumentStore) -> ClinicResult<()> {
        Ok(())
    }

    fn before_update(&mut self, _previous: &Self, _store: &DocumentStore) -> ClinicResult<()> {
        Ok(())
    }

    fn after_update(&self, _previous: &Self, _store: &DocumentStore) -> ClinicResult<()> {
        Ok(())
    }

    fn before_delete(&self, _store: &DocumentStore) -> ClinicResult<()> {
        Ok(())
    }

    fn after_delete(&self, _store: &DocumentStore) -> ClinicResult<()> {
        Ok(())
    }
}

/// Implements `meta`/`meta_mut` for a struct with a `meta: DocumentMeta` field.
macro_rules! document_meta {
    () => {
        fn meta(&self) -> &$crate::document::DocumentMeta {
            &self.meta
        }

        fn meta_mut(&mut self) -> &mut $crate::document::DocumentMeta {
            &mut self.meta
        }
    };
}

pub(crate) use document_meta;
