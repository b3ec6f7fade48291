//! Generic CRUD over one document collection.
//!
//! Every resource follows the same list/get/create/update/delete shape, so
//! the behaviour is written once here and parameterised by [`Document`].

use crate::document::{Document, DocumentMeta, Reference, RESERVED_FIELDS};
use crate::query::{ListQuery, Page};
use crate::store::DocumentStore;
use crate::{ClinicError, ClinicResult};
use chrono::Utc;
use clinic_uuid::DocumentId;
use serde_json::{Map, Value};
use std::marker::PhantomData;

pub struct Collection<'a, T> {
    store: &'a DocumentStore,
    _marker: PhantomData<T>,
}

impl<'a, T: Document> Collection<'a, T> {
    pub fn new(store: &'a DocumentStore) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    /// Lists documents matching `query`, populated unless the query opts out.
    pub fn list(&self, query: &ListQuery) -> ClinicResult<Page<Value>> {
        let values = self
            .store
            .all::<T>()
            .iter()
            .map(to_value)
            .collect::<ClinicResult<Vec<_>>>()?;

        let page = query.apply(values, T::SEARCH_FIELDS, T::DATE_FIELD);
        if !query.populate {
            return Ok(page);
        }

        let mut populated = page;
        for doc in populated.data.iter_mut() {
            populate_value(self.store, T::REFERENCES, doc)?;
        }
        Ok(populated)
    }

    /// Loads one typed document by its external id.
    pub fn fetch(&self, id: &str) -> ClinicResult<T> {
        let id = DocumentId::parse(id.trim())?;
        self.store.load::<T>(&id)
    }

    /// Loads one document as JSON, with references resolved when `populate` is set.
    pub fn get(&self, id: &str, populate: bool) -> ClinicResult<Value> {
        let doc = self.fetch(id)?;
        if populate {
            self.populate(&doc)
        } else {
            to_value(&doc)
        }
    }

    pub fn populate(&self, doc: &T) -> ClinicResult<Value> {
        let mut value = to_value(doc)?;
        populate_value(self.store, T::REFERENCES, &mut value)?;
        Ok(value)
    }

    /// Creates a document from a JSON body.
    ///
    /// Server-owned fields in the body are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::InvalidInput` if the body is not a JSON object or
    /// does not describe a valid document, and whatever the resource's
    /// lifecycle hooks reject.
    pub fn create(&self, body: Value) -> ClinicResult<T> {
        let mut fields = into_object(body)?;
        strip_reserved(&mut fields);

        let meta = DocumentMeta::new();
        let meta_value = to_value(&meta)?;
        if let Value::Object(meta_fields) = meta_value {
            fields.extend(meta_fields);
        }

        let mut doc: T = from_body(Value::Object(fields))?;
        doc.validate()?;

        let _guard = self.store.write_guard()?;
        doc.before_create(self.store)?;
        self.store.save(&doc)?;
        doc.after_create(self.store)?;

        tracing::info!("created {} {}", T::LABEL, doc.id());
        Ok(doc)
    }

    /// Merges `patch` over the stored document.
    ///
    /// Top-level keys in the patch replace stored values; keys that are absent
    /// keep their stored value. Identity and timestamps cannot be patched.
    pub fn update(&self, id: &str, patch: Value) -> ClinicResult<T> {
        let id = DocumentId::parse(id.trim())?;
        let mut patch = into_object(patch)?;
        strip_reserved(&mut patch);

        let _guard = self.store.write_guard()?;
        self.update_locked(&id, patch)
    }

    /// Merge and save for callers already holding the store write guard.
    fn update_locked(&self, id: &DocumentId, patch: Map<String, Value>) -> ClinicResult<T> {
        let previous: T = self.store.load(id)?;

        let mut fields = into_object(to_value(&previous)?)?;
        fields.extend(patch);

        let mut doc: T = from_body(Value::Object(fields))?;
        doc.meta_mut().updated_at = Utc::now();
        doc.validate()?;
        doc.before_update(&previous, self.store)?;
        self.store.save(&doc)?;
        doc.after_update(&previous, self.store)?;

        tracing::info!("updated {} {}", T::LABEL, doc.id());
        Ok(doc)
    }

    /// Deletes a document and returns what was removed.
    pub fn delete(&self, id: &str) -> ClinicResult<T> {
        let id = DocumentId::parse(id.trim())?;

        let _guard = self.store.write_guard()?;
        let doc: T = self.store.load(&id)?;
        doc.before_delete(self.store)?;
        self.store.remove::<T>(&id)?;
        doc.after_delete(self.store)?;

        tracing::info!("deleted {} {}", T::LABEL, id);
        Ok(doc)
    }

    /// Records an uploaded file's public path on the document.
    ///
    /// Array-valued attachment fields collect paths; scalar ones are replaced.
    pub fn attach(&self, id: &str, public_path: &str) -> ClinicResult<T> {
        let Some(field) = T::ATTACHMENT_FIELD else {
            return Err(ClinicError::InvalidInput(format!(
                "{} does not accept uploads",
                T::LABEL
            )));
        };

        let id = DocumentId::parse(id.trim())?;

        let _guard = self.store.write_guard()?;
        let current: T = self.store.load(&id)?;
        let existing = to_value(&current)?.get(field).cloned();
        let value = match existing {
            Some(Value::Array(mut paths)) => {
                if !paths.iter().any(|p| p.as_str() == Some(public_path)) {
                    paths.push(Value::String(public_path.to_string()));
                }
                Value::Array(paths)
            }
            _ => Value::String(public_path.to_string()),
        };

        let mut patch = Map::new();
        patch.insert(field.to_string(), value);
        self.update_locked(&id, patch)
    }
}

fn to_value<T: serde::Serialize>(doc: &T) -> ClinicResult<Value> {
    serde_json::to_value(doc).map_err(ClinicError::Serialization)
}

fn from_body<T: Document>(body: Value) -> ClinicResult<T> {
    serde_json::from_value(body)
        .map_err(|e| ClinicError::InvalidInput(format!("invalid {}: {}", T::LABEL.to_lowercase(), e)))
}

fn into_object(value: Value) -> ClinicResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ClinicError::InvalidInput("request body must be a JSON object".into())),
    }
}

fn strip_reserved(fields: &mut Map<String, Value>) {
    for key in RESERVED_FIELDS {
        fields.remove(key);
    }
}

/// Replaces referenced ids in `doc` with the referenced documents.
///
/// Ids that do not resolve are left untouched.
pub fn populate_value(
    store: &DocumentStore,
    references: &[Reference],
    doc: &mut Value,
) -> ClinicResult<()> {
    for reference in references {
        let segments: Vec<&str> = reference.path.split('.').collect();
        populate_path(store, reference.collection, &segments, doc)?;
    }
    Ok(())
}

fn populate_path(
    store: &DocumentStore,
    collection: &str,
    segments: &[&str],
    value: &mut Value,
) -> ClinicResult<()> {
    match value {
        Value::Array(items) => {
            for item in items.iter_mut() {
                populate_path(store, collection, segments, item)?;
            }
            Ok(())
        }
        Value::Object(map) => {
            let Some((head, rest)) = segments.split_first() else {
                return Ok(());
            };
            let Some(child) = map.get_mut(*head) else {
                return Ok(());
            };
            if rest.is_empty() {
                resolve_in_place(store, collection, child)
            } else {
                populate_path(store, collection, rest, child)
            }
        }
        _ => Ok(()),
    }
}

fn resolve_in_place(store: &DocumentStore, collection: &str, slot: &mut Value) -> ClinicResult<()> {
    match slot {
        Value::Array(items) => {
            for item in items.iter_mut() {
                resolve_in_place(store, collection, item)?;
            }
            Ok(())
        }
        Value::String(raw) => {
            let Ok(id) = DocumentId::parse(raw) else {
                return Ok(());
            };
            if let Some(referenced) = store.load_value(collection, &id)? {
                *slot = referenced;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::opd::Appointment;
    use crate::models::patients::Patient;
    use crate::models::staff::{Department, Employee};
    use crate::models::test_support::test_store;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_create_ignores_client_supplied_identity() {
        let (_tmp, store) = test_store();
        let departments = Collection::<Department>::new(&store);

        let forged = "0123456789abcdef0123456789abcdef";
        let dept = departments
            .create(json!({"_id": forged, "createdAt": "1999-01-01T00:00:00Z", "name": "ENT"}))
            .unwrap();

        assert_ne!(dept.meta.id.to_string(), forged);
        assert!(dept.meta.created_at.timestamp() > 946_684_800);
    }

    #[test]
    fn test_create_rejects_invalid_body() {
        let (_tmp, store) = test_store();
        let departments = Collection::<Department>::new(&store);

        let err = departments.create(json!({"name": "   "})).unwrap_err();
        assert!(matches!(err, ClinicError::InvalidInput(_)));

        let err = departments.create(json!(["not", "an", "object"])).unwrap_err();
        assert!(matches!(err, ClinicError::InvalidInput(_)));
    }

    #[test]
    fn test_get_rejects_malformed_id() {
        let (_tmp, store) = test_store();
        let departments = Collection::<Department>::new(&store);

        let err = departments.get("not-an-id", true).unwrap_err();
        assert!(matches!(err, ClinicError::Uuid(_)));
    }

    #[test]
    fn test_update_merges_and_refreshes_timestamp() {
        let (_tmp, store) = test_store();
        let departments = Collection::<Department>::new(&store);

        let dept = departments
            .create(json!({"name": "Orthopaedics", "description": "Bones"}))
            .unwrap();
        let updated = departments
            .update(&dept.meta.id.to_string(), json!({"head": "Dr. Rana", "_id": "x"}))
            .unwrap();

        assert_eq!(updated.meta.id, dept.meta.id);
        assert_eq!(updated.meta.created_at, dept.meta.created_at);
        assert!(updated.meta.updated_at >= dept.meta.updated_at);
        assert_eq!(updated.description.as_deref(), Some("Bones"));
        assert_eq!(updated.head.as_deref(), Some("Dr. Rana"));
    }

    #[test]
    fn test_delete_then_get_is_not_found() {
        let (_tmp, store) = test_store();
        let departments = Collection::<Department>::new(&store);

        let dept = departments.create(json!({"name": "Dermatology"})).unwrap();
        let id = dept.meta.id.to_string();
        departments.delete(&id).unwrap();

        let err = departments.get(&id, false).unwrap_err();
        assert!(matches!(err, ClinicError::NotFound { .. }));
    }

    #[test]
    fn test_list_populates_references() {
        let (_tmp, store) = test_store();

        let patient = Collection::<Patient>::new(&store)
            .create(json!({"name": "Ayesha Khan"}))
            .unwrap();
        let doctor = Collection::<Employee>::new(&store)
            .create(json!({"name": "Dr. Imran", "isDoctor": true}))
            .unwrap();
        Collection::<Appointment>::new(&store)
            .create(json!({
                "patient": patient.meta.id.to_string(),
                "doctor": doctor.meta.id.to_string(),
                "date": "2024-06-01"
            }))
            .unwrap();

        let query = ListQuery::from_params(&HashMap::new(), 10).unwrap();
        let page = Collection::<Appointment>::new(&store).list(&query).unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.data[0]["patient"]["name"], "Ayesha Khan");
        assert_eq!(page.data[0]["doctor"]["name"], "Dr. Imran");
    }

    #[test]
    fn test_list_filters_on_reference_ids_before_populate() {
        let (_tmp, store) = test_store();

        let a = Collection::<Patient>::new(&store)
            .create(json!({"name": "A"}))
            .unwrap();
        let b = Collection::<Patient>::new(&store)
            .create(json!({"name": "B"}))
            .unwrap();
        let doctor = Collection::<Employee>::new(&store)
            .create(json!({"name": "Dr. Imran", "isDoctor": true}))
            .unwrap();
        let appointments = Collection::<Appointment>::new(&store);
        for patient in [&a, &a, &b] {
            appointments
                .create(json!({
                    "patient": patient.meta.id.to_string(),
                    "doctor": doctor.meta.id.to_string(),
                    "date": "2024-06-01"
                }))
                .unwrap();
        }

        let mut params = HashMap::new();
        params.insert("patient".to_string(), a.meta.id.to_string());
        let query = ListQuery::from_params(&params, 10).unwrap();
        let page = appointments.list(&query).unwrap();

        assert_eq!(page.total, 2);
    }

    #[test]
    fn test_attach_rejects_resources_without_uploads() {
        let (_tmp, store) = test_store();
        let departments = Collection::<Department>::new(&store);
        let dept = departments.create(json!({"name": "ICU"})).unwrap();

        let err = departments
            .attach(&dept.meta.id.to_string(), "/Images/x.png")
            .unwrap_err();
        assert!(matches!(err, ClinicError::InvalidInput(_)));
    }

    #[test]
    fn test_attach_sets_scalar_field() {
        let (_tmp, store) = test_store();
        let patients = Collection::<Patient>::new(&store);
        let patient = patients.create(json!({"name": "Photo Person"})).unwrap();

        let updated = patients
            .attach(&patient.meta.id.to_string(), "/Images/sha256/ab/cd/abcd.png")
            .unwrap();
        assert_eq!(updated.image.as_deref(), Some("/Images/sha256/ab/cd/abcd.png"));
    }

    #[test]
    fn test_populate_leaves_dangling_ids() {
        let (_tmp, store) = test_store();
        let dangling = DocumentId::new().to_string();
        let mut doc = json!({"patient": dangling.clone()});

        populate_value(&store, &[Reference::new("patient", "patients")], &mut doc).unwrap();
        assert_eq!(doc["patient"], dangling);
    }
}
