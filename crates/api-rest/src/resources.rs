//! Generic CRUD routes, one set per resource.
//!
//! Every resource gets:
//!
//! ```text
//! GET    /<collection>/get
//! GET    /<collection>/get/:id
//! POST   /<collection>/create
//! PUT    /<collection>/update/:id
//! DELETE /<collection>/delete/:id
//! POST   /<collection>/upload/:id     (resources that take attachments)
//! ```

use crate::error::ApiError;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use clinic_api_shared::DeletedRes;
use clinic_core::models::billing::{Expense, Invoice};
use clinic_core::models::closing::StoreClosing;
use clinic_core::models::indoor::{Admission, Bed, Discharge, Room, Ward};
use clinic_core::models::opd::{Appointment, Certificate, Procedure, Token};
use clinic_core::models::patients::Patient;
use clinic_core::models::pharmacy::{
    MissedSale, PharmCategory, PharmItem, PharmSale, PharmSupplier, PurchaseOrder, StockEntry,
};
use clinic_core::models::staff::{Department, DutyRoster, Employee, Leave};
use clinic_core::{Collection, Document, ListQuery, Page};
use clinic_files::UploadStore;
use serde_json::Value;
use std::collections::HashMap;

/// Name of the multipart field carrying the uploaded file.
const UPLOAD_FIELD: &str = "file";

/// Routes for every resource, to be nested under `/apis`.
pub fn all_resources() -> Router<AppState> {
    Router::new()
        .merge(resource_routes::<Patient>())
        .merge(resource_routes::<Department>())
        .merge(resource_routes::<Employee>())
        .merge(resource_routes::<Leave>())
        .merge(resource_routes::<DutyRoster>())
        .merge(resource_routes::<Appointment>())
        .merge(resource_routes::<Token>())
        .merge(resource_routes::<Procedure>())
        .merge(resource_routes::<Certificate>())
        .merge(resource_routes::<Ward>())
        .merge(resource_routes::<Room>())
        .merge(resource_routes::<Bed>())
        .merge(resource_routes::<Admission>())
        .merge(resource_routes::<Discharge>())
        .merge(resource_routes::<Invoice>())
        .merge(resource_routes::<Expense>())
        .merge(resource_routes::<PharmCategory>())
        .merge(resource_routes::<PharmSupplier>())
        .merge(resource_routes::<PharmItem>())
        .merge(resource_routes::<StockEntry>())
        .merge(resource_routes::<PharmSale>())
        .merge(resource_routes::<MissedSale>())
        .merge(resource_routes::<PurchaseOrder>())
        .merge(resource_routes::<StoreClosing>())
}

pub fn resource_routes<T: Document>() -> Router<AppState> {
    let base = format!("/{}", T::COLLECTION);
    let router = Router::new()
        .route(&format!("{}/get", base), get(list::<T>))
        .route(&format!("{}/get/:id", base), get(read::<T>))
        .route(&format!("{}/create", base), post(create::<T>))
        .route(&format!("{}/update/:id", base), put(update::<T>))
        .route(&format!("{}/delete/:id", base), delete(remove::<T>));

    if T::ATTACHMENT_FIELD.is_some() {
        router.route(&format!("{}/upload/:id", base), post(upload::<T>))
    } else {
        router
    }
}

async fn list<T: Document>(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<Value>>, ApiError> {
    let query = ListQuery::from_params(&params, state.cfg.default_page_size())?;
    let page = Collection::<T>::new(&state.store).list(&query)?;
    Ok(Json(page))
}

async fn read<T: Document>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let populate = !matches!(
        params.get("populate").map(|v| v.trim()),
        Some("false") | Some("0")
    );
    let doc = Collection::<T>::new(&state.store).get(&id, populate)?;
    Ok(Json(doc))
}

async fn create<T: Document>(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<T>), ApiError> {
    let Json(body) = body?;
    let doc = Collection::<T>::new(&state.store).create(body)?;
    Ok((StatusCode::CREATED, Json(doc)))
}

async fn update<T: Document>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<T>, ApiError> {
    let Json(body) = body?;
    let doc = Collection::<T>::new(&state.store).update(&id, body)?;
    Ok(Json(doc))
}

async fn remove<T: Document>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedRes>, ApiError> {
    let doc = Collection::<T>::new(&state.store).delete(&id)?;
    Ok(Json(DeletedRes {
        message: format!("{} deleted", T::LABEL),
        id: doc.id().to_string(),
    }))
}

/// Stores the `file` field and records its public path on the document.
async fn upload<T: Document>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<T>, ApiError> {
    // Fail before buffering the body if the document is missing.
    Collection::<T>::new(&state.store).fetch(&id)?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        upload = Some((filename, bytes));
        break;
    }
    let Some((filename, bytes)) = upload else {
        return Err(ApiError::bad_request(format!(
            "multipart field '{}' is required",
            UPLOAD_FIELD
        )));
    };

    let meta = state.uploads.store(&bytes, &filename)?;
    let public_path = UploadStore::public_path(&meta);
    tracing::info!(
        "stored upload {} ({} bytes) for {} {}",
        public_path,
        meta.size_bytes,
        T::LABEL,
        id
    );

    let doc = Collection::<T>::new(&state.store).attach(&id, &public_path)?;
    Ok(Json(doc))
}
