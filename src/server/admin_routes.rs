//! Catalog administration endpoints, nested under `/v1/admin`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::metrics::set_catalog_metrics;
use super::server::{error_response, internal_error};
use super::session::Session;
use super::state::{GuardedCatalogStore, GuardedUserManager, ServerState};
use crate::catalog_store::validation::{
    validate_category_fields, validate_selection, ValidationError,
};
use crate::catalog_store::{import_songs_csv, CategoryFields, ImportError, SongSummary};
use crate::user::Permission;

#[derive(Deserialize, Debug)]
struct AssignBody {
    song_codes: Vec<i64>,
    category_codes: Vec<i64>,
}

#[derive(Deserialize, Debug)]
struct RemoveBody {
    song_codes: Vec<i64>,
}

#[derive(Serialize)]
struct CategorySongsResponse {
    songs: Vec<SongSummary>,
}

#[derive(Serialize)]
struct AddedResponse {
    added: usize,
}

#[derive(Serialize)]
struct ModifiedResponse {
    ok: bool,
    modified: usize,
}

fn validation_error_response(err: ValidationError) -> Response {
    error_response(StatusCode::BAD_REQUEST, err.to_string())
}

fn refresh_catalog_metrics(catalog_store: &GuardedCatalogStore) {
    set_catalog_metrics(
        catalog_store.get_songs_count(),
        catalog_store.get_categories_count(),
    );
}

async fn create_category(
    session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
    Json(fields): Json<CategoryFields>,
) -> Response {
    if !session.has_permission(Permission::EditCatalog) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let fields = fields.trimmed();
    let existing = match catalog_store.list_categories() {
        Ok(existing) => existing,
        Err(err) => return internal_error("create_category", err),
    };
    if let Err(err) = validate_category_fields(&fields, &existing, None) {
        return validation_error_response(err);
    }
    match catalog_store.create_category(&fields) {
        Ok(category) => {
            info!("Created category {} '{}'", category.code, category.name);
            refresh_catalog_metrics(&catalog_store);
            (StatusCode::CREATED, Json(category)).into_response()
        }
        Err(err) => internal_error("create_category", err),
    }
}

async fn update_category(
    session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
    Path(code): Path<i64>,
    Json(fields): Json<CategoryFields>,
) -> Response {
    if !session.has_permission(Permission::EditCatalog) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let fields = fields.trimmed();
    let existing = match catalog_store.list_categories() {
        Ok(existing) => existing,
        Err(err) => return internal_error("update_category", err),
    };
    if !existing.iter().any(|c| c.code == code) {
        return StatusCode::NOT_FOUND.into_response();
    }
    if let Err(err) = validate_category_fields(&fields, &existing, Some(code)) {
        return validation_error_response(err);
    }
    match catalog_store.update_category(code, &fields) {
        Ok(Some(category)) => Json(category).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => internal_error("update_category", err),
    }
}

async fn delete_category(
    session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
    Path(code): Path<i64>,
) -> Response {
    if !session.has_permission(Permission::EditCatalog) {
        return StatusCode::FORBIDDEN.into_response();
    }
    match catalog_store.delete_category(code) {
        Ok(Some(modified)) => {
            info!("Deleted category {}, {} songs affected", code, modified);
            refresh_catalog_metrics(&catalog_store);
            Json(ModifiedResponse { ok: true, modified }).into_response()
        }
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => internal_error("delete_category", err),
    }
}

async fn get_category_songs(
    session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
    Path(code): Path<i64>,
) -> Response {
    if !session.has_permission(Permission::EditCatalog) {
        return StatusCode::FORBIDDEN.into_response();
    }
    match catalog_store.get_songs_in_category(code) {
        Ok(songs) => Json(CategorySongsResponse {
            songs: songs.iter().map(SongSummary::from).collect(),
        })
        .into_response(),
        Err(err) => internal_error("get_category_songs", err),
    }
}

async fn assign_categories(
    session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
    Json(body): Json<AssignBody>,
) -> Response {
    if !session.has_permission(Permission::EditCatalog) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let selection = validate_selection(&body.song_codes, "songs")
        .and_then(|_| validate_selection(&body.category_codes, "categories"));
    if let Err(err) = selection {
        return validation_error_response(err);
    }
    match catalog_store.add_songs_to_categories(&body.song_codes, &body.category_codes) {
        Ok(added) => Json(AddedResponse { added }).into_response(),
        Err(err) => internal_error("assign_categories", err),
    }
}

async fn remove_from_category(
    session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
    Path(code): Path<i64>,
    Json(body): Json<RemoveBody>,
) -> Response {
    if !session.has_permission(Permission::EditCatalog) {
        return StatusCode::FORBIDDEN.into_response();
    }
    if let Err(err) = validate_selection(&body.song_codes, "songs") {
        return validation_error_response(err);
    }
    match catalog_store.remove_songs_from_category(code, &body.song_codes) {
        Ok(modified) => Json(ModifiedResponse { ok: true, modified }).into_response(),
        Err(err) => internal_error("remove_from_category", err),
    }
}

async fn import_catalog(
    session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
    body: String,
) -> Response {
    if !session.has_permission(Permission::ImportCatalog) {
        return StatusCode::FORBIDDEN.into_response();
    }
    match import_songs_csv(catalog_store.as_ref(), body.as_bytes()) {
        Ok(report) => {
            info!(
                "Catalog import: {} imported, {} skipped",
                report.imported, report.skipped
            );
            refresh_catalog_metrics(&catalog_store);
            Json(report).into_response()
        }
        Err(ImportError::Store(err)) => internal_error("import_catalog", err),
        Err(err) => {
            warn!("Rejected catalog import: {}", err);
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        }
    }
}

async fn list_users_activity(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
) -> Response {
    if !session.has_permission(Permission::ViewUserActivity) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let result = user_manager.lock().unwrap().get_users_activity();
    match result {
        Ok(rows) => Json(rows).into_response(),
        Err(err) => internal_error("list_users_activity", err),
    }
}

pub fn admin_routes() -> Router<ServerState> {
    Router::new()
        .route("/categories", post(create_category))
        .route("/categories/assign", post(assign_categories))
        .route(
            "/categories/{code}",
            put(update_category).delete(delete_category),
        )
        .route("/categories/{code}/songs", get(get_category_songs))
        .route("/categories/{code}/remove", post(remove_from_category))
        .route("/import", post(import_catalog))
        .route("/users", get(list_users_activity))
}
