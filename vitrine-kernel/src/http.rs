/**
 * API REST VITRINE - Serveur HTTP du backend portfolio
 *
 * RÔLE :
 * Expose au frontend les quelques données dynamiques du site :
 * versions des outils (easter egg terminal), présence Nintendo,
 * changelog et upload d'images.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, état partagé = caches + stores construits au démarrage
 * - Lecture publique : /health, /api/versions, /api/nintendo, /api/changelog
 * - Écriture (changelog, upload) : header x-api-key obligatoire
 * - Fichiers uploadés servis en statique sous /uploads
 *
 * CODES HTTP :
 * - /api/versions répond toujours 200 (repli sur valeurs par défaut)
 * - /api/nintendo répond 500 {error} seulement sans aucune présence connue
 */

use crate::changelog::{ChangelogEntry, ChangelogError, ChangelogStore};
use crate::models::{PresenceResponse, VersionSnapshot};
use crate::presence::PresenceCache;
use crate::upload::{read_first_file, UploadError, UploadStore, MAX_UPLOAD_BYTES};
use crate::versions::VersionCache;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::{error, warn};

type ApiError = (StatusCode, Json<Value>);

#[derive(Clone)]
pub struct AppState {
    pub versions: Arc<VersionCache>,
    pub presence: Arc<PresenceCache>,
    pub changelog: Arc<ChangelogStore>,
    pub uploads: Arc<UploadStore>,
    /// `None` : toutes les écritures sont refusées
    pub admin_key: Option<Arc<str>>,
}

async fn require_admin_key(State(app): State<AppState>, req: Request, next: Next) -> Result<Response, StatusCode> {
    let Some(expected) = app.admin_key.as_deref() else {
        warn!("SECURITY: VITRINE_ADMIN_KEY not set - write access denied");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let ok = req.headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        warn!(path = %req.uri().path(), "unauthorized write attempt");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

pub fn build_router(app_state: AppState) -> Router {
    let admin = Router::new()
        .route("/api/changelog", post(create_entry))
        .route("/api/changelog/{version}", put(update_entry).delete(delete_entry))
        .route("/api/upload", post(upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)))
        .route_layer(middleware::from_fn_with_state(app_state.clone(), require_admin_key));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/versions", get(get_versions))
        .route("/api/nintendo", get(get_presence))
        .route("/api/changelog", get(list_entries))
        .route("/api/changelog/{version}", get(get_entry))
        .merge(admin)
        .nest_service("/uploads", ServeDir::new(app_state.uploads.dir()))
        .with_state(app_state)
}

// GET /api/versions
async fn get_versions(State(app): State<AppState>) -> Json<VersionSnapshot> {
    Json(app.versions.get_versions().await)
}

// GET /api/nintendo
async fn get_presence(State(app): State<AppState>) -> Result<Json<PresenceResponse>, ApiError> {
    app.presence
        .get_presence()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}

// GET /api/changelog (liste)
async fn list_entries(State(app): State<AppState>) -> Json<Vec<ChangelogEntry>> {
    Json(app.changelog.list().await)
}

// GET /api/changelog/{version} (détail)
async fn get_entry(
    State(app): State<AppState>,
    Path(version): Path<String>,
) -> Result<Json<ChangelogEntry>, ApiError> {
    app.changelog.get(&version).await.map(Json).map_err(changelog_error)
}

// POST /api/changelog
async fn create_entry(
    State(app): State<AppState>,
    Json(entry): Json<ChangelogEntry>,
) -> Result<(StatusCode, Json<ChangelogEntry>), ApiError> {
    let created = app.changelog.create(entry).await.map_err(changelog_error)?;
    Ok((StatusCode::CREATED, Json(created)))
}

// PUT /api/changelog/{version}
async fn update_entry(
    State(app): State<AppState>,
    Path(version): Path<String>,
    Json(entry): Json<ChangelogEntry>,
) -> Result<Json<ChangelogEntry>, ApiError> {
    app.changelog.update(&version, entry).await.map(Json).map_err(changelog_error)
}

// DELETE /api/changelog/{version}
async fn delete_entry(
    State(app): State<AppState>,
    Path(version): Path<String>,
) -> Result<Json<Value>, ApiError> {
    app.changelog.delete(&version).await.map_err(changelog_error)?;
    Ok(Json(json!({ "status": "deleted" })))
}

// POST /api/upload (multipart, un fichier)
async fn upload(State(app): State<AppState>, multipart: Multipart) -> Result<Json<Value>, ApiError> {
    let (file_name, bytes) = read_first_file(multipart).await.map_err(upload_error)?;
    let url = app.uploads.save(file_name.as_deref(), &bytes).await.map_err(upload_error)?;
    Ok(Json(json!({ "url": url })))
}

fn changelog_error(e: ChangelogError) -> ApiError {
    let status = match &e {
        ChangelogError::NotFound(_) => StatusCode::NOT_FOUND,
        ChangelogError::Conflict(_) => StatusCode::CONFLICT,
        ChangelogError::Invalid(_) => StatusCode::BAD_REQUEST,
        ChangelogError::Serialization(_) | ChangelogError::Io(_) => {
            error!("changelog storage failure: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "error": e.to_string() })))
}

fn upload_error(e: UploadError) -> ApiError {
    let status = match &e {
        UploadError::MissingFile | UploadError::Multipart(_) => StatusCode::BAD_REQUEST,
        UploadError::Io(_) => {
            error!("upload storage failure: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "error": e.to_string() })))
}
