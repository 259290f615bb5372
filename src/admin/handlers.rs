use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use super::dto::{
    DeleteQuery, LoginRequest, LoginResponse, Notice, PurgeConfirmRequest, PurgeResponse,
    PurgeTicketResponse, RecordsResponse,
};
use super::export;
use super::extractors::AdminSession;
use crate::config::ListingOrder;
use crate::registration::model::COLUMNS;
use crate::state::AppState;
use crate::store::{StoreError, StoredRow};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(login))
        .route("/admin/records", get(list_records).delete(delete_record))
        .route("/admin/records/purge", post(request_purge))
        .route("/admin/records/purge/confirm", post(confirm_purge))
        .route("/admin/export.csv", get(export_csv))
        .route("/admin/export.json", get(export_json))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, String)> {
    match state.admin.login(&payload.secret) {
        Ok(Some(access_token)) => {
            info!("admin logged in");
            Ok(Json(LoginResponse { access_token }))
        }
        Ok(None) => {
            warn!("admin login rejected");
            Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()))
        }
        Err(e) => {
            error!(error = %e, "admin login failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Login unavailable".into()))
        }
    }
}

#[instrument(skip_all)]
pub async fn list_records(
    State(state): State<AppState>,
    AdminSession(_): AdminSession,
) -> Result<Json<RecordsResponse>, (StatusCode, String)> {
    let mut rows = load_rows(&state).await?;
    let order = match state.config.listing_order {
        ListingOrder::NewestFirst => {
            rows.reverse();
            "newest-first"
        }
        ListingOrder::Insertion => "insertion",
    };
    Ok(Json(RecordsResponse {
        columns: COLUMNS.to_vec(),
        order,
        rows,
    }))
}

#[instrument(skip(state, _session))]
pub async fn delete_record(
    State(state): State<AppState>,
    _session: AdminSession,
    Query(q): Query<DeleteQuery>,
) -> Result<Json<Notice>, (StatusCode, String)> {
    let store = state.store.handle().map_err(storage_error)?;
    match store.delete(&q.id).await {
        Ok(()) => {
            info!(id = %q.id, "record deleted by admin");
            Ok(Json(Notice {
                message: format!("Record {} deleted.", q.id),
            }))
        }
        Err(StoreError::NotFound(_)) => Err((
            StatusCode::NOT_FOUND,
            format!("No record with id \"{}\"; nothing was deleted.", q.id),
        )),
        Err(e) => Err(storage_error(e)),
    }
}

#[instrument(skip_all)]
pub async fn request_purge(
    State(state): State<AppState>,
    AdminSession(_): AdminSession,
) -> Result<Json<PurgeTicketResponse>, (StatusCode, String)> {
    let rows = load_rows(&state).await?.len();
    let (ticket, expires_at) = state.purge.issue().await;
    info!(rows, "purge ticket issued");
    Ok(Json(PurgeTicketResponse {
        ticket,
        expires_at,
        rows,
    }))
}

#[instrument(skip_all)]
pub async fn confirm_purge(
    State(state): State<AppState>,
    AdminSession(_): AdminSession,
    Json(body): Json<PurgeConfirmRequest>,
) -> Result<Json<PurgeResponse>, (StatusCode, String)> {
    if !state.purge.redeem(body.ticket).await {
        warn!("purge confirmation with stale or unknown ticket");
        return Err((
            StatusCode::CONFLICT,
            "Purge ticket is unknown or expired; request a new one.".into(),
        ));
    }
    let store = state.store.handle().map_err(storage_error)?;
    let removed = store.delete_all().await.map_err(storage_error)?;
    warn!(removed, "guest store purged by admin");
    Ok(Json(PurgeResponse { removed }))
}

#[instrument(skip_all)]
pub async fn export_csv(
    State(state): State<AppState>,
    AdminSession(_): AdminSession,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let rows = load_rows(&state).await?;
    let body = export::delimited(&rows).map_err(storage_error)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"guestbook.csv\"",
            ),
        ],
        body,
    ))
}

#[instrument(skip_all)]
pub async fn export_json(
    State(state): State<AppState>,
    AdminSession(_): AdminSession,
) -> Result<Json<export::GuestbookExport>, (StatusCode, String)> {
    let rows = load_rows(&state).await?;
    Ok(Json(export::hierarchical(&rows)))
}

async fn load_rows(state: &AppState) -> Result<Vec<StoredRow>, (StatusCode, String)> {
    let store = state.store.handle().map_err(storage_error)?;
    store.list_all().await.map_err(storage_error)
}

fn storage_error(e: StoreError) -> (StatusCode, String) {
    error!(error = %e, "admin storage operation failed");
    match e {
        StoreError::Unavailable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Guest store is not connected; check the server logs.".into(),
        ),
        StoreError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            format!("No record with id \"{id}\"."),
        ),
        _ => (
            StatusCode::BAD_GATEWAY,
            "Guest store operation failed; check the server logs.".into(),
        ),
    }
}
