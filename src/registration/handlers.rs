use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::controller::{Outcome, SubmissionController};
use super::dto::{FormOptions, FormValues, SessionView};
use crate::state::AppState;

pub fn checkin_routes() -> Router<AppState> {
    Router::new()
        .route("/checkin/options", get(options))
        .route("/checkin/sessions", post(start_session))
        .route("/checkin/sessions/:id", get(get_session))
        .route("/checkin/sessions/:id/draft", put(save_draft))
        .route("/checkin/sessions/:id/submit", post(submit))
}

pub async fn options() -> Json<FormOptions> {
    Json(FormOptions::current())
}

#[instrument(skip(state))]
pub async fn start_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let (id, session) = state.sessions.create().await;
    (StatusCode::CREATED, Json(session.view(id)))
}

#[instrument(skip(state))]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, (StatusCode, String)> {
    state
        .sessions
        .get(id)
        .await
        .map(|s| Json(s.view(id)))
        .ok_or_else(unknown_session)
}

#[instrument(skip(state, values))]
pub async fn save_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(values): Json<FormValues>,
) -> Result<Json<SessionView>, (StatusCode, String)> {
    let mut slot = state.sessions.checkout(id).await.ok_or_else(unknown_session)?;
    let next = controller(&state).edit(slot.session(), values);
    let view = next.view(id);
    slot.put(next);
    Ok(Json(view))
}

#[instrument(skip(state, values))]
pub async fn submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(values): Json<FormValues>,
) -> Result<(StatusCode, Json<SessionView>), (StatusCode, String)> {
    let mut slot = state.sessions.checkout(id).await.ok_or_else(unknown_session)?;

    let (next, outcome) = controller(&state).submit(slot.session(), values).await;
    let view = next.view(id);
    slot.put(next);

    let status = match outcome {
        Outcome::Persisted { replayed: false, .. } => StatusCode::CREATED,
        Outcome::Persisted { replayed: true, .. } => StatusCode::OK,
        Outcome::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Outcome::StorageFailed => StatusCode::SERVICE_UNAVAILABLE,
    };
    Ok((status, Json(view)))
}

fn controller(state: &AppState) -> SubmissionController<'_> {
    SubmissionController::new(
        &state.store,
        state.config.rules,
        state.config.clear_on_success,
    )
}

fn unknown_session() -> (StatusCode, String) {
    warn!("unknown check-in session");
    (
        StatusCode::NOT_FOUND,
        "Session not found; start a new check-in.".into(),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        async_trait,
        body::{to_bytes, Body},
        http::Request,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::app::build_app;
    use crate::registration::builder::tests::valid_single;
    use crate::registration::model::GuestRecord;
    use crate::state::AppState;
    use crate::store::{GuestStore, RowId, StoreConnection, StoreError, StoredRow};

    async fn call(state: &AppState, req: Request<Body>) -> (axum::http::StatusCode, Value) {
        let resp = build_app(state.clone()).oneshot(req).await.expect("response");
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).expect("request")
    }

    fn post_json(uri: &str, body: &impl serde::Serialize) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).expect("json")))
            .expect("request")
    }

    fn submit_uri(id: &str) -> String {
        format!("/api/v1/checkin/sessions/{id}/submit")
    }

    async fn new_session(state: &AppState) -> String {
        let req = Request::post("/api/v1/checkin/sessions")
            .body(Body::empty())
            .expect("request");
        let (status, view) = call(state, req).await;
        assert_eq!(status, 201);
        assert_eq!(view["phase"], "collecting");
        view["session_id"].as_str().expect("id").to_string()
    }

    /// Accepts connections but never finishes an append.
    struct StalledStore;

    #[async_trait]
    impl GuestStore for StalledStore {
        fn backend(&self) -> &'static str {
            "stalled"
        }
        async fn initialize(&self) -> Result<(), StoreError> {
            Ok(())
        }
        async fn append(&self, _record: &GuestRecord) -> Result<(), StoreError> {
            std::future::pending::<Result<(), StoreError>>().await
        }
        async fn list_all(&self) -> Result<Vec<StoredRow>, StoreError> {
            Ok(Vec::new())
        }
        async fn delete(&self, id: &RowId) -> Result<(), StoreError> {
            Err(StoreError::NotFound(id.0.clone()))
        }
        async fn delete_all(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn options_list_both_select_boxes() {
        let state = AppState::fake();
        let (status, v) = call(&state, get("/api/v1/checkin/options")).await;
        assert_eq!(status, 200);
        assert_eq!(v["nationalities"][0], "Česko");
        assert_eq!(v["purposes"].as_array().expect("purposes").len(), 5);
    }

    #[tokio::test]
    async fn successful_submission_persists_once() {
        let state = AppState::fake();
        let id = new_session(&state).await;

        let (status, view) = call(&state, post_json(&submit_uri(&id), &valid_single())).await;
        assert_eq!(status, 201);
        assert_eq!(view["phase"], "persisted");
        assert_eq!(view["values"]["email"], "");

        // a reload re-posting the same form does not store it again
        let (status, _) = call(&state, post_json(&submit_uri(&id), &valid_single())).await;
        assert_eq!(status, 200);

        let store = state.store.handle().expect("connected");
        assert_eq!(store.list_all().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn invalid_submission_keeps_values_and_lists_errors() {
        let state = AppState::fake();
        let id = new_session(&state).await;
        let mut values = valid_single();
        values.departure = values.arrival.clone();
        values.consent = false;

        let (status, view) = call(&state, post_json(&submit_uri(&id), &values)).await;
        assert_eq!(status, 422);
        assert_eq!(view["phase"], "collecting");
        assert_eq!(view["errors"].as_array().expect("errors").len(), 2);
        assert_eq!(view["values"]["primary"]["name"], " Jan Novák ");

        let uri = format!("/api/v1/checkin/sessions/{id}");
        let (_, reloaded) = call(&state, get(&uri)).await;
        assert_eq!(reloaded["values"]["departure"], "1. 7. 2025");
        let store = state.store.handle().expect("connected");
        assert!(store.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn draft_is_saved_without_validation() {
        let state = AppState::fake();
        let id = new_session(&state).await;
        let body = serde_json::json!({ "email": "half-typed@", "guests": 2 });
        let req = Request::put(format!("/api/v1/checkin/sessions/{id}/draft"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        let (status, view) = call(&state, req).await;
        assert_eq!(status, 200);
        assert_eq!(view["errors"].as_array().expect("errors").len(), 0);
        assert_eq!(view["values"]["guests"], 2);
        assert_eq!(view["values"]["email"], "half-typed@");
    }

    #[tokio::test]
    async fn storage_outage_shows_generic_message() {
        let mut state = AppState::fake();
        state.store = StoreConnection::Unavailable("token expired".into());
        let id = new_session(&state).await;

        let (status, view) = call(&state, post_json(&submit_uri(&id), &valid_single())).await;
        assert_eq!(status, 503);
        let message = view["message"].as_str().expect("message");
        assert!(message.contains("administrator"));
        assert!(!message.contains("token"));
    }

    #[tokio::test]
    async fn stalled_append_only_blocks_its_own_session() {
        let mut state = AppState::fake();
        state.store = StoreConnection::Connected(Arc::new(StalledStore));
        let stuck = new_session(&state).await;
        let other = new_session(&state).await;

        let app = build_app(state.clone());
        let req = post_json(&submit_uri(&stuck), &valid_single());
        let pending = tokio::spawn(async move { app.oneshot(req).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let wait = Duration::from_secs(2);
        let uri = format!("/api/v1/checkin/sessions/{other}");
        let (status, view) = tokio::time::timeout(wait, call(&state, get(&uri)))
            .await
            .expect("other session answers while a submit is stalled");
        assert_eq!(status, 200);
        assert_eq!(view["phase"], "collecting");

        let (status, _) = tokio::time::timeout(wait, call(&state, get("/api/v1/health")))
            .await
            .expect("health answers while a submit is stalled");
        assert_eq!(status, 200);

        assert!(!pending.is_finished());
        pending.abort();
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let state = AppState::fake();
        let uri = submit_uri(&uuid::Uuid::new_v4().to_string());
        let (status, _) = call(&state, post_json(&uri, &valid_single())).await;
        assert_eq!(status, 404);
    }
}
