use std::net::SocketAddr;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{admin, registration};

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub store: &'static str,
    pub active_sessions: usize,
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1",
              Router::new()
                  .merge(registration::router())
                  .merge(admin::router())
                  .route("/health", get(health))
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

/// Liveness stays "ok" while the store is down so the form can still
/// report the outage to guests.
async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        store: if state.store.is_connected() {
            "connected"
        } else {
            "unavailable"
        },
        active_sessions: state.sessions.active_count().await,
    })
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
        .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::build_app;
    use crate::state::AppState;
    use crate::store::StoreConnection;

    async fn health(state: AppState) -> Value {
        let resp = build_app(state)
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).expect("req"))
            .await
            .expect("response");
        assert_eq!(resp.status(), 200);
        let body = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&body).expect("json")
    }

    #[tokio::test]
    async fn health_reports_store_state() {
        let v = health(AppState::fake()).await;
        assert_eq!(v["status"], "ok");
        assert_eq!(v["store"], "connected");
        assert_eq!(v["active_sessions"], 0);

        let mut state = AppState::fake();
        state.store = StoreConnection::Unavailable("no credentials".into());
        let v = health(state).await;
        assert_eq!(v["status"], "ok");
        assert_eq!(v["store"], "unavailable");
    }
}
