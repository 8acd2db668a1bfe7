use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::access::AccessMap;
use crate::commands::ACCESS_DENIED;
use crate::models::StatusSnapshot;
use crate::registry::Registry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub access: Arc<AccessMap>,
}

pub async fn get_snapshots(State(state): State<AppState>) -> Json<Vec<StatusSnapshot>> {
    Json(state.registry.snapshots().await)
}

pub async fn get_target_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<String, (StatusCode, String)> {
    state
        .registry
        .status_of(&name)
        .await
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("unknown target '{name}'")))
}

pub async fn get_user_status(
    State(state): State<AppState>,
    Path(user): Path<i64>,
) -> Result<String, (StatusCode, String)> {
    match state.access.visible_to(user) {
        Some(visible) => Ok(state.registry.status_for(visible).await),
        None => Err((StatusCode::FORBIDDEN, ACCESS_DENIED.to_string())),
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(get_snapshots))
        .route("/api/status/{name}", get(get_target_status))
        .route("/api/users/{user}/status", get(get_user_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(port: u16, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Status API: http://localhost:{}", addr.port());
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CheckType, Target};
    use crate::registry::testing::scripted;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let registry = scripted(&[("home", vec![]), ("office", vec![])]);
        let access = AccessMap::from_targets(&[Target {
            name: "home".into(),
            address: "home.example".into(),
            members: vec![1],
            check: CheckType::default(),
        }]);
        create_router(AppState { registry: Arc::new(registry), access: Arc::new(access) })
    }

    async fn fetch(uri: &str) -> (StatusCode, String) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn lists_snapshots() {
        let (status, body) = fetch("/api/status").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["name"], "home");
        assert_eq!(json[0]["state"], serde_json::Value::Null);
        assert_eq!(json[0]["total_up_secs"], 0);
    }

    #[tokio::test]
    async fn single_target_status() {
        let (status, body) = fetch("/api/status/office").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("office"));

        let (status, _) = fetch("/api/status/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn user_status_is_access_checked() {
        let (status, body) = fetch("/api/users/1/status").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("home"));
        assert!(!body.contains("office"));

        let (status, body) = fetch("/api/users/2/status").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, ACCESS_DENIED);
    }
}
