//! Connection lifecycle routes, called by the websocket gateway in front of
//! this service on connect, authenticate, subscribe, and disconnect.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::{Value, json};

use shared::models::Identity;

use crate::app_state::AppState;
use crate::http::error::AppResult;

/// Claims already verified by the gateway's authentication collaborator.
/// This service only records them; it never validates tokens itself.
#[derive(Debug, Deserialize)]
pub struct AuthenticateRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub role: String,
    /// Session expiry in epoch seconds.
    pub expiration: i64,
}

async fn connect(
    State(state): State<Arc<AppState>>,
    Path(connection_id): Path<String>,
) -> AppResult<StatusCode> {
    state.registry.register_connection(&connection_id).await?;
    Ok(StatusCode::CREATED)
}

async fn disconnect(
    State(state): State<Arc<AppState>>,
    Path(connection_id): Path<String>,
) -> AppResult<Json<Value>> {
    let removed = state.registry.disconnect(&connection_id).await?;
    Ok(Json(json!({ "removed": removed })))
}

/// The gateway's auth check: returns the identity of an authenticated,
/// unexpired connection, 403 otherwise.
async fn verify(
    State(state): State<Arc<AppState>>,
    Path(connection_id): Path<String>,
) -> AppResult<Json<Identity>> {
    let identity = state.registry.verify_connection(&connection_id).await?;
    Ok(Json(identity))
}

async fn authenticate(
    State(state): State<Arc<AppState>>,
    Path(connection_id): Path<String>,
    Json(request): Json<AuthenticateRequest>,
) -> AppResult<StatusCode> {
    let identity = Identity {
        user_id: request.user_id,
        role: request.role,
    };
    state
        .registry
        .authenticate(&connection_id, &identity, request.expiration)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn subscribe(
    State(state): State<Arc<AppState>>,
    Path((connection_id, channel)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state.registry.subscribe(&connection_id, &channel).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    Path((connection_id, channel)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state.registry.unsubscribe(&connection_id, &channel).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_connections_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/connections/{id}",
            get(verify).post(connect).delete(disconnect),
        )
        .route("/connections/{id}/authenticate", post(authenticate))
        .route(
            "/connections/{id}/subscriptions/{channel}",
            put(subscribe).delete(unsubscribe),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use shared::models::METADATA_CHANNEL;

    use crate::app_state::testing::test_state;
    use crate::store::testing::MemoryStore;
    use crate::transport::testing::ScriptedTransport;

    fn app(store: Arc<MemoryStore>) -> Router {
        create_connections_router()
            .with_state(test_state(store, Arc::new(ScriptedTransport::new())))
    }

    fn request(method: &str, uri: &str, body: Option<String>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    #[tokio::test]
    async fn connect_writes_the_metadata_row() {
        let store = Arc::new(MemoryStore::new());
        let app = app(store.clone());

        let response = app
            .oneshot(request("POST", "/connections/c1", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(store.contains("c1", METADATA_CHANNEL));
    }

    #[tokio::test]
    async fn subscribe_rejects_the_metadata_channel() {
        let store = Arc::new(MemoryStore::new());
        let app = app(store);

        let response = app
            .oneshot(request(
                "PUT",
                "/connections/c1/subscriptions/metadata",
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn subscribe_then_disconnect_removes_every_row() {
        let store = Arc::new(MemoryStore::new());
        let app = app(store.clone());

        let response = app
            .clone()
            .oneshot(request("POST", "/connections/c1", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(request(
                "PUT",
                "/connections/c1/subscriptions/incidentes",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(store.contains("c1", "incidentes"));

        let response = app
            .oneshot(request("DELETE", "/connections/c1", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn authenticate_requires_a_known_connection() {
        let store = Arc::new(MemoryStore::new());
        let app = app(store);

        let response = app
            .oneshot(request(
                "POST",
                "/connections/ghost/authenticate",
                Some(r#"{"userId":"user-1","role":"estudiante","expiration":4102444800}"#.into()),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn authenticate_then_verify_returns_the_identity() {
        let store = Arc::new(MemoryStore::new());
        let app = app(store.clone());

        app.clone()
            .oneshot(request("POST", "/connections/c1", None))
            .await
            .unwrap();

        // Unauthenticated connections fail the gateway's auth check.
        let response = app
            .clone()
            .oneshot(request("GET", "/connections/c1", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/connections/c1/authenticate",
                Some(r#"{"userId":"user-1","role":"autoridad","expiration":4102444800}"#.into()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(request("GET", "/connections/c1", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let identity: Identity = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(identity.user_id, "user-1");
        assert_eq!(identity.role, "autoridad");
    }
}
