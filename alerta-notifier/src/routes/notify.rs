//! Batch ingest endpoint for the external queue collaborator.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::post,
};
use serde::Deserialize;

use shared::models::BatchReport;

use crate::app_state::AppState;

/// One inbound batch. Each record is the raw JSON body of one queued
/// message, exactly as the queue delivered it.
#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub records: Vec<String>,
}

/// Processes every record independently and always answers 202: per-record
/// dispositions (including retryable ones) live in the [`BatchReport`] body,
/// which is the caller's redelivery decision input.
async fn notify(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NotifyRequest>,
) -> impl IntoResponse {
    let report = state.intake.handle_batch(&request.records).await;
    (StatusCode::ACCEPTED, Json(report))
}

pub fn create_notify_router() -> Router<Arc<AppState>> {
    Router::new().route("/notify", post(notify))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::app_state::testing::test_state;
    use crate::store::testing::MemoryStore;
    use crate::transport::testing::ScriptedTransport;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn batch_is_accepted_and_reported_per_record() {
        let store = Arc::new(MemoryStore::with_subscriptions(&[("c1", "incidentes")]));
        let transport = Arc::new(ScriptedTransport::new());
        let state = test_state(store, transport.clone());
        let app = create_notify_router().with_state(state);

        let body = json!({
            "records": [
                "{broken",
                r#"{"channelKey":"incidentes","eventType":"IncidenteCreado","payload":{"incidenciaId":"inc-1"}}"#,
            ]
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/notify")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let report: BatchReport = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.summary.delivered, 1);
        assert_eq!(transport.call_count(), 1);
    }
}
