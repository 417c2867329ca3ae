use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use gorgone_common::types::RequestContext;
use gorgone_common::GorgoneError;
use gorgone_ingest::handlers::AppIngestor;
use gorgone_jobs::{CallbackVerifier, HandlerRegistry, JobQueue};

#[derive(Clone)]
pub struct AppState {
    pub webhook_secret: String,
    pub verifier: CallbackVerifier,
    pub ingestor: Arc<AppIngestor>,
    pub registry: HandlerRegistry,
    pub queue: JobQueue,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/_jobs/{topic}", post(job_callback_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Inbound push-provider webhook. Authenticated by the shared secret in
/// `X-API-Key`; empty and test deliveries succeed without touching the
/// store.
async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let presented = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    if presented != Some(state.webhook_secret.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "invalid API key"})),
        )
            .into_response();
    }

    // The provider probes with empty bodies and connectivity tests; those
    // are acknowledged, not ingested.
    if body.is_empty() {
        return Json(empty_report()).into_response();
    }
    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "body is not valid JSON"})),
            )
                .into_response();
        }
    };
    if is_test_payload(&payload) {
        return Json(empty_report()).into_response();
    }

    let ctx = RequestContext::new(chrono::Utc::now() + chrono::Duration::seconds(30));
    match state.ingestor.ingest_webhook(&ctx, &payload).await {
        Ok(report) => Json(serde_json::to_value(&report).unwrap_or_default()).into_response(),
        Err(e) => error_response(e),
    }
}

fn empty_report() -> serde_json::Value {
    serde_json::json!({"received": 0, "inserted": 0, "duplicates": 0, "errors": 0})
}

fn is_test_payload(payload: &serde_json::Value) -> bool {
    if payload.is_null() {
        return true;
    }
    if let Some(array) = payload.as_array() {
        return array.is_empty();
    }
    if let Some(object) = payload.as_object() {
        if object.is_empty() {
            return true;
        }
        if object.get("test").and_then(|v| v.as_bool()) == Some(true) {
            return true;
        }
        if object.get("event_type").and_then(|v| v.as_str()) == Some("test_webhook_url") {
            return true;
        }
    }
    false
}

/// Queue-service callback for a delayed job. The signature covers the raw
/// body; with no signature header present, a bearer token is accepted for
/// local development.
async fn job_callback_handler(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get("x-queue-signature")
        .and_then(|v| v.to_str().ok());
    let authorization = headers.get("authorization").and_then(|v| v.to_str().ok());

    if let Err(e) = state.verifier.verify(&body, signature, authorization) {
        return error_response(e);
    }

    let Some(handler) = state.registry.get(&topic).cloned() else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("unknown topic: {topic}")})),
        )
            .into_response();
    };

    let payload: serde_json::Value = if body.is_empty() {
        serde_json::json!({})
    } else {
        match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": "body is not valid JSON"})),
                )
                    .into_response();
            }
        }
    };

    let deadline = handler.timeout().min(Duration::from_secs(300));
    match tokio::time::timeout(deadline, handler.handle(payload)).await {
        Ok(Ok(followups)) => {
            for f in followups {
                if let Err(e) = state
                    .queue
                    .enqueue(f.topic, &f.payload, f.run_after, f.idempotency_key.as_deref())
                    .await
                {
                    tracing::error!(topic = f.topic, error = %e, "Follow-up enqueue failed");
                }
            }
            Json(serde_json::json!({"ok": true})).into_response()
        }
        Ok(Err(e)) => {
            tracing::error!(topic, error = %e, "Job callback handler failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "handler deadline exceeded"})),
        )
            .into_response(),
    }
}

fn error_response(error: GorgoneError) -> axum::response::Response {
    let status = match &error {
        GorgoneError::Validation(_) | GorgoneError::Parse(_) => StatusCode::BAD_REQUEST,
        GorgoneError::SignatureInvalid => StatusCode::UNAUTHORIZED,
        GorgoneError::NotFound(_) => StatusCode::NOT_FOUND,
        GorgoneError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        GorgoneError::Provider { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %error, "Request failed");
    } else {
        tracing::warn!(error = %error, "Request rejected");
    }
    (status, Json(serde_json::json!({"error": error.to_string()}))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_detection() {
        assert!(is_test_payload(&serde_json::json!(null)));
        assert!(is_test_payload(&serde_json::json!([])));
        assert!(is_test_payload(&serde_json::json!({})));
        assert!(is_test_payload(&serde_json::json!({"test": true})));
        assert!(is_test_payload(
            &serde_json::json!({"event_type": "test_webhook_url"})
        ));
        assert!(!is_test_payload(
            &serde_json::json!({"rule_id": "R1", "tweets": []})
        ));
    }

    #[test]
    fn error_statuses_follow_the_wire_contract() {
        use axum::response::IntoResponse as _;

        let cases = [
            (GorgoneError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (GorgoneError::SignatureInvalid, StatusCode::UNAUTHORIZED),
            (GorgoneError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (GorgoneError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (
                GorgoneError::Database("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            let response = error_response(error).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
