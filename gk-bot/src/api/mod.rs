//! HTTP ingress
//!
//! A gateway relay posts chat events here; they are queued on the event
//! bus and answered before any handling happens.

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use gk_common::events::{ChatEvent, EventBus};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub bus: EventBus,
}

impl AppState {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "gk-bot".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /events
///
/// 202 once queued; 503 when no dispatcher is listening.
pub async fn post_event(State(state): State<AppState>, Json(event): Json<ChatEvent>) -> StatusCode {
    let kind = event.kind();
    match state.bus.emit(event) {
        Ok(_) => {
            debug!(event = kind, "Chat event queued");
            StatusCode::ACCEPTED
        }
        Err(_) => {
            warn!(event = kind, "Chat event dropped: dispatcher not running");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", post(post_event))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health() {
        let app = build_router(AppState::new(EventBus::new(8)));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["module"], "gk-bot");
    }

    #[tokio::test]
    async fn test_event_is_queued() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let app = build_router(AppState::new(bus));

        let body = r#"{"type":"MemberUpdated","guild_id":"1","member_id":"2",
            "before_roles":[],"after_roles":["GN1"]}"#;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/events")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        match rx.recv().await.unwrap() {
            ChatEvent::MemberUpdated(update) => {
                assert_eq!(update.after_roles, vec!["GN1".to_string()])
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_event_without_dispatcher() {
        let app = build_router(AppState::new(EventBus::new(8)));

        let body = r#"{"type":"MessageCreated","guild_id":"1","channel_id":"2",
            "author_id":"3","content":"hi"}"#;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/events")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_malformed_event_rejected() {
        let app = build_router(AppState::new(EventBus::new(8)));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/events")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"type":"Typing"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
