//! Axum router configuration

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::handlers::{active_sessions, health_check, store_stats, version_check};
use super::sessions::{
    cancel_session, create_session, delete_record, get_record, get_session, list_sessions,
    session_timings,
};

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    // Browser extensions call this from arbitrary page origins, so CORS is
    // wide open when enabled.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::ORIGIN])
        .max_age(Duration::from_secs(3600));

    let mut router = Router::new()
        // Health and version endpoints
        .route("/health", get(health_check))
        .route("/version", get(version_check))
        // Debug endpoints
        .route("/debug/store", get(store_stats))
        .route("/debug/sessions", get(active_sessions))
        // Session lifecycle
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/{id}", get(get_session).delete(cancel_session))
        .route("/sessions/{id}/timings", get(session_timings))
        // Stored records
        .route(
            "/records/{platform}/{video_id}",
            get(get_record).delete(delete_record),
        )
        // Middleware
        .layer(TraceLayer::new_for_http());

    if state.config.cors_enabled {
        router = router.layer(cors);
    }

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::fixtures::make_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt; // Use tower::util::ServiceExt for oneshot

    fn json_request(method: Method, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(Arc::new(make_state()));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let app = create_router(Arc::new(make_state()));

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/sessions")
            .header(header::ORIGIN, "https://www.youtube.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_METHODS)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("POST"));
    }

    #[tokio::test]
    async fn test_create_session_and_status() {
        let state = Arc::new(make_state());
        let app = create_router(state.clone());

        let body = r#"{
            "platform": "youtube",
            "video_id": "vid1",
            "source_language": "en",
            "target_language": "es",
            "cues": [
                {"start_time_ms": 0, "end_time_ms": 1000, "text": "Hello"},
                {"start_time_ms": 1000, "end_time_ms": 2000, "text": "World"}
            ]
        }"#;
        let response = app
            .clone()
            .oneshot(json_request(Method::POST, "/sessions", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let created = body_json(response).await;
        assert_eq!(created["cached"], false);
        assert_eq!(created["cue_count"], 2);
        assert_eq!(created["batch_count"], 1);
        let session_id = created["session_id"].as_str().unwrap().to_string();
        assert_eq!(state.session_count(), 1);

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/sessions/{}", session_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let status = body_json(response).await;
        assert_eq!(status["cue_count"], 2);
        assert_eq!(status["platform"], "youtube");

        let response = app
            .oneshot(
                Request::get(format!("/sessions/{}/timings", session_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let timings = body_json(response).await;
        assert_eq!(timings["timings"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_session_rejects_empty_cues() {
        let app = create_router(Arc::new(make_state()));
        let body = r#"{
            "platform": "youtube",
            "video_id": "vid1",
            "source_language": "en",
            "target_language": "es"
        }"#;
        let response = app
            .oneshot(json_request(Method::POST, "/sessions", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_session_not_found() {
        let app = create_router(Arc::new(make_state()));
        let response = app
            .oneshot(Request::get("/sessions/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_session() {
        let state = Arc::new(make_state());
        let app = create_router(state.clone());

        let body = r#"{
            "platform": "youtube",
            "video_id": "vid1",
            "source_language": "en",
            "target_language": "es",
            "cues": [{"start_time_ms": 0, "end_time_ms": 1000, "text": "Hello"}]
        }"#;
        let response = app
            .clone()
            .oneshot(json_request(Method::POST, "/sessions", body))
            .await
            .unwrap();
        let session_id = body_json(response).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .oneshot(
                Request::delete(format!("/sessions/{}", session_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(!state.get_session(&session_id).unwrap().is_active());
    }

    #[tokio::test]
    async fn test_record_endpoints() {
        let state = Arc::new(make_state());
        state
            .store
            .put(crate::integration::fixtures::sample_record("vid9"))
            .unwrap();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(
                Request::get("/records/youtube/vid9?source=en&target=es")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let record = body_json(response).await;
        assert_eq!(record["video_id"], "vid9");

        let response = app
            .clone()
            .oneshot(
                Request::delete("/records/youtube/vid9?source=en&target=es")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                Request::get("/records/youtube/vid9?source=en&target=es")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cached_record_short_circuits_session() {
        let state = Arc::new(make_state());
        state
            .store
            .put(crate::integration::fixtures::sample_record("vid9"))
            .unwrap();
        let app = create_router(state.clone());

        let body = r#"{
            "platform": "youtube",
            "video_id": "vid9",
            "source_language": "en",
            "target_language": "es",
            "cues": [{"start_time_ms": 0, "end_time_ms": 1000, "text": "Hello"}]
        }"#;
        let response = app
            .oneshot(json_request(Method::POST, "/sessions", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let created = body_json(response).await;
        assert_eq!(created["cached"], true);
        assert!(created["record"].is_object());
        assert_eq!(state.session_count(), 0);
    }
}
