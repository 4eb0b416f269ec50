//! Router assembly: chat endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - the chat endpoints used by the mobile client (paths at the root)
/// - lesson recommendation and session inspection endpoints
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/check-server", get(http::http_check_server))
        .route("/set-up-chat", post(http::http_set_up_chat))
        .route("/generate-response", post(http::http_generate_response))
        .route("/reset-chat", post(http::http_reset_chat))
        .route("/record-mistakes", post(http::http_record_mistakes))
        .route("/session-state", get(http::http_session_state))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use super::http::SESSION_HEADER;
    use crate::config::{AgentConfig, ServerConfig};
    use crate::testing::{sample_pack, FixedSampler, ScriptedOracle};

    async fn app_state(oracle: Arc<ScriptedOracle>) -> Arc<AppState> {
        let server = ServerConfig {
            port: 0,
            data_dir: "./no-such-data-dir".into(),
            default_language: "Spanish".into(),
            native_language: "English".into(),
            default_rating: 300,
            difficulty_seed: None,
        };
        let state = AppState::new(server, AgentConfig::default(), oracle, Arc::new(FixedSampler(300)));
        state.catalog.insert(sample_pack()).await;
        Arc::new(state)
    }

    async fn app(oracle: Arc<ScriptedOracle>) -> Router {
        build_router(app_state(oracle).await)
    }

    fn post_json(uri: &str, session: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .header(SESSION_HEADER, session)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_as(uri: &str, session: &str) -> Request<Body> {
        Request::get(uri)
            .header(SESSION_HEADER, session)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = send(app, req).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn check_server_reports_identity() {
        let app = app(Arc::new(ScriptedOracle::default())).await;
        let (status, body) = send_json(&app, get_as("/check-server", "x")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["server"].as_str().unwrap().starts_with("converso-backend/"));
    }

    #[tokio::test]
    async fn generate_before_set_up_is_rejected_without_oracle_calls() {
        let oracle = Arc::new(ScriptedOracle::default());
        let app = app(oracle.clone()).await;
        let (status, body) =
            send_json(&app, post_json("/generate-response", "alice", json!({"input": "hola"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_session_state");
        assert_eq!(body["retryable"], false);
        assert_eq!(oracle.calls.total(), 0);
    }

    #[tokio::test]
    async fn set_up_then_generate_returns_reply_and_rating() {
        let oracle = Arc::new(ScriptedOracle::default());
        let app = app(oracle.clone()).await;

        let (status, body) = send(
            &app,
            post_json("/set-up-chat", "alice", json!({"conversation_topic": "food"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"Chat Set Up");

        let (status, body) = send_json(
            &app,
            post_json(
                "/generate-response",
                "alice",
                json!({"input": "hola", "messages": [{"role": "system", "content": "ignored"}]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "bot reply 1");
        assert_eq!(body["users_rating"], 300);
        // Nothing to score on the first turn.
        assert_eq!(oracle.calls.score.load(Ordering::SeqCst), 0);

        let (_, state) = send_json(&app, get_as("/session-state", "alice")).await;
        assert_eq!(state["phase"], "ready");
        assert_eq!(state["cefr_level"], "A1");
        assert_eq!(state["topic"], "food");
        assert_eq!(state["language"], "Spanish");
        assert_eq!(state["message_count"], 2);
    }

    #[tokio::test]
    async fn sessions_are_keyed_by_header() {
        let app = app(Arc::new(ScriptedOracle::default())).await;
        send(
            &app,
            post_json("/set-up-chat", "alice", json!({"conversation_topic": "food", "users_rating": 900})),
        )
        .await;

        let (status, _) =
            send_json(&app, post_json("/generate-response", "bob", json!({"input": "hola"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, alice) = send_json(&app, get_as("/session-state", "alice")).await;
        let (_, bob) = send_json(&app, get_as("/session-state", "bob")).await;
        assert_eq!(alice["users_rating"], 900);
        assert_eq!(alice["cefr_level"], "B1");
        assert_eq!(bob["phase"], "uninitialized");
        assert_eq!(bob["users_rating"], Value::Null);
    }

    #[tokio::test]
    async fn reset_then_set_up_restores_initial_state() {
        let app = app(Arc::new(ScriptedOracle::default())).await;
        let setup = json!({"conversation_topic": "travel", "users_rating": 450});
        send(&app, post_json("/set-up-chat", "alice", setup.clone())).await;
        send(&app, post_json("/generate-response", "alice", json!({"input": "hola"}))).await;

        let (status, body) = send_json(
            &app,
            Request::post("/reset-chat")
                .header(SESSION_HEADER, "alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Chat has been reset.");

        let (_, after_reset) = send_json(&app, get_as("/session-state", "alice")).await;
        assert_eq!(after_reset["phase"], "uninitialized");

        send(&app, post_json("/set-up-chat", "alice", setup)).await;
        let (_, state) = send_json(&app, get_as("/session-state", "alice")).await;
        assert_eq!(state["phase"], "ready");
        assert_eq!(state["users_rating"], 450);
        assert_eq!(state["topic"], "travel");
        assert_eq!(state["message_count"], 0);
    }

    #[tokio::test]
    async fn unknown_language_fails_set_up() {
        let app = app(Arc::new(ScriptedOracle::default())).await;
        let (status, body) = send_json(
            &app,
            post_json("/set-up-chat", "alice", json!({"conversation_topic": "food", "language": "Klingon"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["kind"], "configuration");

        let (_, state) = send_json(&app, get_as("/session-state", "alice")).await;
        assert_eq!(state["phase"], "uninitialized");
    }

    #[tokio::test]
    async fn oracle_outage_is_retryable_and_leaves_session_intact() {
        let oracle = Arc::new(ScriptedOracle::default());
        let app = app(oracle.clone()).await;
        send(&app, post_json("/set-up-chat", "alice", json!({"conversation_topic": "food"}))).await;
        oracle.fail_reply.store(true, Ordering::SeqCst);

        let (status, body) =
            send_json(&app, post_json("/generate-response", "alice", json!({"input": "hola"}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["retryable"], true);

        let (_, state) = send_json(&app, get_as("/session-state", "alice")).await;
        assert_eq!(state["phase"], "ready");
        assert_eq!(state["message_count"], 0);
        assert_eq!(state["users_rating"], 300);
    }

    #[tokio::test]
    async fn repeated_mistakes_produce_a_recommendation() {
        let app = app(Arc::new(ScriptedOracle::default())).await;
        send(&app, post_json("/set-up-chat", "alice", json!({"conversation_topic": "food"}))).await;
        let body = json!({"mistake_types": ["Preterite Tense"]});
        for _ in 0..9 {
            let (status, out) = send_json(&app, post_json("/record-mistakes", "alice", body.clone())).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(out["recommendation"], Value::Null);
        }
        let (_, out) = send_json(&app, post_json("/record-mistakes", "alice", body)).await;
        assert_eq!(out["recommendation"], "Preterite Tense");
        assert!(out["message"].as_str().unwrap().contains("Preterite Tense"));

        let (_, state) = send_json(&app, get_as("/session-state", "alice")).await;
        assert_eq!(state["lesson_counters"], json!({"Preterite Tense": 10.0}));
    }

    #[tokio::test]
    async fn second_turn_is_scored_and_moves_the_rating() {
        let oracle = Arc::new(ScriptedOracle::default());
        oracle.set_quality(1.0);
        let app = app(oracle.clone()).await;
        send(&app, post_json("/set-up-chat", "alice", json!({"conversation_topic": "food"}))).await;

        let (_, first) =
            send_json(&app, post_json("/generate-response", "alice", json!({"input": "hola"}))).await;
        assert_eq!(first["score"], Value::Null);

        let (status, second) =
            send_json(&app, post_json("/generate-response", "alice", json!({"input": "yo como pan"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["data"], "bot reply 2");
        assert_eq!(second["users_rating"], 302);
        assert_eq!(second["score"]["final_score"], 1.0);

        let (_, state) = send_json(&app, get_as("/session-state", "alice")).await;
        assert_eq!(state["pending_bot_response"], "bot reply 2");
        assert_eq!(state["message_count"], 4);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_registered() {
        let state = app_state(Arc::new(ScriptedOracle::default())).await;
        let app = build_router(state.clone());

        for i in 0..50 {
            let (status, body) = send_json(&app, get_as("/session-state", &format!("visitor-{i}"))).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["phase"], "uninitialized");
        }
        let (status, body) = send_json(
            &app,
            post_json("/record-mistakes", "stranger", json!({"mistake_types": ["Articles"]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_session_state");

        assert!(state.sessions.get("visitor-0").await.is_none());
        assert!(state.sessions.get("visitor-49").await.is_none());
        assert!(state.sessions.get("stranger").await.is_none());
    }
}
