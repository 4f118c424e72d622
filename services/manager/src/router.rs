//! Axum Router Configuration
//!
//! All routes live under `/{name}`, the configured manager name: the control
//! API, the speech WebSockets and the OpenAPI description.

use crate::{
    handlers,
    models::{CommandResponse, LastResult, StatusResponse},
    state::AppState,
    ws::{speech_interp_ws_handler, speech_ws_handler},
};

use axum::{
    Json, Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::start_session,
        handlers::stop_session,
        handlers::get_status,
    ),
    components(
        schemas(CommandResponse, StatusResponse, LastResult)
    ),
    tags(
        (name = "TUG manager", description = "Control of the Timed-Up-and-Go session supervisor")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let prefix = format!("/{}", app_state.config.name);

    let api_router = Router::new()
        .route("/start", post(handlers::start_session))
        .route("/stop", post(handlers::stop_session))
        .route("/status", get(handlers::get_status))
        .route("/speech", get(speech_ws_handler))
        .route("/speech-interp", get(speech_interp_ws_handler))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }));

    Router::new()
        .nest(&prefix, api_router)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAnalysis, FakePerception, FakeSpeechStatus, test_config};
    use crate::ws::SpeechHub;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use futures_util::{SinkExt, Stream, StreamExt};
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::{mpsc, watch};
    use tokio_tungstenite::{connect_async, tungstenite::Message};
    use tower::ServiceExt;
    use tug_core::services::SpeechOutput;
    use tug_core::{PhraseBook, SessionManager, SpeechChannel, SpokenAnswerListener, Utterance};

    struct TestApp {
        router: Router,
        state: Arc<AppState>,
        listener: Arc<SpokenAnswerListener>,
        utterances: Option<mpsc::Receiver<Utterance>>,
        interrupt: watch::Sender<bool>,
    }

    fn app(perception_acks: bool) -> TestApp {
        let (interrupt_tx, interrupt) = watch::channel(false);
        let config = Arc::new(test_config());
        let phrases = Arc::new(PhraseBook::from_map(HashMap::from([
            ("speed".to_string(), "Walk at your usual pace".to_string()),
            ("aid".to_string(), "Use your cane if you need it".to_string()),
        ])));
        let speech_hub = SpeechHub::new("speech", 8);
        let interp_hub = SpeechHub::new("speech-interp", 8);
        let speech = SpeechChannel::new(
            phrases.clone(),
            Arc::new(speech_hub.clone()),
            Arc::new(FakeSpeechStatus),
            Duration::from_millis(100),
            interrupt.clone(),
        );
        let listener = Arc::new(SpokenAnswerListener::new(
            phrases,
            Arc::new(interp_hub.clone()),
        ));
        let manager = Arc::new(SessionManager::new(
            config.session_settings(),
            Arc::new(FakeAnalysis),
            Arc::new(FakePerception::new(perception_acks)),
            speech,
            listener.clone(),
            interrupt.clone(),
        ));
        let (utterances, utterance_rx) = mpsc::channel(4);
        let state = Arc::new(AppState {
            manager,
            speech_hub,
            interp_hub,
            utterances,
            interrupt,
            config,
        });
        TestApp {
            router: create_router(state.clone()),
            state,
            listener,
            utterances: Some(utterance_rx),
            interrupt: interrupt_tx,
        }
    }

    async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    /// Serves `router` on an ephemeral port and returns its address.
    async fn serve(router: Router) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        addr
    }

    async fn next_text<S>(socket: &mut S) -> String
    where
        S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("no message within 5s")
            .expect("socket closed")
            .unwrap();
        message.to_text().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_start_and_status() {
        let app = app(true);

        let (status, body) = send(app.router.clone(), "POST", "/managerTUG/start").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"ok": true, "state": "idle"}));

        let (status, body) = send(app.router, "GET", "/managerTUG/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "idle");
        assert!(body["last_result"].is_null());
    }

    #[tokio::test]
    async fn test_unacknowledged_stop_still_stops() {
        let app = app(false);

        let (status, body) = send(app.router.clone(), "POST", "/managerTUG/stop").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"ok": false, "state": "stopped"}));

        let (_, body) = send(app.router, "GET", "/managerTUG/status").await;
        assert_eq!(body["state"], "stopped");
    }

    #[tokio::test]
    async fn test_rejected_start_reports_unchanged_state() {
        let app = app(false);

        let (status, body) = send(app.router.clone(), "POST", "/managerTUG/start").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"ok": false, "state": "idle"}));
        let (_, body) = send(app.router, "GET", "/managerTUG/status").await;
        assert_eq!(body["state"], "idle");
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let app = app(true);
        let (status, body) = send(app.router, "GET", "/managerTUG/api-docs/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/start"]["post"].is_object());
        assert!(body["paths"]["/status"]["get"].is_object());
    }

    #[tokio::test]
    async fn test_speech_socket_counts_as_peer_and_receives_phrases() {
        let app = app(true);
        let addr = serve(app.router.clone()).await;
        assert_eq!(app.state.speech_hub.peer_count(), 0);

        let (mut socket, _) = connect_async(format!("ws://{}/managerTUG/speech", addr))
            .await
            .unwrap();
        assert_eq!(app.state.speech_hub.peer_count(), 1);

        app.state.speech_hub.push("Ready? Go!");
        assert_eq!(next_text(&mut socket).await, "Ready? Go!");

        app.interrupt.send(true).unwrap();
    }

    #[tokio::test]
    async fn test_speech_interp_socket_round_trip() {
        let mut app = app(true);
        let utterances = app.utterances.take().unwrap();
        let (listener, interrupt) = (app.listener.clone(), app.state.interrupt.clone());
        tokio::spawn(async move { listener.run(utterances, interrupt).await });
        let addr = serve(app.router.clone()).await;

        let (mut socket, _) = connect_async(format!("ws://{}/managerTUG/speech-interp", addr))
            .await
            .unwrap();

        socket
            .send(Message::text(
                r#"{"keyword": "speed", "payload": {"pace": "slow"}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(next_text(&mut socket).await, "Walk at your usual pace");
        assert_eq!(
            app.listener.answers().current().as_deref(),
            Some("Walk at your usual pace")
        );

        socket
            .send(Message::text("aid can I use my cane"))
            .await
            .unwrap();
        assert_eq!(next_text(&mut socket).await, "Use your cane if you need it");

        app.interrupt.send(true).unwrap();
    }
}
