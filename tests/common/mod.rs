//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;

use proxy_manager::document::Document;

/// How the mock engine should treat the next push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushBehavior {
    Accept,
    /// Respond 400 as if the document were invalid.
    Reject,
    /// Hang long enough for the client timeout to fire.
    Hang,
}

struct EngineState {
    document: Document,
    push_behavior: PushBehavior,
    push_count: usize,
}

/// In-process stand-in for the proxy engine's admin API.
#[derive(Clone)]
pub struct MockEngine {
    pub addr: SocketAddr,
    state: Arc<Mutex<EngineState>>,
}

impl MockEngine {
    /// Start the mock engine with an empty base document.
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(EngineState {
            document: Document::base(vec![]),
            push_behavior: PushBehavior::Accept,
            push_count: 0,
        }));

        let app = Router::new()
            .route("/config/", get(get_config))
            .route("/load", post(load_config))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn admin_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn document(&self) -> Document {
        self.state.lock().unwrap().document.clone()
    }

    pub fn push_count(&self) -> usize {
        self.state.lock().unwrap().push_count
    }

    pub fn set_push_behavior(&self, behavior: PushBehavior) {
        self.state.lock().unwrap().push_behavior = behavior;
    }
}

async fn get_config(State(state): State<Arc<Mutex<EngineState>>>) -> Json<Document> {
    Json(state.lock().unwrap().document.clone())
}

async fn load_config(
    State(state): State<Arc<Mutex<EngineState>>>,
    Json(document): Json<Document>,
) -> impl IntoResponse {
    let behavior = state.lock().unwrap().push_behavior;
    match behavior {
        PushBehavior::Reject => {
            (StatusCode::BAD_REQUEST, "loading config: invalid document").into_response()
        }
        PushBehavior::Hang => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK.into_response()
        }
        PushBehavior::Accept => {
            let mut guard = state.lock().unwrap();
            guard.document = document.clone();
            guard.push_count += 1;
            Json(document).into_response()
        }
    }
}
