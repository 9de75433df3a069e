use std::{collections::VecDeque, sync::Arc};

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::Value;
use tokio::sync::Mutex;

/// One scripted reply from the mock `/generate`
#[derive(Clone, Debug)]
pub struct MockReply {
    pub status: u16,
    pub body: String,
    pub delay_ms: u64,
}

impl MockReply {
    pub fn json(body: Value) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            delay_ms: 0,
        }
    }

    pub fn raw(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay_ms: 0,
        }
    }

    pub fn delayed(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

#[derive(Default)]
struct MockState {
    /// Replies are consumed in order; the last one repeats once the queue runs dry
    replies: VecDeque<MockReply>,
    last: Option<MockReply>,
    requests: Vec<Value>,
}

/// Mock SGLang server for testing
pub struct MockSglang {
    state: Arc<Mutex<MockState>>,
    shutdown_handle: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    url: String,
}

impl MockSglang {
    /// Start a server on an ephemeral port that answers with `replies` in order
    pub async fn start(replies: Vec<MockReply>) -> Self {
        let state = Arc::new(Mutex::new(MockState {
            replies: replies.into(),
            ..Default::default()
        }));

        let app = Router::new()
            .route("/generate", post(generate_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let port = listener.local_addr().unwrap().port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                eprintln!("Mock server error: {}", e);
            }
        });

        Self {
            state,
            shutdown_handle: Some(handle),
            shutdown_tx: Some(shutdown_tx),
            url: format!("http://127.0.0.1:{}", port),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Bodies received so far, in arrival order
    pub async fn requests(&self) -> Vec<Value> {
        self.state.lock().await.requests.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.state.lock().await.requests.len()
    }

    pub async fn stop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(handle) = self.shutdown_handle.take() {
            let _ = tokio::time::timeout(tokio::time::Duration::from_secs(5), handle).await;
        }
    }
}

impl Drop for MockSglang {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

async fn generate_handler(
    State(state): State<Arc<Mutex<MockState>>>,
    Json(body): Json<Value>,
) -> Response {
    let reply = {
        let mut state = state.lock().await;
        state.requests.push(body);
        let reply = match state.replies.pop_front() {
            Some(reply) => reply,
            None => state
                .last
                .clone()
                .unwrap_or_else(|| MockReply::raw(500, "no scripted reply")),
        };
        state.last = Some(reply.clone());
        reply
    };

    if reply.delay_ms > 0 {
        tokio::time::sleep(tokio::time::Duration::from_millis(reply.delay_ms)).await;
    }

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        reply.body,
    )
        .into_response()
}
