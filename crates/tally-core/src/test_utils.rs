//! Test utilities for tally-core
//!
//! This module provides testing infrastructure including a mock Messages API
//! server that can be used for development and integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// What the mock server answers to every request
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 200 with a single text block
    Text(String),
    /// 200 with no text block
    NoText,
    /// Error status with a raw body
    Error { status: u16, body: String },
}

/// A request the mock server received
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub api_key: Option<String>,
    pub anthropic_version: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct MockState {
    reply: MockReply,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Mock Messages API server for testing and development
pub struct MockMessagesServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockMessagesServer {
    /// Start the mock server on an available port
    pub async fn start(reply: MockReply) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            reply,
            requests: requests.clone(),
        };

        let app = Router::new()
            .route("/v1/messages", post(handle_messages))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Start a server that replies with the canned receipt JSON
    pub async fn with_receipt() -> Self {
        Self::start(MockReply::Text(sample_receipt_json())).await
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockMessagesServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Receipt JSON wrapped in a markdown fence, the way models often answer
pub fn sample_receipt_json() -> String {
    let receipt = json!({
        "store_name": "Costco",
        "store_location": "Issaquah, WA",
        "purchase_date": "2024-03-01",
        "subtotal": 24.98,
        "tax": 1.02,
        "total": 26.00,
        "item_count": 2,
        "line_items": [
            {
                "item_code": "57554",
                "raw_description": "KS TOWEL",
                "normalized_name": "Kirkland Signature Paper Towels",
                "category": "Household",
                "subcategory": "Paper Goods",
                "quantity": 1,
                "total_price": 21.99,
                "is_taxable": true,
                "is_discount": false
            },
            {
                "item_code": null,
                "raw_description": "BANANAS",
                "normalized_name": "Bananas",
                "category": "Grocery",
                "subcategory": "Produce",
                "quantity": 1,
                "total_price": 2.99,
                "is_taxable": false,
                "is_discount": false
            }
        ]
    });
    format!("```json\n{}\n```", receipt)
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Messages endpoint
async fn handle_messages(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let model = body["model"].as_str().unwrap_or("mock").to_string();

    state.requests.lock().unwrap().push(RecordedRequest {
        api_key: header(&headers, "x-api-key"),
        anthropic_version: header(&headers, "anthropic-version"),
        body,
    });

    match state.reply {
        MockReply::Text(text) => Json(json!({
            "id": "msg_mock",
            "type": "message",
            "role": "assistant",
            "model": model,
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 100, "output_tokens": 50}
        }))
        .into_response(),
        MockReply::NoText => Json(json!({
            "id": "msg_mock",
            "type": "message",
            "role": "assistant",
            "model": model,
            "content": [],
            "stop_reason": "end_turn"
        }))
        .into_response(),
        MockReply::Error { status, body } => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body,
        )
            .into_response(),
    }
}
