#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use chain_enricher::config::AppConfig;

/// Canned JSON-RPC node. Maps are keyed by the wire form of the key.
#[derive(Default)]
pub struct StubNode {
    pub receipts: HashMap<String, Value>,
    pub code: HashMap<String, String>,
    /// Answered with HTTP 500.
    pub http_failures: HashSet<String>,
    /// Answered with a JSON-RPC error member.
    pub rpc_errors: HashSet<String>,
    pub requests: AtomicUsize,
}

impl StubNode {
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

async fn rpc(State(node): State<Arc<StubNode>>, Json(req): Json<Value>) -> Response {
    node.requests.fetch_add(1, Ordering::SeqCst);

    let id = req["id"].clone();
    let method = req["method"].as_str().unwrap_or_default();
    let key = req["params"][0].as_str().unwrap_or_default().to_string();

    if node.http_failures.contains(&key) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
    }
    if node.rpc_errors.contains(&key) {
        return Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32000, "message": "header not found"}
        }))
        .into_response();
    }

    let result = match method {
        "eth_getTransactionReceipt" => node.receipts.get(&key).cloned().unwrap_or(Value::Null),
        "eth_getCode" => Value::String(node.code.get(&key).cloned().unwrap_or_else(|| "0x".into())),
        _ => {
            return Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": "method not found"}
            }))
            .into_response()
        }
    };

    Json(json!({"jsonrpc": "2.0", "id": id, "result": result})).into_response()
}

/// Serves `node` on an ephemeral port and returns its URL.
pub async fn spawn_node(node: StubNode) -> (String, Arc<StubNode>) {
    let node = Arc::new(node);
    let app = Router::new().route("/", post(rpc)).with_state(node.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), node)
}

pub fn config(vars: &[(&str, &str)]) -> AppConfig {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub fn receipt(gas_used: &str, gas_price: &str) -> Value {
    json!({
        "status": "0x1",
        "gasUsed": gas_used,
        "effectiveGasPrice": gas_price,
        "logs": []
    })
}
