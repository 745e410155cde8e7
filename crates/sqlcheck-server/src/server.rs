use crate::config::ServerConfig;
use crate::handlers::{self, Call};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlcheck_core::engine::{CommitGate, Engine};
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

static RID: AtomicU64 = AtomicU64::new(1);

fn next_rid() -> String {
    let n = RID.fetch_add(1, Ordering::Relaxed);
    format!("r-{n:06}")
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Option<Value>,
    id: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn ok(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError { code, message }),
            id,
        }
    }
}

pub struct Server;

impl Server {
    pub async fn run(engine: Engine, cfg: ServerConfig) -> Result<()> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        for line in stdin.lock().lines() {
            let line = line?;
            if let Some(resp) = handle_line(&engine, &cfg, &line).await {
                writeln!(stdout, "{}", serde_json::to_string(&resp)?)?;
                stdout.flush()?;
            }
        }

        tracing::info!(event = "server_stop");
        Ok(())
    }
}

/// Handles one transport line. `None` means nothing is written back
/// (blank lines, unparseable JSON, notifications).
pub async fn handle_line(engine: &Engine, cfg: &ServerConfig, line: &str) -> Option<Value> {
    let rid = next_rid();

    if line.len() > cfg.max_msg_bytes {
        tracing::warn!(
            event = "limit_exceeded",
            rid = %rid,
            bytes_in = line.len(),
            max = cfg.max_msg_bytes
        );
        let resp = JsonRpcResponse::ok(
            None,
            handlers::error_result(
                "E_LIMIT_EXCEEDED",
                format!("message bytes={} > max={}", line.len(), cfg.max_msg_bytes),
            ),
        );
        return serde_json::to_value(resp).ok();
    }

    if line.trim().is_empty() {
        return None;
    }

    let req: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(event = "json_parse_error", rid = %rid, error = %e);
            return None;
        }
    };

    let resp = match req.method.as_str() {
        "initialize" => JsonRpcResponse::ok(
            req.id.clone(),
            serde_json::json!({
                "serverInfo": {
                    "name": "sqlcheck-server",
                    "version": env!("CARGO_PKG_VERSION")
                },
                "methods": handlers::METHODS,
                "settings": engine.settings()
            }),
        ),
        "notifications/initialized" => {
            tracing::info!(event = "initialized", rid = %rid);
            return None;
        }
        method => match Call::parse(method, req.params.as_ref()) {
            Ok(Some(call)) => {
                let result = execute(engine, cfg, call, &rid, &req.id, line.len()).await;
                JsonRpcResponse::ok(req.id.clone(), result)
            }
            Ok(None) => JsonRpcResponse::error(
                req.id.clone(),
                -32601,
                format!("Method not found: {}", method),
            ),
            Err(message) => {
                tracing::info!(event = "invalid_params", rid = %rid, method = method);
                JsonRpcResponse::error(req.id.clone(), -32602, message)
            }
        },
    };

    serde_json::to_value(resp).ok()
}

async fn execute(
    engine: &Engine,
    cfg: &ServerConfig,
    call: Call,
    rid: &str,
    rpc_id: &Option<Value>,
    bytes_in: usize,
) -> Value {
    let method = call.name();
    let subject = call.subject().to_string();
    let on_timeout = call.timeout_result(cfg.timeout_ms);
    let start = std::time::Instant::now();

    tracing::info!(
        event = "call_start",
        rid = %rid,
        rpc_id = ?rpc_id,
        method = method,
        subject = %subject,
        bytes_in = bytes_in
    );

    let engine = engine.clone();
    let gate = Arc::new(CommitGate::new());
    let worker_gate = Arc::clone(&gate);
    let mut task = tokio::task::spawn_blocking(move || call.execute(&engine, &worker_gate));
    let joined = match timeout(Duration::from_millis(cfg.timeout_ms), &mut task).await {
        Ok(joined) => Some(joined),
        Err(_) if gate.try_abandon() => None,
        // The worker is already writing progress; report what it recorded.
        Err(_) => Some(task.await),
    };
    let result = match joined {
        Some(Ok(Ok(v))) => v,
        Some(Ok(Err(e))) => {
            tracing::error!(event = "call_error", rid = %rid, method = method, error = %e);
            handlers::error_result("E_INTERNAL", e.to_string())
        }
        Some(Err(join)) => {
            tracing::error!(event = "call_crash", rid = %rid, method = method, error = %join);
            handlers::error_result("E_INTERNAL", "handler panicked".to_string())
        }
        None => {
            // The blocking task keeps running until its statement deadline fires,
            // but can no longer record progress.
            tracing::warn!(
                event = "call_timeout",
                rid = %rid,
                method = method,
                timeout_ms = cfg.timeout_ms
            );
            on_timeout
        }
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    match result.get("code").and_then(|c| c.as_str()) {
        Some(code) => tracing::info!(
            event = "call_done",
            rid = %rid,
            rpc_id = ?rpc_id,
            method = method,
            subject = %subject,
            duration_ms = duration_ms,
            outcome = "app_error",
            code = code
        ),
        None => tracing::info!(
            event = "call_done",
            rid = %rid,
            rpc_id = ?rpc_id,
            method = method,
            subject = %subject,
            duration_ms = duration_ms,
            outcome = "ok"
        ),
    }
    result
}
