//! JSON API server for a running OpenSAW job.
//!
//! Publishes a named set of JSON documents at `/api/<name>.json`. The job
//! replaces documents as it makes progress; monitors poll them. A document
//! is either a value held in memory or a file re-read on every request, so
//! an external process can grow the job's output on disk.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use log::{debug, info, warn};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Where a published document comes from.
#[derive(Debug, Clone)]
pub enum Document {
    /// Served with object keys in insertion order.
    Value(Value),
    /// Read from disk on every request.
    File(PathBuf),
}

#[derive(Default)]
struct Inner {
    documents: BTreeMap<String, Document>,
    hits: HashMap<String, u64>,
}

/// The published documents, shared between the server and whoever updates
/// them.
#[derive(Clone, Default)]
pub struct ApiData {
    inner: Arc<Mutex<Inner>>,
}

impl ApiData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish (or replace) `name` as an in-memory value.
    pub async fn set_value(&self, name: impl Into<String>, value: Value) {
        self.set(name.into(), Document::Value(value)).await;
    }

    /// Publish (or replace) `name` as a file read per request.
    pub async fn set_file(&self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.set(name.into(), Document::File(path.into())).await;
    }

    pub async fn set(&self, name: String, document: Document) {
        self.inner.lock().await.documents.insert(name, document);
    }

    pub async fn remove(&self, name: &str) -> Option<Document> {
        self.inner.lock().await.documents.remove(name)
    }

    pub async fn names(&self) -> Vec<String> {
        self.inner.lock().await.documents.keys().cloned().collect()
    }

    /// Requests served for `name`, including failed reads.
    pub async fn hits(&self, name: &str) -> u64 {
        self.inner.lock().await.hits.get(name).copied().unwrap_or(0)
    }

    async fn lookup(&self, name: &str) -> Option<Document> {
        let mut inner = self.inner.lock().await;
        let document = inner.documents.get(name).cloned()?;
        *inner.hits.entry(name.to_string()).or_default() += 1;
        Some(document)
    }
}

fn json_body(status: StatusCode, body: Vec<u8>) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

fn not_found(path: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("No such API: {path}")).into_response()
}

async fn handle_api(State(data): State<ApiData>, Path(file): Path<String>) -> Response {
    let Some(name) = file.strip_suffix(".json") else {
        return not_found(&format!("/api/{file}"));
    };
    let Some(document) = data.lookup(name).await else {
        debug!("unknown api document {name}");
        return not_found(&format!("/api/{name}.json"));
    };

    match document {
        Document::Value(value) => match serde_json::to_vec(&value) {
            Ok(body) => json_body(StatusCode::OK, body),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        },
        Document::File(path) => match tokio::fs::read(&path).await {
            Ok(body) => json_body(StatusCode::OK, body),
            Err(e) => {
                warn!("cannot read {}: {e}", path.display());
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("cannot read {}: {e}", path.display()),
                )
                    .into_response()
            }
        },
    }
}

async fn handle_index(State(data): State<ApiData>) -> Json<Value> {
    let endpoints: serde_json::Map<String, Value> = data
        .names()
        .await
        .into_iter()
        .map(|name| {
            let path = format!("/api/{name}.json");
            (path, Value::String(format!("Current {name} document")))
        })
        .collect();

    Json(serde_json::json!({
        "name": "OpenSAW job API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": endpoints,
    }))
}

async fn handle_favicon() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Build the axum router.
pub fn build_router(data: ApiData) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/favicon.ico", get(handle_favicon))
        .route("/api/{file}", get(handle_api))
        .with_state(data)
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, data: ApiData, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("serving job API on http://{addr}");
    }
    axum::serve(listener, build_router(data))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("job API stopped");
    Ok(())
}

/// Bind `host:port` and serve until Ctrl-C.
pub async fn run_server(data: ApiData, host: &str, port: u16) -> std::io::Result<()> {
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    serve(listener, data, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}
