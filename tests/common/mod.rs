//! Shared fixtures: a PDF builder, an in-process stand-in for Ollama and
//! web pages, and a config that keeps everything offline.

#![allow(dead_code)]

use axum::{
    response::Html,
    routing::{get, post},
    Json, Router,
};
use research_assistant::config::{parse_config, Config};
use std::net::SocketAddr;
use std::path::Path;

mod pdf;
pub use pdf::pdf_with_pages;

pub const STUB_ANSWER: &str = "Water boils at 100 degrees Celsius [a.pdf p. 2].";

/// Three pages; only the last (page index 2) talks about boiling water.
pub fn sample_pdf() -> Vec<u8> {
    pdf_with_pages(&[
        "Medieval trade routes crossed the Alps",
        "Glaciers shaped the valleys of the region",
        "The boiling point of water at sea level is 100 degrees Celsius",
    ])
}

/// Serve a router on an ephemeral localhost port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Ollama `/api/chat` with a canned reply, plus an HTML article and a
/// page that always fails.
pub async fn start_stub_services() -> SocketAddr {
    let router = Router::new()
        .route(
            "/api/chat",
            post(|| async {
                Json(serde_json::json!({
                    "model": "stub",
                    "message": { "role": "assistant", "content": STUB_ANSWER },
                    "done": true
                }))
            }),
        )
        .route(
            "/article",
            get(|| async {
                Html(
                    "<html><head><title>Photosynthesis</title><script>track()</script></head>\
                     <body><h1>Photosynthesis</h1>\
                     <p>Plants convert sunlight, water and carbon dioxide into glucose.</p>\
                     <p>Chlorophyll absorbs mostly blue and red light.</p></body></html>",
                )
            }),
        )
        .route(
            "/broken",
            get(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
    serve(router).await
}

/// Offline configuration rooted at `root`: hashing embeddings and the stub
/// as the language model.
pub fn test_config(root: &Path, stub: SocketAddr) -> Config {
    parse_config(&config_toml(root, stub)).unwrap()
}

pub fn config_toml(root: &Path, stub: SocketAddr) -> String {
    format!(
        r#"[paths]
documents_dir = "{root}/documents"

[index]
path = "{root}/data/index.sqlite"

[embedding]
provider = "hashing"
dims = 128

[llm]
provider = "ollama"
model = "stub"
url = "http://{stub}"
timeout_secs = 10

[loader]
timeout_secs = 5
"#,
        root = root.display(),
        stub = stub
    )
}
