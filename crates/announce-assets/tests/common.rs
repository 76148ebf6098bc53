#![allow(dead_code)]

use announce_assets::Downloader;
use announce_types::{AssetFile, Catalog, Gender, VoiceKey, VoiceSpec};
use axum::body::{Body, Bytes};
use axum::extract::{Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Payload every `/files/*` route serves.
pub fn payload_for(name: &str) -> Vec<u8> {
    format!("contents of {name}\n").repeat(64).into_bytes()
}

#[derive(Clone, Default)]
pub struct Hits {
    pub total: Arc<AtomicUsize>,
    pub flaky: Arc<AtomicUsize>,
}

impl Hits {
    pub fn count(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

pub struct TestServer {
    pub base: String,
    pub hits: Hits,
}

async fn serve_file(State(hits): State<Hits>, UrlPath(name): UrlPath<String>) -> Response {
    hits.total.fetch_add(1, Ordering::SeqCst);
    (StatusCode::OK, payload_for(&name)).into_response()
}

async fn serve_missing(State(hits): State<Hits>) -> Response {
    hits.total.fetch_add(1, Ordering::SeqCst);
    StatusCode::NOT_FOUND.into_response()
}

/// Sends ten bytes, then aborts the connection mid-body.
async fn serve_broken(State(hits): State<Hits>) -> Response {
    hits.total.fetch_add(1, Ordering::SeqCst);
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from_static(b"0123456789")),
        Err(std::io::Error::other("connection reset by test")),
    ];
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from_stream(futures_util::stream::iter(chunks)))
        .unwrap()
}

/// Sends ten bytes of a larger body, then goes quiet.
async fn serve_stalled(State(hits): State<Hits>) -> Response {
    hits.total.fetch_add(1, Ordering::SeqCst);
    let head = futures_util::stream::once(async {
        Ok::<_, std::io::Error>(Bytes::from_static(b"0123456789"))
    });
    let silence = futures_util::stream::once(async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok::<_, std::io::Error>(Bytes::from_static(b"late"))
    });
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, "1024")
        .body(Body::from_stream(futures_util::StreamExt::chain(head, silence)))
        .unwrap()
}

/// Fails with 503 for the first two requests, then serves the file.
async fn serve_flaky(State(hits): State<Hits>, UrlPath(name): UrlPath<String>) -> Response {
    hits.total.fetch_add(1, Ordering::SeqCst);
    let seen = hits.flaky.fetch_add(1, Ordering::SeqCst);
    if seen < 2 {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    } else {
        (StatusCode::OK, payload_for(&name)).into_response()
    }
}

pub async fn spawn_server() -> TestServer {
    let hits = Hits::default();
    let app = Router::new()
        .route("/files/{name}", get(serve_file))
        .route("/missing/{name}", get(serve_missing))
        .route("/broken/{name}", get(serve_broken))
        .route("/flaky/{name}", get(serve_flaky))
        .route("/stalled/{name}", get(serve_stalled))
        .with_state(hits.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind test listener");
    let addr = listener.local_addr().expect("should have local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server error");
    });

    TestServer {
        base: format!("http://{addr}"),
        hits,
    }
}

pub fn downloader() -> Downloader {
    Downloader::new(reqwest::Client::new(), Duration::from_millis(1))
}

/// A voice whose files are served from `route` (`files`, `broken`, ...).
pub fn voice(base: &str, id: &str, language: &str, gender: Gender, model_route: &str) -> VoiceSpec {
    let model = format!("{id}.onnx");
    let config = format!("{id}.onnx.json");
    VoiceSpec {
        id: id.to_string(),
        key: VoiceKey::new(language, gender),
        language_label: language.to_uppercase(),
        quality: "Low".to_string(),
        model: AssetFile::new(&model, format!("{base}/{model_route}/{model}"), "1KB"),
        config: AssetFile::new(&config, format!("{base}/files/{config}"), "1KB"),
    }
}

/// Three healthy voices.
pub fn healthy_catalog(base: &str) -> Catalog {
    Catalog::new(vec![
        voice(base, "en_GB-test-low", "en", Gender::Female, "files"),
        voice(base, "es_ES-test-low", "es", Gender::Male, "files"),
        voice(base, "ca_ES-test-low", "ca", Gender::Female, "files"),
    ])
}

pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
