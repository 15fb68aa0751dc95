//! End-to-end pipeline behavior over local resources.
//!
//! A throwaway TCP listener stands in for remote hosts, so the non-ignored
//! tests run without real network access or ffmpeg. The full happy path
//! needs both and is `#[ignore]`d, following the convention for
//! environment-dependent tests.

use async_trait::async_trait;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use unigif::error::{PipelineError, TranscodeError};
use unigif::pipeline::temp::TempPool;
use unigif::pipeline::{resolve, AnimationSink, MediaRequest, Pipeline};

/// Sink that records every delivery and whether the file existed at read time.
#[derive(Default)]
struct RecordingSink {
    delivered: Mutex<Vec<(PathBuf, bool)>>,
}

#[async_trait]
impl AnimationSink for RecordingSink {
    async fn deliver(&self, animation: &Path) -> anyhow::Result<()> {
        self.delivered
            .lock()
            .expect("sink lock")
            .push((animation.to_path_buf(), animation.exists()));
        Ok(())
    }
}

impl RecordingSink {
    fn deliveries(&self) -> Vec<(PathBuf, bool)> {
        self.delivered.lock().expect("sink lock").clone()
    }
}

/// Serve one canned HTTP response on an ephemeral local port.
fn serve_once(status_line: &'static str, content_type: &'static str, body: &'static [u8]) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut request = [0u8; 2048];
            let _ = stream.read(&mut request);
            let header = format!(
                "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(body);
        }
    });
    format!("http://{addr}")
}

async fn pool_in(dir: &Path) -> TempPool {
    TempPool::new(dir.join("pool")).await.expect("temp pool")
}

async fn pool_is_empty(pool: &TempPool) -> bool {
    let mut entries = tokio::fs::read_dir(pool.dir()).await.expect("read pool");
    entries.next_entry().await.expect("pool entry").is_none()
}

#[tokio::test]
async fn test_undersized_download_is_rejected_before_transcode() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = pool_in(dir.path()).await;
    // ffmpeg path is bogus on purpose: the request must fail before it runs
    let pipeline = Pipeline::new(pool.clone(), "ffmpeg-must-not-run");
    let sink = RecordingSink::default();

    let base = serve_once("HTTP/1.1 200 OK", "image/gif", b"GIF89a tiny");
    let request = MediaRequest::link(format!("{base}/tiny.gif"));

    let result = pipeline.process(&request, &sink).await;
    match result {
        Err(PipelineError::Transcode(TranscodeError::EmptyInput { size })) => {
            assert!(size < 100);
        }
        other => panic!("expected empty-file rejection, got {other:?}"),
    }
    assert!(sink.deliveries().is_empty());
    assert!(pool_is_empty(&pool).await, "staging files must not survive");
}

#[tokio::test]
async fn test_http_404_is_fetch_error_with_full_cleanup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = pool_in(dir.path()).await;
    let pipeline = Pipeline::new(pool.clone(), "ffmpeg-must-not-run");
    let sink = RecordingSink::default();

    let base = serve_once("HTTP/1.1 404 Not Found", "text/html", b"<html>gone</html>");
    let request = MediaRequest::link(format!("{base}/missing.mp4"));

    let result = pipeline.process(&request, &sink).await;
    assert!(matches!(result, Err(PipelineError::Fetch(_))));
    assert!(sink.deliveries().is_empty());
    assert!(pool_is_empty(&pool).await);
}

#[tokio::test]
async fn test_refused_connection_cleans_up_partial_staging() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = pool_in(dir.path()).await;
    let pipeline = Pipeline::new(pool.clone(), "ffmpeg-must-not-run");
    let sink = RecordingSink::default();

    // Direct-media fast path resolves without network, then the fetch fails
    let request = MediaRequest::link("http://127.0.0.1:9/a.gif");

    let result = pipeline.process(&request, &sink).await;
    assert!(matches!(result, Err(PipelineError::Fetch(_))));
    assert!(sink.deliveries().is_empty());
    assert!(pool_is_empty(&pool).await);
}

#[tokio::test]
async fn test_unresolvable_page_fails_before_any_staging() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = pool_in(dir.path()).await;
    let pipeline = Pipeline::new(pool.clone(), "ffmpeg-must-not-run");
    let sink = RecordingSink::default();

    let base = serve_once(
        "HTTP/1.1 200 OK",
        "text/html",
        b"<html><head><title>no media here</title></head></html>",
    );
    let request = MediaRequest::link(base);

    let result = pipeline.process(&request, &sink).await;
    assert!(matches!(result, Err(PipelineError::Resolve(_))));
    assert!(sink.deliveries().is_empty());
    assert!(pool_is_empty(&pool).await);
}

#[tokio::test]
async fn test_scraped_og_image_gets_webp_selector_rewritten() {
    let base = serve_once(
        "HTTP/1.1 200 OK",
        "text/html",
        b"<html><head>\
          <meta property=\"og:image\" content=\"https://cdn.example.com/x.png?format=webp\">\
          </head></html>",
    );

    let client = reqwest::Client::new();
    let resolved = resolve::resolve(&client, &base).await.expect("resolve");
    assert_eq!(resolved, "https://cdn.example.com/x.png?format=gif");
    // Classification comes from the path extension, untouched by the rewrite
    assert_eq!(
        resolve::path_extension(&resolved).as_deref(),
        Some("png")
    );
}

#[tokio::test]
#[ignore = "requires network access and ffmpeg on PATH"]
async fn test_photo_link_happy_path_delivers_and_cleans_up() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = pool_in(dir.path()).await;
    let pipeline = Pipeline::new(pool.clone(), "ffmpeg");
    let sink = RecordingSink::default();

    let request = MediaRequest::link(
        "https://upload.wikimedia.org/wikipedia/commons/4/47/PNG_transparency_demonstration_1.png",
    );

    pipeline
        .process(&request, &sink)
        .await
        .expect("pipeline should succeed");

    let deliveries = sink.deliveries();
    assert_eq!(deliveries.len(), 1);
    let (path, existed_at_delivery) = &deliveries[0];
    assert!(*existed_at_delivery, "file must exist while the sink reads it");
    assert!(path.extension().is_some_and(|e| e == "mp4"));
    // Released right after delivery, not on a timer
    assert!(!path.exists());
    assert!(pool_is_empty(&pool).await);
}
