//! HTTP API tests.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`; MinerU
//! and the LLM are replaced by small axum apps on ephemeral ports.

use axum::body::{to_bytes, Body};
use axum::extract::Path as AxumPath;
use axum::http::{header, Method, Request, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use litreader::model::{BBox, BlockKind, TextBlock};
use litreader::server::{router, AppState};
use litreader::{poll_job, translate_layout, NoopProgressCallback, PollPolicy, ReaderApiClient, ReaderConfig, TranslateOptions};
use serde_json::{json, Value};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use zip::write::SimpleFileOptions;

// ── Helpers ──────────────────────────────────────────────────────────────────

const BOUNDARY: &str = "litreader-test-boundary";
const PDF_BYTES: &[u8] = b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a [u8]),
}

fn multipart(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        write!(body, "--{BOUNDARY}\r\n").unwrap();
        match part {
            Part::Text(name, value) => {
                write!(body, "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").unwrap();
            }
            Part::File(filename, data) => {
                write!(
                    body,
                    "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .unwrap();
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    write!(body, "--{BOUNDARY}--\r\n").unwrap();
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

struct Harness {
    _tmp: TempDir,
    upload_dir: PathBuf,
    mineru_dir: PathBuf,
    app: Router,
}

impl Harness {
    fn new(upstream: Option<&str>, llm_key: Option<&str>) -> Self {
        let tmp = TempDir::new().unwrap();
        let upload_dir = tmp.path().join("files");
        let mineru_dir = tmp.path().join("mineru");
        std::fs::create_dir_all(&upload_dir).unwrap();
        std::fs::create_dir_all(&mineru_dir).unwrap();

        let mut builder = ReaderConfig::builder()
            .upload_dir(&upload_dir)
            .mineru_dir(&mineru_dir)
            .mineru_token("test-token")
            .llm_max_retries(0)
            .retry_backoff_ms(1);
        if let Some(base) = upstream {
            builder = builder.mineru_base_url(base).llm_base_url(base);
        }
        if let Some(key) = llm_key {
            builder = builder.llm_api_key(key);
        }
        let config = builder.build().unwrap();
        let app = router(AppState::with_http(config, reqwest::Client::new()));

        Self {
            _tmp: tmp,
            upload_dir,
            mineru_dir,
            app,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>, Option<String>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec(), content_type)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, body, _) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn get_raw(&self, uri: &str) -> (StatusCode, Vec<u8>, Option<String>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, body, _) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn post_form(&self, uri: &str, parts: &[Part<'_>]) -> (StatusCode, Value) {
        let (content_type, body) = multipart(parts);
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        let (status, body, _) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }
}

fn content_list() -> Value {
    json!([
        {"type": "text", "text": "Attention Is All You Need", "text_level": 1, "page_idx": 0, "bbox": [50, 40, 550, 80]},
        {"type": "text", "text": "The dominant sequence transduction models are recurrent.", "page_idx": 0, "bbox": [50, 100, 550, 160]},
        {"type": "text", "text": "", "page_idx": 1, "bbox": [50, 100, 550, 160]}
    ])
}

fn result_zip() -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut zw = zip::ZipWriter::new(&mut buf);
        let opts = SimpleFileOptions::default();
        zw.start_file("layout.json", opts).unwrap();
        zw.write_all(content_list().to_string().as_bytes()).unwrap();
        zw.start_file("full.md", opts).unwrap();
        zw.write_all(b"# Attention Is All You Need\n\nThe dominant sequence transduction models are recurrent.\n")
            .unwrap();
        zw.start_file("images/fig1.png", opts).unwrap();
        zw.write_all(b"\x89PNG\r\n\x1a\n").unwrap();
        zw.finish().unwrap();
    }
    buf.into_inner()
}

/// Fake MinerU + LLM on one ephemeral port. Every task is already done.
async fn spawn_upstream() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let zip_url = format!("{base}/results/full.zip");

    let task_zip_url = zip_url.clone();
    let batch_zip_url = zip_url;
    let slot_url = format!("{base}/upload/slot-1");
    let downloads = Arc::new(AtomicUsize::new(0));
    let counted = downloads.clone();
    let app = Router::new()
        .route(
            "/extract/task",
            post(|| async { Json(json!({"code": 0, "msg": "ok", "data": {"task_id": "task-42"}})) }),
        )
        .route(
            "/extract/task/{id}",
            get(move |AxumPath(id): AxumPath<String>| {
                let url = task_zip_url.clone();
                async move {
                    Json(json!({
                        "code": 0,
                        "msg": "ok",
                        "data": {"task_id": id, "state": "done", "full_zip_url": url}
                    }))
                }
            }),
        )
        .route(
            "/extract-results/batch/{id}",
            get(move |AxumPath(id): AxumPath<String>| {
                let url = batch_zip_url.clone();
                async move {
                    Json(json!({
                        "code": 0,
                        "msg": "ok",
                        "data": {
                            "batch_id": id,
                            "extract_result": [{"file_name": "paper.pdf", "state": "done", "full_zip_url": url}]
                        }
                    }))
                }
            }),
        )
        .route(
            "/file-urls/batch",
            post(move || {
                let url = slot_url.clone();
                async move { Json(json!({"code": 0, "msg": "ok", "data": {"batch_id": "batch-9", "file_urls": [url]}})) }
            }),
        )
        .route("/upload/slot-1", put(|| async { StatusCode::OK }))
        .route(
            "/results/full.zip",
            get(move || {
                counted.fetch_add(1, Ordering::SeqCst);
                async { result_zip() }
            }),
        )
        .route(
            "/results/downloads",
            get(move || {
                let n = downloads.load(Ordering::SeqCst);
                async move { n.to_string() }
            }),
        )
        .route(
            "/chat/completions",
            post(|| async {
                Json(json!({
                    "choices": [{"message": {"role": "assistant", "content": "译文"}}],
                    "usage": {"prompt_tokens": 12, "completion_tokens": 3}
                }))
            }),
        );

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base
}

/// How many times the fake upstream served the result archive.
async fn zip_downloads(base: &str) -> usize {
    reqwest::get(format!("{base}/results/downloads"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap()
        .parse()
        .unwrap()
}

fn block(page: u32, text: &str) -> TextBlock {
    TextBlock::new(page, BBox::from([10.0, 10.0, 200.0, 40.0]), text, BlockKind::Text)
}

fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, bytes).unwrap();
}

// ── Health & upload ──────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_ok() {
    let h = Harness::new(None, None);
    let (status, body) = h.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn upload_saves_sanitized_pdf_and_serves_it() {
    let h = Harness::new(None, None);
    let (status, body) = h.post_form("/api/upload", &[Part::File("my paper.pdf", PDF_BYTES)]).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["filename"], "my_paper.pdf");
    assert!(h.upload_dir.join("my_paper.pdf").is_file());

    let (status, bytes, _) = h.get_raw("/api/files/my_paper.pdf").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, PDF_BYTES);
}

#[tokio::test]
async fn upload_rejects_other_extensions() {
    let h = Harness::new(None, None);
    let (status, body) = h.post_form("/api/upload", &[Part::File("notes.txt", b"hello")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("notes.txt"));
}

#[tokio::test]
async fn upload_rejects_pdf_without_magic() {
    let h = Harness::new(None, None);
    let (status, body) = h.post_form("/api/upload", &[Part::File("fake.pdf", b"<html></html>")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(!h.upload_dir.join("fake.pdf").exists());
}

#[tokio::test]
async fn upload_checks_magic_of_non_ascii_pdf_names() {
    let h = Harness::new(None, None);
    let (status, body) = h.post_form("/api/upload", &[Part::File("论文.pdf", b"MZ not a pdf at all")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["success"], false);

    let (status, body) = h.post_form("/api/upload", &[Part::File("论文.pdf", PDF_BYTES)]).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["filename"], "upload.pdf");
    assert!(h.upload_dir.join("upload.pdf").is_file());
}

#[tokio::test]
async fn upload_without_file_is_bad_request() {
    let h = Harness::new(None, None);
    let (status, _) = h.post_form("/api/upload", &[Part::Text("wait", "true")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Parse & status ───────────────────────────────────────────────────────────

#[tokio::test]
async fn parse_pdf_requires_url_or_pdf() {
    let h = Harness::new(None, None);
    let (status, body) = h.post_form("/api/parse-pdf", &[Part::Text("wait", "false")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn parse_pdf_uploads_non_ascii_pdf_through_batch_flow() {
    let base = spawn_upstream().await;
    let h = Harness::new(Some(&base), None);
    let (status, body) = h
        .post_form("/api/parse-pdf", &[Part::File("论文.pdf", PDF_BYTES), Part::Text("wait", "false")])
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["batch_id"], "batch-9");
    assert_eq!(body["data"]["state"], "waiting-file");
    assert!(h.upload_dir.join("upload.pdf").is_file());
}

#[tokio::test]
async fn parse_pdf_rejects_unknown_model_version() {
    let h = Harness::new(None, None);
    let (status, body) = h
        .post_form(
            "/api/parse-pdf",
            &[Part::Text("file_url", "https://example.org/a.pdf"), Part::Text("model_version", "gpt")],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("model_version"));
}

#[tokio::test]
async fn parse_pdf_url_without_wait_returns_task_id() {
    let base = spawn_upstream().await;
    let h = Harness::new(Some(&base), None);
    let (status, body) = h
        .post_form(
            "/api/parse-pdf",
            &[Part::Text("file_url", "https://example.org/a.pdf"), Part::Text("wait", "false")],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["task_id"], "task-42");
    assert_eq!(body["data"]["state"], "pending");
    assert!(body["data"].get("layout").is_none());
}

#[tokio::test]
async fn parse_pdf_url_waits_for_layout() {
    let base = spawn_upstream().await;
    let h = Harness::new(Some(&base), None);
    let (status, body) = h
        .post_form("/api/parse-pdf", &[Part::Text("file_url", "https://example.org/a.pdf")])
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["state"], "done");
    assert_eq!(body["data"]["layout_count"], 2);
    assert_eq!(body["data"]["layout"][0]["text"], "Attention Is All You Need");
    assert_eq!(body["data"]["layout"][0]["type"], "title");
    assert!(h.mineru_dir.join("task-42").join("full.md").is_file());
}

#[tokio::test]
async fn task_status_attaches_layout_and_result_files() {
    let base = spawn_upstream().await;
    let h = Harness::new(Some(&base), None);

    let (status, body) = h.get("/api/task/task-7").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["data"];
    assert_eq!(data["state"], "done");
    assert_eq!(data["layout_count"], 2);
    assert_eq!(data["layout"][1]["page"], 1);
    assert!(data["mineru_data"].is_array());
    assert!(data["full_md_path"].as_str().unwrap().ends_with("full.md"));
    assert!(data["images_dir"].as_str().is_some());

    let (status, body) = h.get("/api/full-text/task-7").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["content"].as_str().unwrap().starts_with("# Attention"));

    let (status, bytes, content_type) = h.get_raw("/api/images/task-7/fig1.png").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    assert!(bytes.starts_with(b"\x89PNG"));
}

#[tokio::test]
async fn finished_job_results_are_downloaded_once() {
    let base = spawn_upstream().await;
    let h = Harness::new(Some(&base), None);

    for _ in 0..3 {
        let (status, body) = h.get("/api/task/task-8").await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["layout_count"], 2);
        assert!(body["data"]["full_md_path"].as_str().unwrap().ends_with("full.md"));
    }
    assert_eq!(zip_downloads(&base).await, 1);
}

#[tokio::test]
async fn batch_status_reads_first_file() {
    let base = spawn_upstream().await;
    let h = Harness::new(Some(&base), None);
    let (status, body) = h.get("/api/batch/batch-1").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["state"], "done");
    assert_eq!(body["data"]["layout_count"], 2);
}

#[tokio::test]
async fn status_rejects_path_like_job_ids() {
    let h = Harness::new(None, None);
    let (status, body) = h.get("/api/task/..%2Fescape").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn layout_normalizes_uploaded_json() {
    let h = Harness::new(None, None);
    let raw = content_list().to_string();
    let (status, body) = h
        .post_form("/api/layout", &[Part::File("paper_content_list.json", raw.as_bytes())])
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["layout_count"], 2);
    assert!(h.mineru_dir.join("paper_content_list_layout.json").is_file());
}

#[tokio::test]
async fn layout_for_missing_file_is_not_found() {
    let h = Harness::new(None, None);
    let (status, _) = h.post_form("/api/layout", &[Part::Text("filename", "absent.json")]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Translation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn translate_layout_rejects_empty_layout() {
    let h = Harness::new(None, None);
    let (status, body) = h.post_json("/api/translate-layout", json!({"layout": []})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn translate_layout_rejects_malformed_json() {
    let h = Harness::new(None, None);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/translate-layout")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, _) = h.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn translate_layout_without_key_fails_every_block() {
    let h = Harness::new(None, None);
    let layout = vec![block(1, "First paragraph."), block(1, "Second paragraph."), block(2, "  ")];
    let (status, body) = h
        .post_json("/api/translate-layout", json!({"layout": layout, "target_lang": "zh"}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["data"];
    assert_eq!(data["translated_count"], 0);
    assert_eq!(data["failed_count"], 2);
    assert_eq!(data["total_count"], 2);
    assert_eq!(data["error_summary"]["api_configured"], false);
    assert!(body["message"].as_str().unwrap().contains("QWEN_API_KEY"));
}

#[tokio::test]
async fn translate_layout_merges_translations() {
    let base = spawn_upstream().await;
    let h = Harness::new(Some(&base), Some("sk-test"));
    let mut done = block(2, "Already translated paragraph.");
    done.translated_text = Some("已有译文".into());
    let layout = vec![block(1, "First paragraph."), done];

    let (status, body) = h.post_json("/api/translate-layout", json!({"layout": layout})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["data"];
    assert_eq!(data["translated_count"], 1);
    assert_eq!(data["skipped_count"], 1);
    assert_eq!(data["failed_count"], 0);
    assert_eq!(data["layout"][0]["translated_text"], "译文");
    assert_eq!(data["layout"][1]["translated_text"], "已有译文");
    assert!(data.get("error_summary").is_none());
}

#[tokio::test]
async fn translate_legacy_file_writes_sibling() {
    let base = spawn_upstream().await;
    let h = Harness::new(Some(&base), Some("sk-test"));
    let legacy = json!({
        "pages": [{
            "page_num": 1,
            "blocks": [
                {"type": "text", "lines": [{"text": "Hello"}, {"text": "world"}]},
                {"type": "image", "lines": []}
            ]
        }]
    });
    write_file(&h.mineru_dir.join("legacy.json"), legacy.to_string().as_bytes());

    let (status, body) = h
        .post_json("/api/translate", json!({"filename": "legacy.json", "target_lang": "zh"}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["data"]["translated_file"].as_str().unwrap().ends_with("legacy_zh.json"));

    let written: Value =
        serde_json::from_slice(&std::fs::read(h.mineru_dir.join("legacy_zh.json")).unwrap()).unwrap();
    assert_eq!(written["pages"][0]["blocks"][0]["translated_text"], "译文");
    assert!(written["pages"][0]["blocks"][1].get("translated_text").is_none());
}

#[tokio::test]
async fn translate_legacy_file_missing_is_not_found() {
    let h = Harness::new(None, Some("sk-test"));
    let (status, _) = h.post_json("/api/translate", json!({"filename": "nope.json"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Result files ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_text_missing_is_not_found() {
    let h = Harness::new(None, None);
    let (status, body) = h.get("/api/full-text/unknown-job").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "full.md not found");
}

#[tokio::test]
async fn full_text_found_in_nested_folder() {
    let h = Harness::new(None, None);
    write_file(&h.mineru_dir.join("job-3/paper/auto/full.md"), b"# Nested\n");
    let (status, body) = h.get("/api/full-text/job-3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], "# Nested\n");
}

#[tokio::test]
async fn mineru_files_are_confined_to_the_folder() {
    let h = Harness::new(None, None);
    write_file(&h.mineru_dir.join("job-1/layout.json"), b"{}");

    let (status, bytes, content_type) = h.get_raw("/api/mineru/job-1/layout.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(bytes, b"{}");

    let (status, _, _) = h.get_raw("/api/mineru/job-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = h.get_raw("/api/mineru/job-1/missing.json").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = h.get_raw("/api/mineru/..%2F..%2Fetc%2Fpasswd").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = h.get_raw("/api/images/job-1/..%2Flayout.json").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ── Remote client against a live router ──────────────────────────────────────

#[tokio::test]
async fn remote_client_drives_parse_and_translate() {
    let base = spawn_upstream().await;
    let h = Harness::new(Some(&base), Some("sk-test"));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server_url = format!("http://{}", listener.local_addr().unwrap());
    let app = h.app.clone();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let api = ReaderApiClient::new(&server_url).unwrap();
    tokio_test::assert_ok!(api.health().await);

    let submission = api.parse_url("https://example.org/a.pdf", None).await.unwrap();
    let job = submission.job_id().unwrap();
    let policy = PollPolicy {
        interval: Duration::from_millis(10),
        max_attempts: 5,
    };
    let parsed = poll_job(&api, &job, policy, &NoopProgressCallback, None).await.unwrap();
    assert_eq!(parsed.blocks.len(), 2);
    assert_eq!(parsed.attempts, 1);

    let options = TranslateOptions {
        batch_size: 1,
        ..TranslateOptions::default()
    };
    let summary = translate_layout(&api, parsed.blocks, &options, &NoopProgressCallback).await;
    assert_eq!(summary.batches_submitted, 2);
    assert_eq!(summary.counts.translated, 2);
    assert_eq!(summary.counts.failed, 0);
    assert!(summary.layout.iter().all(|b| b.translated_text.as_deref() == Some("译文")));

    let full = tokio_test::assert_ok!(api.full_text("task-42").await);
    assert!(full.contains("transduction"));
}
