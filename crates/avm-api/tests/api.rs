//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_test::assert_ok;
use tower::ServiceExt;

use avm_api::{create_router, ApiConfig, AppState};
use avm_avatar::{AvatarConfig, AvatarSelector};
use avm_media::FfmpegEngine;
use avm_models::{ErrorCategory, Job, JobId, JobRequest, PipelineStage, VideoMode};
use avm_store::JobStore;
use avm_worker::{CollaboratorConfig, Collaborators, JobService, Pipeline, ServiceClient, WorkerConfig};

struct TestApp {
    dir: TempDir,
    store: Arc<JobStore>,
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_config(ApiConfig::default()).await
    }

    async fn with_config(config: ApiConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JobStore::open(dir.path().join("jobs.json")).await);

        // Nothing listens on port 1, so any job that actually runs fails fast
        let unreachable = "http://127.0.0.1:1".to_string();
        let client = ServiceClient::new(CollaboratorConfig {
            analyzer_url: unreachable.clone(),
            script_url: unreachable.clone(),
            tts_url: unreachable.clone(),
            capture_url: unreachable,
            ..CollaboratorConfig::default()
        })
        .unwrap();

        let avatar = AvatarSelector::from_config(&AvatarConfig {
            clips_dir: dir.path().join("clips"),
            placeholder_dir: dir.path().join("placeholders"),
            ..AvatarConfig::default()
        })
        .unwrap();

        let worker_config = WorkerConfig {
            work_dir: dir.path().join("work"),
            output_dir: dir.path().join("videos"),
            ..WorkerConfig::default()
        };

        let pipeline = Pipeline::new(
            Arc::clone(&store),
            Arc::new(FfmpegEngine::default()),
            Collaborators::from_service_client(client, Arc::new(avatar)),
            worker_config,
        );
        let state = AppState::new(config, JobService::new(Arc::clone(&store), pipeline));

        Self {
            router: create_router(state, None),
            store,
            dir,
        }
    }

    /// Store a job that finished with `bytes` as its deliverable.
    async fn completed_job(&self, bytes: &[u8]) -> JobId {
        let id = JobId::new();
        let path = self.dir.path().join(format!("final_{}.mp4", id));
        tokio::fs::write(&path, bytes).await.unwrap();

        self.store
            .create(Job::new(id.clone(), JobRequest::new("https://example.com/a", VideoMode::ScreenRecording)))
            .await
            .unwrap();
        self.store
            .update(&id, |job| job.complete(path.to_string_lossy().into_owned()))
            .await
            .unwrap();
        id
    }

    async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> axum::response::Response {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_ok!(serde_json::from_slice(&bytes))
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_create_returns_processing() {
    let app = TestApp::new().await;
    let response = app
        .send(
            Request::post("/api/videos/create")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"source_reference": "https://example.com/post", "mode": "screen_recording"}).to_string(),
                ))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "processing");

    let id = body["video_id"].as_str().unwrap().to_string();
    let status = body_json(app.get(&format!("/api/videos/{}/status", id)).await).await;
    assert_eq!(status["video_id"], id.as_str());
    assert_eq!(status["mode"], "screen_recording");
}

#[tokio::test]
async fn test_create_overlay_without_image_is_rejected() {
    let app = TestApp::new().await;
    let response = app
        .send(
            Request::post("/api/videos/create")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"source_reference": "https://example.com/post", "mode": "custom_avatar_overlay"})
                        .to_string(),
                ))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "validation_error");
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_create_overlay_with_local_image_path_is_rejected() {
    let app = TestApp::new().await;
    let response = app
        .send(
            Request::post("/api/videos/create")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "source_reference": "https://example.com/post",
                        "mode": "custom_avatar_overlay",
                        "custom_avatar_image": "uploads/me.png"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "validation_error");
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_status_unknown_is_404() {
    let app = TestApp::new().await;
    let response = app.get("/api/videos/does-not-exist/status").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["detail"], "Video not found");
}

#[tokio::test]
async fn test_failed_status_shows_only_category() {
    let app = TestApp::new().await;
    let id = JobId::new();
    app.store
        .create(Job::new(id.clone(), JobRequest::new("https://example.com/a", VideoMode::Avatar)))
        .await
        .unwrap();
    app.store
        .update(&id, |job| {
            job.enter_stage(PipelineStage::AnalyzingSource)?;
            job.fail(ErrorCategory::UpstreamUnavailable)
        })
        .await
        .unwrap();

    let body = body_json(app.get(&format!("/api/videos/{}/status", id)).await).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["progress"], 10);
    assert_eq!(body["error_category"], "upstream API unavailable");
    assert!(body.get("output_reference").is_none());
}

#[tokio::test]
async fn test_stream_before_completion_is_400() {
    let app = TestApp::new().await;
    let id = JobId::new();
    app.store
        .create(Job::new(id.clone(), JobRequest::new("https://example.com/a", VideoMode::Avatar)))
        .await
        .unwrap();

    let response = app.get(&format!("/api/videos/{}/stream", id)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], "Video not ready");
}

#[tokio::test]
async fn test_stream_and_download() {
    let app = TestApp::new().await;
    let id = app.completed_job(b"0123456789").await;

    let response = app.get(&format!("/api/videos/{}/stream", id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(response.headers()[header::CONTENT_DISPOSITION], "inline");
    assert_eq!(body_bytes(response).await, b"0123456789");

    let response = app.get(&format!("/api/videos/{}/download", id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"narrated_video_{}.mp4\"", id).as_str()
    );
}

#[tokio::test]
async fn test_stream_range() {
    let app = TestApp::new().await;
    let id = app.completed_job(b"0123456789").await;

    let response = app
        .send(
            Request::get(format!("/api/videos/{}/stream", id))
                .header(header::RANGE, "bytes=2-5")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 2-5/10");
    assert_eq!(body_bytes(response).await, b"2345");

    let response = app
        .send(
            Request::get(format!("/api/videos/{}/stream", id))
                .header(header::RANGE, "bytes=20-")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
}

#[tokio::test]
async fn test_large_deliverable_range_from_tail() {
    let app = TestApp::new().await;
    let bytes: Vec<u8> = (0..4 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let id = app.completed_job(&bytes).await;

    let response = app
        .send(
            Request::get(format!("/api/videos/{}/download", id))
                .header(header::RANGE, "bytes=-16")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "16");
    assert_eq!(body_bytes(response).await, &bytes[bytes.len() - 16..]);

    let response = app.get(&format!("/api/videos/{}/stream", id)).await;
    assert_eq!(
        response.headers()[header::CONTENT_LENGTH],
        bytes.len().to_string().as_str()
    );
    assert_eq!(body_bytes(response).await.len(), bytes.len());
}

#[tokio::test]
async fn test_download_missing_file_is_404() {
    let app = TestApp::new().await;
    let id = app.completed_job(b"gone").await;
    let job = app.store.get(&id).await.unwrap();
    tokio::fs::remove_file(job.output_reference.unwrap()).await.unwrap();

    let response = app.get(&format!("/api/videos/{}/download", id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_videos() {
    let app = TestApp::new().await;
    app.completed_job(b"a").await;
    app.completed_job(b"b").await;

    let response = app.get("/api/videos").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|item| item["status"] == "completed" && item["progress"] == 100));
}

#[tokio::test]
async fn test_rate_limit_per_client() {
    let app = TestApp::with_config(ApiConfig {
        rate_limit_rps: 1,
        ..ApiConfig::default()
    })
    .await;

    let request = || {
        Request::get("/api/videos")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(app.send(request()).await.status(), StatusCode::OK);
    let limited = app.send(request()).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.headers()[header::RETRY_AFTER], "1");

    // Health is outside the limited routes
    assert_eq!(app.get("/health").await.status(), StatusCode::OK);
}
