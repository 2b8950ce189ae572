use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use upload_relay::config::{UploadConfig, final_dimensions};
use upload_relay::error::TransferError;
use upload_relay::services::pipeline::UploadPipeline;
use upload_relay::services::remote::{RemoteDescriptor, RemoteOptions, RemoteStore};
use upload_relay::services::stage::{StagedFile, Stager};
use upload_relay::{AppState, create_app};

const BOUNDARY: &str = "x-test-boundary-91c4";

struct MockRemote {
    fail_with: Option<String>,
    puts: Mutex<Vec<String>>,
}

impl MockRemote {
    fn new(fail_with: Option<&str>) -> Self {
        Self {
            fail_with: fail_with.map(|s| s.to_string()),
            puts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RemoteStore for MockRemote {
    async fn put(
        &self,
        staged: &StagedFile,
        options: &RemoteOptions,
    ) -> Result<RemoteDescriptor, TransferError> {
        if let Some(detail) = &self.fail_with {
            return Err(TransferError::new(detail.clone()));
        }
        let format = staged
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "bin".to_string());
        let key = match &options.fixed_key {
            Some(fixed) => format!("{}/{}", options.folder, fixed),
            None => format!("{}/{}.{}", options.folder, uuid::Uuid::new_v4(), format),
        };
        self.puts.lock().unwrap().push(key.clone());
        let (width, height) = final_dimensions(&options.transformations);
        Ok(RemoteDescriptor {
            url: format!("http://remote.test/{key}"),
            remote_id: key,
            format,
            bytes: staged.size,
            width,
            height,
        })
    }

    async fn delete(&self, _remote_id: &str) -> Result<(), TransferError> {
        Ok(())
    }
}

async fn test_app(fail_with: Option<&str>) -> (tempfile::TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    let stager = Stager::new(dir.path()).await.unwrap();
    let pipeline = UploadPipeline::new(stager, Arc::new(MockRemote::new(fail_with)));
    let config = UploadConfig {
        staging_dir: dir.path().to_path_buf(),
        ..UploadConfig::default()
    };
    let app = create_app(AppState::new(pipeline, &config));
    (dir, app)
}

#[derive(Default)]
struct MultipartBody {
    bytes: Vec<u8>,
}

impl MultipartBody {
    fn file(mut self, field: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
                 filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.bytes.extend_from_slice(data);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    fn text(mut self, field: &str, value: &str) -> Self {
        self.bytes.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n")
                .as_bytes(),
        );
        self.bytes.extend_from_slice(value.as_bytes());
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.bytes
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.bytes
    }
}

async fn post_multipart(app: &Router, uri: &str, body: Vec<u8>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

fn scratch_entries(dir: &tempfile::TempDir) -> usize {
    std::fs::read_dir(dir.path()).unwrap().count()
}

#[tokio::test]
async fn health_probe() {
    let (_dir, app) = test_app(None).await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn single_image_upload_succeeds() {
    let (dir, app) = test_app(None).await;
    let body = MultipartBody::default()
        .file("file", "photo.JPG", "image/jpeg", &[0xFFu8; 2048])
        .finish();

    let (status, json) = post_multipart(&app, "/uploads/image", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["original_name"], "photo.JPG");
    assert_eq!(json["remote"]["format"], "jpg");
    assert_eq!(json["remote"]["bytes"], 2048);
    assert!(
        json["remote"]["url"]
            .as_str()
            .unwrap()
            .starts_with("http://remote.test/images/")
    );
    assert_eq!(scratch_entries(&dir), 0);
}

#[tokio::test]
async fn missing_file_is_a_caller_error() {
    let (_dir, app) = test_app(None).await;
    let body = MultipartBody::default().text("note", "no file here").finish();

    let (status, json) = post_multipart(&app, "/uploads/image", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["reason"], "no_file_present");
}

#[tokio::test]
async fn unknown_category_is_404() {
    let (_dir, app) = test_app(None).await;
    let body = MultipartBody::default()
        .file("file", "clip.mp4", "video/mp4", b"data")
        .finish();

    let (status, json) = post_multipart(&app, "/uploads/video", body).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["reason"], "not_found");
}

#[tokio::test]
async fn executable_upload_is_rejected_without_staging() {
    let (dir, app) = test_app(None).await;
    let body = MultipartBody::default()
        .file("file", "malware.exe", "application/x-msdownload", b"MZ....")
        .finish();

    let (status, json) = post_multipart(&app, "/uploads/image", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["reason"], "validation_rejected");
    assert!(json["error"].as_str().unwrap().contains("extension"));
    assert_eq!(scratch_entries(&dir), 0);
}

#[tokio::test]
async fn transfer_failure_surfaces_provider_detail() {
    let (dir, app) = test_app(Some("simulated provider outage")).await;
    let body = MultipartBody::default()
        .file("file", "photo.png", "image/png", &[1u8; 256])
        .finish();

    let (status, json) = post_multipart(&app, "/uploads/image", body).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["reason"], "transfer_failed");
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("simulated provider outage")
    );
    assert_eq!(scratch_entries(&dir), 0);
}

#[tokio::test]
async fn batch_processes_every_file_independently() {
    let (dir, app) = test_app(None).await;
    let body = MultipartBody::default()
        .file("file", "one.png", "image/png", &[1u8; 128])
        .file("file", "two.exe", "application/x-msdownload", b"MZ")
        .file("file", "three.gif", "image/gif", &[3u8; 128])
        .finish();

    let (status, json) = post_multipart(&app, "/uploads/image/batch", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["field"], "file");

    let files = json["files"].as_array().unwrap();
    assert_eq!(files.len(), 3);
    assert_eq!(files[0]["status"], "stored");
    assert_eq!(files[1]["status"], "failed");
    assert_eq!(files[1]["reason"], "validation_rejected");
    assert_eq!(files[2]["status"], "stored");
    assert_eq!(scratch_entries(&dir), 0);
}

#[tokio::test]
async fn listing_groups_outcomes_by_field() {
    let (dir, app) = test_app(None).await;
    let body = MultipartBody::default()
        .file("photos", "a.png", "image/png", &[1u8; 64])
        .file("photos", "b.jpg", "image/jpeg", &[2u8; 64])
        .file("attachments", "terms.pdf", "application/pdf", b"%PDF-1.5")
        .text("title", "lake house")
        .finish();

    let (status, json) = post_multipart(&app, "/uploads/listing", body).await;
    assert_eq!(status, StatusCode::OK);

    let photos = json["fields"]["photos"].as_array().unwrap();
    assert_eq!(photos.len(), 2);
    assert_eq!(photos[0]["status"], "stored");
    assert_eq!(photos[1]["status"], "stored");

    let attachments = json["fields"]["attachments"].as_array().unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0]["status"], "stored");
    assert_eq!(scratch_entries(&dir), 0);
}

#[tokio::test]
async fn avatar_fixed_key_overwrites_by_convention() {
    let (_dir, app) = test_app(None).await;
    let body = MultipartBody::default()
        .file("avatar", "me.png", "image/png", &[5u8; 64])
        .finish();

    let (status, json) = post_multipart(&app, "/uploads/avatar?key=user-42", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["remote"]["remote_id"], "avatars/user-42");
    assert_eq!(json["remote"]["width"], 256);
    assert_eq!(json["remote"]["height"], 256);
}
