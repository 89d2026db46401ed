//! Server test utilities.

use super::fixtures::MultipartBody;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use bytes::Bytes;
use perch_core::Platform;
use perch_core::config::AppConfig;
use perch_metadata::MetadataStore;
use perch_server::{AppState, create_router};
use perch_storage::ArtifactStore;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

/// A buffered response.
#[allow(dead_code)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[allow(dead_code)]
impl TestResponse {
    /// Parse the body as JSON (`Null` when empty).
    pub fn json(&self) -> Value {
        if self.body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&self.body).expect("response body is not JSON")
        }
    }

    /// The body as UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).expect("response body is not UTF-8")
    }
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let mut config = AppConfig::for_testing(temp_dir.path());
        modifier(&mut config);

        let storage = perch_storage::from_config(&config.storage)
            .await
            .expect("Failed to create storage backend");
        perch_storage::prepare(storage.as_ref())
            .await
            .expect("Failed to prepare storage");
        let metadata = perch_metadata::from_config(&config.metadata)
            .await
            .expect("Failed to create metadata store");

        let state = AppState::new(config, storage, metadata);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Get access to the underlying artifact store.
    pub fn storage(&self) -> Arc<dyn ArtifactStore> {
        self.state.storage.clone()
    }

    /// The temporary root holding storage and metadata.
    pub fn root(&self) -> &Path {
        self._temp_dir.path()
    }

    /// On-disk path of a committed artifact.
    pub fn artifact_path(&self, platform: Platform, file_name: &str) -> PathBuf {
        self.root()
            .join("releases")
            .join(platform.as_str())
            .join(file_name)
    }

    /// Send a request and buffer the response.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        send(&self.router, request).await
    }

    /// GET a URI.
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    /// DELETE a URI.
    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.send(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }

    /// POST a JSON body.
    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        self.send(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
    }

    /// Upload files as one release.
    pub async fn upload(&self, platform: &str, version: &str, files: &[(&str, &[u8])]) -> TestResponse {
        self.send(upload_request(platform, version, files)).await
    }
}

/// Send a request through a router and buffer the response.
pub async fn send(router: &axum::Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    TestResponse {
        status,
        headers,
        body,
    }
}

/// Build a multipart upload request.
#[allow(dead_code)]
pub fn upload_request(platform: &str, version: &str, files: &[(&str, &[u8])]) -> Request<Body> {
    let mut form = MultipartBody::new().text("version", version);
    for (name, data) in files {
        form = form.file("files", name, data);
    }
    multipart_request(&format!("/upload/{platform}"), form)
}

/// Build a request carrying a multipart form.
#[allow(dead_code)]
pub fn multipart_request(uri: &str, form: MultipartBody) -> Request<Body> {
    let (content_type, body) = form.finish();
    Request::post(uri)
        .header("content-type", content_type)
        .body(Body::from(body))
        .unwrap()
}
