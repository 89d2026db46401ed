//! Integration tests for version history and rollback.

mod common;

use axum::http::StatusCode;
use common::TestServer;
use perch_core::Platform;
use serde_json::json;

#[tokio::test]
async fn test_rollback_restores_previous_release() {
    let server = TestServer::new().await;
    server.upload("win32", "1.1.0", &[("Setup.exe", b"one")]).await;
    server.upload("win32", "1.2.0", &[("Setup.exe", b"two")]).await;

    let response = server
        .post_json("/api/rollback", json!({"platform": "win32", "version": "1.1.0"}))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    let body = response.json();
    assert_eq!(body["version"], "1.1.0");
    assert_eq!(body["previousVersion"], "1.2.0");

    let versions = server.get("/api/versions").await.json();
    let win32 = &versions["win32"];
    assert_eq!(win32["version"], "1.1.0");
    assert_eq!(win32["rolledBack"], true);
    assert_eq!(win32["rolledBackFrom"], "1.2.0");
    assert_eq!(win32["files"][0]["name"], "Setup-1.1.0.exe");

    // Clients on 1.1.0 are now current; older ones are sent to 1.1.0
    let response = server.get("/update/win32/1.1.0").await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    let manifest = server.get("/update/win32/1.0.0").await.json();
    assert_eq!(manifest["version"], "1.1.0");

    let activity = server.get("/api/activity").await.json();
    assert_eq!(activity[0]["type"], "rollback");
}

#[tokio::test]
async fn test_rollback_blocked_by_missing_files() {
    let server = TestServer::new().await;
    server.upload("linux", "1.1.0", &[("app.deb", b"one")]).await;
    server.upload("linux", "1.2.0", &[("app.deb", b"two")]).await;
    std::fs::remove_file(server.artifact_path(Platform::Linux, "app-1.1.0.deb")).unwrap();

    let response = server
        .post_json("/api/rollback", json!({"platform": "linux", "version": "1.1.0"}))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    let body = response.json();
    assert_eq!(body["code"], "missing_files");
    assert_eq!(body["missing_files"], json!(["app-1.1.0.deb"]));

    let versions = server.get("/api/versions").await.json();
    assert_eq!(versions["linux"]["version"], "1.2.0");
    assert_eq!(versions["linux"]["files"][0]["name"], "app-1.2.0.deb");
}

#[tokio::test]
async fn test_rollback_rejects_bad_requests() {
    let server = TestServer::new().await;
    server.upload("darwin", "1.1.0", &[("App.dmg", b"one")]).await;

    let response = server
        .post_json("/api/rollback", json!({"platform": "darwin", "version": "0.5.0"}))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    // History is per platform
    let response = server
        .post_json("/api/rollback", json!({"platform": "win32", "version": "1.1.0"}))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = server
        .post_json("/api/rollback", json!({"platform": "darwin"}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = server
        .post_json("/api/rollback", json!({"platform": "darwin", "version": "latest"}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_history_is_capped() {
    let server = TestServer::with_config(|config| {
        config.metadata.history_limit = 2;
    })
    .await;
    for version in ["1.1.0", "1.2.0", "1.3.0"] {
        let response = server.upload("win32", version, &[("Setup.exe", b"x")]).await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let history = server.get("/api/version-history").await.json();
    let versions: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["version"].as_str().unwrap())
        .collect();
    assert_eq!(versions, vec!["1.2.0", "1.3.0"]);

    // The evicted entry can no longer be rolled back to
    let response = server
        .post_json("/api/rollback", json!({"platform": "win32", "version": "1.1.0"}))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_history_entry() {
    let server = TestServer::new().await;
    server.upload("linux", "1.1.0", &[("app.deb", b"one")]).await;

    let history = server.get("/api/version-history").await.json();
    let entry = &history[0];
    assert_eq!(entry["platform"], "linux");
    assert_eq!(entry["fileCount"], 1);
    let id = entry["id"].as_str().unwrap().to_string();

    let response = server.delete(&format!("/api/version-history/{id}")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(
        server
            .get("/api/version-history")
            .await
            .json()
            .as_array()
            .unwrap()
            .is_empty()
    );

    // The release itself and its files are untouched
    let versions = server.get("/api/versions").await.json();
    assert_eq!(versions["linux"]["version"], "1.1.0");
    assert!(server.artifact_path(Platform::Linux, "app-1.1.0.deb").exists());

    let response = server.delete(&format!("/api/version-history/{id}")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let activity = server.get("/api/activity").await.json();
    assert_eq!(activity[0]["type"], "delete_history");
}

#[tokio::test]
async fn test_set_version_keeps_files() {
    let server = TestServer::new().await;
    server.upload("darwin", "2.0.0", &[("App.dmg", b"mac")]).await;

    let response = server
        .post_json("/api/versions", json!({"platform": "darwin", "version": "2.0.1"}))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["version"], "2.0.1");

    let versions = server.get("/versions").await.json();
    assert_eq!(versions["darwin"]["version"], "2.0.1");
    assert_eq!(versions["darwin"]["files"][0]["name"], "App-2.0.0.dmg");

    let response = server
        .post_json("/versions", json!({"platform": "darwin"}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = server
        .post_json("/versions", json!({"platform": "darwin", "version": "two"}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_bodies_get_json_errors() {
    let server = TestServer::new().await;

    let response = server
        .post_json("/api/rollback", json!({"platform": "win32", "version": 110}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.headers["content-type"], "application/json");
    assert_eq!(response.json()["code"], "bad_request");

    // No content type at all
    let response = server
        .send(
            axum::http::Request::post("/api/versions")
                .body(axum::body::Body::from(
                    r#"{"platform":"win32","version":"1.2.0"}"#,
                ))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body = response.json();
    assert_eq!(body["code"], "bad_request");
    assert!(body["message"].as_str().unwrap().contains("invalid JSON body"));

    let response = server
        .send(
            axum::http::Request::post("/versions")
                .header("content-type", "application/json")
                .body(axum::body::Body::from("{\"platform\":"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["code"], "bad_request");

    let versions = server.get("/api/versions").await.json();
    assert_eq!(versions["win32"]["version"], "1.0.0");
}
