//! End-to-end tests through the full HTTP stack (`create_server`): install
//! a bundle, then invoke its tool both non-streaming and streaming, the
//! `AlreadyInstalled` conflict, and the metadata round-trip law for
//! `ReadPackageMetadata`/`GetPackageMetadata`.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use plugin_host::config::Config;
use serde_json::json;

fn test_config(extensions: &std::path::Path, storage: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.runtime.extensions_path = extensions.to_path_buf();
    config.runtime.local_storage_path = storage.to_path_buf();
    config.runtime.start_process_max_retries = 30;
    config.runtime.start_process_retry_delay = std::time::Duration::from_millis(50);
    config
}

#[tokio::test]
async fn install_then_run_tool_non_streaming() {
    let extensions = tempfile::tempdir().unwrap();
    let storage = tempfile::tempdir().unwrap();
    let bundle_dir = tempfile::tempdir().unwrap();
    let bundle_path = bundle_dir.path().join("echo-1.0.0.zip");
    common::build_echo_bundle(&bundle_path);

    let config = test_config(extensions.path(), storage.path());
    let app = plugin_host::create_server(config).await.unwrap();
    let server = TestServer::new(app).unwrap();

    let install_resp = server
        .post("/v1/InstallPackage")
        .json(&json!({"uri": format!("file://{}", bundle_path.display()), "filename": "echo-1.0.0.zip"}))
        .await;
    assert_eq!(install_resp.status_code(), StatusCode::OK);
    let body: serde_json::Value = install_resp.json();
    assert_eq!(body["data"]["name"], json!("echo"));
    assert_eq!(body["data"]["plugins"][0]["name"], json!("echo"));

    let input = json!({"hello": "world"});
    let run_resp = server
        .post("/v1/RunPluginTool")
        .json(&json!({
            "pkg": "echo", "version": "1.0.0", "plugin": "echo", "tool": "echo",
            "input": input,
        }))
        .await;
    assert_eq!(run_resp.status_code(), StatusCode::OK);
    let run_body: serde_json::Value = run_resp.json();
    assert_eq!(run_body["data"], input);
}

#[tokio::test]
async fn reinstalling_without_force_reports_already_installed() {
    let extensions = tempfile::tempdir().unwrap();
    let storage = tempfile::tempdir().unwrap();
    let bundle_dir = tempfile::tempdir().unwrap();
    let bundle_path = bundle_dir.path().join("echo-1.0.0.zip");
    common::build_echo_bundle(&bundle_path);

    let config = test_config(extensions.path(), storage.path());
    let app = plugin_host::create_server(config).await.unwrap();
    let server = TestServer::new(app).unwrap();

    let body = json!({"uri": format!("file://{}", bundle_path.display()), "filename": "echo-1.0.0.zip"});
    assert_eq!(server.post("/v1/InstallPackage").json(&body).await.status_code(), StatusCode::OK);

    let second = server.post("/v1/InstallPackage").json(&body).await;
    assert_eq!(second.status_code(), StatusCode::CONFLICT);
    let second_body: serde_json::Value = second.json();
    assert_eq!(second_body["error"]["code"], json!("ImportPluginError.AlreadyInstalled"));
}

#[tokio::test]
async fn read_package_metadata_round_trips_declared_plugin_names() {
    let extensions = tempfile::tempdir().unwrap();
    let storage = tempfile::tempdir().unwrap();
    let bundle_dir = tempfile::tempdir().unwrap();
    let bundle_path = bundle_dir.path().join("echo-1.0.0.zip");
    common::build_echo_bundle(&bundle_path);

    let config = test_config(extensions.path(), storage.path());
    let app = plugin_host::create_server(config).await.unwrap();
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/v1/ReadPackageMetadata")
        .json(&json!({"uri": format!("file://{}", bundle_path.display()), "filename": "echo-1.0.0.zip"}))
        .await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["data"]["plugins"], json!(["echo"]));
    assert!(!extensions.path().join("echo").exists());
}

#[tokio::test]
async fn get_package_metadata_matches_what_install_returned() {
    let extensions = tempfile::tempdir().unwrap();
    let storage = tempfile::tempdir().unwrap();
    let bundle_dir = tempfile::tempdir().unwrap();
    let bundle_path = bundle_dir.path().join("echo-1.0.0.zip");
    common::build_echo_bundle(&bundle_path);

    let config = test_config(extensions.path(), storage.path());
    let app = plugin_host::create_server(config).await.unwrap();
    let server = TestServer::new(app).unwrap();

    let install_body = json!({"uri": format!("file://{}", bundle_path.display()), "filename": "echo-1.0.0.zip"});
    let installed: serde_json::Value = server.post("/v1/InstallPackage").json(&install_body).await.json();

    let resp = server
        .post("/v1/GetPackageMetadata")
        .json(&json!({"pkg": "echo", "version": "1.0.0"}))
        .await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    let metas: serde_json::Value = resp.json();
    assert_eq!(metas["data"], installed["data"]["plugins"]);
}

#[tokio::test]
async fn run_plugin_tool_streams_server_sent_events() {
    let extensions = tempfile::tempdir().unwrap();
    let storage = tempfile::tempdir().unwrap();
    let bundle_dir = tempfile::tempdir().unwrap();
    let bundle_path = bundle_dir.path().join("echo-1.0.0.zip");
    common::build_echo_bundle(&bundle_path);

    let config = test_config(extensions.path(), storage.path());
    let app = plugin_host::create_server(config).await.unwrap();
    let server = TestServer::new(app).unwrap();

    assert_eq!(
        server
            .post("/v1/InstallPackage")
            .json(&json!({"uri": format!("file://{}", bundle_path.display()), "filename": "echo-1.0.0.zip"}))
            .await
            .status_code(),
        StatusCode::OK
    );

    let resp = server
        .post("/v1/RunPluginTool")
        .json(&json!({
            "pkg": "echo", "version": "1.0.0", "plugin": "echo", "tool": "echo",
            "input": {"text": "one two"}, "stream": true,
        }))
        .await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    let text = resp.text();
    assert!(text.contains("event: message"));
    assert!(text.contains("\"one\""));
    assert!(text.contains("\"two\""));
    assert!(text.contains("event: close"));
}
