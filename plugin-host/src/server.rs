//! HTTP server assembly: shared application state and route wiring for the
//! `/v1/*` plugin host surface, plus `/ping`.

use crate::config::Config;
use crate::handlers;
use crate::installer::Installer;
use crate::job_queue::{JobQueue, SharedJobQueue};
use crate::process_manager::{ProcessManager, SharedProcessManager};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared state every handler extracts via `axum::extract::State`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub process_manager: SharedProcessManager,
    pub installer: Arc<Installer>,
    pub job_queue: SharedJobQueue,
}

/// Locate the `plugin-child` binary alongside the running `plugin-host`
/// binary. Test binaries run from a `deps/` subdirectory one level below
/// where `plugin-child` actually lands, so that directory is checked too
/// before falling back to a bare `PATH` lookup.
fn child_binary_path() -> std::path::PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| {
            let dir = exe.parent()?;
            let candidate = dir.join("plugin-child");
            if candidate.exists() {
                return Some(candidate);
            }
            let sibling = dir.parent()?.join("plugin-child");
            sibling.exists().then_some(sibling)
        })
        .unwrap_or_else(|| std::path::PathBuf::from("plugin-child"))
}

pub async fn create_server(config: Config) -> anyhow::Result<Router> {
    let config = Arc::new(config);

    let process_manager = Arc::new(ProcessManager::new(config.runtime.clone(), child_binary_path()));
    let installer = Arc::new(Installer::new(config.runtime.clone(), config.package.clone()));
    let job_queue: SharedJobQueue = JobQueue::new(installer.clone(), config.runtime.install_workers, config.runtime.worker_job_timeout);

    let state = AppState { config: config.clone(), process_manager, installer, job_queue };

    let app = Router::new()
        .route("/v1/InstallPackage", post(handlers::install_package))
        .route("/v1/InstallPackageAsync", post(handlers::install_package_async))
        .route("/v1/GetInstallPackageAsyncStatus", post(handlers::get_install_package_async_status))
        .route("/v1/RetryInstallPackage", post(handlers::retry_install_package))
        .route("/v1/CancelInstallPackage", post(handlers::cancel_install_package))
        .route("/v1/ReadPackageMetadata", post(handlers::read_package_metadata))
        .route("/v1/DeletePackage", post(handlers::delete_package))
        .route("/v1/GetPackageMetadata", post(handlers::get_package_metadata))
        .route("/v1/GetPluginIcon", post(handlers::get_plugin_icon))
        .route("/v1/RunPluginTool", post(handlers::run_plugin_tool))
        .route("/v1/RunPluginValidate", post(handlers::run_plugin_validate))
        .route("/ping", get(handlers::ping))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(config.server.timeout.max(Duration::from_secs(1))))
        .with_state(state);

    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ping_route_responds() {
        let mut config = Config::default();
        let dir = tempfile::tempdir().unwrap();
        config.runtime.extensions_path = dir.path().join("extensions");
        config.runtime.local_storage_path = dir.path().join("storage");

        let app = create_server(config).await.unwrap();
        let server = axum_test::TestServer::new(app).unwrap();
        let resp = server.get("/ping").await;
        resp.assert_status_ok();
        resp.assert_json(&serde_json::json!({"message": "pong"}));
    }
}
