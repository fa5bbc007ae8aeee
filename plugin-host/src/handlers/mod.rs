//! `/v1/*` request handlers: install/read/delete package metadata, the
//! install job queue surface, and the run-tool/run-validate/get-icon
//! plugin-facing endpoints. Each handler takes an axum `Json<...>`
//! extractor and returns `CommonResponse<T>`.

use crate::error::PluginHostError;
use crate::model::{CommonResponse, InstallJobRequest, JobStatus, PackageBrief, PackageMeta};
use crate::server::AppState;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use futures::stream::{self, Stream, StreamExt};
use plugin_runtime_sdk::client;
use plugin_runtime_sdk::envelope::Req;
use plugin_runtime_sdk::metadata::Metadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;

fn addr_str(addr: &std::path::Path) -> Result<String, PluginHostError> {
    addr.to_str()
        .map(|s| s.to_string())
        .ok_or_else(|| PluginHostError::Internal { message: "non-utf8 socket path".to_string() })
}

/// Ensure a child is running for `(pkg, version)` and confirm it has
/// finished bootstrapping (§4.3 bootstrap retry) before returning its
/// socket address as a string for use with `plugin_runtime_sdk::client`.
async fn ensure_child(state: &AppState, pkg: &str, version: &str, plugin: &str) -> Result<String, PluginHostError> {
    let (addr, fresh) = state.process_manager.ensure(pkg, version).await?;
    let addr_s = addr_str(&addr)?;
    if fresh {
        client::confirm_bootstrap(&addr_s, plugin, state.process_manager.bootstrap_retry())
            .await
            .map_err(PluginHostError::Plugin)?;
    }
    Ok(addr_s)
}

// ---- InstallPackage ---------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct InstallPackageBody {
    pub uri: String,
    pub filename: String,
    #[serde(default)]
    pub force: bool,
}

/// `POST /v1/InstallPackage` — install a bundle synchronously, then fetch
/// every declared plugin's full metadata to build the response.
pub async fn install_package(
    State(state): State<AppState>,
    Json(body): Json<InstallPackageBody>,
) -> Result<Json<CommonResponse<PackageMeta>>, PluginHostError> {
    let brief = state.installer.install(&body.uri, &body.filename, body.force).await?;
    let plugins = fetch_all_metadata(&state, &brief.name, &brief.version).await?;
    Ok(Json(CommonResponse::ok(PackageMeta {
        name: brief.name,
        version: brief.version,
        uri: brief.uri,
        filename: brief.filename,
        plugins,
    })))
}

async fn fetch_all_metadata(state: &AppState, pkg: &str, version: &str) -> Result<Vec<Metadata>, PluginHostError> {
    let addr = ensure_child(state, pkg, version, "*").await?;
    let policy = state.process_manager.bootstrap_retry();
    let value = client::request_with_retry(&addr, &Req::run_pkg_metadata(), policy)
        .await
        .map_err(PluginHostError::Plugin)?;
    let metas: Vec<Metadata> = serde_json::from_value(value)?;
    Ok(metas)
}

// ---- ReadPackageMetadata -----------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReadPackageMetadataBody {
    pub uri: String,
    pub filename: String,
}

/// `POST /v1/ReadPackageMetadata` — read a bundle's declared plugin names
/// without installing it.
pub async fn read_package_metadata(
    State(state): State<AppState>,
    Json(body): Json<ReadPackageMetadataBody>,
) -> Result<Json<CommonResponse<crate::model::PackageBriefWithEntry>>, PluginHostError> {
    let brief = state.installer.read_metadata(&body.uri, &body.filename).await?;
    Ok(Json(CommonResponse::ok(brief)))
}

// ---- InstallPackageAsync / job queue ------------------------------------

#[derive(Debug, Serialize)]
pub struct JobIdResponse {
    pub job_id: String,
}

/// `POST /v1/InstallPackageAsync` — enqueue an install job, returning
/// immediately with its id.
pub async fn install_package_async(
    State(state): State<AppState>,
    Json(body): Json<InstallPackageBody>,
) -> Result<Json<CommonResponse<JobIdResponse>>, PluginHostError> {
    let job_id = state.job_queue.enqueue(InstallJobRequest { uri: body.uri, filename: body.filename, force: body.force });
    Ok(Json(CommonResponse::ok(JobIdResponse { job_id })))
}

#[derive(Debug, Deserialize)]
pub struct JobIdBody {
    pub job_id: String,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PackageBrief>,
}

/// `POST /v1/GetInstallPackageAsyncStatus` — fetch a job's current state.
pub async fn get_install_package_async_status(
    State(state): State<AppState>,
    Json(body): Json<JobIdBody>,
) -> Result<Json<CommonResponse<JobStatusResponse>>, PluginHostError> {
    let job = state
        .job_queue
        .status(&body.job_id)
        .ok_or_else(|| PluginHostError::JobNotFound(body.job_id.clone()))?;
    Ok(Json(CommonResponse::ok(JobStatusResponse { status: job.status, reason: job.reason, data: job.data })))
}

/// `POST /v1/RetryInstallPackage` — cancel any in-flight attempt and
/// re-enqueue the same job id with its original arguments.
pub async fn retry_install_package(
    State(state): State<AppState>,
    Json(body): Json<JobIdBody>,
) -> Result<Json<CommonResponse<()>>, PluginHostError> {
    state.job_queue.retry(&body.job_id)?;
    Ok(Json(CommonResponse::empty()))
}

/// `POST /v1/CancelInstallPackage` — cancel a non-terminal job.
pub async fn cancel_install_package(
    State(state): State<AppState>,
    Json(body): Json<JobIdBody>,
) -> Result<Json<CommonResponse<()>>, PluginHostError> {
    state.job_queue.cancel(&body.job_id)?;
    Ok(Json(CommonResponse::empty()))
}

// ---- DeletePackage -------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PackageRefBody {
    pub pkg: String,
    pub version: String,
}

/// `POST /v1/DeletePackage` — stop the live child, if any, then remove the
/// installed directory.
pub async fn delete_package(
    State(state): State<AppState>,
    Json(body): Json<PackageRefBody>,
) -> Result<Json<CommonResponse<()>>, PluginHostError> {
    state.process_manager.stop(&body.pkg, &body.version).await;
    state.installer.delete(&body.pkg, &body.version).await?;
    Ok(Json(CommonResponse::empty()))
}

// ---- GetPackageMetadata ---------------------------------------------------

/// `POST /v1/GetPackageMetadata` — metadata for every plugin an installed
/// package declares, ensuring its child is running.
pub async fn get_package_metadata(
    State(state): State<AppState>,
    Json(body): Json<PackageRefBody>,
) -> Result<Json<CommonResponse<Vec<Metadata>>>, PluginHostError> {
    let metas = fetch_all_metadata(&state, &body.pkg, &body.version).await?;
    Ok(Json(CommonResponse::ok(metas)))
}

// ---- GetPluginIcon ---------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GetPluginIconBody {
    pub pkg: String,
    pub version: String,
    pub plugin: String,
}

#[derive(Debug, Serialize)]
pub struct PluginIconResponse {
    pub filename: String,
    pub content: String,
}

/// `POST /v1/GetPluginIcon` — base64-encode a plugin's icon file. The icon
/// must be declared as a `file://` URI; anything else is rejected.
pub async fn get_plugin_icon(
    State(state): State<AppState>,
    Json(body): Json<GetPluginIconBody>,
) -> Result<Json<CommonResponse<PluginIconResponse>>, PluginHostError> {
    let addr = ensure_child(&state, &body.pkg, &body.version, &body.plugin).await?;
    let policy = state.process_manager.bootstrap_retry();
    let value = client::request_with_retry(&addr, &Req::run_metadata(body.plugin.clone()), policy)
        .await
        .map_err(PluginHostError::Plugin)?;
    let meta: Metadata = serde_json::from_value(value)?;

    if meta.icon.is_empty() {
        return Err(PluginHostError::ImportPluginError(format!("plugin {} has no icon", body.plugin)));
    }
    let Some(path) = meta.icon.strip_prefix("file://") else {
        return Err(PluginHostError::InvalidPackage(format!("icon uri is not file://: {}", meta.icon)));
    };

    let bytes = tokio::fs::read(path).await?;
    let content = base64::engine::general_purpose::STANDARD.encode(bytes);
    let filename = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Json(CommonResponse::ok(PluginIconResponse { filename, content })))
}

// ---- RunPluginTool ---------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RunPluginToolBody {
    pub pkg: String,
    pub version: String,
    pub plugin: String,
    pub tool: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub stream: bool,
}

/// `POST /v1/RunPluginTool` — run a tool, returning either a single JSON
/// result or (when `stream: true`) a server-sent-events stream of partial
/// results.
pub async fn run_plugin_tool(
    State(state): State<AppState>,
    Json(body): Json<RunPluginToolBody>,
) -> Result<Response, PluginHostError> {
    let addr = ensure_child(&state, &body.pkg, &body.version, &body.plugin).await?;
    let policy = state.process_manager.bootstrap_retry();

    if body.stream {
        let req = Req::run_tool_stream(body.plugin, body.tool, body.input, body.config);
        let items = client::request_stream(&addr, &req).await.map_err(PluginHostError::Plugin)?;
        return Ok(sse_from_stream(items).into_response());
    }

    let req = Req::run_tool(body.plugin, body.tool, body.input, body.config);
    let value = client::request_with_retry(&addr, &req, policy).await.map_err(PluginHostError::Plugin)?;
    Ok(Json(CommonResponse::ok(value)).into_response())
}

fn sse_from_stream(
    items: futures::stream::BoxStream<'static, Result<Value, plugin_runtime_sdk::error::PluginError>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = items.map(|item| {
        let event = match item {
            Ok(value) => Event::default().event("message").json_data(value).unwrap_or_else(|_| Event::default()),
            Err(e) => Event::default()
                .event("error")
                .json_data(serde_json::json!({ "error": e.to_envelope() }))
                .unwrap_or_else(|_| Event::default()),
        };
        Ok(event)
    });
    let terminated = events.chain(stream::once(async { Ok(Event::default().event("close").data("")) }));
    Sse::new(terminated).keep_alive(KeepAlive::default())
}

// ---- RunPluginValidate -----------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RunPluginValidateBody {
    pub pkg: String,
    pub version: String,
    pub plugin: String,
    #[serde(default)]
    pub config: Option<Value>,
}

/// `POST /v1/RunPluginValidate` — validate a configuration payload without
/// running a tool.
pub async fn run_plugin_validate(
    State(state): State<AppState>,
    Json(body): Json<RunPluginValidateBody>,
) -> Result<Json<CommonResponse<()>>, PluginHostError> {
    let addr = ensure_child(&state, &body.pkg, &body.version, &body.plugin).await?;
    let policy = state.process_manager.bootstrap_retry();
    let req = Req::run_validate(body.plugin, body.config);
    client::request_with_retry(&addr, &req, policy).await.map_err(PluginHostError::Plugin)?;
    Ok(Json(CommonResponse::empty()))
}

// ---- /ping -------------------------------------------------------------

/// `GET /ping` — HTTP-level liveness probe. Distinct from the wire-level
/// `run_ping` action, which a child answers with the bare string `"pong"`;
/// this one answers with a small JSON envelope.
pub async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "pong" }))
}
