//! Data model: installed-package records, install job state, and the
//! uniform HTTP response envelope every `/v1/*` route returns.

use plugin_runtime_sdk::error::ErrorEnvelope;
use plugin_runtime_sdk::metadata::Metadata;
use serde::{Deserialize, Serialize};

/// The uniform HTTP response envelope: exactly one of `data`/`error` is
/// populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonResponse<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
}

impl<T> CommonResponse<T> {
    pub fn ok(data: T) -> Self {
        CommonResponse { data: Some(data), error: None }
    }

    pub fn empty() -> Self {
        CommonResponse { data: None, error: None }
    }
}

/// Brief record for a just-installed package: no plugin metadata attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageBrief {
    pub name: String,
    pub version: String,
    pub uri: String,
    pub filename: String,
}

/// Brief record plus the plugin names declared by the bundle's entry
/// points, returned by `ReadPackageMetadata` without installing anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageBriefWithEntry {
    pub name: String,
    pub version: String,
    pub uri: String,
    pub filename: String,
    #[serde(default)]
    pub plugins: Vec<String>,
}

/// Full package record with every plugin's metadata attached, returned by
/// `InstallPackage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMeta {
    pub name: String,
    pub version: String,
    pub uri: String,
    pub filename: String,
    #[serde(default)]
    pub plugins: Vec<Metadata>,
}

/// Install job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Started,
    Deferred,
    Scheduled,
    Finished,
    Failed,
    Stopped,
}

impl JobStatus {
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            JobStatus::Queued | JobStatus::Started | JobStatus::Deferred | JobStatus::Scheduled
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed | JobStatus::Stopped)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallJobRequest {
    pub uri: String,
    pub filename: String,
    #[serde(default)]
    pub force: bool,
}

/// A queued/running/completed install job, as tracked by the job table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallJob {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub data: Option<PackageBrief>,
    pub request: InstallJobRequest,
}
