//! The HTTP edge's error type: every handler returns `Result<Json<CommonResponse<T>>, PluginHostError>`
//! and this type's `IntoResponse` impl is the second (and last) place a
//! `PluginError`/`ErrorEnvelope` is converted into an HTTP response, the
//! first being the child dispatcher itself.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use plugin_runtime_sdk::error::{ErrorEnvelope, PluginError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PluginHostError {
    #[error("plugin runtime error: {0}")]
    Plugin(#[from] PluginError),

    #[error("install failed: {0}")]
    InstallFailed(String),

    #[error("invalid package: {0}")]
    InvalidPackage(String),

    #[error("package already installed: {0}")]
    AlreadyInstalled(String),

    #[error("plugin entry import failed: {0}")]
    ImportPluginError(String),

    #[error("package not found: {pkg} {version}")]
    PackageNotFound { pkg: String, version: String },

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("job {job_id} is {status}: cannot cancel")]
    JobNotCancellable { job_id: String, status: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl PluginHostError {
    /// Default-cases any unclassified failure to `code = <variant name>`,
    /// `http_code = 500`, mirroring `HttpError.from_exception`'s fallback
    /// branch.
    pub fn code(&self) -> &'static str {
        match self {
            PluginHostError::Plugin(_) => "PluginError",
            PluginHostError::InstallFailed(_) => "ImportPluginError.InstallFailed",
            PluginHostError::InvalidPackage(_) => "ImportPluginError.InvalidPackage",
            PluginHostError::AlreadyInstalled(_) => "ImportPluginError.AlreadyInstalled",
            PluginHostError::ImportPluginError(_) => "ImportPluginError",
            PluginHostError::PackageNotFound { .. } => "PackageNotFound",
            PluginHostError::JobNotFound(_) => "JobNotFound",
            PluginHostError::JobNotCancellable { .. } => "JobNotCancellable",
            PluginHostError::Io(_) => "IoError",
            PluginHostError::Config { .. } => "ConfigurationError",
            PluginHostError::Internal { .. } => "InternalError",
        }
    }

    pub fn http_code(&self) -> StatusCode {
        match self {
            PluginHostError::Plugin(e) => {
                StatusCode::from_u16(e.http_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            PluginHostError::InstallFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PluginHostError::InvalidPackage(_) => StatusCode::BAD_REQUEST,
            PluginHostError::AlreadyInstalled(_) => StatusCode::CONFLICT,
            PluginHostError::ImportPluginError(_) => StatusCode::BAD_REQUEST,
            PluginHostError::PackageNotFound { .. } => StatusCode::NOT_FOUND,
            PluginHostError::JobNotFound(_) => StatusCode::NOT_FOUND,
            PluginHostError::JobNotCancellable { .. } => StatusCode::BAD_REQUEST,
            PluginHostError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PluginHostError::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            PluginHostError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_envelope(&self) -> ErrorEnvelope {
        if let PluginHostError::Plugin(e) = self {
            return e.to_envelope();
        }
        ErrorEnvelope {
            code: self.code().to_string(),
            message: self.to_string(),
            data: None,
            http_code: self.http_code().as_u16(),
        }
    }
}

impl IntoResponse for PluginHostError {
    fn into_response(self) -> Response {
        let status = self.http_code();
        let envelope = self.to_envelope();
        tracing::warn!(code = %envelope.code, message = %envelope.message, "request failed");
        (status, Json(json!({ "error": envelope }))).into_response()
    }
}
