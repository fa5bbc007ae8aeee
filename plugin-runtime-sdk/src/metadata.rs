//! Plugin and tool metadata types returned by `GetMetadata`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bilingual(+) display strings for a plugin or tool.
///
/// Callers populate whichever fields their bundle's `metadata.yaml`
/// supplies and leave the rest `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Labels {
    #[serde(default)]
    pub name_en: Option<String>,
    #[serde(default)]
    pub name_zh_hans: Option<String>,
    #[serde(default)]
    pub name_zh_hant: Option<String>,
    #[serde(default)]
    pub description_en: Option<String>,
    #[serde(default)]
    pub description_zh_hans: Option<String>,
    #[serde(default)]
    pub description_zh_hant: Option<String>,
}

/// The package name and version a plugin was shipped under.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Metadata describing a single callable tool on a plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub input_schema: serde_json::Value,
    #[serde(default)]
    pub output_schema: serde_json::Value,
    #[serde(default)]
    pub func_name: Option<String>,
    #[serde(default)]
    pub stream_func_name: Option<String>,
    #[serde(default)]
    pub runtime_features: Vec<String>,
}

/// Full metadata for a plugin, returned by `run_metadata`/`run_pkg_metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub meta_version: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub metadata_path: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub config_schema: serde_json::Value,
    #[serde(default)]
    pub package_info: PackageInfo,
    #[serde(default)]
    pub tools: HashMap<String, ToolMetadata>,
}
