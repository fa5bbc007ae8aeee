//! Current-time tool: one tool, `current_time`, returning the current
//! wall-clock time formatted for a requested timezone (defaulting to UTC).

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use futures::stream;
use plugin_runtime_sdk::error::PluginError;
use plugin_runtime_sdk::metadata::{Metadata, PackageInfo, ToolMetadata};
use plugin_runtime_sdk::plugin::{Plugin, ToolStream};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;

pub struct TimePlugin;

impl TimePlugin {
    fn metadata() -> Metadata {
        let mut tools = HashMap::new();
        tools.insert(
            "current_time".to_string(),
            ToolMetadata {
                name: "current_time".to_string(),
                description: "Get the current time in a given timezone.".to_string(),
                labels: Default::default(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "timezone": {
                            "type": "string",
                            "description": "IANA timezone name, e.g. Asia/Shanghai. Defaults to UTC.",
                        }
                    },
                }),
                output_schema: json!({"type": "string"}),
                func_name: Some("current_time".to_string()),
                stream_func_name: None,
                runtime_features: vec![],
            },
        );
        Metadata {
            meta_version: "1".to_string(),
            name: "time".to_string(),
            category: "productivity".to_string(),
            description: "A tool for getting the current time.".to_string(),
            icon: String::new(),
            metadata_path: String::new(),
            labels: Default::default(),
            config_schema: json!({}),
            package_info: PackageInfo { name: "plugin-time".to_string(), version: "0.1.0".to_string() },
            tools,
        }
    }

    fn current_time(timezone: &str) -> Result<String, PluginError> {
        let tz_name = if timezone.is_empty() { "UTC" } else { timezone };
        let tz = Tz::from_str(tz_name)
            .map_err(|_| PluginError::new("InvalidTimezone", format!("unknown timezone: {}", tz_name), 400))?;
        let now = Utc::now().with_timezone(&tz);
        Ok(now.format("%Y-%m-%d %H:%M:%S %Z").to_string())
    }
}

#[async_trait]
impl Plugin for TimePlugin {
    fn get_metadata(&self) -> Metadata {
        Self::metadata()
    }

    async fn run_tool(&self, tool: &str, input: Value, _config: Option<Value>) -> Result<Value, PluginError> {
        if tool != "current_time" {
            return Err(PluginError::new("ToolNotFound", format!("unknown tool: {}", tool), 404));
        }
        let timezone = input.get("timezone").and_then(|v| v.as_str()).unwrap_or("UTC");
        let out = tokio::task::spawn_blocking({
            let timezone = timezone.to_string();
            move || Self::current_time(&timezone)
        })
        .await
        .map_err(|e| PluginError::new("JoinError", e.to_string(), 500))??;
        Ok(Value::String(out))
    }

    async fn run_tool_stream(&self, tool: &str, input: Value, config: Option<Value>) -> Result<ToolStream, PluginError> {
        let value = self.run_tool(tool, input, config).await;
        Ok(Box::pin(stream::once(async move { value })))
    }
}
