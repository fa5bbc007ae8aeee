//! The plugin runtime contract: the trait every in-process plugin
//! implementation satisfies.

use crate::error::PluginError;
use crate::metadata::Metadata;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

/// A stream of tool-output chunks, as produced by `run_tool_stream`.
pub type ToolStream = BoxStream<'static, Result<Value, PluginError>>;

/// The contract a plugin implementation satisfies.
///
/// Tool bodies that are naturally synchronous should be offloaded with
/// `tokio::task::spawn_blocking` by the caller (the child dispatcher does
/// this per §4.6) rather than blocking the executor inside the trait
/// implementation itself.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Static metadata describing this plugin and the tools it exposes.
    fn get_metadata(&self) -> Metadata;

    /// Invoke a single tool by name with the given input and optional
    /// per-call configuration, returning its full result.
    async fn run_tool(&self, tool: &str, input: Value, config: Option<Value>) -> Result<Value, PluginError>;

    /// Invoke a tool in streaming mode, yielding a sequence of partial
    /// results terminated by the stream's end.
    async fn run_tool_stream(&self, tool: &str, input: Value, config: Option<Value>) -> Result<ToolStream, PluginError>;

    /// Validate a configuration payload without running a tool. Plugins
    /// that require no configuration can accept the default no-op.
    async fn run_validate(&self, _config: Option<Value>) -> Result<(), PluginError> {
        Ok(())
    }

    /// A cheap liveness probe, also used to confirm a freshly spawned
    /// child has finished bootstrapping before a stream is opened.
    async fn ping(&self) -> Result<String, PluginError> {
        Ok("pong".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::PackageInfo;
    use futures::stream::StreamExt;
    use std::collections::HashMap;

    /// A plugin that only implements the required methods, exercising the
    /// trait's default `run_validate`/`ping` bodies.
    struct Bare;

    #[async_trait]
    impl Plugin for Bare {
        fn get_metadata(&self) -> Metadata {
            Metadata {
                meta_version: "1".to_string(),
                name: "bare".to_string(),
                category: "test".to_string(),
                description: String::new(),
                icon: String::new(),
                metadata_path: String::new(),
                labels: Default::default(),
                config_schema: Value::Null,
                package_info: PackageInfo::default(),
                tools: HashMap::new(),
            }
        }

        async fn run_tool(&self, _tool: &str, input: Value, _config: Option<Value>) -> Result<Value, PluginError> {
            Ok(input)
        }

        async fn run_tool_stream(&self, _tool: &str, input: Value, _config: Option<Value>) -> Result<ToolStream, PluginError> {
            Ok(futures::stream::once(async move { Ok(input) }).boxed())
        }
    }

    #[tokio::test]
    async fn default_validate_and_ping_are_no_ops() {
        let plugin = Bare;
        plugin.run_validate(None).await.unwrap();
        assert_eq!(plugin.ping().await.unwrap(), "pong");
    }
}
