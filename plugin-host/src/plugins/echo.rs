//! Minimal reference plugin used by the test suite and as a streaming
//! example: `echo` returns its input unchanged
//! (`RunTool(echo-plugin, input) == input`). Its streaming variant chunks
//! a `text` field word-by-word and, when the input carries a `fail_after`
//! count, raises after that many chunks, exercising the stream-error path.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use plugin_runtime_sdk::error::PluginError;
use plugin_runtime_sdk::metadata::{Metadata, PackageInfo, ToolMetadata};
use plugin_runtime_sdk::plugin::{Plugin, ToolStream};
use serde_json::{json, Value};
use std::collections::HashMap;

pub struct EchoPlugin;

impl EchoPlugin {
    fn metadata() -> Metadata {
        let mut tools = HashMap::new();
        tools.insert(
            "echo".to_string(),
            ToolMetadata {
                name: "echo".to_string(),
                description: "Return the given input unchanged.".to_string(),
                labels: Default::default(),
                input_schema: json!({}),
                output_schema: json!({}),
                func_name: Some("echo".to_string()),
                stream_func_name: Some("echo".to_string()),
                runtime_features: vec![],
            },
        );
        Metadata {
            meta_version: "1".to_string(),
            name: "echo".to_string(),
            category: "testing".to_string(),
            description: "A tool that echoes its input.".to_string(),
            icon: String::new(),
            metadata_path: String::new(),
            labels: Default::default(),
            config_schema: json!({}),
            package_info: PackageInfo { name: "plugin-echo".to_string(), version: "0.1.0".to_string() },
            tools,
        }
    }
}

#[async_trait]
impl Plugin for EchoPlugin {
    fn get_metadata(&self) -> Metadata {
        Self::metadata()
    }

    async fn run_tool(&self, tool: &str, input: Value, _config: Option<Value>) -> Result<Value, PluginError> {
        if tool != "echo" {
            return Err(PluginError::new("ToolNotFound", format!("unknown tool: {}", tool), 404));
        }
        Ok(input)
    }

    /// Splits `input.text` on whitespace and yields one chunk per word. An
    /// `input.fail_after` integer truncates the stream to that many chunks
    /// and appends a final error frame, rather than running to completion —
    /// a controllable way to exercise the "N data frames then one error
    /// frame" contract without depending on a real plugin misbehaving.
    async fn run_tool_stream(&self, tool: &str, input: Value, _config: Option<Value>) -> Result<ToolStream, PluginError> {
        if tool != "echo" {
            return Err(PluginError::new("ToolNotFound", format!("unknown tool: {}", tool), 404));
        }

        let fail_after = input.get("fail_after").and_then(|v| v.as_u64()).map(|n| n as usize);
        let words: Vec<String> = match input.get("text").and_then(|v| v.as_str()) {
            Some(text) => text.split_whitespace().map(|s| s.to_string()).collect(),
            None => Vec::new(),
        };

        let chunks: Vec<Result<Value, PluginError>> = match fail_after {
            Some(limit) => {
                let mut items: Vec<Result<Value, PluginError>> =
                    words.iter().take(limit).map(|w| Ok(Value::String(w.clone()))).collect();
                items.push(Err(PluginError::new(
                    "EchoStreamFailure",
                    "intentional failure after fail_after chunks",
                    500,
                )));
                items
            }
            None if words.is_empty() => vec![Ok(input)],
            None => words.into_iter().map(|w| Ok(Value::String(w))).collect(),
        };

        Ok(stream::iter(chunks).boxed())
    }

    async fn run_validate(&self, _config: Option<Value>) -> Result<(), PluginError> {
        Ok(())
    }

    async fn ping(&self) -> Result<String, PluginError> {
        Ok("pong".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_tool_echoes_input_verbatim() {
        let plugin = EchoPlugin;
        let input = json!({"anything": [1, 2, 3], "nested": {"ok": true}});
        let out = plugin.run_tool("echo", input.clone(), None).await.unwrap();
        assert_eq!(out, input);
    }

    #[tokio::test]
    async fn run_tool_rejects_unknown_tool() {
        let plugin = EchoPlugin;
        let err = plugin.run_tool("nope", Value::Null, None).await.unwrap_err();
        assert_eq!(err.http_code(), 404);
    }

    #[tokio::test]
    async fn stream_chunks_text_word_by_word() {
        let plugin = EchoPlugin;
        let input = json!({"text": "one two three"});
        let mut stream = plugin.run_tool_stream("echo", input, None).await.unwrap();
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item.unwrap());
        }
        assert_eq!(out, vec![json!("one"), json!("two"), json!("three")]);
    }

    #[tokio::test]
    async fn stream_fails_after_requested_chunk_count() {
        let plugin = EchoPlugin;
        let input = json!({"text": "one two three", "fail_after": 2});
        let mut stream = plugin.run_tool_stream("echo", input, None).await.unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap(), json!("one"));
        assert_eq!(stream.next().await.unwrap().unwrap(), json!("two"));
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
