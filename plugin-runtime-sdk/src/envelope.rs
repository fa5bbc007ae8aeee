//! Wire envelope: the JSON shapes that cross the unix socket between a
//! client (process manager) and a child worker.
//!
//! Requests are tagged by an `action` field rather than an externally
//! tagged enum so the closed action set is matched against the dispatcher's
//! method table one-for-one.

use crate::error::ErrorEnvelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The closed set of actions a child dispatcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    RunTool,
    RunToolStream,
    RunValidate,
    RunMetadata,
    RunPkgMetadata,
    RunPing,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::RunTool => "run_tool",
            Action::RunToolStream => "run_tool_stream",
            Action::RunValidate => "run_validate",
            Action::RunMetadata => "run_metadata",
            Action::RunPkgMetadata => "run_pkg_metadata",
            Action::RunPing => "run_ping",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "run_tool" => Some(Action::RunTool),
            "run_tool_stream" => Some(Action::RunToolStream),
            "run_validate" => Some(Action::RunValidate),
            "run_metadata" => Some(Action::RunMetadata),
            "run_pkg_metadata" => Some(Action::RunPkgMetadata),
            "run_ping" => Some(Action::RunPing),
            _ => None,
        }
    }
}

/// A request frame. `action` selects which of the other fields apply; the
/// five logical request shapes are flattened into one struct for
/// convenience on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Req {
    pub action: String,
    #[serde(default)]
    pub plugin: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub stream: bool,
}

impl Req {
    pub fn run_tool(plugin: impl Into<String>, tool: impl Into<String>, input: Value, config: Option<Value>) -> Self {
        Req {
            action: Action::RunTool.as_str().to_string(),
            plugin: Some(plugin.into()),
            tool: Some(tool.into()),
            input: Some(input),
            config,
            stream: false,
        }
    }

    pub fn run_tool_stream(plugin: impl Into<String>, tool: impl Into<String>, input: Value, config: Option<Value>) -> Self {
        Req {
            action: Action::RunToolStream.as_str().to_string(),
            plugin: Some(plugin.into()),
            tool: Some(tool.into()),
            input: Some(input),
            config,
            stream: true,
        }
    }

    pub fn run_validate(plugin: impl Into<String>, config: Option<Value>) -> Self {
        Req {
            action: Action::RunValidate.as_str().to_string(),
            plugin: Some(plugin.into()),
            tool: None,
            input: None,
            config,
            stream: false,
        }
    }

    pub fn run_metadata(plugin: impl Into<String>) -> Self {
        Req {
            action: Action::RunMetadata.as_str().to_string(),
            plugin: Some(plugin.into()),
            tool: None,
            input: None,
            config: None,
            stream: false,
        }
    }

    pub fn run_pkg_metadata() -> Self {
        Req {
            action: Action::RunPkgMetadata.as_str().to_string(),
            plugin: None,
            tool: None,
            input: None,
            config: None,
            stream: false,
        }
    }

    pub fn run_ping(plugin: impl Into<String>) -> Self {
        Req {
            action: Action::RunPing.as_str().to_string(),
            plugin: Some(plugin.into()),
            tool: None,
            input: None,
            config: None,
            stream: false,
        }
    }

    pub fn action(&self) -> Option<Action> {
        Action::from_str(&self.action)
    }

    pub fn plugin_name(&self) -> Result<&str, crate::error::PluginError> {
        self.plugin.as_deref().ok_or_else(|| {
            crate::error::PluginError::new("InvalidRequest", "plugin is required", 400)
        })
    }
}

/// A response frame. `data` carries the successful payload; `error` carries
/// an [`ErrorEnvelope`] when the handler failed. Exactly one is populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
}

impl Resp {
    pub fn ok(data: Value) -> Self {
        Resp { data: Some(data), error: None }
    }

    pub fn err(error: ErrorEnvelope) -> Self {
        Resp { data: None, error: Some(error) }
    }

    pub fn into_result(self) -> Result<Value, ErrorEnvelope> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.data.unwrap_or(Value::Null)),
        }
    }
}

pub type JsonMap = HashMap<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_round_trips_through_its_wire_string() {
        for action in [
            Action::RunTool,
            Action::RunToolStream,
            Action::RunValidate,
            Action::RunMetadata,
            Action::RunPkgMetadata,
            Action::RunPing,
        ] {
            assert_eq!(Action::from_str(action.as_str()), Some(action));
        }
        assert_eq!(Action::from_str("bogus"), None);
    }

    #[test]
    fn req_constructors_set_the_action_discriminant() {
        let req = Req::run_tool("echo", "echo", Value::Null, None);
        assert_eq!(req.action().unwrap(), Action::RunTool);
        assert!(!req.stream);

        let req = Req::run_tool_stream("echo", "echo", Value::Null, None);
        assert_eq!(req.action().unwrap(), Action::RunToolStream);
        assert!(req.stream);

        let req = Req::run_pkg_metadata();
        assert!(req.plugin.is_none());
    }

    #[test]
    fn plugin_name_is_required_for_per_plugin_actions() {
        let req = Req::run_pkg_metadata();
        assert!(req.plugin_name().is_err());

        let req = Req::run_ping("echo");
        assert_eq!(req.plugin_name().unwrap(), "echo");
    }

    #[test]
    fn resp_into_result_unwraps_data_or_surfaces_the_error() {
        let ok = Resp::ok(Value::from(42));
        assert_eq!(ok.into_result().unwrap(), Value::from(42));

        let err = Resp::err(ErrorEnvelope {
            code: "Boom".to_string(),
            message: "bad".to_string(),
            data: None,
            http_code: 500,
        });
        assert_eq!(err.into_result().unwrap_err().code, "Boom");
    }
}
