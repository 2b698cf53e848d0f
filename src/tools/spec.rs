//! Tool specification traits for the Doubao MCP tool surface.
//!
//! This module defines the core abstractions for tools:
//! - `ToolSpec`: The trait every exposed tool implements
//! - `ToolContext`: Shared client and defaults handed to each call
//! - `ToolResult`: The `{success, ...}` object returned to MCP clients
//! - `ToolCapability`: Side effects a tool has

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::client::ArkClient;
use crate::config::Config;
use crate::error::GenerationError;
use crate::modules::poll::PollConfig;

/// Side effects a tool may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCapability {
    /// Tool only reads remote state
    ReadOnly,
    /// Tool writes to the local filesystem
    WritesFiles,
    /// Tool makes network requests
    Network,
    /// Tool creates a billable generation job
    Billable,
}

/// Errors that can occur during tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to validate input: {message}")]
    InvalidInput { message: String },

    #[error("Failed to validate input: missing required field '{field}'")]
    MissingField { field: String },

    #[error("Failed to execute tool: {message}")]
    ExecutionFailed { message: String },

    #[error("Unknown tool: {name}")]
    NotAvailable { name: String },

    /// Orchestrator failures keep their own message at the tool boundary.
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl ToolError {
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    #[must_use]
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    #[must_use]
    pub fn execution_failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            message: msg.into(),
        }
    }

    #[must_use]
    pub fn not_available(name: impl Into<String>) -> Self {
        Self::NotAvailable { name: name.into() }
    }
}

impl From<crate::error::ApiError> for ToolError {
    fn from(err: crate::error::ApiError) -> Self {
        Self::Generation(GenerationError::Api(err))
    }
}

/// Result object of a tool call: `{"success": bool, ...fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ToolResult {
    /// Successful result; the fields of `value` (an object) are flattened in.
    #[must_use]
    pub fn success(value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                map
            }
        };
        Self {
            success: true,
            fields,
        }
    }

    /// Failed result carrying only an error message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("error".to_string(), Value::String(message.into()));
        Self {
            success: false,
            fields,
        }
    }

    /// Successful result from any serializable object.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::success(serde_json::to_value(value)?))
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Compact JSON text sent back in the MCP content block.
    #[must_use]
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"success":false,"error":"Failed to serialize tool result: {e}"}}"#)
        })
    }
}

/// Context passed to tools during execution.
#[derive(Clone)]
pub struct ToolContext {
    /// Authenticated API client
    pub client: ArkClient,
    /// Base directory for relative download paths
    pub output_dir: PathBuf,
    pub image_model: String,
    pub video_model: String,
    /// Polling policy used when a call does not override it
    pub poll: PollConfig,
}

impl ToolContext {
    #[must_use]
    pub fn new(client: ArkClient, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            output_dir: output_dir.into(),
            image_model: crate::config::DEFAULT_IMAGE_MODEL.to_string(),
            video_model: crate::config::DEFAULT_VIDEO_MODEL.to_string(),
            poll: PollConfig::default(),
        }
    }

    /// Build the context from loaded configuration. Fails without an API key.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = ArkClient::new(config)?;
        Ok(Self {
            client,
            output_dir: config.output_dir(),
            image_model: config.image_model(),
            video_model: config.video_model(),
            poll: config.poll_config(),
        })
    }

    /// Resolve a user-supplied path. `~` is expanded; relative paths land
    /// under the output directory.
    pub fn resolve_path(&self, raw: &str) -> Result<PathBuf, ToolError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ToolError::invalid_input("filePath must not be empty"));
        }
        let expanded = shellexpand::tilde(trimmed);
        let candidate = Path::new(expanded.as_ref());
        if candidate.is_absolute() {
            return Ok(candidate.to_path_buf());
        }

        let base = if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            std::env::current_dir()
                .map_err(|e| {
                    ToolError::execution_failed(format!("Failed to read current directory: {e}"))
                })?
                .join(&self.output_dir)
        };
        Ok(base.join(candidate))
    }

    /// Poll policy with per-call overrides; zero or absent values keep the defaults.
    #[must_use]
    pub fn poll_with(&self, max_attempts: Option<u32>, interval_ms: Option<u64>) -> PollConfig {
        let max_attempts = max_attempts
            .filter(|n| *n > 0)
            .unwrap_or(self.poll.max_attempts);
        let interval = interval_ms
            .filter(|ms| *ms > 0)
            .map_or(self.poll.interval, std::time::Duration::from_millis);
        PollConfig::new(max_attempts, interval)
    }
}

/// The core trait that all tools must implement.
#[async_trait]
pub trait ToolSpec: Send + Sync {
    /// Returns the unique name of this tool (used in `tools/call`).
    fn name(&self) -> &str;

    /// Returns a human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// Returns the JSON Schema for the tool's input parameters.
    fn input_schema(&self) -> Value;

    /// Returns the side effects this tool has.
    fn capabilities(&self) -> Vec<ToolCapability>;

    /// Execute the tool with the given input and context.
    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError>;
}

// === Helper functions for extracting values from JSON input ===

/// Helper to extract required string field from JSON input.
pub fn required_str<'a>(input: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    input
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::missing_field(field))
}

/// Helper to extract optional string field from JSON input.
pub fn optional_str<'a>(input: &'a Value, field: &str) -> Option<&'a str> {
    input.get(field).and_then(|v| v.as_str())
}

/// Deserialize the whole input object into a typed argument struct.
pub fn parse_args<T: DeserializeOwned>(input: Value) -> Result<T, ToolError> {
    serde_json::from_value(input).map_err(|e| ToolError::invalid_input(e.to_string()))
}

/// Reject a numeric argument outside `[min, max]`.
pub fn check_range<T>(field: &str, value: Option<T>, min: T, max: T) -> Result<(), ToolError>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    match value {
        Some(v) if v < min || v > max => Err(ToolError::invalid_input(format!(
            "{field} must be between {min} and {max}, got {v}"
        ))),
        _ => Ok(()),
    }
}

// === Unit Tests ===

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;

    fn test_context(output_dir: &Path) -> ToolContext {
        let config = Config {
            api_key: Some("test".to_string()),
            ..Config::default()
        };
        let client = ArkClient::new(&config).expect("client");
        ToolContext::new(client, output_dir)
    }

    #[test]
    fn test_tool_result_success_flattens_fields() {
        let result = ToolResult::success(json!({ "taskId": "cgt-1" }));
        assert!(result.success);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "success": true, "taskId": "cgt-1" })
        );
    }

    #[test]
    fn test_tool_result_error() {
        let result = ToolResult::error("something failed");
        assert!(!result.success);
        assert_eq!(
            result.to_text(),
            r#"{"success":false,"error":"something failed"}"#
        );
    }

    #[test]
    fn test_resolve_path_relative_uses_output_dir() {
        let tmp = tempdir().expect("tempdir");
        let ctx = test_context(tmp.path());
        let resolved = ctx.resolve_path("images/cat.png").expect("resolve");
        assert_eq!(resolved, tmp.path().join("images/cat.png"));
    }

    #[test]
    fn test_resolve_path_absolute_passthrough() {
        let tmp = tempdir().expect("tempdir");
        let ctx = test_context(tmp.path());
        let target = tmp.path().join("elsewhere.png");
        let resolved = ctx
            .resolve_path(target.to_str().expect("utf8"))
            .expect("resolve");
        assert_eq!(resolved, target);
        assert!(ctx.resolve_path("  ").is_err());
    }

    #[test]
    fn test_poll_with_zero_keeps_defaults() {
        let tmp = tempdir().expect("tempdir");
        let ctx = test_context(tmp.path());
        assert_eq!(ctx.poll_with(Some(0), Some(0)), ctx.poll);
        assert_eq!(ctx.poll_with(None, None), ctx.poll);
        let custom = ctx.poll_with(Some(3), Some(250));
        assert_eq!(custom.max_attempts, 3);
        assert_eq!(custom.interval, Duration::from_millis(250));
    }

    #[test]
    fn test_required_str() {
        let input = json!({"name": "test", "count": 42, "blank": " "});
        assert_eq!(required_str(&input, "name").unwrap(), "test");
        assert!(required_str(&input, "missing").is_err());
        assert!(required_str(&input, "count").is_err());
        assert!(required_str(&input, "blank").is_err());
    }

    #[test]
    fn test_check_range() {
        assert!(check_range("max_images", Some(15u32), 1, 15).is_ok());
        assert!(check_range("max_images", None::<u32>, 1, 15).is_ok());
        let err = check_range("max_images", Some(16u32), 1, 15).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to validate input: max_images must be between 1 and 15, got 16"
        );
    }

    #[test]
    fn test_generation_error_keeps_message() {
        let err: ToolError = GenerationError::invalid_input("too many").into();
        assert_eq!(err.to_string(), "Invalid input: too many");
        assert_eq!(
            ToolError::not_available("nope").to_string(),
            "Unknown tool: nope"
        );
    }
}
