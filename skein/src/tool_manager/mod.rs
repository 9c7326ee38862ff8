//! Tool Manager (spec §4.2): resolves a `ToolConfig` plus a parameter map
//! into an HTTP request against a tool microservice's registry entry.
//!
//! Grounded on `tool_source::web_tools_source::WebFetcherTool` (reqwest GET/POST,
//! status-code-to-error mapping) for the client shape, generalized from a
//! single fixed endpoint to a registry of peers, and on
//! `original_source/.../tool_manager.py` (`ToolManager.execute`,
//! `resolve_parameters`, `_apply_transform`) for the registry/multipart/
//! parameter-resolution semantics.

mod registry;
mod transform;

pub use registry::{ToolRegistry, ToolRegistryEntry};
pub use transform::apply_transform;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::warn;

use crate::adl::{OnError, ParameterMapping, ParameterSource, ToolConfig};
use crate::template;

/// One file attached to a tool call (spec §4.2: "a triple `(field_name,
/// filename, bytes)`").
#[derive(Clone, Debug)]
pub struct ToolFile {
    pub field_name: String,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Result of one tool execution (spec §4.2 contract).
#[derive(Clone, Debug)]
pub struct ToolExecutionResult {
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ToolExecutionResult {
    fn ok(output: Value, duration_ms: u64) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
            duration_ms,
        }
    }

    fn err(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const MAX_ERROR_BODY_LEN: usize = 2000;

/// Turns resolved parameters into an HTTP call against the tool registered
/// under `tool_config.tool_id` (spec §4.2). Stateless beyond the shared
/// client and registry, so a single instance is safe to share across
/// concurrent executions (spec §5).
#[derive(Clone)]
pub struct ToolManager {
    client: reqwest::Client,
    registry: ToolRegistry,
}

impl ToolManager {
    pub fn new(client: reqwest::Client, registry: ToolRegistry) -> Self {
        Self { client, registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Resolves the parameter map for a `tool_call` step (spec §4.1
    /// "Parameter resolution").
    ///
    /// - `inputs`: values supplied by the UI layer for this execution.
    /// - `variables`: the execution's current variable map (`variable` and
    ///   `context` sources — spec §9: currently aliased).
    /// - `previous_outputs`: `{output_variable_name → step_output}` built
    ///   from prior step results in this execution.
    pub fn resolve_parameters(
        &self,
        tool_config: &ToolConfig,
        inputs: &Value,
        variables: &Value,
        previous_outputs: &Value,
    ) -> HashMap<String, Value> {
        let mut resolved = HashMap::new();
        for param in &tool_config.parameters {
            let Some(value) = resolve_one_parameter(param, inputs, variables, previous_outputs)
            else {
                continue;
            };
            let value = match &param.transform {
                Some(transform) => apply_transform(&value, transform),
                None => value,
            };
            resolved.insert(param.name.clone(), value);
        }
        resolved
    }

    /// Executes `tool_id` with `parameters`, honoring the tool config's
    /// `timeout_ms`. Does not apply `on_error` policy — that's the
    /// executor's job (spec §4.1: retry/fallback/continue/stop are step
    /// concerns, not transport concerns).
    pub async fn execute(
        &self,
        tool_id: &str,
        parameters: &HashMap<String, Value>,
        files: &[ToolFile],
        timeout_ms: Option<u64>,
    ) -> ToolExecutionResult {
        let start = Instant::now();
        let Some(entry) = self.registry.get(tool_id) else {
            return ToolExecutionResult::err(
                format!("unknown tool: {tool_id}"),
                elapsed_ms(start),
            );
        };

        let url = format!("{}{}", entry.base_url, entry.endpoint_path);
        let timeout = Duration::from_millis(timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS));

        let request = if entry.requires_file_input && !files.is_empty() {
            self.build_multipart_request(&url, parameters, files)
        } else {
            self.client.post(&url).json(parameters)
        };

        match request.timeout(timeout).send().await {
            Ok(response) => {
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    let truncated: String = body.chars().take(MAX_ERROR_BODY_LEN).collect();
                    return ToolExecutionResult::err(
                        format!("tool returned error {status}: {truncated}"),
                        elapsed_ms(start),
                    );
                }
                match response.json::<Value>().await {
                    Ok(output) => ToolExecutionResult::ok(output, elapsed_ms(start)),
                    Err(e) => ToolExecutionResult::err(
                        format!("failed to parse tool response: {e}"),
                        elapsed_ms(start),
                    ),
                }
            }
            Err(e) if e.is_timeout() => ToolExecutionResult::err(
                format!("tool execution timed out after {}ms", timeout.as_millis()),
                elapsed_ms(start),
            ),
            Err(e) => {
                ToolExecutionResult::err(format!("tool execution failed: {e}"), elapsed_ms(start))
            }
        }
    }

    fn build_multipart_request(
        &self,
        url: &str,
        parameters: &HashMap<String, Value>,
        files: &[ToolFile],
    ) -> reqwest::RequestBuilder {
        let mut form = reqwest::multipart::Form::new();
        for file in files {
            let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                .file_name(file.filename.clone());
            form = form.part(file.field_name.clone(), part);
        }
        for (key, value) in parameters {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            form = form.text(key.clone(), text);
        }
        self.client.post(url).multipart(form)
    }

    /// Probes a tool's `/health` endpoint with a 5-second timeout (spec §4.2).
    pub async fn check_health(&self, tool_id: &str) -> (bool, String) {
        let Some(entry) = self.registry.get(tool_id) else {
            return (false, "no endpoint configured".to_string());
        };
        let url = format!("{}/health", entry.base_url.trim_end_matches('/'));
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => (true, "healthy".to_string()),
            Ok(response) => (false, format!("status {}", response.status())),
            Err(e) => {
                warn!(tool_id, error = %e, "tool health check failed");
                (false, e.to_string())
            }
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn resolve_one_parameter(
    param: &ParameterMapping,
    inputs: &Value,
    variables: &Value,
    previous_outputs: &Value,
) -> Option<Value> {
    match param.source {
        ParameterSource::Constant => param.value.clone(),
        ParameterSource::Input => {
            let key = param.input_component.as_deref().unwrap_or(&param.name);
            template::resolve_path(inputs, key)
                .cloned()
                .or_else(|| param.value.clone())
        }
        ParameterSource::Variable | ParameterSource::Context => {
            let path = param
                .value
                .as_ref()
                .and_then(Value::as_str)
                .unwrap_or(&param.name);
            template::resolve_path(variables, path).cloned()
        }
        ParameterSource::PreviousOutput => {
            let path = param
                .value
                .as_ref()
                .and_then(Value::as_str)
                .unwrap_or(&param.name);
            template::resolve_path(previous_outputs, path).cloned()
        }
    }
}

/// Applies a `ToolConfig`'s error policy to a failed execution, retrying up
/// to `retry_count` times with a fixed back-off (spec §4.1). Returns the
/// final result, which may still be a failure (caller maps that to
/// `StepFailure` for `on_error = stop`).
pub async fn execute_with_policy(
    manager: &ToolManager,
    tool_config: &ToolConfig,
    tool_id: &str,
    parameters: &HashMap<String, Value>,
    files: &[ToolFile],
) -> ToolExecutionResult {
    let mut result = manager
        .execute(tool_id, parameters, files, Some(tool_config.timeout_ms))
        .await;

    if result.success || tool_config.on_error != OnError::Retry {
        return result;
    }

    for attempt in 0..tool_config.retry_count {
        tokio::time::sleep(retry_backoff(attempt)).await;
        result = manager
            .execute(tool_id, parameters, files, Some(tool_config.timeout_ms))
            .await;
        if result.success {
            break;
        }
        warn!(tool_id, attempt, "tool retry failed");
    }

    result
}

/// Fixed back-off schedule for `on_error: retry` (DESIGN.md "Open Question
/// decisions" item 5): 500ms, 1s, 2s, then 2s for every attempt beyond the
/// third.
fn retry_backoff(attempt: u32) -> Duration {
    match attempt {
        0 => Duration::from_millis(500),
        1 => Duration::from_secs(1),
        _ => Duration::from_secs(2),
    }
}
