//! REST endpoint adapter.
//!
//! Each operation maps to one `[tools.<id>.endpoints.<operation>]` entry,
//! resolved against the tool's `entry_point` base URL. Used to front
//! companion HTTP services that the bridge cannot link directly.

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::tools::{BridgeAdapter, Dispatch, Dispatcher, Params, ToolConfig, ToolResult, ToolStatus};
use crate::types::{AdapterConfig, Error, Result};

/// Endpoint probed by `status()` when configured.
const HEALTH_ENDPOINT: &str = "health";

#[derive(Debug, Clone)]
struct Endpoint {
    method: Method,
    url: Url,
}

/// Adapter proxying operations to HTTP endpoints.
#[derive(Debug, Clone)]
pub struct HttpAdapter {
    tool: String,
    client: reqwest::Client,
    endpoints: BTreeMap<String, Endpoint>,
    status_timeout: Duration,
}

impl HttpAdapter {
    /// Parse the base URL and every endpoint. Any malformed entry fails the load.
    pub fn from_config(tool: &ToolConfig, settings: &AdapterConfig) -> Result<Self> {
        let base = Url::parse(&tool.entry_point).map_err(|e| {
            Error::adapter_load(format!(
                "tool '{}' has invalid base URL '{}': {}",
                tool.id, tool.entry_point, e
            ))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::adapter_load(format!(
                "tool '{}' base URL scheme '{}' is not http(s)",
                tool.id,
                base.scheme()
            )));
        }

        let mut endpoints = BTreeMap::new();
        for (name, endpoint) in &tool.endpoints {
            let method = endpoint
                .method
                .to_ascii_uppercase()
                .parse::<Method>()
                .map_err(|e| {
                    Error::adapter_load(format!(
                        "endpoint '{}' has invalid method '{}': {}",
                        name, endpoint.method, e
                    ))
                })?;
            let url = join(&base, &endpoint.path).map_err(|e| {
                Error::adapter_load(format!(
                    "endpoint '{}' has invalid path '{}': {}",
                    name, endpoint.path, e
                ))
            })?;
            endpoints.insert(name.clone(), Endpoint { method, url });
        }

        let client = reqwest::Client::builder()
            .timeout(settings.http_timeout)
            .build()
            .map_err(|e| Error::adapter_load(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            tool: tool.id.clone(),
            client,
            endpoints,
            status_timeout: settings.status_timeout,
        })
    }

    async fn call(&self, operation: &str, params: Params) -> ToolResult {
        // `health` is reserved for status probes and not callable.
        let Some(endpoint) = self
            .endpoints
            .get(operation)
            .filter(|_| operation != HEALTH_ENDPOINT)
        else {
            return ToolResult::failure(format!(
                "Unknown operation '{}' for tool '{}'",
                operation, self.tool
            ));
        };

        let request = self.client.request(endpoint.method.clone(), endpoint.url.clone());
        let request = if endpoint.method == Method::GET {
            let query: Vec<(String, String)> = params
                .iter()
                .map(|(k, v)| (k.clone(), query_value(v)))
                .collect();
            request.query(&query)
        } else {
            request.json(&params)
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return ToolResult::failure(format!("{} '{}' timed out", self.tool, operation))
                    .with("status", "timeout")
            }
            Err(e) if e.is_connect() => {
                return ToolResult::failure(format!("{} is unreachable: {}", self.tool, e))
            }
            Err(e) => return ToolResult::failure(format!("HTTP request failed: {}", e)),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return ToolResult::failure(format!("Failed to read response body: {}", e)),
        };
        let data = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));

        if status.is_success() {
            ToolResult::ok()
                .with("status_code", status.as_u16())
                .with("data", data)
        } else {
            tracing::debug!(tool = %self.tool, operation, status = %status, "Endpoint returned error status");
            ToolResult::failure(format!("{} returned HTTP {}", self.tool, status))
                .with("status_code", status.as_u16())
                .with("data", data)
        }
    }
}

/// Append `path` to `base` without discarding the base's own path.
fn join(base: &Url, path: &str) -> std::result::Result<Url, String> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|e| e.to_string())
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl BridgeAdapter for HttpAdapter {
    fn capabilities(&self) -> Vec<String> {
        self.endpoints
            .keys()
            .filter(|k| k.as_str() != HEALTH_ENDPOINT)
            .cloned()
            .collect()
    }

    async fn status(&self) -> ToolStatus {
        let Some(health) = self.endpoints.get(HEALTH_ENDPOINT) else {
            return ToolStatus::healthy(&self.tool);
        };

        let probe = self
            .client
            .request(health.method.clone(), health.url.clone())
            .timeout(self.status_timeout)
            .send()
            .await;

        match probe {
            Ok(response) if response.status().is_success() => ToolStatus::healthy(&self.tool),
            Ok(response) => ToolStatus::unhealthy(
                &self.tool,
                format!("health check returned HTTP {}", response.status()),
            ),
            Err(e) if e.is_timeout() => ToolStatus::unhealthy(&self.tool, "health check timed out"),
            Err(e) => ToolStatus::unavailable(&self.tool, format!("service unreachable: {}", e)),
        }
    }

    fn dispatch(&self) -> Dispatch<'_> {
        Dispatch::Dispatcher(self)
    }
}

#[async_trait]
impl Dispatcher for HttpAdapter {
    async fn execute(&self, operation: &str, params: Params) -> ToolResult {
        self.call(operation, params).await
    }
}
