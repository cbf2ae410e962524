//! Subprocess-backed adapter for CLI tools.
//!
//! Runs `<entry_point> <operation> <args…>` with a bounded wait. The bound
//! covers the child's exit and the drain of its output pipes, so a background
//! grandchild holding stdout open cannot stretch a call. Children are spawned
//! with `kill_on_drop` in their own process group; on timeout the whole group
//! is killed before the timeout result is returned. Captured output is capped
//! at `max_output_bytes` per stream; the rest is read and discarded.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::tools::{BridgeAdapter, Dispatch, Dispatcher, Params, ToolConfig, ToolResult, ToolStatus};
use crate::types::{AdapterConfig, Error, Result};

/// Keyword parameters accepted by every command operation.
const ACCEPTED_PARAMS: &[&str] = &["args", "stdin", "timeout_secs"];

/// Adapter wrapping one executable.
#[derive(Debug, Clone)]
pub struct CommandAdapter {
    tool: String,
    program: PathBuf,
    working_dir: Option<PathBuf>,
    capabilities: Vec<String>,
    timeout: Duration,
    status_timeout: Duration,
    max_output_bytes: usize,
}

impl CommandAdapter {
    /// Resolve the tool's executable. Fails when it is not installed.
    pub fn from_config(tool: &ToolConfig, settings: &AdapterConfig) -> Result<Self> {
        if tool.entry_point.is_empty() {
            return Err(Error::adapter_load(format!(
                "tool '{}' has no entry_point",
                tool.id
            )));
        }

        let program = which::which(&tool.entry_point).map_err(|e| {
            let hint = if tool.install_cmd.is_empty() {
                String::new()
            } else {
                format!(" (install with: {})", tool.install_cmd)
            };
            Error::adapter_load(format!(
                "executable '{}' not found: {}{}",
                tool.entry_point, e, hint
            ))
        })?;

        let working_dir = Some(PathBuf::from(&tool.path)).filter(|p| p.is_dir());

        Ok(Self {
            tool: tool.id.clone(),
            program,
            working_dir,
            capabilities: tool.capabilities.clone(),
            timeout: settings.command_timeout,
            status_timeout: settings.status_timeout,
            max_output_bytes: settings.max_output_bytes,
        })
    }

    fn supports(&self, operation: &str) -> bool {
        self.capabilities.is_empty() || self.capabilities.iter().any(|c| c == operation)
    }

    async fn run(&self, operation: &str, params: Params) -> ToolResult {
        if !self.supports(operation) {
            return ToolResult::failure(format!(
                "Unknown operation '{}' for tool '{}'",
                operation, self.tool
            ));
        }
        if let Some(unknown) = params.keys().find(|k| !ACCEPTED_PARAMS.contains(&k.as_str())) {
            return ToolResult::failure(format!("Unknown parameter: {}", unknown));
        }

        let args = match parse_args(params.get("args")) {
            Ok(args) => args,
            Err(e) => return ToolResult::failure(e),
        };
        let timeout = match params.get("timeout_secs") {
            None => self.timeout,
            Some(v) => match v
                .as_f64()
                .filter(|s| *s > 0.0)
                .and_then(|s| Duration::try_from_secs_f64(s).ok())
            {
                Some(timeout) => timeout,
                None => return ToolResult::failure("'timeout_secs' must be a positive number"),
            },
        };
        let stdin = params.get("stdin").and_then(Value::as_str).map(str::to_owned);

        let mut command = Command::new(&self.program);
        command
            .arg(operation)
            .args(&args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ToolResult::failure(format!(
                    "Failed to start {}: {}",
                    self.program.display(),
                    e
                ))
            }
        };

        // The leader may be reaped before the output drains; keep its group id.
        #[cfg(unix)]
        let process_group = child.id();

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            tokio::spawn(async move {
                if let Err(e) = pipe.write_all(input.as_bytes()).await {
                    tracing::debug!(error = %e, "Child closed stdin early");
                }
            });
        }
        let mut stdout_task = tokio::spawn(read_pipe(child.stdout.take(), self.max_output_bytes));
        let mut stderr_task = tokio::spawn(read_pipe(child.stderr.take(), self.max_output_bytes));

        tracing::debug!(tool = %self.tool, operation, ?args, "Spawned command");

        let finished = tokio::time::timeout(timeout, async {
            let status = child.wait().await;
            let stdout = (&mut stdout_task).await.unwrap_or_default();
            let stderr = (&mut stderr_task).await.unwrap_or_default();
            (status, stdout, stderr)
        })
        .await;

        match finished {
            Ok((Ok(status), stdout, stderr)) => {
                let code = status.code().unwrap_or(-1);
                let truncated = stdout.truncated || stderr.truncated;

                let result = if status.success() {
                    ToolResult::ok()
                } else {
                    ToolResult::failure(format!(
                        "{} exited with code {}: {}",
                        self.tool,
                        code,
                        stderr.text.trim()
                    ))
                };
                let result = result
                    .with("exit_code", code)
                    .with("stdout", stdout.text)
                    .with("stderr", stderr.text);
                if truncated {
                    result.with("truncated", true)
                } else {
                    result
                }
            }
            Ok((Err(e), _, _)) => ToolResult::failure(format!("Failed waiting for {}: {}", self.tool, e)),
            Err(_) => {
                #[cfg(unix)]
                kill_process_group(process_group);
                if let Err(e) = child.kill().await {
                    tracing::warn!(tool = %self.tool, error = %e, "Failed to kill timed-out command");
                }
                stdout_task.abort();
                stderr_task.abort();
                tracing::warn!(tool = %self.tool, operation, timeout_secs = timeout.as_secs_f64(), "Command timed out");
                ToolResult::failure(format!(
                    "{} '{}' timed out after {:.1}s",
                    self.tool,
                    operation,
                    timeout.as_secs_f64()
                ))
                .with("status", "timeout")
            }
        }
    }
}

/// SIGKILL the child's process group so background descendants die with it.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        tracing::debug!(pid, error = %e, "Process group already gone");
    }
}

fn parse_args(value: Option<&Value>) -> std::result::Result<Vec<String>, String> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let items = value
        .as_array()
        .ok_or_else(|| "'args' must be a list of strings".to_string())?;
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_owned)
                .ok_or_else(|| "'args' must be a list of strings".to_string())
        })
        .collect()
}

#[derive(Debug, Default)]
struct Captured {
    text: String,
    truncated: bool,
}

/// Read a pipe to EOF, keeping at most `limit` bytes.
async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>, limit: usize) -> Captured {
    let mut kept = Vec::new();
    let mut truncated = false;
    if let Some(mut pipe) = pipe {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    let room = limit.saturating_sub(kept.len());
                    if n > room {
                        truncated = true;
                    }
                    kept.extend_from_slice(&chunk[..n.min(room)]);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Error reading child output");
                    break;
                }
            }
        }
    }
    Captured {
        text: String::from_utf8_lossy(&kept).into_owned(),
        truncated,
    }
}

#[async_trait]
impl BridgeAdapter for CommandAdapter {
    fn capabilities(&self) -> Vec<String> {
        self.capabilities.clone()
    }

    async fn status(&self) -> ToolStatus {
        let probe = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.status_timeout, probe).await {
            Ok(Ok(output)) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let version = stdout.lines().next().unwrap_or("").trim().to_string();
                let status = ToolStatus::healthy(&self.tool);
                if version.is_empty() {
                    status
                } else {
                    status.with_version(version)
                }
            }
            Ok(Ok(output)) => ToolStatus::unhealthy(
                &self.tool,
                format!("version probe exited with {}", output.status),
            ),
            Ok(Err(e)) => ToolStatus::unavailable(&self.tool, format!("cannot run {}: {}", self.program.display(), e)),
            Err(_) => ToolStatus::unhealthy(&self.tool, "version probe timed out"),
        }
    }

    fn dispatch(&self) -> Dispatch<'_> {
        Dispatch::Dispatcher(self)
    }
}

#[async_trait]
impl Dispatcher for CommandAdapter {
    async fn execute(&self, operation: &str, params: Params) -> ToolResult {
        self.run(operation, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shell(capabilities: &[&str]) -> CommandAdapter {
        shell_with(capabilities, &AdapterConfig::default())
    }

    fn shell_with(capabilities: &[&str], settings: &AdapterConfig) -> CommandAdapter {
        let mut tool = ToolConfig::new("shell", "command");
        tool.entry_point = "sh".to_string();
        tool.capabilities = capabilities.iter().map(|c| c.to_string()).collect();
        CommandAdapter::from_config(&tool, settings).unwrap()
    }

    /// Gone, or exited and awaiting reaping.
    fn process_gone(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Err(_) => true,
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .map(|rest| rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
        }
    }

    async fn wait_until_gone(pid: &str) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !process_gone(pid) {
            assert!(std::time::Instant::now() < deadline, "process {} still running", pid);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_missing_executable_fails_to_load() {
        let mut tool = ToolConfig::new("ghost", "command");
        tool.entry_point = "definitely-not-installed-toolbridge-bin".to_string();
        tool.install_cmd = "pip install ghost".to_string();

        let err = CommandAdapter::from_config(&tool, &AdapterConfig::default()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("not found"));
        assert!(message.contains("pip install ghost"));
    }

    #[test]
    fn test_empty_entry_point_fails_to_load() {
        let tool = ToolConfig::new("blank", "command");
        assert!(CommandAdapter::from_config(&tool, &AdapterConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_successful_command() {
        let adapter = shell(&[]);
        let result = adapter
            .execute("-c", params(json!({"args": ["echo hello"]})))
            .await;
        assert!(result.success, "{:?}", result);
        assert_eq!(result.get("exit_code"), Some(&json!(0)));
        assert_eq!(result.get("stdout").and_then(Value::as_str).map(str::trim), Some("hello"));
    }

    #[tokio::test]
    async fn test_stdin_is_forwarded() {
        let adapter = shell(&[]);
        let result = adapter
            .execute("-c", params(json!({"args": ["cat"], "stdin": "piped"})))
            .await;
        assert!(result.success);
        assert_eq!(result.get("stdout"), Some(&json!("piped")));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let adapter = shell(&[]);
        let result = adapter
            .execute("-c", params(json!({"args": ["echo broken >&2; exit 3"]})))
            .await;
        assert!(!result.success);
        assert_eq!(result.get("exit_code"), Some(&json!(3)));
        assert!(result.error.unwrap().contains("broken"));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let adapter = shell(&[]);
        let started = std::time::Instant::now();
        let result = adapter
            .execute("-c", params(json!({"args": ["sleep 30"], "timeout_secs": 0.2})))
            .await;
        assert!(!result.success);
        assert_eq!(result.get("status"), Some(&json!("timeout")));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_undeclared_operation_is_structured_failure() {
        let adapter = shell(&["-c"]);
        let result = adapter.execute("no_such_op", Params::new()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Unknown operation"));
    }

    #[tokio::test]
    async fn test_bad_params_are_structured_failures() {
        let adapter = shell(&[]);
        let result = adapter.execute("-c", params(json!({"args": "echo"}))).await;
        assert!(!result.success);

        let result = adapter.execute("-c", params(json!({"verbose": true}))).await;
        assert_eq!(result.error.as_deref(), Some("Unknown parameter: verbose"));
    }

    #[tokio::test]
    async fn test_status_reports_available() {
        let status = shell(&[]).status().await;
        assert!(status.available);
        assert_eq!(status.name, "shell");
    }

    #[tokio::test]
    async fn test_timeout_bounds_inherited_pipes() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("pid");
        let script = format!("sleep 30 & echo $! > '{}'; echo hi", pidfile.display());

        let adapter = shell(&[]);
        let started = std::time::Instant::now();
        let result = adapter
            .execute("-c", params(json!({"args": [script], "timeout_secs": 0.5})))
            .await;
        assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
        assert!(!result.success);
        assert_eq!(result.get("status"), Some(&json!("timeout")));

        // The backgrounded grandchild shares the group and is killed too.
        let pid = std::fs::read_to_string(&pidfile).unwrap();
        wait_until_gone(pid.trim()).await;
    }

    #[tokio::test]
    async fn test_overflowing_timeout_is_structured_failure() {
        let adapter = shell(&[]);
        for bad in [json!(1e30), json!(-1), json!("soon"), json!(0)] {
            let result = adapter
                .execute("-c", params(json!({"args": ["true"], "timeout_secs": bad})))
                .await;
            assert_eq!(
                result.error.as_deref(),
                Some("'timeout_secs' must be a positive number")
            );
        }
    }

    #[tokio::test]
    async fn test_dropped_call_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("pid");
        let script = format!("echo $$ > '{}'; exec sleep 30", pidfile.display());

        let adapter = shell(&[]);
        let call = adapter.execute("-c", params(json!({"args": [script]})));
        assert!(tokio::time::timeout(Duration::from_millis(500), call).await.is_err());

        let pid = std::fs::read_to_string(&pidfile).unwrap();
        wait_until_gone(pid.trim()).await;
    }

    #[tokio::test]
    async fn test_output_capture_is_capped() {
        let settings = AdapterConfig {
            max_output_bytes: 16,
            ..AdapterConfig::default()
        };
        let adapter = shell_with(&[], &settings);
        let result = adapter
            .execute("-c", params(json!({"args": ["head -c 100000 /dev/zero | tr '\\0' x"]})))
            .await;
        assert!(result.success, "{:?}", result);
        assert_eq!(result.get("stdout"), Some(&json!("x".repeat(16))));
        assert_eq!(result.get("truncated"), Some(&json!(true)));
    }
}
