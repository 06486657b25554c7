//! Sandbox provider seam: an opaque service that creates a long-lived VM,
//! runs shell commands with streamed output, and supports pause/resume/kill.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use squad_core::{SandboxError, SandboxResources, SquadResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Sink for one output stream of a running command.
pub type StreamSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Options for running a command inside the sandbox.
#[derive(Clone, Default)]
pub struct ExecOptions {
    pub cwd: Option<String>,
    pub env: HashMap<String, String>,
    pub timeout_ms: Option<i64>,
    pub on_stdout: Option<StreamSink>,
    pub on_stderr: Option<StreamSink>,
}

impl std::fmt::Debug for ExecOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecOptions")
            .field("cwd", &self.cwd)
            .field("env_keys", &self.env.keys().collect::<Vec<_>>())
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Outcome of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Trait for sandbox providers.
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    /// Create a new sandbox and return its provider-assigned id.
    async fn create_sandbox(&self, resources: &SandboxResources) -> SquadResult<String>;

    /// Write a file into the sandbox filesystem.
    async fn write_file(&self, sandbox_id: &str, path: &str, contents: &str) -> SquadResult<()>;

    /// Run a shell command to completion, streaming output through the
    /// sinks in `options`. Timeouts surface as
    /// `SandboxError::CommandTimeout`, distinct from command failure.
    async fn exec(
        &self,
        sandbox_id: &str,
        command: &str,
        options: ExecOptions,
    ) -> SquadResult<ExecOutcome>;

    /// Suspend every process in the sandbox.
    async fn pause(&self, sandbox_id: &str) -> SquadResult<()>;

    /// Resume a paused sandbox.
    async fn resume(&self, sandbox_id: &str) -> SquadResult<()>;

    /// Tear the sandbox down.
    async fn kill(&self, sandbox_id: &str) -> SquadResult<()>;
}

// ============================================================================
// HTTP PROVIDER
// ============================================================================

/// HTTP sandbox provider speaking an E2B-style REST API.
pub struct HttpSandboxProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl HttpSandboxProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.e2b.dev/v2".to_string(),
        }
    }

    /// Read `E2B_API_KEY` from the environment, if set.
    pub fn from_env() -> Option<Self> {
        std::env::var("E2B_API_KEY").ok().map(Self::new)
    }

    /// Override the API base URL (tests, self-hosted providers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn post<Req: Serialize, Res: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Req,
    ) -> SquadResult<Res> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| SandboxError::ProviderError {
                reason: format!("request to {path} failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SandboxError::ProviderError {
                reason: format!("{path} returned {status}: {text}"),
            }
            .into());
        }
        response.json().await.map_err(|e| {
            SandboxError::ProviderError {
                reason: format!("invalid response from {path}: {e}"),
            }
            .into()
        })
    }

    async fn post_empty(&self, path: &str) -> SquadResult<()> {
        let _: serde_json::Value = self.post(path, &serde_json::json!({})).await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSandboxRequest {
    cpu_count: i32,
    memory_mb: i32,
    timeout_ms: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSandboxResponse {
    sandbox_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecRequest<'a> {
    command: &'a str,
    cwd: Option<&'a str>,
    env: &'a HashMap<String, String>,
    timeout_ms: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecResponse {
    exit_code: i32,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(default)]
    timed_out: bool,
}

#[async_trait]
impl SandboxProvider for HttpSandboxProvider {
    async fn create_sandbox(&self, resources: &SandboxResources) -> SquadResult<String> {
        let response: CreateSandboxResponse = self
            .post(
                "/sandboxes",
                &CreateSandboxRequest {
                    cpu_count: resources.cpu_count,
                    memory_mb: resources.memory_mb,
                    timeout_ms: resources.timeout_ms,
                },
            )
            .await
            .map_err(|e| SandboxError::CreationFailed {
                reason: e.to_string(),
            })?;
        debug!(sandbox_id = %response.sandbox_id, "Sandbox created");
        Ok(response.sandbox_id)
    }

    async fn write_file(&self, sandbox_id: &str, path: &str, contents: &str) -> SquadResult<()> {
        let _: serde_json::Value = self
            .post(
                &format!("/sandboxes/{sandbox_id}/files"),
                &serde_json::json!({ "path": path, "contents": contents }),
            )
            .await?;
        Ok(())
    }

    async fn exec(
        &self,
        sandbox_id: &str,
        command: &str,
        options: ExecOptions,
    ) -> SquadResult<ExecOutcome> {
        let response: ExecResponse = self
            .post(
                &format!("/sandboxes/{sandbox_id}/commands"),
                &ExecRequest {
                    command,
                    cwd: options.cwd.as_deref(),
                    env: &options.env,
                    timeout_ms: options.timeout_ms,
                },
            )
            .await?;

        if response.timed_out {
            return Err(SandboxError::CommandTimeout {
                timeout_ms: options.timeout_ms.unwrap_or_default(),
            }
            .into());
        }

        // Forward accumulated output through the streaming sinks.
        if let Some(sink) = &options.on_stdout {
            if !response.stdout.is_empty() {
                sink(&response.stdout);
            }
        }
        if let Some(sink) = &options.on_stderr {
            if !response.stderr.is_empty() {
                sink(&response.stderr);
            }
        }

        Ok(ExecOutcome {
            exit_code: response.exit_code,
            stdout: response.stdout,
            stderr: response.stderr,
        })
    }

    async fn pause(&self, sandbox_id: &str) -> SquadResult<()> {
        self.post_empty(&format!("/sandboxes/{sandbox_id}/pause"))
            .await
    }

    async fn resume(&self, sandbox_id: &str) -> SquadResult<()> {
        self.post_empty(&format!("/sandboxes/{sandbox_id}/resume"))
            .await
    }

    async fn kill(&self, sandbox_id: &str) -> SquadResult<()> {
        let url = format!("{}/sandboxes/{sandbox_id}", self.base_url);
        let response = self
            .client
            .delete(&url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| SandboxError::ProviderError {
                reason: format!("kill request failed: {e}"),
            })?;
        if !response.status().is_success() {
            return Err(SandboxError::ProviderError {
                reason: format!("kill returned {}", response.status()),
            }
            .into());
        }
        Ok(())
    }
}

impl std::fmt::Debug for HttpSandboxProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSandboxProvider")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// MOCK PROVIDER FOR TESTING
// ============================================================================

/// Scripted command behavior for the mock provider.
type CommandScript = Box<dyn Fn(&str, &ExecOptions) -> SquadResult<ExecOutcome> + Send + Sync>;

/// In-memory sandbox provider for tests. Records every command and file
/// write; command outcomes are scripted per invocation.
pub struct MockSandboxProvider {
    next_id: Mutex<u32>,
    commands: Mutex<Vec<(String, String)>>,
    files: Mutex<Vec<(String, String, String)>>,
    paused: Mutex<Vec<String>>,
    killed: Mutex<Vec<String>>,
    script: CommandScript,
}

impl Default for MockSandboxProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSandboxProvider {
    /// A provider whose commands all succeed with empty output.
    pub fn new() -> Self {
        Self::with_script(|_, _| {
            Ok(ExecOutcome {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            })
        })
    }

    /// A provider with scripted command outcomes.
    pub fn with_script(
        script: impl Fn(&str, &ExecOptions) -> SquadResult<ExecOutcome> + Send + Sync + 'static,
    ) -> Self {
        Self {
            next_id: Mutex::new(0),
            commands: Mutex::new(Vec::new()),
            files: Mutex::new(Vec::new()),
            paused: Mutex::new(Vec::new()),
            killed: Mutex::new(Vec::new()),
            script: Box::new(script),
        }
    }

    /// Every (sandbox_id, command) run so far.
    pub fn commands(&self) -> Vec<(String, String)> {
        self.commands.lock().expect("mock lock").clone()
    }

    /// Every (sandbox_id, path, contents) written so far.
    pub fn files(&self) -> Vec<(String, String, String)> {
        self.files.lock().expect("mock lock").clone()
    }

    /// Sandboxes paused / killed so far.
    pub fn paused(&self) -> Vec<String> {
        self.paused.lock().expect("mock lock").clone()
    }

    pub fn killed(&self) -> Vec<String> {
        self.killed.lock().expect("mock lock").clone()
    }
}

#[async_trait]
impl SandboxProvider for MockSandboxProvider {
    async fn create_sandbox(&self, _resources: &SandboxResources) -> SquadResult<String> {
        let mut next = self.next_id.lock().expect("mock lock");
        *next += 1;
        Ok(format!("mock-sandbox-{next}"))
    }

    async fn write_file(&self, sandbox_id: &str, path: &str, contents: &str) -> SquadResult<()> {
        self.files.lock().expect("mock lock").push((
            sandbox_id.to_string(),
            path.to_string(),
            contents.to_string(),
        ));
        Ok(())
    }

    async fn exec(
        &self,
        sandbox_id: &str,
        command: &str,
        options: ExecOptions,
    ) -> SquadResult<ExecOutcome> {
        self.commands
            .lock()
            .expect("mock lock")
            .push((sandbox_id.to_string(), command.to_string()));
        let outcome = (self.script)(command, &options)?;
        if let Some(sink) = &options.on_stdout {
            if !outcome.stdout.is_empty() {
                sink(&outcome.stdout);
            }
        }
        if let Some(sink) = &options.on_stderr {
            if !outcome.stderr.is_empty() {
                sink(&outcome.stderr);
            }
        }
        Ok(outcome)
    }

    async fn pause(&self, sandbox_id: &str) -> SquadResult<()> {
        self.paused
            .lock()
            .expect("mock lock")
            .push(sandbox_id.to_string());
        Ok(())
    }

    async fn resume(&self, _sandbox_id: &str) -> SquadResult<()> {
        Ok(())
    }

    async fn kill(&self, sandbox_id: &str) -> SquadResult<()> {
        self.killed
            .lock()
            .expect("mock lock")
            .push(sandbox_id.to_string());
        Ok(())
    }
}
