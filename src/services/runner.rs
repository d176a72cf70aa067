use crate::services::dependencies::Tool;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

/// One external process invocation: program, argument vector and working
/// directory, never a shell string.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub tool: Tool,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub current_dir: PathBuf,
}

impl Invocation {
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was terminated by a signal
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            status: Some(code),
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Trait for executing the pipeline's external tools
#[async_trait::async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run the invocation to completion and capture its output.
    ///
    /// An `Err` means the process could not be started at all.
    async fn run(&self, invocation: &Invocation) -> std::io::Result<ProcessOutput>;
}

/// Runs tools as real child processes on the tokio runtime
pub struct ProcessRunner;

#[async_trait::async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> std::io::Result<ProcessOutput> {
        let output = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.current_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        tracing::debug!(
            "{} exited with {:?} ({} bytes stdout, {} bytes stderr)",
            invocation.tool,
            output.status.code(),
            output.stdout.len(),
            output.stderr.len()
        );

        Ok(ProcessOutput {
            status: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
