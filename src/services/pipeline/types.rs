use crate::services::metadata::VerificationStatus;
use crate::services::runner::Invocation;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preflight,
    StripInfo,
    StripEmbedded,
    Linearize,
    Verify,
    Finalize,
}

impl Stage {
    /// Progress line written to the transcript when the stage starts
    pub fn banner(self) -> &'static str {
        match self {
            Stage::Preflight => "Checking input file...",
            Stage::StripInfo => "Step 1: Removing PDF metadata...",
            Stage::StripEmbedded => "Step 2: Removing EXIF metadata...",
            Stage::Linearize => "Step 3: Linearizing PDF...",
            Stage::Verify => "Step 4: Verifying clean state...",
            Stage::Finalize => "Step 5: Finalizing...",
        }
    }
}

/// What happens when a step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// Abort the run with a non-zero aggregate status
    Propagate,
    /// Log the step's placeholder message and continue
    Suppress,
}

/// Where a tool's standard output goes besides the transcript
#[derive(Debug, Clone)]
pub enum Capture {
    Truncate(PathBuf),
    Append(PathBuf),
}

#[derive(Debug, Clone)]
pub enum StepAction {
    /// The input file must exist and be a regular file
    RequireInput(PathBuf),
    /// Run an external tool. Exit codes in `ok_codes` count as success.
    Run {
        invocation: Invocation,
        stdout_to: Option<Capture>,
        ok_codes: &'static [i32],
    },
    /// Blank every `InfoValue` of a metadata dump
    BlankMetadata { from: PathBuf, to: PathBuf },
    /// Strip EXIF/XMP from embedded images and attachments in place
    ScrubEmbedded(PathBuf),
    Rename { from: PathBuf, to: PathBuf },
    /// Delete files; already missing files are not an error
    Remove(Vec<PathBuf>),
}

#[derive(Debug, Clone)]
pub struct Step {
    pub stage: Stage,
    pub policy: StepPolicy,
    /// Placeholder written to the transcript when a suppressed step fails
    pub on_error: &'static str,
    pub action: StepAction,
}

/// Aggregate result of one pipeline run
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// 0 on success, otherwise the status of the step that aborted the run
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
    /// Placeholder messages of steps that failed but were suppressed
    pub suppressed: Vec<&'static str>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// Diagnostics kept on disk for a failed job
#[derive(Debug, Clone)]
pub struct FailureReport {
    pub result: ExecutionResult,
    pub error_log: PathBuf,
}

#[derive(Debug, Clone)]
pub enum CleanOutcome {
    Cleaned {
        path: PathBuf,
        verification: VerificationStatus,
    },
    Failed(FailureReport),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error while preparing job {job}: {source}")]
    Io {
        job: String,
        #[source]
        source: std::io::Error,
    },
}
