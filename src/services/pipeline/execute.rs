use super::PipelineService;
use super::plan::{PipelinePlan, render_action};
use super::types::{Capture, ExecutionResult, Step, StepAction, StepPolicy};
use crate::services::embedded;
use crate::services::metadata::blank_info_values;
use std::fmt::Write as _;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Exit status used when a tool could not be started, as a shell would report
const SPAWN_FAILED: i32 = 127;
const SIGNALLED: i32 = 128;

#[derive(Debug)]
struct StepFailure {
    code: i32,
    message: String,
}

impl StepFailure {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl PipelineService {
    /// Run every step of `plan` in order and aggregate the transcript.
    ///
    /// A failing `Propagate` step ends the run with its status; a failing
    /// `Suppress` step writes its placeholder to stdout and the run goes on.
    pub async fn execute(&self, plan: &PipelinePlan) -> ExecutionResult {
        let mut result = ExecutionResult::default();
        let mut stage = None;

        for step in &plan.steps {
            if stage != Some(step.stage) {
                stage = Some(step.stage);
                push_line(&mut result.stdout, step.stage.banner());
            }
            let _ = writeln!(
                result.stderr,
                "+ {}",
                render_action(&step.action, plan.dir())
            );

            let Err(failure) = self.run_step(step, &mut result).await else {
                continue;
            };
            push_line(&mut result.stderr, &failure.message);

            match step.policy {
                StepPolicy::Propagate => {
                    tracing::error!(
                        "❌ Pipeline step failed ({}): {}",
                        step.on_error,
                        failure.message
                    );
                    result.exit_status = failure.code;
                    return result;
                }
                StepPolicy::Suppress => {
                    tracing::warn!(
                        "⚠️  Ignoring failed pipeline step ({}): {}",
                        step.on_error,
                        failure.message
                    );
                    push_line(&mut result.stdout, step.on_error);
                    result.suppressed.push(step.on_error);
                }
            }
        }

        push_line(&mut result.stdout, "Process completed successfully");
        result
    }

    async fn run_step(&self, step: &Step, result: &mut ExecutionResult) -> Result<(), StepFailure> {
        match &step.action {
            StepAction::RequireInput(path) => {
                let meta = tokio::fs::metadata(path).await.map_err(|e| {
                    StepFailure::new(2, format!("ls: cannot access '{}': {}", path.display(), e))
                })?;
                if !meta.is_file() {
                    return Err(StepFailure::new(
                        2,
                        format!("{} is not a regular file", path.display()),
                    ));
                }
                push_line(
                    &mut result.stdout,
                    &format!("{} ({} bytes)", file_name(path), meta.len()),
                );
                Ok(())
            }

            StepAction::Run {
                invocation,
                stdout_to,
                ok_codes,
            } => {
                let output = self.runner.run(invocation).await.map_err(|e| {
                    StepFailure::new(
                        SPAWN_FAILED,
                        format!("{}: failed to start: {}", invocation.tool, e),
                    )
                })?;

                let stdout = String::from_utf8_lossy(&output.stdout);
                result.stderr.push_str(&String::from_utf8_lossy(&output.stderr));

                // Redirected output lands in the file instead of the transcript,
                // even when the tool fails, like a shell redirect
                match stdout_to {
                    Some(capture) => {
                        write_capture(capture, &output.stdout).await.map_err(|e| {
                            let path = capture_path(capture).display();
                            StepFailure::new(1, format!("cannot write {}: {}", path, e))
                        })?
                    }
                    None => result.stdout.push_str(&stdout),
                }

                match output.status {
                    Some(code) if ok_codes.contains(&code) => Ok(()),
                    Some(code) => Err(StepFailure::new(
                        code,
                        format!("{} exited with status {}", invocation.tool, code),
                    )),
                    None => Err(StepFailure::new(
                        SIGNALLED,
                        format!("{} was terminated by a signal", invocation.tool),
                    )),
                }
            }

            StepAction::BlankMetadata { from, to } => {
                let dump = tokio::fs::read(from).await.map_err(|e| {
                    StepFailure::new(1, format!("cannot read {}: {}", from.display(), e))
                })?;
                tokio::fs::write(to, blank_info_values(&dump))
                    .await
                    .map_err(|e| StepFailure::new(1, format!("cannot write {}: {}", to.display(), e)))
            }

            StepAction::ScrubEmbedded(path) => {
                let target = path.clone();
                let report = tokio::task::spawn_blocking(move || embedded::scrub_document(&target))
                    .await
                    .map_err(|e| StepFailure::new(1, format!("embedded scrub panicked: {}", e)))?
                    .map_err(|e| {
                        StepFailure::new(1, format!("embedded scrub of {}: {}", file_name(path), e))
                    })?;
                push_line(
                    &mut result.stdout,
                    &format!("{}: {}", file_name(path), report),
                );
                Ok(())
            }

            StepAction::Rename { from, to } => tokio::fs::rename(from, to).await.map_err(|e| {
                StepFailure::new(
                    1,
                    format!("mv: cannot move '{}' to '{}': {}", file_name(from), file_name(to), e),
                )
            }),

            StepAction::Remove(paths) => {
                for path in paths {
                    match tokio::fs::remove_file(path).await {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => {
                            return Err(StepFailure::new(
                                1,
                                format!("rm: cannot remove '{}': {}", file_name(path), e),
                            ));
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

async fn write_capture(capture: &Capture, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    match capture {
        Capture::Truncate(_) => options.write(true).create(true).truncate(true),
        Capture::Append(_) => options.append(true).create(true),
    };
    let mut file = options.open(capture_path(capture)).await?;
    file.write_all(bytes).await?;
    file.flush().await
}

fn capture_path(capture: &Capture) -> &Path {
    match capture {
        Capture::Truncate(path) | Capture::Append(path) => path,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn push_line(buf: &mut String, line: &str) {
    if !buf.is_empty() && !buf.ends_with('\n') {
        buf.push('\n');
    }
    buf.push_str(line);
    buf.push('\n');
}
