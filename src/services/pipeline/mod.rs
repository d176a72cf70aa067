use crate::config::FailurePolicy;
use crate::services::dependencies::DependencyReport;
use crate::services::embedded;
use crate::services::job::JobPaths;
use crate::services::metadata::{VerificationStatus, summarize_verification};
use crate::services::runner::ToolRunner;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub mod execute;
pub mod plan;
pub mod types;

pub use plan::PipelinePlan;
pub use types::{
    CleanOutcome, ExecutionResult, FailureReport, PipelineError, Stage, StepPolicy,
};

/// Orchestrates the cleaning of one uploaded PDF at a time per call.
///
/// Holds no per-job state, so one instance serves every concurrent request.
pub struct PipelineService {
    runner: Arc<dyn ToolRunner>,
    dependencies: Arc<DependencyReport>,
    policy: FailurePolicy,
}

impl PipelineService {
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        dependencies: Arc<DependencyReport>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            runner,
            dependencies,
            policy,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Clean the upload already saved at `paths.input()`.
    ///
    /// On success the cleaned file replaces the upload. On failure the plan
    /// script and an error log stay on disk next to the job's other files.
    /// The verification report is removed either way.
    pub async fn clean(&self, paths: &JobPaths) -> Result<CleanOutcome, PipelineError> {
        let job = paths.id.to_string();
        let io_err = |source| PipelineError::Io {
            job: job.clone(),
            source,
        };

        let plan = PipelinePlan::build(paths, &self.dependencies, self.policy);
        let script = plan.render_script();
        tokio::fs::write(paths.script(), &script)
            .await
            .map_err(io_err)?;

        info!(
            "🧹 Cleaning job {} ({} steps, {} policy)",
            job,
            plan.steps.len(),
            self.policy
        );
        let result = self.execute(&plan).await;

        let verification = if result.success() {
            Some(self.verify(paths).await)
        } else {
            None
        };
        remove_quietly(&paths.verification()).await;

        match verification {
            Some(verification) => {
                remove_quietly(&paths.script()).await;
                if !result.suppressed.is_empty() {
                    warn!(
                        "⚠️  Job {} finished with suppressed failures: {}",
                        job,
                        result.suppressed.join(", ")
                    );
                }
                info!("✅ Job {} cleaned ({})", job, verification.as_str());
                Ok(CleanOutcome::Cleaned {
                    path: paths.input(),
                    verification,
                })
            }
            None => {
                let log = format!(
                    "STDOUT:\n{}\n\nSTDERR:\n{}\n\nSCRIPT CONTENT:\n{}",
                    result.stdout, result.stderr, script
                );
                tokio::fs::write(paths.error_log(), log)
                    .await
                    .map_err(io_err)?;
                warn!(
                    "❌ Job {} failed with status {}; log at {}",
                    job,
                    result.exit_status,
                    paths.error_log().display()
                );
                Ok(CleanOutcome::Failed(FailureReport {
                    result,
                    error_log: paths.error_log(),
                }))
            }
        }
    }

    async fn verify(&self, paths: &JobPaths) -> VerificationStatus {
        let report = tokio::fs::read(paths.verification())
            .await
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();

        let input = paths.input();
        let residual = tokio::task::spawn_blocking(move || embedded::residual_exif(&input))
            .await
            .map_err(|e| e.to_string())
            .and_then(|r| r.map_err(|e| e.to_string()));
        let residual = match residual {
            Ok(count) => count,
            Err(e) => {
                warn!("Could not inspect embedded images of job {}: {}", paths.id, e);
                0
            }
        };

        let status = summarize_verification(&report, residual);
        if let VerificationStatus::Residual { fields } = &status {
            warn!(
                "⚠️  Job {} still carries metadata after cleaning: {}",
                paths.id,
                fields.join(", ")
            );
        }
        status
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}
