use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Unique per-request token namespacing every temporary artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Names of all files one job may create inside the upload directory.
///
/// Every name embeds the job id, so two jobs never touch the same path.
#[derive(Debug, Clone)]
pub struct JobPaths {
    pub id: JobId,
    dir: PathBuf,
}

impl JobPaths {
    pub fn new(dir: impl Into<PathBuf>, id: JobId) -> Self {
        Self {
            id,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<job>.pdf`: the uploaded copy, replaced by the cleaned file on success
    pub fn input_name(&self) -> String {
        format!("{}.pdf", self.id)
    }

    pub fn cleaned_name(&self) -> String {
        format!("clean-{}", self.input_name())
    }

    pub fn linearized_name(&self) -> String {
        format!("clean2-{}", self.input_name())
    }

    pub fn original_metadata_name(&self) -> String {
        format!("{}-original-metadata.txt", self.id)
    }

    pub fn modified_metadata_name(&self) -> String {
        format!("{}-modified-metadata.txt", self.id)
    }

    pub fn verification_name(&self) -> String {
        format!("{}-verification.txt", self.id)
    }

    pub fn error_log_name(&self) -> String {
        format!("{}-error-log.txt", self.id)
    }

    pub fn script_name(&self) -> String {
        format!("{}.sh", self.id)
    }

    pub fn input(&self) -> PathBuf {
        self.dir.join(self.input_name())
    }

    pub fn cleaned(&self) -> PathBuf {
        self.dir.join(self.cleaned_name())
    }

    pub fn linearized(&self) -> PathBuf {
        self.dir.join(self.linearized_name())
    }

    pub fn original_metadata(&self) -> PathBuf {
        self.dir.join(self.original_metadata_name())
    }

    pub fn modified_metadata(&self) -> PathBuf {
        self.dir.join(self.modified_metadata_name())
    }

    pub fn verification(&self) -> PathBuf {
        self.dir.join(self.verification_name())
    }

    pub fn error_log(&self) -> PathBuf {
        self.dir.join(self.error_log_name())
    }

    pub fn script(&self) -> PathBuf {
        self.dir.join(self.script_name())
    }

    /// Every path the job can leave behind
    pub fn all(&self) -> Vec<PathBuf> {
        vec![
            self.input(),
            self.cleaned(),
            self.linearized(),
            self.original_metadata(),
            self.modified_metadata(),
            self.verification(),
            self.error_log(),
            self.script(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_names_embed_job_id() {
        let paths = JobPaths::new("/tmp/pdf_uploads", JobId::new());
        let id = paths.id.to_string();
        for path in paths.all() {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.contains(&id), "{} does not contain {}", name, id);
            assert_eq!(path.parent().unwrap(), Path::new("/tmp/pdf_uploads"));
        }
        assert_eq!(paths.cleaned_name(), format!("clean-{}.pdf", id));
        assert_eq!(paths.linearized_name(), format!("clean2-{}.pdf", id));
    }

    #[test]
    fn test_distinct_jobs_never_share_paths() {
        let a = JobPaths::new("/tmp/x", JobId::new());
        let b = JobPaths::new("/tmp/x", JobId::new());
        assert_ne!(a.id, b.id);
        for pa in a.all() {
            assert!(!b.all().contains(&pa));
        }
    }
}
