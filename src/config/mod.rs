use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// How failing pipeline steps are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Any failing cleaning step aborts the job
    Strict,
    /// Cleaning steps log a placeholder and continue; only a missing final
    /// artifact fails the job
    Lenient,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!("unknown failure policy '{}'", other)),
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Lenient => write!(f, "lenient"),
        }
    }
}

/// Runtime configuration for the cleaner service
#[derive(Debug, Clone)]
pub struct CleanerConfig {
    /// Listen address (default: "127.0.0.1")
    pub host: String,

    /// Listen port (default: 8080)
    pub port: u16,

    /// Directory holding every per-job artifact (default: <tmp>/pdf_uploads)
    pub upload_dir: PathBuf,

    /// Maximum upload size in bytes (default: 256 MB)
    pub max_file_size: usize,

    /// Step failure handling (default: strict)
    pub failure_policy: FailurePolicy,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            upload_dir: env::temp_dir().join("pdf_uploads"),
            max_file_size: 256 * 1024 * 1024, // 256 MB
            failure_policy: FailurePolicy::Strict,
        }
    }
}

impl CleanerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            host: env::var("HOST").unwrap_or(default.host),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            upload_dir: env::var("UPLOAD_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            failure_policy: env::var("PIPELINE_FAILURE_POLICY")
                .ok()
                .and_then(|v| match v.parse() {
                    Ok(policy) => Some(policy),
                    Err(e) => {
                        tracing::warn!("Ignoring PIPELINE_FAILURE_POLICY: {}", e);
                        None
                    }
                })
                .unwrap_or(default.failure_policy),
        }
    }

    /// Config rooted at an explicit upload directory, used by tests and tooling
    pub fn with_upload_dir(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CleanerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert!(config.upload_dir.ends_with("pdf_uploads"));
        assert_eq!(config.max_file_size, 256 * 1024 * 1024);
        assert_eq!(config.failure_policy, FailurePolicy::Strict);
    }

    #[test]
    fn test_failure_policy_parse() {
        assert_eq!("strict".parse::<FailurePolicy>(), Ok(FailurePolicy::Strict));
        assert_eq!(" LENIENT ".parse::<FailurePolicy>(), Ok(FailurePolicy::Lenient));
        assert!("sometimes".parse::<FailurePolicy>().is_err());
        assert_eq!(FailurePolicy::Lenient.to_string(), "lenient");
    }

    #[test]
    fn test_with_upload_dir() {
        let config = CleanerConfig::with_upload_dir("/srv/jobs");
        assert_eq!(config.upload_dir, PathBuf::from("/srv/jobs"));
        assert_eq!(config.port, 8080);
    }
}
