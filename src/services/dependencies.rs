use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// External binaries the cleaning pipeline shells out to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tool {
    Pdftk,
    Exiftool,
    Qpdf,
    Pdfinfo,
}

impl Tool {
    pub const ALL: [Tool; 4] = [Tool::Pdftk, Tool::Exiftool, Tool::Qpdf, Tool::Pdfinfo];

    pub fn binary_name(self) -> &'static str {
        match self {
            Tool::Pdftk => "pdftk",
            Tool::Exiftool => "exiftool",
            Tool::Qpdf => "qpdf",
            Tool::Pdfinfo => "pdfinfo",
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// Which required tools were found on the search path.
///
/// Computed once at startup and handed to request handlers through
/// [`crate::AppState`], so availability never changes mid-flight.
#[derive(Debug, Clone, Default)]
pub struct DependencyReport {
    resolved: BTreeMap<Tool, PathBuf>,
}

impl DependencyReport {
    /// Resolve every tool against the process `PATH`
    pub fn detect() -> Self {
        let path_var = std::env::var_os("PATH").unwrap_or_default();
        Self::detect_in(&path_var)
    }

    /// Resolve every tool against an explicit `PATH`-style search list
    pub fn detect_in(path_var: &OsStr) -> Self {
        let dirs: Vec<PathBuf> = std::env::split_paths(path_var).collect();
        let resolved = Tool::ALL
            .iter()
            .filter_map(|tool| find_executable(&dirs, tool.binary_name()).map(|p| (*tool, p)))
            .collect();
        Self { resolved }
    }

    /// Report where every tool except `missing` resolves to its bare name
    pub fn from_missing(missing: &[Tool]) -> Self {
        let resolved = Tool::ALL
            .iter()
            .filter(|tool| !missing.contains(tool))
            .map(|tool| (*tool, PathBuf::from(tool.binary_name())))
            .collect();
        Self { resolved }
    }

    /// Report where every tool is present
    pub fn all_present() -> Self {
        Self::from_missing(&[])
    }

    pub fn is_ready(&self) -> bool {
        self.resolved.len() == Tool::ALL.len()
    }

    pub fn missing(&self) -> Vec<Tool> {
        Tool::ALL
            .iter()
            .filter(|tool| !self.resolved.contains_key(tool))
            .copied()
            .collect()
    }

    /// Comma separated names of the missing tools
    pub fn missing_names(&self) -> String {
        self.missing()
            .iter()
            .map(|t| t.binary_name())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn is_installed(&self, tool: Tool) -> bool {
        self.resolved.contains_key(&tool)
    }

    /// Program to invoke for `tool`, falling back to the bare binary name
    pub fn program(&self, tool: Tool) -> PathBuf {
        self.resolved
            .get(&tool)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(tool.binary_name()))
    }

    pub fn resolved(&self, tool: Tool) -> Option<&Path> {
        self.resolved.get(&tool).map(PathBuf::as_path)
    }
}

fn find_executable(dirs: &[PathBuf], name: &str) -> Option<PathBuf> {
    dirs.iter().find_map(|dir| {
        candidate_names(name)
            .into_iter()
            .map(|candidate| dir.join(candidate))
            .find(|path| is_executable(path))
    })
}

#[cfg(windows)]
fn candidate_names(name: &str) -> Vec<String> {
    vec![format!("{}.exe", name), name.to_string()]
}

#[cfg(not(windows))]
fn candidate_names(name: &str) -> Vec<String> {
    vec![name.to_string()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
