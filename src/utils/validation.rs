use std::path::Path;

/// Only extension the cleaner accepts
pub const PDF_EXTENSION: &str = ".pdf";

/// Prefix of every file name handed back to the client
pub const CLEANED_PREFIX: &str = "cleaned_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check an uploaded file name and return its sanitized form.
///
/// Runs before anything is written to disk. An empty name means the browser
/// submitted the form without choosing a file.
pub fn validate_pdf_filename(filename: &str) -> Result<String, ValidationError> {
    let name = base_name(filename);
    if name.trim().is_empty() {
        return Err(ValidationError {
            code: "NO_FILE",
            message: "No file uploaded".to_string(),
        });
    }

    if !name.to_lowercase().ends_with(PDF_EXTENSION) {
        return Err(ValidationError {
            code: "UNSUPPORTED_TYPE",
            message: "Only PDF files are supported at this time".to_string(),
        });
    }

    Ok(sanitize_filename(name))
}

/// `cleaned_<original>`
pub fn cleaned_filename(original: &str) -> String {
    format!("{}{}", CLEANED_PREFIX, original)
}

fn base_name(filename: &str) -> &str {
    // Browsers on Windows may send a full path
    let last = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    Path::new(last)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(last)
}

fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Limit length safely for UTF-8, keeping room for the prefix
    let limit = 255 - CLEANED_PREFIX.len();
    if sanitized.len() > limit {
        let keep = limit - PDF_EXTENSION.len();
        let mut end = keep;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}{}", &sanitized[..end], PDF_EXTENSION)
    } else {
        sanitized
    }
}
