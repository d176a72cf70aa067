//! Text handling for `pdftk dump_data` reports and the post-clean
//! verification transcript.

const INFO_VALUE: &[u8] = b"InfoValue:";

/// exiftool tags that identify the author, origin or location of a document
const IDENTIFYING_TAGS: &[&str] = &[
    "Author",
    "Title",
    "Subject",
    "Keywords",
    "Creator",
    "GPS Position",
    "GPS Latitude",
    "GPS Longitude",
];

/// Blank every `InfoValue:` field of a `dump_data` report.
///
/// Keys and structural records (`InfoBegin`, `InfoKey`, `PdfID0`,
/// `NumberOfPages`, bookmarks, page media) pass through untouched, so
/// `update_info` rewrites each dictionary entry with an empty value instead of
/// dropping it. Running the rewrite on its own output changes nothing.
pub fn blank_info_values(dump: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(dump.len());
    for (i, line) in dump.split(|b| *b == b'\n').enumerate() {
        if i > 0 {
            out.push(b'\n');
        }
        out.extend_from_slice(&blank_line(line));
    }
    out
}

fn blank_line(line: &[u8]) -> Vec<u8> {
    let Some(rest) = line.strip_prefix(INFO_VALUE) else {
        return line.to_vec();
    };
    match rest.first() {
        Some(b) if b.is_ascii_whitespace() => {
            let mut blanked = INFO_VALUE.to_vec();
            blanked.push(b' ');
            if line.ends_with(b"\r") {
                blanked.push(b'\r');
            }
            blanked
        }
        _ => line.to_vec(),
    }
}

/// Summary of the verification transcript, exposed to the caller as the
/// `x-verification-status` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStatus {
    /// No identifying metadata was reported
    Clean,
    /// Fields that still carry a value
    Residual { fields: Vec<String> },
    /// No verification tool produced output
    Unavailable,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Residual { .. } => "residual",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Inspect a verification transcript (pdftk dump, exiftool listing and
/// pdfinfo output concatenated) for metadata that survived cleaning.
pub fn summarize_verification(report: &str, residual_exif_streams: usize) -> VerificationStatus {
    if report.trim().is_empty() && residual_exif_streams == 0 {
        return VerificationStatus::Unavailable;
    }

    let mut fields = Vec::new();
    let mut pending_key: Option<&str> = None;

    for line in report.lines() {
        if let Some(key) = line.strip_prefix("InfoKey:") {
            pending_key = Some(key.trim());
        } else if let Some(value) = line.strip_prefix("InfoValue:") {
            if !value.trim().is_empty() {
                fields.push(pending_key.unwrap_or("InfoValue").to_string());
            }
            pending_key = None;
        } else if let Some((tag, value)) = line.split_once(':') {
            let tag = tag.trim();
            if IDENTIFYING_TAGS.contains(&tag) && !value.trim().is_empty() {
                fields.push(tag.to_string());
            }
        }
    }

    if residual_exif_streams > 0 {
        fields.push(format!("EXIF ({} embedded images)", residual_exif_streams));
    }

    fields.dedup();
    if fields.is_empty() {
        VerificationStatus::Clean
    } else {
        VerificationStatus::Residual { fields }
    }
}
