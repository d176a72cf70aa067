use crate::AppState;
use crate::api::error::AppError;
use crate::services::job::{JobId, JobPaths};
use crate::services::pipeline::CleanOutcome;
use crate::utils::validation::{cleaned_filename, validate_pdf_filename};
use axum::{
    body::{Body, Bytes},
    extract::{
        Multipart, State,
        multipart::{Field, MultipartError},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::Stream;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::info;
use utoipa::ToSchema;

/// Multipart form accepted by `/upload`
#[derive(Deserialize, ToSchema)]
pub struct UploadForm {
    /// PDF to clean; the file name must end in `.pdf`
    #[schema(value_type = String, format = Binary)]
    pub upload: String,
}

pub const VERIFICATION_HEADER: &str = "x-verification-status";

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Cleaned PDF as attachment, or an HTML page describing a pipeline failure"),
        (status = 400, description = "No file uploaded"),
        (status = 413, description = "Upload exceeds the configured size limit"),
        (status = 415, description = "Only PDF files are supported"),
        (status = 503, description = "Required tools are missing")
    ),
    tag = "cleaner"
)]
pub async fn upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    // Nothing touches the disk while a tool is missing
    if !state.dependencies.is_ready() {
        return Err(AppError::MissingDependency(
            state.dependencies.missing_names(),
        ));
    }

    // The guard removes the upload on every early return below
    let mut saved: Option<(JobPaths, String, TempPath)> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if saved.is_some() || field.name() != Some("upload") {
            continue;
        }

        let original_filename = validate_pdf_filename(field.file_name().unwrap_or_default())?;
        let paths = JobPaths::new(&state.config.upload_dir, JobId::new());

        tokio::fs::create_dir_all(paths.dir()).await?;
        let upload = TempPath::try_from_path(paths.input())?;
        save_field(&mut field, &upload).await?;

        info!("📥 Job {} received '{}'", paths.id, original_filename);
        saved = Some((paths, original_filename, upload));
    }

    let (paths, original_filename, upload) = saved.ok_or(AppError::NoFileProvided)?;

    match state.pipeline.clean(&paths).await? {
        CleanOutcome::Cleaned { verification, .. } => {
            // The cleaned file has replaced the upload at the same path
            let download_name = cleaned_filename(&original_filename);
            let body = cleanup_body(upload).await?;

            Ok((
                [
                    (header::CONTENT_TYPE, mime::APPLICATION_PDF.to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        content_disposition(&download_name),
                    ),
                    (
                        header::HeaderName::from_static(VERIFICATION_HEADER),
                        verification.as_str().to_string(),
                    ),
                ],
                body,
            )
                .into_response())
        }
        CleanOutcome::Failed(report) => {
            // Failed jobs stay on disk next to their error log
            let _ = upload.keep();
            Err(AppError::PipelineFailure(Box::new(report)))
        }
    }
}

async fn save_field(field: &mut Field<'_>, path: &Path) -> Result<(), AppError> {
    let mut file = tokio::fs::File::create(path).await?;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

/// `attachment; filename="<ascii>"; filename*=UTF-8''<percent-encoded>`
fn content_disposition(filename: &str) -> String {
    let ascii_filename = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\')
        .collect::<String>();
    let fallback_filename = if ascii_filename.is_empty() {
        "cleaned.pdf"
    } else {
        &ascii_filename
    };

    // RFC 5987 percent-encoding for UTF-8 filename
    let encoded_filename = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback_filename, encoded_filename
    )
}

/// Response body streaming the cleaned file, which is deleted once the body
/// is dropped (fully sent or connection closed).
async fn cleanup_body(path: TempPath) -> Result<Body, AppError> {
    let file = tokio::fs::File::open(&path).await?;
    let stream = CleanupStream {
        inner: ReaderStream::new(file),
        _path: path,
    };
    Ok(Body::from_stream(stream))
}

struct CleanupStream {
    inner: ReaderStream<tokio::fs::File>,
    _path: TempPath,
}

impl Stream for CleanupStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("cleaned_sample.pdf"),
            "attachment; filename=\"cleaned_sample.pdf\"; filename*=UTF-8''cleaned%5Fsample%2Epdf"
        );
    }

    #[test]
    fn test_content_disposition_unicode_fallback() {
        let value = content_disposition("cleaned_测试.pdf");
        assert!(value.starts_with("attachment; filename=\"cleaned_.pdf\""));
        assert!(value.contains("filename*=UTF-8''cleaned%5F%E6%B5%8B%E8%AF%95%2Epdf"));
    }

    #[tokio::test]
    async fn test_cleanup_body_deletes_file_when_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.pdf");
        std::fs::write(&path, b"%PDF-1.5 cleaned").unwrap();

        let body = cleanup_body(TempPath::try_from_path(&path).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"%PDF-1.5 cleaned");
        assert!(!path.exists());
    }
}
