use crate::services::dependencies::Tool;
use crate::services::pipeline::FailureReport;
use crate::utils::html_escape;

/// Render the upload form, warning about any missing tool.
pub fn render_index(missing: &[Tool]) -> String {
    let (warning, disabled) = if missing.is_empty() {
        (String::new(), "")
    } else {
        let names = missing
            .iter()
            .map(|t| html_escape(t.binary_name()))
            .collect::<Vec<_>>()
            .join(", ");
        (
            format!(
                r#"<div class="warning"><strong>Warning:</strong> The following required tools are missing: {}. Please install them to use this application.</div>"#,
                names
            ),
            " disabled",
        )
    };

    let content = format!(
        r#"<h1>File Metadata Remover</h1>
<p>Upload a PDF file to remove all metadata.</p>
{warning}
<div class="upload-form">
    <form action="/upload" method="post" enctype="multipart/form-data">
        <input type="file" name="upload" accept=".pdf" required{disabled}>
        <br>
        <button type="submit" class="btn"{disabled}>Clean and Download</button>
    </form>
</div>
<div>
    <h3>What this tool does:</h3>
    <ul>
        <li>Removes PDF document information (author, creation date, etc.)</li>
        <li>Strips EXIF metadata</li>
        <li>Removes embedded metadata</li>
        <li>Linearizes the PDF for web optimization</li>
    </ul>
</div>"#
    );

    build_page("File Metadata Remover", &content)
}

/// Render the failure page for a pipeline run with a non-zero status.
pub fn render_pipeline_error(report: &FailureReport) -> String {
    let content = format!(
        r#"<h1>Error Processing File</h1>
<div class="error">
    <p>There was an error processing your file. The error log is available at: <code>{log}</code></p>
</div>
<h2>Error Details</h2>
<h3>Standard Output</h3>
<pre>{stdout}</pre>
<h3>Standard Error</h3>
<pre>{stderr}</pre>
<p><a href="/">Go back to homepage</a></p>"#,
        log = html_escape(&report.error_log.display().to_string()),
        stdout = html_escape(&report.result.stdout),
        stderr = html_escape(&report.result.stderr),
    );

    build_page("Error Processing File", &content)
}

fn build_page(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body{{font-family:Arial,sans-serif;max-width:800px;margin:0 auto;padding:20px;}}
.upload-form{{border:2px dashed #ccc;padding:20px;text-align:center;margin:20px 0;border-radius:5px;}}
.btn{{background-color:#4CAF50;color:white;padding:10px 20px;border:none;cursor:pointer;margin-top:10px;border-radius:4px;}}
.btn:hover{{background-color:#45a049;}}
.btn:disabled{{background-color:#9e9e9e;cursor:not-allowed;}}
.warning{{background-color:#f8d7da;color:#721c24;padding:10px;border:1px solid #f5c6cb;border-radius:4px;margin-bottom:20px;}}
.error{{background-color:#f8d7da;color:#721c24;padding:15px;border-radius:5px;margin:20px 0;}}
pre{{background-color:#f8f9fa;padding:15px;border-radius:5px;overflow-x:auto;}}
</style>
</head>
<body>
{content}
</body>
</html>"#,
        title = html_escape(title),
    )
}
