#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, header},
};
use lopdf::{Document, Object, Stream, dictionary};
use rust_pdf_cleaner::config::{CleanerConfig, FailurePolicy};
use rust_pdf_cleaner::services::dependencies::{DependencyReport, Tool};
use rust_pdf_cleaner::services::runner::{Invocation, ProcessOutput, ToolRunner};
use rust_pdf_cleaner::{AppState, create_app};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const BOUNDARY: &str = "---------------------------pdfcleanerboundary";

/// Stands in for pdftk, exiftool, qpdf and pdfinfo by copying files around
/// the job directory.
#[derive(Default)]
pub struct StubRunner {
    failing: HashSet<Tool>,
    pub calls: Mutex<Vec<(Tool, Vec<String>)>>,
    /// Contents of every metadata file handed to `pdftk update_info`
    pub fed_metadata: Mutex<Vec<String>>,
}

impl StubRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(tools: &[Tool]) -> Self {
        Self {
            failing: tools.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn calls_to(&self, tool: Tool) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == tool)
            .count()
    }
}

#[async_trait]
impl ToolRunner for StubRunner {
    async fn run(&self, invocation: &Invocation) -> std::io::Result<ProcessOutput> {
        let args = invocation.args_lossy();
        self.calls
            .lock()
            .unwrap()
            .push((invocation.tool, args.clone()));

        if self.failing.contains(&invocation.tool) {
            return Ok(ProcessOutput::failed(
                1,
                format!("{}: simulated failure", invocation.tool),
            ));
        }

        let at = |name: &String| invocation.current_dir.join(name);
        match invocation.tool {
            Tool::Pdftk if args.get(1).map(String::as_str) == Some("dump_data") => {
                // Cleaned outputs report blank values
                if args[0].starts_with("clean") {
                    Ok(ProcessOutput::ok("InfoBegin\nInfoKey: Author\nInfoValue: \n"))
                } else {
                    Ok(ProcessOutput::ok(
                        "InfoBegin\nInfoKey: Author\nInfoValue: Jane Doe\nInfoBegin\nInfoKey: Producer\nInfoValue: Scanner 9000\n",
                    ))
                }
            }
            Tool::Pdftk => {
                // <in> update_info <meta> output <out>
                let metadata = std::fs::read_to_string(at(&args[2]))?;
                self.fed_metadata.lock().unwrap().push(metadata);
                std::fs::copy(at(&args[0]), at(&args[4]))?;
                Ok(ProcessOutput::ok(""))
            }
            Tool::Exiftool => Ok(ProcessOutput::ok("")),
            Tool::Qpdf => {
                // --linearize <in> <out>
                std::fs::copy(at(&args[1]), at(&args[2]))?;
                Ok(ProcessOutput::ok(""))
            }
            Tool::Pdfinfo => Ok(ProcessOutput::ok("Producer:       \n")),
        }
    }
}

pub struct TestApp {
    pub app: Router,
    pub runner: Arc<StubRunner>,
    pub upload_dir: tempfile::TempDir,
}

impl TestApp {
    pub fn upload_dir(&self) -> &Path {
        self.upload_dir.path()
    }

    /// Every file currently in the upload directory
    pub fn artifacts(&self) -> Vec<PathBuf> {
        list_dir(self.upload_dir())
    }
}

pub fn setup_app(runner: StubRunner, deps: DependencyReport, policy: FailurePolicy) -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    let mut config = CleanerConfig::with_upload_dir(upload_dir.path());
    config.failure_policy = policy;

    let runner = Arc::new(runner);
    let state = AppState::new(config, deps, runner.clone());

    TestApp {
        app: create_app(state),
        runner,
        upload_dir,
    }
}

pub fn setup_default_app() -> TestApp {
    setup_app(
        StubRunner::new(),
        DependencyReport::all_present(),
        FailurePolicy::Strict,
    )
}

pub fn list_dir(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|rd| rd.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    entries.sort();
    entries
}

pub fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
        Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
        Content-Type: application/pdf\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(filename: &str, content: &[u8]) -> Request<Body> {
    upload_request_with_field("upload", filename, content)
}

pub fn upload_request_with_field(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(field, filename, content)))
        .unwrap()
}

/// A one-page PDF whose information dictionary names an author
pub fn sample_pdf(author: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(dictionary! {}, b"BT ET".to_vec()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Author" => Object::string_literal(author),
        "Title" => Object::string_literal("Quarterly Report"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// JPEG whose EXIF block carries a GPS IFD (version and latitude reference)
pub fn jpeg_with_gps() -> Vec<u8> {
    let tiff: [u8; 56] = [
        b'I', b'I', 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00, // header
        0x01, 0x00, // IFD0: one entry
        0x25, 0x88, 0x04, 0x00, 0x01, 0x00, 0x00, 0x00, 0x1A, 0x00, 0x00, 0x00, // GPSInfo -> 26
        0x00, 0x00, 0x00, 0x00, // no next IFD
        0x02, 0x00, // GPS IFD: two entries
        0x00, 0x00, 0x01, 0x00, 0x04, 0x00, 0x00, 0x00, 0x02, 0x02, 0x00, 0x00, // GPSVersionID
        0x01, 0x00, 0x02, 0x00, 0x02, 0x00, 0x00, 0x00, b'N', 0x00, 0x00, 0x00, // GPSLatitudeRef
        0x00, 0x00, 0x00, 0x00, // no next IFD
    ];

    let mut jpeg = vec![0xFF, 0xD8];
    jpeg.extend_from_slice(&[0xFF, 0xE1]);
    jpeg.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    jpeg.extend_from_slice(b"Exif\0\0");
    jpeg.extend_from_slice(&tiff);
    jpeg.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x12, 0x34, 0x56, 0xFF, 0xD9]);
    jpeg
}

/// A one-page PDF carrying `photo.jpg` (see [`jpeg_with_gps`]) as an attachment
pub fn photo_embedded_pdf() -> Vec<u8> {
    let jpeg = jpeg_with_gps();
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let attachment_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "EmbeddedFile",
            "Params" => dictionary! { "Size" => Object::Integer(jpeg.len() as i64) },
        },
        jpeg,
    ));
    let filespec_id = doc.add_object(dictionary! {
        "Type" => "Filespec",
        "F" => Object::string_literal("photo.jpg"),
        "EF" => dictionary! { "F" => attachment_id },
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "Names" => dictionary! {
            "EmbeddedFiles" => dictionary! {
                "Names" => vec![Object::string_literal("photo.jpg"), filespec_id.into()],
            },
        },
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Payloads of every `/EmbeddedFile` stream in `pdf`
pub fn embedded_files(pdf: &[u8]) -> Vec<Vec<u8>> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.objects
        .values()
        .filter_map(|obj| match obj {
            Object::Stream(stream)
                if matches!(stream.dict.get(b"Type"), Ok(Object::Name(n)) if n == b"EmbeddedFile") =>
            {
                Some(
                    stream
                        .decompressed_content()
                        .unwrap_or_else(|_| stream.content.clone()),
                )
            }
            _ => None,
        })
        .collect()
}

/// Multipart body whose `upload` field is complete but whose trailing field
/// is cut off before the closing boundary
pub fn truncated_upload_request(filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
        Content-Disposition: form-data; name=\"upload\"; filename=\"{filename}\"\r\n\
        Content-Type: application/pdf\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(
        format!("\r\n--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello")
            .as_bytes(),
    );

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}
