//! In-process removal of metadata carried by objects embedded in a PDF:
//! XMP `/Metadata` streams, and EXIF/XMP/IPTC segments inside JPEG images
//! and JPEG attachments.

use lopdf::{Document, Object, ObjectId, Stream};
use std::collections::BTreeSet;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const APP1: u8 = 0xE1; // EXIF, XMP
const APP13: u8 = 0xED; // Photoshop IRB, IPTC
const COM: u8 = 0xFE;

#[derive(Error, Debug)]
pub enum ScrubError {
    #[error("Failed to parse PDF: {0}")]
    Parse(#[from] lopdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What one scrub pass changed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScrubReport {
    pub metadata_streams_removed: usize,
    pub images_stripped: usize,
    pub attachments_stripped: usize,
}

impl ScrubReport {
    pub fn changed(&self) -> bool {
        self.metadata_streams_removed + self.images_stripped + self.attachments_stripped > 0
    }
}

impl std::fmt::Display for ScrubReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "removed {} XMP streams, stripped {} images and {} attachments",
            self.metadata_streams_removed, self.images_stripped, self.attachments_stripped
        )
    }
}

/// Drop APP1, APP13 and COM segments from a JPEG.
///
/// Returns `None` when `bytes` is not a well-formed JPEG header; scan data
/// after SOS is copied verbatim.
pub fn strip_jpeg_metadata(bytes: &[u8]) -> Option<Vec<u8>> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != SOI {
        return None;
    }

    let mut out = Vec::with_capacity(bytes.len());
    out.extend_from_slice(&bytes[..2]);
    let mut i = 2;

    while i < bytes.len() {
        if bytes[i] != 0xFF {
            return None;
        }
        let start = i;
        while i < bytes.len() && bytes[i] == 0xFF {
            i += 1;
        }
        let marker = *bytes.get(i)?;

        if marker == SOS || marker == EOI {
            out.extend_from_slice(&bytes[start..]);
            return Some(out);
        }

        // Standalone markers carry no length field
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            out.extend_from_slice(&bytes[start..=i]);
            i += 1;
            continue;
        }

        let len = u16::from_be_bytes([*bytes.get(i + 1)?, *bytes.get(i + 2)?]) as usize;
        if len < 2 {
            return None;
        }
        let end = i + 1 + len;
        if end > bytes.len() {
            return None;
        }

        if !matches!(marker, APP1 | APP13 | COM) {
            out.extend_from_slice(&bytes[start..end]);
        }
        i = end;
    }

    Some(out)
}

/// Remove embedded metadata from the PDF at `path`, rewriting it in place
/// only when something changed.
pub fn scrub_document(path: &Path) -> Result<ScrubReport, ScrubError> {
    let mut doc = Document::load(path)?;
    let report = scrub(&mut doc);
    if report.changed() {
        doc.save(path)?;
    }
    Ok(report)
}

/// Count embedded JPEG images and attachments that still carry an EXIF block
pub fn residual_exif(path: &Path) -> Result<usize, ScrubError> {
    let doc = Document::load(path)?;
    let count = doc
        .objects
        .values()
        .filter_map(|obj| match obj {
            Object::Stream(stream) => jpeg_payload(stream),
            _ => None,
        })
        .filter(|jpeg| {
            exif::Reader::new()
                .read_from_container(&mut Cursor::new(jpeg.as_slice()))
                .is_ok()
        })
        .count();
    Ok(count)
}

fn scrub(doc: &mut Document) -> ScrubReport {
    let mut report = ScrubReport::default();
    let mut metadata_ids: BTreeSet<ObjectId> = BTreeSet::new();

    for object in doc.objects.values_mut() {
        let dict = match object {
            Object::Dictionary(dict) => dict,
            Object::Stream(stream) => &mut stream.dict,
            _ => continue,
        };
        if let Some(Object::Reference(id)) = dict.remove(b"Metadata") {
            metadata_ids.insert(id);
        }
    }

    for id in metadata_ids {
        if matches!(doc.objects.get(&id), Some(Object::Stream(_))) {
            doc.objects.remove(&id);
            report.metadata_streams_removed += 1;
        }
    }

    for object in doc.objects.values_mut() {
        let Object::Stream(stream) = object else {
            continue;
        };
        match stream_kind(stream) {
            Some(StreamKind::Image) => {
                if let Some(stripped) = strip_changed(&stream.content) {
                    stream.set_content(stripped);
                    report.images_stripped += 1;
                }
            }
            Some(StreamKind::Attachment) => {
                let Some(payload) = attachment_payload(stream) else {
                    continue;
                };
                if let Some(stripped) = strip_changed(&payload) {
                    let size = stripped.len() as i64;
                    stream.set_plain_content(stripped);
                    if let Ok(Object::Dictionary(params)) = stream.dict.get_mut(b"Params") {
                        params.set("Size", Object::Integer(size));
                        params.remove(b"CheckSum");
                    }
                    report.attachments_stripped += 1;
                }
            }
            None => {}
        }
    }

    report
}

enum StreamKind {
    Image,
    Attachment,
}

fn stream_kind(stream: &Stream) -> Option<StreamKind> {
    let name_of = |key: &[u8]| match stream.dict.get(key) {
        Ok(Object::Name(name)) => Some(name.clone()),
        _ => None,
    };

    if name_of(b"Type").as_deref() == Some(b"EmbeddedFile".as_slice()) {
        return Some(StreamKind::Attachment);
    }
    if name_of(b"Subtype").as_deref() == Some(b"Image".as_slice())
        && filters(stream) == [b"DCTDecode".to_vec()]
    {
        return Some(StreamKind::Image);
    }
    None
}

fn filters(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Object::Name(name) => Some(name.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Decoded attachment bytes, when the encoding is one we can rewrite
fn attachment_payload(stream: &Stream) -> Option<Vec<u8>> {
    let filters = filters(stream);
    if filters.is_empty() {
        Some(stream.content.clone())
    } else if filters == [b"FlateDecode".to_vec()] {
        stream.decompressed_content().ok()
    } else {
        None
    }
}

fn jpeg_payload(stream: &Stream) -> Option<Vec<u8>> {
    let bytes = match stream_kind(stream)? {
        StreamKind::Image => stream.content.clone(),
        StreamKind::Attachment => attachment_payload(stream)?,
    };
    bytes.starts_with(&[0xFF, SOI]).then_some(bytes)
}

fn strip_changed(bytes: &[u8]) -> Option<Vec<u8>> {
    strip_jpeg_metadata(bytes).filter(|stripped| stripped.len() != bytes.len())
}
