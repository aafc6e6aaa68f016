//! Page sources feeding the pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::{BBox, PageInput, RawImage, RawLink, RawSpan};

/// Anything that can hand the pipeline its extracted pages.
///
/// The crate never opens a document container itself; an extractor for
/// PDF, DOCX or anything else implements this trait.
pub trait PageSource {
    /// Name of the source document, shown to the semantic provider.
    fn name(&self) -> Option<String> {
        None
    }

    /// Produce every page in page order.
    ///
    /// An unreadable or corrupt source fails with [`Error::Extraction`] and
    /// no partial output.
    fn load(self) -> Result<Vec<PageInput>>
    where
        Self: Sized;
}

impl PageSource for Vec<PageInput> {
    fn load(self) -> Result<Vec<PageInput>> {
        Ok(self)
    }
}

/// Pages read from a JSON dump.
///
/// The dump is either a bare array of pages or an object with a `pages`
/// array and an optional `name`:
///
/// ```json
/// {
///   "name": "report",
///   "pages": [{
///     "page_index": 0,
///     "spans": [{"text": "INTRO", "font_size": 24, "bbox": [72, 72, 160, 96]}],
///     "images": [{"data": "iVBORw0KGgo...", "bbox": [72, 120, 300, 320]}],
///     "links": [{"span_index": 0, "target": {"type": "external", "url": "https://example.com"}}]
///   }]
/// }
/// ```
///
/// Image bytes come from base64 `data` or from a `path` resolved against
/// the dump's directory.
#[derive(Debug, Clone)]
pub struct JsonPageSource {
    json: String,
    base_dir: Option<PathBuf>,
    name: Option<String>,
}

impl JsonPageSource {
    /// Read a dump from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        Ok(Self {
            json,
            base_dir: path.parent().map(Path::to_path_buf),
            name: path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string),
        })
    }

    /// Use an in-memory dump.
    pub fn from_json(json: impl Into<String>) -> Self {
        Self {
            json: json.into(),
            base_dir: None,
            name: None,
        }
    }

    /// Resolve image `path` entries against `dir`.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Override the document name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn image_bytes(&self, image: &DumpImage, page: u32, seq: usize) -> Result<Vec<u8>> {
        if let Some(data) = &image.data {
            return STANDARD.decode(data.trim()).map_err(|e| {
                Error::Extraction(format!(
                    "image {} on page {}: invalid base64: {}",
                    seq, page, e
                ))
            });
        }

        match &image.path {
            Some(rel) => {
                let path = match &self.base_dir {
                    Some(dir) => dir.join(rel),
                    None => rel.clone(),
                };
                fs::read(&path).map_err(|e| {
                    Error::Extraction(format!(
                        "image {} on page {}: cannot read {}: {}",
                        seq,
                        page,
                        path.display(),
                        e
                    ))
                })
            }
            // No payload: normalization reports the empty image.
            None => Ok(Vec::new()),
        }
    }
}

impl PageSource for JsonPageSource {
    fn name(&self) -> Option<String> {
        if self.name.is_some() {
            return self.name.clone();
        }
        match serde_json::from_str::<DumpHeader>(&self.json) {
            Ok(header) => header.name,
            Err(_) => None,
        }
    }

    fn load(self) -> Result<Vec<PageInput>> {
        let dump: Dump = serde_json::from_str(&self.json)
            .map_err(|e| Error::Extraction(format!("malformed page dump: {}", e)))?;
        let pages = match dump {
            Dump::Document { pages } => pages,
            Dump::Pages(pages) => pages,
        };

        let mut result = Vec::with_capacity(pages.len());
        for (position, page) in pages.into_iter().enumerate() {
            let page_index = page.page_index.unwrap_or(position as u32);
            let mut images = Vec::with_capacity(page.images.len());
            for (seq, image) in page.images.iter().enumerate() {
                let bytes = self.image_bytes(image, page_index, seq)?;
                images.push(RawImage::new(bytes, image.bbox));
            }
            result.push(PageInput {
                page_index,
                spans: page.spans,
                images,
                links: page.links,
            });
        }

        log::debug!("loaded {} pages from JSON dump", result.len());
        Ok(result)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Dump {
    Document { pages: Vec<DumpPage> },
    Pages(Vec<DumpPage>),
}

#[derive(Deserialize)]
struct DumpHeader {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct DumpPage {
    #[serde(default, alias = "page")]
    page_index: Option<u32>,
    #[serde(default)]
    spans: Vec<RawSpan>,
    #[serde(default)]
    images: Vec<DumpImage>,
    #[serde(default)]
    links: Vec<RawLink>,
}

#[derive(Deserialize)]
struct DumpImage {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    bbox: BBox,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinkTarget;

    #[test]
    fn test_load_document_dump() {
        let json = r#"{
            "name": "report",
            "pages": [
                {"spans": [{"text": "INTRO", "font_size": 24, "is_bold": true}]},
                {"page_index": 3, "spans": [{"text": "Body", "size": 12, "font": "Times-Roman"}],
                 "links": [{"span_index": 0, "target": {"type": "page", "page_index": 0}}]}
            ]
        }"#;
        let source = JsonPageSource::from_json(json);
        assert_eq!(source.name().as_deref(), Some("report"));

        let pages = source.load().unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_index, 0);
        assert_eq!(pages[1].page_index, 3);
        assert_eq!(pages[0].spans[0].is_bold, Some(true));
        assert_eq!(pages[1].spans[0].font_name, "Times-Roman");
        assert_eq!(
            pages[1].links[0].target,
            LinkTarget::Page { page_index: 0 }
        );
    }

    #[test]
    fn test_load_bare_array_with_base64_image() {
        let json = r#"[{"images": [{"data": "iVBORw0KGgo=", "bbox": [0, 0, 10, 10]}]}]"#;
        let pages = JsonPageSource::from_json(json).load().unwrap();
        assert_eq!(
            pages[0].images[0].bytes,
            vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]
        );
        assert_eq!(pages[0].images[0].bbox, BBox::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_image_path_relative_to_dump() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("fig.png"), [1u8, 2, 3]).unwrap();
        let dump = dir.path().join("doc.json");
        fs::write(&dump, r#"[{"images": [{"path": "fig.png"}]}]"#).unwrap();

        let source = JsonPageSource::open(&dump).unwrap();
        assert_eq!(source.name().as_deref(), Some("doc"));
        let pages = source.load().unwrap();
        assert_eq!(pages[0].images[0].bytes, vec![1, 2, 3]);
    }

    #[test]
    fn test_corrupt_dump_is_extraction_error() {
        let err = JsonPageSource::from_json("{\"pages\": 7").load().unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));

        let err = JsonPageSource::from_json(r#"[{"images": [{"data": "***"}]}]"#)
            .load()
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }
}
