//! Image assets extracted from the source document.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use super::BBox;

/// An embedded raster image, identified by the hash of its bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAsset {
    /// Page the image was placed on (0-indexed)
    pub page_index: u32,

    /// Position among the page's images in extraction order
    pub sequence_on_page: u32,

    /// Raw encoded bytes
    #[serde(skip_serializing, default)]
    pub bytes: Vec<u8>,

    /// Lowercase hex MD5 of `bytes`
    pub content_hash: String,

    /// Placement on the page
    pub bbox: BBox,
}

impl ImageAsset {
    /// Create an asset, hashing its bytes.
    pub fn new(page_index: u32, sequence_on_page: u32, bytes: Vec<u8>, bbox: BBox) -> Self {
        let content_hash = content_hash(&bytes);
        Self {
            page_index,
            sequence_on_page,
            bytes,
            content_hash,
            bbox,
        }
    }

    /// Short hash used for output filenames.
    pub fn short_hash(&self) -> &str {
        let end = self.content_hash.len().min(8);
        &self.content_hash[..end]
    }

    /// Get the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// MIME type sniffed from the payload.
    pub fn mime_type(&self) -> Option<&'static str> {
        detect_mime_type(&self.bytes)
    }

    /// File extension for the payload, `png` when unrecognized.
    pub fn extension(&self) -> &'static str {
        match self.mime_type() {
            Some("image/jpeg") => "jpg",
            Some("image/gif") => "gif",
            Some("image/tiff") => "tiff",
            Some("image/bmp") => "bmp",
            Some("image/webp") => "webp",
            Some("image/jp2") => "jp2",
            _ => "png",
        }
    }
}

/// Hex MD5 digest of a byte payload.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Detect MIME type from data magic bytes.
pub fn detect_mime_type(data: &[u8]) -> Option<&'static str> {
    if data.len() < 4 {
        return None;
    }

    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }

    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }

    // TIFF: little-endian or big-endian
    if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
        return Some("image/tiff");
    }

    if data.starts_with(b"BM") {
        return Some("image/bmp");
    }

    // WEBP: RIFF....WEBP
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }

    // JPEG 2000: 00 00 00 0C 6A 50 20 20
    if data.starts_with(&[0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20]) {
        return Some("image/jp2");
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable() {
        // md5("abc")
        assert_eq!(content_hash(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
        let asset = ImageAsset::new(0, 0, b"abc".to_vec(), BBox::default());
        assert_eq!(asset.short_hash(), "90015098");
    }

    #[test]
    fn test_detect_mime_type() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
        assert_eq!(detect_mime_type(&jpeg), Some("image/jpeg"));

        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(detect_mime_type(&png), Some("image/png"));

        assert_eq!(detect_mime_type(&[0, 0, 0, 0]), None);
    }

    #[test]
    fn test_extension_fallback() {
        let jpeg = ImageAsset::new(0, 0, vec![0xFF, 0xD8, 0xFF, 0xE0], BBox::default());
        assert_eq!(jpeg.extension(), "jpg");

        let unknown = ImageAsset::new(0, 0, vec![1, 2, 3, 4, 5], BBox::default());
        assert_eq!(unknown.extension(), "png");
    }
}
