//! Content-addressed image file naming.

use std::collections::{HashMap, HashSet};

use super::ImageFile;
use crate::model::ImageAsset;

/// Assigns each distinct image a stable file name.
///
/// Names are the first eight hex digits of the content hash plus the sniffed
/// extension. Identical content shares one file; two different images whose
/// hashes share a prefix get `-2`, `-3`, ... suffixes in first-seen order.
#[derive(Debug, Default)]
pub struct AssetNamer {
    prefix: String,
    by_hash: HashMap<String, usize>,
    taken: HashSet<String>,
    files: Vec<ImageFile>,
}

impl AssetNamer {
    /// Create a namer whose relative paths start with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Register an asset and return the path to reference it by.
    pub fn path_for(&mut self, asset: &ImageAsset) -> &str {
        let index = match self.by_hash.get(&asset.content_hash) {
            Some(&index) => index,
            None => {
                let filename = self.unique_name(asset);
                self.taken.insert(filename.clone());
                self.files.push(ImageFile {
                    relative_path: format!("{}{}", self.prefix, filename),
                    filename,
                    bytes: asset.bytes.clone(),
                });
                let index = self.files.len() - 1;
                self.by_hash.insert(asset.content_hash.clone(), index);
                index
            }
        };
        &self.files[index].relative_path
    }

    fn unique_name(&self, asset: &ImageAsset) -> String {
        let stem = asset.short_hash();
        let ext = asset.extension();
        let mut name = format!("{}.{}", stem, ext);
        let mut n = 2;
        while self.taken.contains(&name) {
            name = format!("{}-{}.{}", stem, n, ext);
            n += 1;
        }
        name
    }

    /// Number of distinct files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if no image was registered.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Take the registered files.
    pub fn into_files(self) -> Vec<ImageFile> {
        self.files
    }
}
