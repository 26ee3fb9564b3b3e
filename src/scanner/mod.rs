//! Candidate index
//!
//! Scans image directories and indexes every supported image under several
//! keys (normalized stem, normalized filename, raw lowercase filename).
//! Stem tokens are computed once per image here, not once per catalog entry.
//!
//! Directories are scanned in parallel, but each directory's files are
//! sorted and directories are merged in the order given, so the index is the
//! same whatever order the filesystem enumerates entries in. On a key
//! collision the first-seen image keeps the key and the collision is
//! recorded.

use catalog_recon_common::{normalize, tokenize, ImageDescriptor};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "avif", "gif", "svg"];

/// Check if a file extension is a supported image format (case-insensitive)
pub fn is_image_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Descend into subdirectories
    pub recursive: bool,
}

/// Two images competing for one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyCollision {
    pub key: String,
    pub kept: PathBuf,
    pub discarded: PathBuf,
}

/// A directory (or an entry inside one) that could not be read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryError {
    pub directory: PathBuf,
    pub message: String,
}

#[derive(Debug, Default)]
struct DirectoryScan {
    images: Vec<ImageDescriptor>,
    errors: Vec<DirectoryError>,
}

#[derive(Debug, Clone, Default)]
pub struct CandidateIndex {
    directories: Vec<PathBuf>,
    options: ScanOptions,
    descriptors: Vec<ImageDescriptor>,
    /// Stem tokens per descriptor, no length filter applied
    tokens: Vec<Vec<String>>,
    keys: HashMap<String, usize>,
    /// Every descriptor per stem key; `keys` only holds the first-seen one
    stems: HashMap<String, Vec<usize>>,
    collisions: Vec<KeyCollision>,
    directory_errors: Vec<DirectoryError>,
}

/// Scan `directories` and build an index. Never fails as a whole: unreadable
/// directories end up in `directory_errors()`.
pub fn build_index(directories: &[PathBuf], options: ScanOptions) -> CandidateIndex {
    let scans: Vec<DirectoryScan> = directories
        .par_iter()
        .map(|dir| scan_directory(dir, options))
        .collect();

    let mut index = CandidateIndex {
        directories: directories.to_vec(),
        options,
        ..Default::default()
    };

    for scan in scans {
        index.directory_errors.extend(scan.errors);
        for image in scan.images {
            index.register(image);
        }
    }

    info!(
        images = index.descriptors.len(),
        directories = directories.len(),
        collisions = index.collisions.len(),
        errors = index.directory_errors.len(),
        "candidate index built"
    );

    index
}

fn scan_directory(dir: &Path, options: ScanOptions) -> DirectoryScan {
    let mut scan = DirectoryScan::default();

    let root = match dir.canonicalize() {
        Ok(root) if root.is_dir() => root,
        Ok(_) => {
            warn!(directory = %dir.display(), "not a directory, skipped");
            scan.errors.push(DirectoryError {
                directory: dir.to_path_buf(),
                message: "not a directory".into(),
            });
            return scan;
        }
        Err(e) => {
            warn!(directory = %dir.display(), error = %e, "image directory unavailable, skipped");
            scan.errors.push(DirectoryError {
                directory: dir.to_path_buf(),
                message: e.to_string(),
            });
            return scan;
        }
    };

    let max_depth = if options.recursive { usize::MAX } else { 1 };

    for entry in WalkDir::new(&root).min_depth(1).max_depth(max_depth) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(directory = %dir.display(), error = %e, "unreadable entry skipped");
                scan.errors.push(DirectoryError {
                    directory: e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf()),
                    message: e.to_string(),
                });
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let supported = path
            .extension()
            .map(|ext| is_image_extension(&ext.to_string_lossy()))
            .unwrap_or(false);
        if !supported {
            continue;
        }

        if let Some(image) = ImageDescriptor::from_path(path) {
            scan.images.push(image);
        }
    }

    // Path order, independent of enumeration order
    scan.images.sort_by(|a, b| a.absolute_path.cmp(&b.absolute_path));

    debug!(directory = %root.display(), images = scan.images.len(), "directory scanned");
    scan
}

impl CandidateIndex {
    /// Index pre-built descriptors in the given order. No filesystem access.
    pub fn from_descriptors(descriptors: Vec<ImageDescriptor>) -> Self {
        let mut index = Self::default();
        for image in descriptors {
            index.register(image);
        }
        index
    }

    fn register(&mut self, image: ImageDescriptor) {
        let position = self.descriptors.len();
        if !image.normalized_key.is_empty() {
            self.stems
                .entry(image.normalized_key.clone())
                .or_default()
                .push(position);
        }
        let keys = [
            image.normalized_key.clone(),
            normalize(&image.filename),
            image.filename.to_lowercase(),
        ];

        for key in keys {
            if key.is_empty() {
                continue;
            }
            match self.keys.get(&key) {
                Some(&existing) if existing != position => {
                    let kept = &self.descriptors[existing];
                    debug!(key = %key, kept = %kept.absolute_path.display(), discarded = %image.absolute_path.display(), "key collision");
                    self.collisions.push(KeyCollision {
                        key,
                        kept: kept.absolute_path.clone(),
                        discarded: image.absolute_path.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    self.keys.insert(key, position);
                }
            }
        }

        self.tokens.push(tokenize(image.stem(), 0));
        self.descriptors.push(image);
    }

    /// Image registered under `key`, first-seen wins.
    pub fn exact_lookup(&self, key: &str) -> Option<&ImageDescriptor> {
        if key.is_empty() {
            return None;
        }
        self.keys.get(key).map(|&i| &self.descriptors[i])
    }

    /// Every image whose normalized stem is `key`, in index order. Unlike
    /// `exact_lookup`, later images with the same stem are not shadowed.
    pub fn stem_matches<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a ImageDescriptor> + 'a {
        self.stems
            .get(key)
            .into_iter()
            .flatten()
            .map(move |&i| &self.descriptors[i])
    }

    /// Every image with its stem tokens, in index order. Tokens keep every
    /// length; callers drop the ones too short for them.
    pub fn tokenized_candidates(&self) -> impl Iterator<Item = (&ImageDescriptor, &[String])> + '_ {
        self.descriptors
            .iter()
            .zip(self.tokens.iter().map(Vec::as_slice))
    }

    /// Every indexed image in index order. Each call starts over.
    pub fn all_candidates(&self) -> impl Iterator<Item = &ImageDescriptor> + '_ {
        self.descriptors.iter()
    }

    /// Scan the same directories again and return a fresh index.
    pub fn rescan(&self) -> CandidateIndex {
        build_index(&self.directories, self.options)
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    pub fn collisions(&self) -> &[KeyCollision] {
        &self.collisions
    }

    pub fn directory_errors(&self) -> &[DirectoryError] {
        &self.directory_errors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
