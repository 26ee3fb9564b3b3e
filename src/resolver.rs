//! Image reference resolution
//!
//! Catalog entries hold image references as strings ("/images/Tea/Lipton.jpg").
//! The reconciler needs to know whether a reference points at an existing
//! file, and which reference string to write for a newly matched image.

use crate::error::Result;
use catalog_recon_common::ImageDescriptor;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Component, Path, PathBuf};

lazy_static! {
    static ref EXTERNAL_RE: Regex =
        Regex::new(r"^(?i)https?://").expect("invalid regex");
}

pub trait ImageResolver {
    /// File a reference points at, or `None` when it is broken.
    fn resolve(&self, reference: &str) -> Option<PathBuf>;

    /// Reference string to store for `image`.
    fn reference_for(&self, image: &ImageDescriptor) -> String;
}

/// Resolves references against an asset root on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsResolver {
    root: PathBuf,
    prefix: String,
    placeholder: Option<Regex>,
}

impl FsResolver {
    pub fn new(root: &Path) -> Self {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        Self {
            root,
            prefix: "/".into(),
            placeholder: None,
        }
    }

    /// Prefix written in front of the root-relative path of a new image.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// References matching `pattern` are treated as "no image".
    pub fn with_placeholder(mut self, pattern: Option<&str>) -> Result<Self> {
        self.placeholder = pattern.map(Regex::new).transpose()?;
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_placeholder(&self, reference: &str) -> bool {
        self.placeholder
            .as_ref()
            .map(|re| re.is_match(reference.trim()))
            .unwrap_or(false)
    }

    pub fn is_external(reference: &str) -> bool {
        EXTERNAL_RE.is_match(reference.trim())
    }
}

impl ImageResolver for FsResolver {
    fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let reference = reference.trim();
        if reference.is_empty() || self.is_placeholder(reference) {
            return None;
        }
        // Remote assets cannot be checked here; they count as present.
        if Self::is_external(reference) {
            return Some(PathBuf::from(reference));
        }

        let relative = reference.trim_start_matches(['/', '\\']);
        let under_root = self.root.join(relative);
        if under_root.is_file() {
            return under_root.canonicalize().ok().or(Some(under_root));
        }

        let as_given = Path::new(reference);
        if as_given.is_absolute() && as_given.is_file() {
            return as_given.canonicalize().ok();
        }

        None
    }

    fn reference_for(&self, image: &ImageDescriptor) -> String {
        match image.absolute_path.strip_prefix(&self.root) {
            Ok(relative) => {
                let parts: Vec<String> = relative
                    .components()
                    .filter_map(|c| match c {
                        Component::Normal(part) => Some(part.to_string_lossy().to_string()),
                        _ => None,
                    })
                    .collect();
                format!("{}{}", self.prefix, parts.join("/"))
            }
            Err(_) => image.absolute_path.display().to_string(),
        }
    }
}
