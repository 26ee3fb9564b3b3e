//! Shared data types
//!
//! - CatalogEntry: one product record from the catalog document
//! - ImageDescriptor: one image file discovered by a directory scan
//! - MatchDecision: what happened to one catalog entry during a run

use crate::normalizer::normalize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Product identifier. Catalogs mix numeric and string ids.
///
/// With `arbitrary_precision` an untagged number only deserializes from a
/// `serde_json::Value`, not straight from text; catalogs are read that way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryId {
    Number(u64),
    Text(String),
}

impl EntryId {
    /// Numeric value, also for digit-only strings ("42").
    pub fn numeric(&self) -> Option<u64> {
        match self {
            EntryId::Number(n) => Some(*n),
            EntryId::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryId::Number(n) => write!(f, "{}", n),
            EntryId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        EntryId::Text(value.to_string())
    }
}

impl From<u64> for EntryId {
    fn from(value: u64) -> Self {
        EntryId::Number(value)
    }
}

/// One product record. Fields the engine does not know about are kept in
/// `extra` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntryId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Primary image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Alternate image references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,

    /// Set for records read from a catalog file
    #[serde(skip)]
    pub origin: Option<EntryOrigin>,
}

/// Where a record sat in the catalog file and how its keys were ordered.
/// Lets a rewrite put every record back the way it was read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryOrigin {
    /// Index in the product list, counting unreadable records too
    pub position: usize,
    pub field_order: Vec<String>,
}

impl CatalogEntry {
    pub fn new(id: impl Into<EntryId>, name: &str) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// All image references, primary first.
    pub fn image_refs(&self) -> Vec<&str> {
        self.image
            .iter()
            .chain(self.images.iter().flatten())
            .map(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
            .collect()
    }

    pub fn primary_image(&self) -> Option<&str> {
        self.image_refs().into_iter().next()
    }

    /// Name with surrounding whitespace removed, `None` when blank.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    /// Replace every image reference with a single primary image.
    /// An existing `images` field is emptied rather than dropped.
    pub fn set_sole_image(&mut self, reference: String) {
        self.image = Some(reference);
        if let Some(images) = self.images.as_mut() {
            images.clear();
        }
    }

    /// Id for reports; entries without id are labelled by their position in
    /// the file, or by `position` when not read from one.
    pub fn label(&self, position: usize) -> String {
        match (&self.id, &self.origin) {
            (Some(id), _) => id.to_string(),
            (None, Some(origin)) => format!("#{}", origin.position),
            (None, None) => format!("#{}", position),
        }
    }
}

/// One image file found on disk
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptor {
    pub absolute_path: PathBuf,
    /// Name of the directory holding the file
    pub category: String,
    pub filename: String,
    /// Lowercase extension without the dot
    pub extension: String,
    /// `normalize(stem)`, recomputed on every scan
    #[serde(skip)]
    pub normalized_key: String,
}

impl ImageDescriptor {
    /// Describe an image path. Returns `None` for paths without a file name
    /// or extension. Does not touch the filesystem.
    pub fn from_path(path: &Path) -> Option<Self> {
        let filename = path.file_name()?.to_string_lossy().to_string();
        let extension = path.extension()?.to_string_lossy().to_lowercase();
        let category = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        Some(Self {
            absolute_path: path.to_path_buf(),
            category,
            filename,
            extension,
            normalized_key: normalize(&stem),
        })
    }

    /// Filename without extension
    pub fn stem(&self) -> &str {
        match self.filename.rfind('.') {
            Some(dot) if dot > 0 => &self.filename[..dot],
            _ => &self.filename,
        }
    }
}

/// Matching strategy that produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchTier {
    Exact,
    TokenSubset,
    KeywordCategory,
    None,
}

impl std::fmt::Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchTier::Exact => write!(f, "exact"),
            MatchTier::TokenSubset => write!(f, "token-subset"),
            MatchTier::KeywordCategory => write!(f, "keyword-category"),
            MatchTier::None => write!(f, "none"),
        }
    }
}

/// Outcome of one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    /// A new image was attached
    Matched,
    /// No acceptable candidate; entry left as-is
    Skipped,
    /// Primary image already resolves; nothing to do
    Unchanged,
    /// Entry is malformed or its match could not be committed
    Error,
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionStatus::Matched => write!(f, "matched"),
            DecisionStatus::Skipped => write!(f, "skipped"),
            DecisionStatus::Unchanged => write!(f, "unchanged"),
            DecisionStatus::Error => write!(f, "error"),
        }
    }
}

/// Decision for one catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDecision {
    pub catalog_entry_id: String,
    #[serde(default)]
    pub entry_name: String,
    pub chosen_image: Option<ImageDescriptor>,
    /// Reference written into the catalog for a matched image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    pub tier: MatchTier,
    pub score: f64,
    pub status: DecisionStatus,
    pub rationale: String,
}

impl MatchDecision {
    /// A decision that attaches no image.
    pub fn without_image(
        catalog_entry_id: &str,
        entry_name: &str,
        status: DecisionStatus,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            catalog_entry_id: catalog_entry_id.to_string(),
            entry_name: entry_name.to_string(),
            chosen_image: None,
            image_ref: None,
            tier: MatchTier::None,
            score: 0.0,
            status,
            rationale: rationale.into(),
        }
    }

    /// A decision attaching `image` found by `tier`.
    pub fn matched(
        catalog_entry_id: &str,
        entry_name: &str,
        image: ImageDescriptor,
        tier: MatchTier,
        score: f64,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            catalog_entry_id: catalog_entry_id.to_string(),
            entry_name: entry_name.to_string(),
            chosen_image: Some(image),
            image_ref: None,
            tier,
            score,
            status: DecisionStatus::Matched,
            rationale: rationale.into(),
        }
    }

    pub fn is_match(&self) -> bool {
        self.status == DecisionStatus::Matched && self.chosen_image.is_some()
    }
}
