//! Duplicate product detection
//!
//! Two entries are duplicates when their names normalize to the same key or
//! their primary images resolve to the same file. Each group keeps one
//! canonical entry, chosen by an ordering shared by all groups:
//!
//! 1. `createdBy` not an auto-generated tag
//! 2. numerically smallest id (non-numeric ids after all numeric ones)
//! 3. id text
//! 4. catalog position

use crate::resolver::ImageResolver;
use catalog_recon_common::{normalize, CatalogEntry};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateReason {
    SameName,
    SameImage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub reason: DuplicateReason,
    /// Normalized name or resolved image path
    pub key: String,
    pub canonical_id: String,
    /// Canonical ordering, canonical entry excluded
    pub duplicate_ids: Vec<String>,
    #[serde(skip)]
    pub canonical_position: usize,
    /// Place of the canonical entry in the catalog-wide canonical ordering
    #[serde(skip)]
    pub canonical_rank: usize,
    #[serde(skip)]
    pub duplicate_positions: Vec<usize>,
}

/// Sort key for the canonical ordering.
#[derive(Debug)]
struct CanonicalKey {
    auto_generated: bool,
    numeric_id: Option<u64>,
    id_text: String,
    position: usize,
}

impl CanonicalKey {
    fn new(entry: &CatalogEntry, position: usize, auto_tags: &[String]) -> Self {
        let auto_generated = entry
            .created_by
            .as_deref()
            .map(|tag| auto_tags.iter().any(|t| t.eq_ignore_ascii_case(tag.trim())))
            .unwrap_or(false);
        let (numeric_id, id_text) = match &entry.id {
            Some(id) => (id.numeric(), id.to_string()),
            None => (None, String::new()),
        };
        Self {
            auto_generated,
            numeric_id,
            id_text,
            position,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        // Numeric ids first; `None < Some` would put them last.
        let numeric = match (self.numeric_id, other.numeric_id) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        self.auto_generated
            .cmp(&other.auto_generated)
            .then(numeric)
            .then_with(|| self.id_text.cmp(&other.id_text))
            .then(self.position.cmp(&other.position))
    }
}

/// Find groups of duplicate entries. Entries without an id are ignored.
pub fn detect_duplicates<R: ImageResolver + ?Sized>(
    entries: &[CatalogEntry],
    resolver: &R,
    auto_tags: &[String],
) -> Vec<DuplicateGroup> {
    let mut by_name: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut by_image: BTreeMap<String, Vec<usize>> = BTreeMap::new();

    for (position, entry) in entries.iter().enumerate() {
        if entry.id.is_none() {
            continue;
        }
        if let Some(key) = entry.name.as_deref().map(normalize).filter(|k| !k.is_empty()) {
            by_name.entry(key).or_default().push(position);
        }
        if let Some(path) = entry.primary_image().and_then(|r| resolver.resolve(r)) {
            by_image
                .entry(path.display().to_string())
                .or_default()
                .push(position);
        }
    }

    let keys: Vec<CanonicalKey> = entries
        .iter()
        .enumerate()
        .map(|(position, entry)| CanonicalKey::new(entry, position, auto_tags))
        .collect();

    let mut ordered: Vec<usize> = (0..entries.len()).collect();
    ordered.sort_by(|a, b| keys[*a].compare(&keys[*b]));
    let mut ranks = vec![0; entries.len()];
    for (rank, &position) in ordered.iter().enumerate() {
        ranks[position] = rank;
    }

    let mut groups = Vec::new();
    for (reason, grouped) in [
        (DuplicateReason::SameName, by_name),
        (DuplicateReason::SameImage, by_image),
    ] {
        for (key, mut positions) in grouped {
            if positions.len() < 2 {
                continue;
            }
            positions.sort_by(|a, b| keys[*a].compare(&keys[*b]));
            let canonical_position = positions[0];
            let duplicate_positions = positions[1..].to_vec();

            debug!(reason = ?reason, key = %key, canonical = canonical_position, "duplicate group");
            groups.push(DuplicateGroup {
                reason,
                key,
                canonical_id: entries[canonical_position].label(canonical_position),
                duplicate_ids: duplicate_positions
                    .iter()
                    .map(|&p| entries[p].label(p))
                    .collect(),
                canonical_position,
                canonical_rank: ranks[canonical_position],
                duplicate_positions,
            });
        }
    }

    if !groups.is_empty() {
        info!(groups = groups.len(), "duplicates detected");
    }
    groups
}

/// Drop the duplicates of every group whose canonical entry survives.
///
/// Groups are applied in canonical order of their canonical entry. A group
/// only removes entries ranked after its canonical one, so once a group is
/// reached its canonical entry's fate is settled. A group whose canonical
/// entry was removed by an earlier group removes nothing.
pub fn remove_duplicates(
    entries: Vec<CatalogEntry>,
    groups: &[DuplicateGroup],
) -> (Vec<CatalogEntry>, usize) {
    let mut ordered: Vec<&DuplicateGroup> = groups.iter().collect();
    ordered.sort_by_key(|g| g.canonical_rank);

    let mut flagged: HashSet<usize> = HashSet::new();
    for group in ordered {
        if flagged.contains(&group.canonical_position) {
            debug!(key = %group.key, canonical = %group.canonical_id, "canonical entry already removed, group kept");
            continue;
        }
        flagged.extend(group.duplicate_positions.iter().copied());
    }

    let before = entries.len();
    let kept: Vec<CatalogEntry> = entries
        .into_iter()
        .enumerate()
        .filter(|(position, _)| !flagged.contains(position))
        .map(|(_, entry)| entry)
        .collect();

    let removed = before - kept.len();
    if removed > 0 {
        info!(removed, "duplicate entries removed");
    }
    (kept, removed)
}
