//! Reconciler
//!
//! Walks the catalog in order and decides, per entry, whether its image is
//! fine, can be repaired from the candidate index, or has to be left alone.
//! Entries are taken by value and handed back with the applied changes.

pub mod duplicates;

use crate::matcher::Matcher;
use crate::resolver::ImageResolver;
use crate::scanner::CandidateIndex;
use catalog_recon_common::{CatalogEntry, DecisionStatus, MatchDecision};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info};

pub use duplicates::{detect_duplicates, remove_duplicates, DuplicateGroup, DuplicateReason};

/// An image reference rewritten during this run, with what it replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageChange {
    /// Position of the entry in the catalog
    pub position: usize,
    /// Index into `Reconciliation::decisions`
    pub decision_index: usize,
    pub previous_image: Option<String>,
    pub previous_images: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub entries: Vec<CatalogEntry>,
    /// One decision per entry, catalog order
    pub decisions: Vec<MatchDecision>,
    pub changes: Vec<ImageChange>,
}

impl Reconciliation {
    pub fn count(&self, status: DecisionStatus) -> usize {
        self.decisions.iter().filter(|d| d.status == status).count()
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Put the entry of `change` back the way it was read.
    pub fn revert(&mut self, change: &ImageChange) {
        if let Some(entry) = self.entries.get_mut(change.position) {
            entry.image = change.previous_image.clone();
            entry.images = change.previous_images.clone();
        }
    }
}

/// Reconcile every entry against `index`.
///
/// Images already used by an entry whose primary reference resolves are
/// claimed up front, and every image attached here is claimed as it is
/// attached, so no image ends up on two entries.
pub fn reconcile<R: ImageResolver + ?Sized>(
    entries: Vec<CatalogEntry>,
    index: &CandidateIndex,
    matcher: &Matcher,
    resolver: &R,
) -> Reconciliation {
    let mut claimed: HashSet<PathBuf> = entries
        .iter()
        .filter_map(|entry| entry.primary_image())
        .filter_map(|reference| resolver.resolve(reference))
        .collect();

    let mut result = Reconciliation {
        decisions: Vec::with_capacity(entries.len()),
        ..Default::default()
    };
    let mut entries = entries;

    for (position, entry) in entries.iter_mut().enumerate() {
        let label = entry.label(position);
        let name = entry.name.clone().unwrap_or_default();

        let decision = if entry.id.is_none() {
            MatchDecision::without_image(&label, &name, DecisionStatus::Error, "entry has no id")
        } else if entry.display_name().is_none() {
            MatchDecision::without_image(&label, &name, DecisionStatus::Error, "entry has no name")
        } else if let Some(reference) = entry
            .primary_image()
            .filter(|reference| resolver.resolve(reference).is_some())
        {
            MatchDecision::without_image(
                &label,
                &name,
                DecisionStatus::Unchanged,
                format!("primary image {} resolves", reference),
            )
        } else {
            let mut decision = matcher.match_entry(&label, name.trim(), index, &claimed);
            if let Some(image) = decision.chosen_image.as_ref().filter(|_| decision.is_match()) {
                let reference = resolver.reference_for(image);
                claimed.insert(image.absolute_path.clone());
                result.changes.push(ImageChange {
                    position,
                    decision_index: result.decisions.len(),
                    previous_image: entry.image.clone(),
                    previous_images: entry.images.clone(),
                });
                entry.set_sole_image(reference.clone());
                decision.image_ref = Some(reference);
            }
            decision
        };

        debug!(
            entry = %decision.catalog_entry_id,
            status = %decision.status,
            tier = %decision.tier,
            score = decision.score,
            "{}",
            decision.rationale
        );
        result.decisions.push(decision);
    }

    result.entries = entries;

    info!(
        entries = result.entries.len(),
        matched = result.count(DecisionStatus::Matched),
        skipped = result.count(DecisionStatus::Skipped),
        unchanged = result.count(DecisionStatus::Unchanged),
        errors = result.count(DecisionStatus::Error),
        "reconciliation finished"
    );

    result
}


#[cfg(test)]
mod tests {
    use super::test_support::MapResolver;
    use super::*;
    use catalog_recon_common::{ImageDescriptor, MatchTier};
    use std::path::Path;

    fn index(paths: &[&str]) -> CandidateIndex {
        CandidateIndex::from_descriptors(
            paths
                .iter()
                .map(|p| ImageDescriptor::from_path(Path::new(p)).unwrap())
                .collect(),
        )
    }

    fn entry(id: u64, name: &str, image: Option<&str>) -> CatalogEntry {
        let mut entry = CatalogEntry::new(id, name);
        entry.image = image.map(str::to_string);
        entry
    }

    #[test]
    fn test_broken_image_is_repaired() {
        let index = index(&["/img/New Images/Apple Cider Vinegar.jpg"]);
        let entries = vec![entry(5, "Apple Cider Vinegar", Some("/images/missing.jpg"))];

        let result = reconcile(entries, &index, &Matcher::default(), &MapResolver::default());

        let decision = &result.decisions[0];
        assert_eq!(decision.status, DecisionStatus::Matched);
        assert_eq!(decision.tier, MatchTier::Exact);
        assert_eq!(decision.image_ref.as_deref(), Some("/images/New Images/Apple Cider Vinegar.jpg"));
        assert_eq!(
            result.entries[0].image.as_deref(),
            Some("/images/New Images/Apple Cider Vinegar.jpg")
        );
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].previous_image.as_deref(), Some("/images/missing.jpg"));
    }

    #[test]
    fn test_resolving_image_is_unchanged() {
        let index = index(&["/img/Produce/Yam.jpg"]);
        let resolver = MapResolver::with(&[("/images/yam-old.jpg", "/old/yam.jpg")]);
        let entries = vec![entry(1, "Yam", Some("/images/yam-old.jpg"))];

        let result = reconcile(entries, &index, &Matcher::default(), &resolver);
        assert_eq!(result.decisions[0].status, DecisionStatus::Unchanged);
        assert_eq!(result.entries[0].image.as_deref(), Some("/images/yam-old.jpg"));
        assert!(!result.has_changes());
    }

    #[test]
    fn test_malformed_entries_are_errors_not_aborts() {
        let index = index(&["/img/Produce/Yam.jpg"]);
        let mut no_id = entry(1, "Yam", None);
        no_id.id = None;
        let mut no_name = entry(2, "", None);
        no_name.name = None;
        let entries = vec![no_id, no_name, entry(3, "Yam", None)];

        let result = reconcile(entries, &index, &Matcher::default(), &MapResolver::default());
        assert_eq!(result.decisions[0].status, DecisionStatus::Error);
        assert_eq!(result.decisions[0].catalog_entry_id, "#0");
        assert_eq!(result.decisions[1].status, DecisionStatus::Error);
        assert_eq!(result.decisions[2].status, DecisionStatus::Matched);
        assert_eq!(result.entries[0].image, None);
    }

    #[test]
    fn test_no_image_is_claimed_twice() {
        let index = index(&["/img/Produce/Yam.jpg"]);
        let entries = vec![entry(1, "Yam", None), entry(2, "yam", None)];

        let result = reconcile(entries, &index, &Matcher::default(), &MapResolver::default());
        assert_eq!(result.decisions[0].status, DecisionStatus::Matched);
        assert_eq!(result.decisions[1].status, DecisionStatus::Skipped);
        assert!(result.decisions[1].rationale.contains("already claimed"));
        assert_eq!(result.entries[1].image, None);
    }

    #[test]
    fn test_images_in_use_are_preclaimed() {
        // Entry 2 already shows Yam.jpg; entry 1 comes first but must not take it.
        let index = index(&["/img/Produce/Yam.jpg"]);
        let resolver = MapResolver::with(&[("/images/Produce/Yam.jpg", "/img/Produce/Yam.jpg")]);
        let entries = vec![
            entry(1, "Yam", Some("/broken.jpg")),
            entry(2, "Yellow Yam", Some("/images/Produce/Yam.jpg")),
        ];

        let result = reconcile(entries, &index, &Matcher::default(), &resolver);
        assert_eq!(result.decisions[0].status, DecisionStatus::Skipped);
        assert_eq!(result.entries[0].image.as_deref(), Some("/broken.jpg"));
        assert_eq!(result.decisions[1].status, DecisionStatus::Unchanged);
    }

    #[test]
    fn test_match_clears_alternates_and_revert_restores_them() {
        let index = index(&["/img/Produce/Yam.jpg"]);
        let mut yam = entry(1, "Yam", Some("/broken.jpg"));
        yam.images = Some(vec!["/also-broken.jpg".into()]);

        let mut result = reconcile(vec![yam], &index, &Matcher::default(), &MapResolver::default());
        assert_eq!(result.entries[0].images, Some(vec![]));

        let change = result.changes[0].clone();
        result.revert(&change);
        assert_eq!(result.entries[0].image.as_deref(), Some("/broken.jpg"));
        assert_eq!(result.entries[0].images, Some(vec!["/also-broken.jpg".to_string()]));
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let index = index(&["/img/Produce/Yam.jpg", "/img/Beverages/Malta Goya.jpg"]);
        let entries = vec![entry(1, "Yam", None), entry(2, "Malta Goya", Some("/x.jpg"))];

        let first = reconcile(entries, &index, &Matcher::default(), &MapResolver::default());
        assert_eq!(first.count(DecisionStatus::Matched), 2);

        let resolver = MapResolver::with(&[
            ("/images/Produce/Yam.jpg", "/img/Produce/Yam.jpg"),
            ("/images/Beverages/Malta Goya.jpg", "/img/Beverages/Malta Goya.jpg"),
        ]);
        let second = reconcile(first.entries.clone(), &index, &Matcher::default(), &resolver);
        assert_eq!(second.count(DecisionStatus::Matched), 0);
        assert_eq!(second.count(DecisionStatus::Unchanged), 2);
        assert_eq!(second.entries, first.entries);
    }
}
