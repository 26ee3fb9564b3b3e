//! Reconciliation report
//!
//! One report per run. It is the record of what the run decided and why,
//! and is written in dry-run mode too.

use crate::reconciler::DuplicateGroup;
use crate::scanner::{CandidateIndex, DirectoryError, KeyCollision};
use catalog_recon_common::{DecisionStatus, MatchDecision};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_entries: usize,
    pub matched: usize,
    pub skipped: usize,
    pub unchanged: usize,
    pub errors: usize,
    pub duplicates_found: usize,
    pub duplicates_removed: usize,
}

impl ReportSummary {
    /// Status counts; duplicate figures are left at zero.
    pub fn from_decisions(decisions: &[MatchDecision]) -> Self {
        let count = |status: DecisionStatus| decisions.iter().filter(|d| d.status == status).count();
        Self {
            total_entries: decisions.len(),
            matched: count(DecisionStatus::Matched),
            skipped: count(DecisionStatus::Skipped),
            unchanged: count(DecisionStatus::Unchanged),
            errors: count(DecisionStatus::Error),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    /// RFC 3339, UTC
    pub timestamp: String,
    pub catalog_path: PathBuf,
    pub image_directories: Vec<PathBuf>,
    pub dry_run: bool,
    pub summary: ReportSummary,
    pub decisions: Vec<MatchDecision>,
    pub duplicates: Vec<DuplicateGroup>,
    pub key_collisions: Vec<KeyCollision>,
    pub directory_errors: Vec<DirectoryError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    /// Error that stopped the commit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal: Option<String>,
}

impl ReconciliationReport {
    pub fn new(catalog_path: &Path, index: &CandidateIndex, dry_run: bool) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            catalog_path: catalog_path.to_path_buf(),
            image_directories: index.directories().to_vec(),
            dry_run,
            summary: ReportSummary::default(),
            decisions: Vec::new(),
            duplicates: Vec::new(),
            key_collisions: index.collisions().to_vec(),
            directory_errors: index.directory_errors().to_vec(),
            backup_path: None,
            fatal: None,
        }
    }

    pub fn set_decisions(&mut self, decisions: Vec<MatchDecision>) {
        self.decisions = decisions;
        self.refresh_summary();
    }

    pub fn set_duplicates(&mut self, duplicates: Vec<DuplicateGroup>, removed: usize) {
        self.duplicates = duplicates;
        self.summary.duplicates_removed = removed;
        self.refresh_summary();
    }

    /// Recount the summary from `decisions` and `duplicates`.
    pub fn refresh_summary(&mut self) {
        let removed = self.summary.duplicates_removed;
        self.summary = ReportSummary {
            duplicates_found: self.duplicates.iter().map(|g| g.duplicate_ids.len()).sum(),
            duplicates_removed: removed,
            ..ReportSummary::from_decisions(&self.decisions)
        };
    }

    /// Matched or removed anything the catalog would have to be rewritten for.
    pub fn has_changes(&self) -> bool {
        self.summary.matched > 0 || self.summary.duplicates_removed > 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn print_summary(&self) {
        let s = &self.summary;
        println!("📊 Summary{}", if self.dry_run { " (dry run)" } else { "" });
        println!("  entries:    {}", s.total_entries);
        println!("  matched:    {}", s.matched);
        println!("  skipped:    {}", s.skipped);
        println!("  unchanged:  {}", s.unchanged);
        println!("  errors:     {}", s.errors);
        println!("  duplicates: {} found, {} removed", s.duplicates_found, s.duplicates_removed);
        if !self.directory_errors.is_empty() {
            println!("  ⚠ {} image director(y/ies) could not be read", self.directory_errors.len());
        }
        if !self.key_collisions.is_empty() {
            println!("  ⚠ {} key collision(s) in the image index", self.key_collisions.len());
        }
        if let Some(backup) = &self.backup_path {
            println!("  backup:     {}", backup.display());
        }
        if let Some(fatal) = &self.fatal {
            println!("  ✖ {}", fatal);
        }
    }
}
