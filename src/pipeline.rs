//! End-to-end run: load, scan, reconcile, detect duplicates, commit.

use crate::catalog::CatalogDocument;
use crate::error::Result;
use crate::matcher::{MatchOptions, Matcher};
use crate::reconciler::{self, detect_duplicates, remove_duplicates};
use crate::report::ReconciliationReport;
use crate::resolver::FsResolver;
use crate::scanner::{build_index, ScanOptions};
use crate::transaction::{self, CommitOptions};
use catalog_recon_common::KeywordTable;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub catalog_path: PathBuf,
    pub image_dirs: Vec<PathBuf>,
    pub dry_run: bool,
    pub scan: ScanOptions,
    pub match_options: MatchOptions,
    pub keywords: KeywordTable,
    /// Root image references are resolved against; defaults to the
    /// catalog's directory
    pub asset_root: Option<PathBuf>,
    pub ref_prefix: String,
    pub placeholder_pattern: Option<String>,
    pub auto_generated_tags: Vec<String>,
    pub remove_duplicates: bool,
    pub commit: CommitOptions,
}

impl RunOptions {
    pub fn new(catalog_path: &Path, image_dirs: Vec<PathBuf>) -> Self {
        Self {
            catalog_path: catalog_path.to_path_buf(),
            image_dirs,
            dry_run: false,
            scan: ScanOptions::default(),
            match_options: MatchOptions::default(),
            keywords: KeywordTable::builtin(),
            asset_root: None,
            ref_prefix: "/".into(),
            placeholder_pattern: None,
            auto_generated_tags: Vec::new(),
            remove_duplicates: false,
            commit: CommitOptions::default(),
        }
    }

    pub fn asset_root(&self) -> PathBuf {
        self.asset_root.clone().unwrap_or_else(|| {
            match self.catalog_path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            }
        })
    }

    pub fn resolver(&self) -> Result<FsResolver> {
        FsResolver::new(&self.asset_root())
            .with_prefix(&self.ref_prefix)
            .with_placeholder(self.placeholder_pattern.as_deref())
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub report: ReconciliationReport,
    pub report_path: PathBuf,
    /// Set when the catalog was rewritten
    pub backup_path: Option<PathBuf>,
    pub document: CatalogDocument,
}

/// Run one reconciliation. `Err` only for fatal errors; everything else ends
/// up in the report.
pub fn run(options: &RunOptions) -> Result<RunOutcome> {
    let mut document = CatalogDocument::load(&options.catalog_path)?;
    info!(
        catalog = %options.catalog_path.display(),
        entries = document.len(),
        unreadable = document.rejected.len(),
        "catalog loaded"
    );

    let resolver = options.resolver()?;
    let index = build_index(&options.image_dirs, options.scan);
    let matcher = Matcher::new(options.match_options.clone(), options.keywords.clone());

    let entries = std::mem::take(&mut document.entries);
    let mut reconciliation = reconciler::reconcile(entries, &index, &matcher, &resolver);
    transaction::verify_matches(&mut reconciliation);

    let duplicates = detect_duplicates(
        &reconciliation.entries,
        &resolver,
        &options.auto_generated_tags,
    );
    let (entries, removed) = if options.remove_duplicates {
        remove_duplicates(reconciliation.entries, &duplicates)
    } else {
        (reconciliation.entries, 0)
    };
    document.entries = entries;

    // Entry decisions are in catalog order with the unreadable records
    // missing; slot those back in by position.
    let mut decisions = reconciliation.decisions;
    for (position, decision) in document.rejected_decisions() {
        decisions.insert(position.min(decisions.len()), decision);
    }

    let mut report = ReconciliationReport::new(&options.catalog_path, &index, options.dry_run);
    report.set_decisions(decisions);
    report.set_duplicates(duplicates, removed);

    let stem = options
        .catalog_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "catalog".into());

    if options.dry_run || !report.has_changes() {
        if !options.dry_run {
            info!("nothing to change, catalog left as is");
        }
        let report_dir = options.commit.report_dir_for(&options.catalog_path);
        let report_path = transaction::write_report(&report, &report_dir, &stem)?;
        return Ok(RunOutcome {
            report,
            report_path,
            backup_path: None,
            document,
        });
    }

    let outcome = transaction::commit(&options.catalog_path, &document, &mut report, &options.commit)?;
    Ok(RunOutcome {
        report,
        report_path: outcome.report_path,
        backup_path: Some(outcome.backup_path),
        document,
    })
}
