//! Transaction writer
//!
//! The only code that writes the catalog file. A commit is:
//!
//! 1. copy the catalog to a timestamped backup and verify it byte for byte
//! 2. write the new catalog to a temp file next to it and rename it over
//! 3. write the report
//!
//! Nothing touches the catalog until step 1 has succeeded.

use crate::catalog::CatalogDocument;
use crate::error::{ReconError, Result};
use crate::reconciler::Reconciliation;
use crate::report::ReconciliationReport;
use catalog_recon_common::DecisionStatus;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

/// Attempts before giving up on finding a free backup/report name.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Where backups and reports go. `None` means next to the catalog, in
/// `backups/` and `reports/`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitOptions {
    pub backup_dir: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
}

impl CommitOptions {
    pub fn backup_dir_for(&self, catalog_path: &Path) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| parent_dir(catalog_path).join("backups"))
    }

    pub fn report_dir_for(&self, catalog_path: &Path) -> PathBuf {
        self.report_dir
            .clone()
            .unwrap_or_else(|| parent_dir(catalog_path).join("reports"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitOutcome {
    pub backup_path: PathBuf,
    pub report_path: PathBuf,
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "catalog".into())
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Create `<dir>/<stem>.<label>-<stamp>.<ext>` exclusively, adding `-N`
/// when the name is taken.
fn create_unique(dir: &Path, stem: &str, label: &str, ext: &str) -> io::Result<(PathBuf, File)> {
    std::fs::create_dir_all(dir)?;
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ").to_string();

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            format!("{}.{}-{}.{}", stem, label, stamp, ext)
        } else {
            format!("{}.{}-{}-{}.{}", stem, label, stamp, attempt, ext)
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free {} name in {}", label, dir.display()),
    ))
}

/// Copy the catalog bytes into `backup_dir` and check the copy's digest.
pub fn backup_catalog(catalog_path: &Path, backup_dir: &Path) -> Result<PathBuf> {
    let backup_err = |source| ReconError::Backup {
        path: catalog_path.display().to_string(),
        source,
    };

    let original = std::fs::read(catalog_path).map_err(backup_err)?;
    let ext = catalog_path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "json".into());

    let (backup_path, mut file) =
        create_unique(backup_dir, &file_stem(catalog_path), "backup", &ext).map_err(backup_err)?;
    file.write_all(&original).map_err(backup_err)?;
    file.sync_all().map_err(backup_err)?;
    drop(file);

    let copied = std::fs::read(&backup_path).map_err(backup_err)?;
    let expected = sha256_hex(&original);
    if sha256_hex(&copied) != expected {
        error!(backup = %backup_path.display(), "backup digest mismatch");
        return Err(ReconError::BackupVerification {
            path: catalog_path.display().to_string(),
            backup: backup_path.display().to_string(),
        });
    }

    info!(backup = %backup_path.display(), sha256 = %expected, "catalog backed up");
    Ok(backup_path)
}

/// Replace `path` with `bytes` through a temp file in the same directory.
/// An existing file's permissions carry over to the replacement.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut temp = NamedTempFile::new_in(parent_dir(path))?;
    temp.write_all(bytes)?;
    // Temp files are created owner-only.
    if let Ok(metadata) = std::fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Write `report` to a fresh file in `dir`.
pub fn write_report(report: &ReconciliationReport, dir: &Path, stem: &str) -> Result<PathBuf> {
    let write = || -> io::Result<PathBuf> {
        let json = report.to_json().map_err(io::Error::from)?;
        let (path, mut file) = create_unique(dir, stem, "report", "json")?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        Ok(path)
    };

    let path = write().map_err(|source| ReconError::ReportWrite {
        path: dir.display().to_string(),
        source,
    })?;
    info!(report = %path.display(), "report written");
    Ok(path)
}

/// Undo matches whose image file vanished after the scan. Returns how many
/// were reverted.
pub fn verify_matches(reconciliation: &mut Reconciliation) -> usize {
    let changes = std::mem::take(&mut reconciliation.changes);
    let mut kept = Vec::with_capacity(changes.len());
    let mut reverted = 0;

    for change in changes {
        let missing = reconciliation
            .decisions
            .get(change.decision_index)
            .and_then(|d| d.chosen_image.as_ref())
            .map(|image| !image.absolute_path.is_file())
            .unwrap_or(false);

        if !missing {
            kept.push(change);
            continue;
        }

        reconciliation.revert(&change);
        if let Some(decision) = reconciliation.decisions.get_mut(change.decision_index) {
            warn!(entry = %decision.catalog_entry_id, "matched image disappeared, match reverted");
            decision.status = DecisionStatus::Error;
            decision.image_ref = None;
            decision.rationale = format!("{}; image vanished before commit", decision.rationale);
        }
        reverted += 1;
    }

    reconciliation.changes = kept;
    reverted
}

/// Persist `document` over `catalog_path` after a verified backup, then
/// write the report.
///
/// A failed catalog write still produces a report (with `fatal` set) so the
/// backup path is on record.
pub fn commit(
    catalog_path: &Path,
    document: &CatalogDocument,
    report: &mut ReconciliationReport,
    options: &CommitOptions,
) -> Result<CommitOutcome> {
    commit_with(catalog_path, document, report, options, write_atomic)
}

/// `commit` with the step that replaces the catalog file passed in.
pub(crate) fn commit_with<W>(
    catalog_path: &Path,
    document: &CatalogDocument,
    report: &mut ReconciliationReport,
    options: &CommitOptions,
    write_catalog: W,
) -> Result<CommitOutcome>
where
    W: FnOnce(&Path, &[u8]) -> io::Result<()>,
{
    let stem = file_stem(catalog_path);
    let report_dir = options.report_dir_for(catalog_path);

    let backup_path = backup_catalog(catalog_path, &options.backup_dir_for(catalog_path))?;
    report.backup_path = Some(backup_path.clone());

    let written = document
        .to_json()
        .map_err(io::Error::from)
        .and_then(|json| write_catalog(catalog_path, json.as_bytes()));

    if let Err(source) = written {
        let err = ReconError::CatalogWrite {
            path: catalog_path.display().to_string(),
            backup: backup_path.display().to_string(),
            source,
        };
        error!(error = %err, "catalog write failed");
        report.fatal = Some(err.to_string());
        if let Err(report_err) = write_report(report, &report_dir, &stem) {
            error!(error = %report_err, "report for the failed commit could not be written");
        }
        return Err(err);
    }
    debug!(catalog = %catalog_path.display(), entries = document.len(), "catalog written");

    let report_path = write_report(report, &report_dir, &stem)?;
    Ok(CommitOutcome {
        backup_path,
        report_path,
    })
}

/// Put a backup back in place. The current catalog, if any, is backed up
/// first; its backup path is returned.
pub fn restore(
    backup_path: &Path,
    catalog_path: &Path,
    options: &CommitOptions,
) -> Result<Option<PathBuf>> {
    if !backup_path.is_file() {
        return Err(ReconError::FileNotFound(backup_path.display().to_string()));
    }
    let bytes = std::fs::read(backup_path)?;
    let content = String::from_utf8_lossy(&bytes);
    CatalogDocument::parse(&content).map_err(|reason| ReconError::CatalogParse {
        path: backup_path.display().to_string(),
        reason,
    })?;

    let safety = if catalog_path.exists() {
        Some(backup_catalog(catalog_path, &options.backup_dir_for(catalog_path))?)
    } else {
        None
    };

    write_atomic(catalog_path, &bytes).map_err(|source| ReconError::CatalogWrite {
        path: catalog_path.display().to_string(),
        backup: safety
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".into()),
        source,
    })?;

    info!(from = %backup_path.display(), catalog = %catalog_path.display(), "catalog restored");
    Ok(safety)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::ImageChange;
    use crate::scanner::CandidateIndex;
    use catalog_recon_common::{CatalogEntry, ImageDescriptor, MatchDecision, MatchTier};
    use tempfile::tempdir;

    const CATALOG: &str = "[\n  {\"id\": 1, \"name\": \"Yam\", \"image\": \"/broken.jpg\"}\n]\n";

    #[test]
    fn test_backup_is_byte_identical() {
        let dir = tempdir().unwrap();
        let catalog = dir.path().join("products.json");
        std::fs::write(&catalog, CATALOG).unwrap();

        let backup = backup_catalog(&catalog, &dir.path().join("backups")).unwrap();
        assert_eq!(std::fs::read(&backup).unwrap(), CATALOG.as_bytes());

        let name = backup.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("products.backup-"));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn test_backups_never_overwrite_each_other() {
        let dir = tempdir().unwrap();
        let catalog = dir.path().join("products.json");
        std::fs::write(&catalog, CATALOG).unwrap();

        let first = backup_catalog(&catalog, dir.path()).unwrap();
        let second = backup_catalog(&catalog, dir.path()).unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }

    #[test]
    fn test_backup_of_missing_catalog_fails() {
        let dir = tempdir().unwrap();
        let result = backup_catalog(&dir.path().join("missing.json"), dir.path());
        assert!(matches!(result, Err(ReconError::Backup { .. })));
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("products.json");
        std::fs::write(&path, "old").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("products.json");
        std::fs::write(&path, "old").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        write_atomic(&path, b"new").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_write_atomic_creates_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("products.json");
        write_atomic(&path, b"[]\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]\n");
    }

    #[test]
    fn test_commit_backs_up_then_writes() {
        let dir = tempdir().unwrap();
        let catalog = dir.path().join("products.json");
        std::fs::write(&catalog, CATALOG).unwrap();

        let mut entry = CatalogEntry::new(1, "Yam");
        entry.image = Some("/images/Produce/Yam.jpg".into());
        let document = CatalogDocument::from_entries(vec![entry]);
        let mut report = ReconciliationReport::new(&catalog, &CandidateIndex::default(), false);

        let outcome = commit(&catalog, &document, &mut report, &CommitOptions::default()).unwrap();

        assert_eq!(std::fs::read_to_string(&outcome.backup_path).unwrap(), CATALOG);
        assert!(outcome.backup_path.starts_with(dir.path().join("backups")));
        assert!(outcome.report_path.starts_with(dir.path().join("reports")));

        let written = CatalogDocument::load(&catalog).unwrap();
        assert_eq!(written.entries[0].image.as_deref(), Some("/images/Produce/Yam.jpg"));

        let saved: ReconciliationReport =
            serde_json::from_str(&std::fs::read_to_string(&outcome.report_path).unwrap()).unwrap();
        assert_eq!(saved.backup_path, Some(outcome.backup_path));
    }

    #[test]
    fn test_commit_aborts_before_writing_when_backup_fails() {
        let dir = tempdir().unwrap();
        let catalog = dir.path().join("products.json");
        std::fs::write(&catalog, CATALOG).unwrap();
        // A file where the backup directory should be
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, "").unwrap();

        let options = CommitOptions {
            backup_dir: Some(blocked.join("backups")),
            report_dir: None,
        };
        let document = CatalogDocument::from_entries(vec![]);
        let mut report = ReconciliationReport::new(&catalog, &CandidateIndex::default(), false);

        let result = commit(&catalog, &document, &mut report, &options);
        assert!(matches!(result, Err(ReconError::Backup { .. })));
        assert_eq!(std::fs::read_to_string(&catalog).unwrap(), CATALOG);
        assert!(!dir.path().join("reports").exists());
    }

    #[test]
    fn test_failed_catalog_write_keeps_backup_and_reports_fatal() {
        let dir = tempdir().unwrap();
        let catalog = dir.path().join("products.json");
        std::fs::write(&catalog, CATALOG).unwrap();

        let document = CatalogDocument::from_entries(vec![CatalogEntry::new(1, "Yam")]);
        let mut report = ReconciliationReport::new(&catalog, &CandidateIndex::default(), false);

        let result = commit_with(&catalog, &document, &mut report, &CommitOptions::default(), |_, _| {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only file system"))
        });
        let backup = match result {
            Err(ReconError::CatalogWrite { backup, .. }) => PathBuf::from(backup),
            other => panic!("expected a catalog write error, got {:?}", other),
        };

        // Backup intact, catalog untouched
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), CATALOG);
        assert_eq!(std::fs::read_to_string(&catalog).unwrap(), CATALOG);

        let fatal = report.fatal.clone().unwrap();
        assert!(fatal.contains("read-only file system"));
        assert!(fatal.contains(&backup.display().to_string()));
        assert_eq!(report.backup_path, Some(backup.clone()));

        // The report still made it to disk
        let reports: Vec<PathBuf> = std::fs::read_dir(dir.path().join("reports"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(reports.len(), 1);
        let saved: ReconciliationReport =
            serde_json::from_str(&std::fs::read_to_string(&reports[0]).unwrap()).unwrap();
        assert_eq!(saved.fatal, Some(fatal));
        assert_eq!(saved.backup_path, Some(backup));
    }

    #[test]
    fn test_verify_matches_reverts_vanished_images() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("Yam.jpg");
        std::fs::write(&present, "").unwrap();
        let gone = dir.path().join("Cassava.jpg");

        let mut yam = CatalogEntry::new(1, "Yam");
        yam.image = Some("/images/Yam.jpg".into());
        let mut cassava = CatalogEntry::new(2, "Cassava");
        cassava.image = Some("/images/Cassava.jpg".into());

        let mut reconciliation = Reconciliation {
            entries: vec![yam, cassava],
            decisions: vec![
                MatchDecision::matched("1", "Yam", ImageDescriptor::from_path(&present).unwrap(), MatchTier::Exact, 1.0, "exact"),
                MatchDecision::matched("2", "Cassava", ImageDescriptor::from_path(&gone).unwrap(), MatchTier::Exact, 1.0, "exact"),
            ],
            changes: vec![
                ImageChange { position: 0, decision_index: 0, previous_image: None, previous_images: None },
                ImageChange { position: 1, decision_index: 1, previous_image: Some("/old.jpg".into()), previous_images: None },
            ],
        };

        assert_eq!(verify_matches(&mut reconciliation), 1);
        assert_eq!(reconciliation.changes.len(), 1);
        assert_eq!(reconciliation.decisions[0].status, DecisionStatus::Matched);
        assert_eq!(reconciliation.decisions[1].status, DecisionStatus::Error);
        assert!(reconciliation.decisions[1].rationale.contains("vanished"));
        assert_eq!(reconciliation.entries[1].image.as_deref(), Some("/old.jpg"));
        assert_eq!(reconciliation.entries[0].image.as_deref(), Some("/images/Yam.jpg"));
    }

    #[test]
    fn test_restore_backs_up_current_catalog() {
        let dir = tempdir().unwrap();
        let catalog = dir.path().join("products.json");
        let backup = dir.path().join("old.json");
        std::fs::write(&catalog, "[]\n").unwrap();
        std::fs::write(&backup, CATALOG).unwrap();

        let safety = restore(&backup, &catalog, &CommitOptions::default()).unwrap().unwrap();
        assert_eq!(std::fs::read_to_string(&catalog).unwrap(), CATALOG);
        assert_eq!(std::fs::read_to_string(&safety).unwrap(), "[]\n");
    }

    #[test]
    fn test_restore_rejects_invalid_backup() {
        let dir = tempdir().unwrap();
        let catalog = dir.path().join("products.json");
        let backup = dir.path().join("bad.json");
        std::fs::write(&catalog, "[]\n").unwrap();
        std::fs::write(&backup, "{ nope").unwrap();

        let result = restore(&backup, &catalog, &CommitOptions::default());
        assert!(matches!(result, Err(ReconError::CatalogParse { .. })));
        assert_eq!(std::fs::read_to_string(&catalog).unwrap(), "[]\n");
    }
}
