//! Snapshot rotation for the group document.
//!
//! Snapshots are full copies named `groups-<utc timestamp>.json`. The
//! timestamp is RFC3339 with `:` and `.` replaced by `-`, so name order is
//! creation order and retention never depends on file mtimes.

use crate::config::Config;
use crate::error::BackupError;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use group_directory_types::{BackupReport, PruneReport, SnapshotInfo};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const SNAPSHOT_PREFIX: &str = "groups-";
pub const SNAPSHOT_SUFFIX: &str = ".json";
const SNAPSHOT_STAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%6fZ";

pub struct SnapshotRotator {
    source: PathBuf,
    backup_dir: PathBuf,
    retain: usize,
}

impl SnapshotRotator {
    pub fn new(source: &Path, backup_dir: &Path, retain: usize) -> Self {
        Self {
            source: source.to_path_buf(),
            backup_dir: backup_dir.to_path_buf(),
            retain,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.data_file, &config.backup_dir, config.backup_retain)
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn retain(&self) -> usize {
        self.retain
    }

    /// Copies the current document into the backup directory and returns
    /// the snapshot's file name.
    pub fn rotate(&self) -> Result<String, BackupError> {
        self.rotate_at(Utc::now())
    }

    fn rotate_at(&self, at: DateTime<Utc>) -> Result<String, BackupError> {
        if !self.source.is_file() {
            return Err(BackupError::MissingSource(self.source.clone()));
        }
        if !self.backup_dir.exists() {
            fs::create_dir_all(&self.backup_dir)?;
        }

        let name = snapshot_name(at);
        let target = self.backup_dir.join(&name);
        fs::copy(&self.source, &target)?;
        log::info!("[BACKUP] Backup created: {}", target.display());
        Ok(name)
    }

    /// Snapshots in the backup directory, newest first. A missing
    /// directory has no snapshots.
    pub fn list(&self) -> io::Result<Vec<SnapshotInfo>> {
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut snapshots = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_snapshot_name(&name) {
                continue;
            }
            let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
            snapshots.push(SnapshotInfo { name, size_bytes });
        }
        snapshots.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(snapshots)
    }

    /// Removes every snapshot after the `retain` newest. Failures are
    /// logged and collected; they never stop the sweep.
    pub fn prune(&self, retain: usize) -> PruneReport {
        let snapshots = match self.list() {
            Ok(s) => s,
            Err(e) => {
                log::error!(
                    "[BACKUP] Error listing backups in {}: {}",
                    self.backup_dir.display(),
                    e
                );
                return PruneReport::default();
            }
        };

        let mut report = PruneReport {
            kept: snapshots.len().min(retain),
            ..Default::default()
        };
        for snapshot in snapshots.into_iter().skip(retain) {
            let path = self.backup_dir.join(&snapshot.name);
            match fs::remove_file(&path) {
                Ok(()) => {
                    log::debug!("[BACKUP] Removed old backup: {}", snapshot.name);
                    report.removed.push(snapshot.name);
                }
                Err(e) => {
                    log::warn!("[BACKUP] Error removing {}: {}", path.display(), e);
                    report.failed.push(snapshot.name);
                }
            }
        }

        if !report.removed.is_empty() {
            log::info!(
                "[BACKUP] Cleaned up {} old backup(s)",
                report.removed.len()
            );
        }
        report
    }

    /// One rotation pass: snapshot, then enforce the configured retention.
    pub fn run(&self) -> Result<BackupReport, BackupError> {
        let snapshot = self.rotate()?;
        let prune = self.prune(self.retain);
        Ok(BackupReport { snapshot, prune })
    }
}

pub fn snapshot_name(at: DateTime<Utc>) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Micros, true)
        .replace([':', '.'], "-");
    format!("{}{}{}", SNAPSHOT_PREFIX, stamp, SNAPSHOT_SUFFIX)
}

/// True only for names `snapshot_name` could have produced.
fn is_snapshot_name(name: &str) -> bool {
    name.strip_prefix(SNAPSHOT_PREFIX)
        .and_then(|rest| rest.strip_suffix(SNAPSHOT_SUFFIX))
        .is_some_and(|stamp| NaiveDateTime::parse_from_str(stamp, SNAPSHOT_STAMP_FORMAT).is_ok())
}
