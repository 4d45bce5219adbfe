//! Background backup worker.
//!
//! Runs a snapshot + retention pass every N seconds. The file work runs on
//! the blocking pool.

use crate::backup::SnapshotRotator;
use group_directory_types::BackupReport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub async fn run_backup_worker(
    rotator: Arc<SnapshotRotator>,
    interval_secs: u64,
    last_backup_at: Arc<Mutex<Option<String>>>,
) {
    log::info!(
        "[BACKUP] Worker started (interval: {}s, retain: {})",
        interval_secs,
        rotator.retain()
    );

    loop {
        tokio::time::sleep(Duration::from_secs(interval_secs)).await;

        if let Err(e) = run_once(rotator.clone(), last_backup_at.clone()).await {
            log::error!("[BACKUP] Backup failed: {}", e);
        }
    }
}

/// One rotation pass; records the completion time on success.
pub async fn run_once(
    rotator: Arc<SnapshotRotator>,
    last_backup_at: Arc<Mutex<Option<String>>>,
) -> Result<BackupReport, String> {
    let report = tokio::task::spawn_blocking(move || rotator.run())
        .await
        .map_err(|e| format!("Backup task panicked: {}", e))?
        .map_err(|e| e.to_string())?;

    *last_backup_at.lock().await = Some(chrono::Utc::now().to_rfc3339());
    Ok(report)
}
