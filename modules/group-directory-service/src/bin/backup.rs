//! One-shot backup: snapshot the group document and prune old snapshots.
//!
//! Intended for cron. Exits non-zero when the snapshot cannot be taken;
//! individual prune failures are only logged.

use group_directory_service::backup::SnapshotRotator;
use group_directory_service::config::Config;

fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let rotator = SnapshotRotator::from_config(&config);

    match rotator.run() {
        Ok(report) => {
            log::info!(
                "[BACKUP] {} written, {} kept, {} removed, {} failed",
                report.snapshot,
                report.prune.kept,
                report.prune.removed.len(),
                report.prune.failed.len()
            );
        }
        Err(e) => {
            log::error!("[BACKUP] Backup failed: {}", e);
            std::process::exit(1);
        }
    }
}
