//! Group Directory Service: standalone binary serving the group directory.
//!
//! Hosts the JSON API, uploaded images and a directory page.
//! Default: http://127.0.0.1:3000/

use group_directory_service::backup::SnapshotRotator;
use group_directory_service::config::Config;
use group_directory_service::routes::{self, AppState};
use group_directory_service::store::GroupStore;
use group_directory_service::worker;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    if let Err(e) = std::fs::create_dir_all(&config.uploads_dir) {
        log::error!(
            "Storage initialization failed for {}: {}",
            config.uploads_dir.display(),
            e
        );
        std::process::exit(1);
    }
    let store = match GroupStore::open(&config.data_file) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::error!("Storage initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    let rotator = Arc::new(SnapshotRotator::from_config(&config));
    let last_backup_at: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

    if config.backup_interval_secs > 0 {
        let worker_rotator = rotator.clone();
        let worker_last_backup = last_backup_at.clone();
        let interval = config.backup_interval_secs;
        tokio::spawn(async move {
            worker::run_backup_worker(worker_rotator, interval, worker_last_backup).await;
        });
    } else {
        log::info!("GROUP_DIRECTORY_BACKUP_INTERVAL not set, background backups disabled");
    }

    let addr = config.listen_addr();
    log::info!("Data file: {}", config.data_file.display());
    log::info!("Uploads dir: {}", config.uploads_dir.display());

    let state = Arc::new(AppState {
        store,
        rotator,
        config,
        start_time: Instant::now(),
        last_backup_at,
    });
    let app = routes::router(state);

    log::info!("Group Directory Service listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app).await.expect("Server error");
}
