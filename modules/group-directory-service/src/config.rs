use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BACKUP_RETAIN: usize = 7;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Paths and limits for one service instance. Built once in `main` and
/// handed to the store, the rotator and the router.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub data_file: PathBuf,
    pub uploads_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub backup_retain: usize,
    /// Seconds between in-process backups; 0 disables the worker
    pub backup_interval_secs: u64,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir = env::var("GROUP_DIRECTORY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let mut config = Self::with_data_dir(&data_dir);

        if let Ok(path) = env::var("GROUP_DIRECTORY_DATA_PATH") {
            config.data_file = PathBuf::from(path);
        }
        config.bind = env::var("GROUP_DIRECTORY_BIND").unwrap_or_else(|_| "127.0.0.1".to_string());
        config.port = parse_env("GROUP_DIRECTORY_PORT").unwrap_or(DEFAULT_PORT);
        config.backup_retain = parse_env("GROUP_DIRECTORY_BACKUP_RETAIN")
            .unwrap_or(DEFAULT_BACKUP_RETAIN)
            .max(1);
        config.backup_interval_secs = parse_env("GROUP_DIRECTORY_BACKUP_INTERVAL").unwrap_or(0);
        config.max_upload_bytes =
            parse_env("GROUP_DIRECTORY_MAX_UPLOAD_BYTES").unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        config
    }

    /// Default layout rooted at `data_dir`: `groups.json`, `uploads/`, `backups/`.
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            data_dir: data_dir.to_path_buf(),
            data_file: data_dir.join("groups.json"),
            uploads_dir: data_dir.join("uploads"),
            backup_dir: data_dir.join("backups"),
            backup_retain: DEFAULT_BACKUP_RETAIN,
            backup_interval_secs: 0,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
