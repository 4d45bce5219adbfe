//! File-backed group store.
//!
//! The whole collection lives in one JSON document. Every append re-reads
//! the document, pushes the new entry and rewrites the document through a
//! temporary file and a rename, all while holding `write_lock`. Readers
//! never take the lock; the rename guarantees they see either the old or
//! the new document in full.
//!
//! The lock is per process. A second process appending to the same file
//! can still lose updates.

use crate::avatar::{AvatarStrategy, GravatarIdenticon};
use crate::error::StoreError;
use chrono::{SecondsFormat, Utc};
use group_directory_types::{GroupEntry, NewGroup};
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const INVITE_LINK_PREFIX: &str = "https://chat.whatsapp.com/";
pub const UPLOADS_URL_PREFIX: &str = "/uploads/";

pub struct GroupStore {
    data_file: PathBuf,
    avatar: Box<dyn AvatarStrategy>,
    write_lock: Mutex<()>,
}

enum Document {
    Missing,
    Parsed(Vec<GroupEntry>),
    Unreadable(String),
}

impl GroupStore {
    /// Opens the store, creating the parent directory and an empty `[]`
    /// document if they do not exist yet.
    pub fn open(data_file: &Path) -> io::Result<Self> {
        if let Some(parent) = data_file.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                log::info!("[GROUP_STORE] Created directory: {}", parent.display());
            }
        }
        if !data_file.exists() {
            write_atomic(data_file, b"[]")?;
            log::info!("[GROUP_STORE] Created new data file at {}", data_file.display());
        }
        Ok(Self {
            data_file: data_file.to_path_buf(),
            avatar: Box::new(GravatarIdenticon),
            write_lock: Mutex::new(()),
        })
    }

    pub fn with_avatar(mut self, avatar: impl AvatarStrategy + 'static) -> Self {
        self.avatar = Box::new(avatar);
        self
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    /// All groups in insertion order, image paths resolved for serving.
    ///
    /// A missing document is an empty directory. A document that fails to
    /// parse is logged and also reported as empty.
    pub fn load(&self) -> Vec<GroupEntry> {
        self.read_entries().into_iter().map(resolve_entry).collect()
    }

    /// Groups whose submitter name or group name contains `term`,
    /// ignoring case. A missing or blank term returns everything.
    pub fn search(&self, term: Option<&str>) -> Vec<GroupEntry> {
        let groups = self.load();
        let needle = match term.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => t.to_lowercase(),
            None => return groups,
        };
        groups
            .into_iter()
            .filter(|g| {
                g.group_name.to_lowercase().contains(&needle)
                    || g.username.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.read_entries().len()
    }

    /// Validates `new`, appends it to the document and returns the stored
    /// entry with its image path resolved.
    pub fn append(&self, new: NewGroup) -> Result<GroupEntry, StoreError> {
        let (username, group_name, group_link) = validate(&new)?;

        let image_path = match new.image_file.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.avatar.avatar_url(&group_name),
        };
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let entry = GroupEntry {
            id: uuid::Uuid::new_v4().to_string(),
            username,
            group_name,
            group_link,
            image_path,
            created_at: now.clone(),
            updated_at: Some(now),
        };

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut groups = match self.read_document() {
            Document::Missing => Vec::new(),
            Document::Parsed(groups) => groups,
            Document::Unreadable(e) => {
                log::error!(
                    "[GROUP_STORE] Refusing to overwrite unreadable document {}: {}",
                    self.data_file.display(),
                    e
                );
                return Err(StoreError::Write(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("existing document is unreadable: {}", e),
                )));
            }
        };
        groups.push(entry.clone());

        let body = serde_json::to_vec_pretty(&groups)?;
        write_atomic(&self.data_file, &body)?;
        log::debug!(
            "[GROUP_STORE] Saved group {} ({} total)",
            entry.id,
            groups.len()
        );

        Ok(resolve_entry(entry))
    }

    fn read_entries(&self) -> Vec<GroupEntry> {
        match self.read_document() {
            Document::Parsed(groups) => groups,
            Document::Missing => Vec::new(),
            Document::Unreadable(e) => {
                log::error!(
                    "[GROUP_STORE] Error loading groups from {}: {}",
                    self.data_file.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    fn read_document(&self) -> Document {
        let raw = match fs::read(&self.data_file) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Document::Missing,
            Err(e) => return Document::Unreadable(e.to_string()),
        };
        match serde_json::from_slice(&raw) {
            Ok(groups) => Document::Parsed(groups),
            Err(e) => Document::Unreadable(e.to_string()),
        }
    }
}

/// Maps a stored image reference to something a browser can fetch: bare
/// upload file names get the `/uploads/` prefix, absolute URLs and already
/// prefixed paths pass through.
pub fn resolve_image_path(image_path: &str) -> String {
    if image_path.starts_with("http") || image_path.starts_with("/uploads") {
        image_path.to_string()
    } else {
        format!("{}{}", UPLOADS_URL_PREFIX, image_path)
    }
}

fn resolve_entry(mut entry: GroupEntry) -> GroupEntry {
    entry.image_path = resolve_image_path(&entry.image_path);
    entry
}

fn validate(new: &NewGroup) -> Result<(String, String, String), StoreError> {
    let username = new.username.trim();
    let group_name = new.group_name.trim();
    let group_link = new.group_link.trim();

    if username.is_empty() || group_name.is_empty() || group_link.is_empty() {
        return Err(StoreError::Validation("All fields are required".to_string()));
    }
    // Checked on the trimmed link, the same value that gets stored.
    if !group_link.starts_with(INVITE_LINK_PREFIX) {
        return Err(StoreError::Validation(
            "Invalid WhatsApp link format".to_string(),
        ));
    }
    Ok((
        username.to_string(),
        group_name.to_string(),
        group_link.to_string(),
    ))
}

/// Writes `body` next to `path` and renames it into place.
fn write_atomic(path: &Path, body: &[u8]) -> io::Result<()> {
    let mut tmp: OsString = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = fs::File::create(&tmp)?;
    file.write_all(body)?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
