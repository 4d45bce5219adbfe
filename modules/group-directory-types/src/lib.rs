//! Shared types for the group directory service and its HTTP clients.
//!
//! Field names on the wire are camelCase and match the persisted
//! `groups.json` document, so the same structs serve both purposes.

use serde::{Deserialize, Serialize};

// =====================================================
// Domain Types
// =====================================================

/// One directory entry: a chat group submitted by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEntry {
    pub id: String,
    /// Name of the person who submitted the group
    pub username: String,
    pub group_name: String,
    /// Invite link, always `https://chat.whatsapp.com/...`
    pub group_link: String,
    /// Uploaded file name, `/uploads/<name>`, or an absolute avatar URL
    pub image_path: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Validated-at-the-store input for a new group.
///
/// `image_file` is the name the upload handler assigned to a stored image,
/// if one was sent. Missing text fields read as empty and fail validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewGroup {
    pub username: String,
    pub group_name: String,
    pub group_link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_file: Option<String>,
}

// =====================================================
// Query / Response Types
// =====================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupQuery {
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroupResponse {
    pub success: bool,
    pub group: GroupEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub groups_count: usize,
    /// Summed size in bytes of the files under the data directory
    pub disk_space: u64,
    pub uptime_secs: u64,
    pub last_backup_at: Option<String>,
}

// =====================================================
// Backup Types
// =====================================================

/// A snapshot file in the backup directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub name: String,
    pub size_bytes: u64,
}

/// Outcome of one retention sweep. Failed removals are listed, not fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneReport {
    pub kept: usize,
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupReport {
    pub snapshot: String,
    pub prune: PruneReport,
}
