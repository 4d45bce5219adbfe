//! Fallback images for groups submitted without an upload.

use md5::{Digest, Md5};

/// Produces a deterministic placeholder image URL for a group label.
pub trait AvatarStrategy: Send + Sync {
    fn avatar_url(&self, label: &str) -> String;
}

/// Gravatar identicon keyed by the MD5 of the trimmed group name.
#[derive(Debug, Clone, Copy, Default)]
pub struct GravatarIdenticon;

impl AvatarStrategy for GravatarIdenticon {
    fn avatar_url(&self, label: &str) -> String {
        let digest = Md5::digest(label.trim().as_bytes());
        format!(
            "https://www.gravatar.com/avatar/{:x}?d=identicon&s=200",
            digest
        )
    }
}
