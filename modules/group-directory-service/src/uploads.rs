//! Multipart form handling for group submissions.
//!
//! The image part is streamed to the uploads directory under a generated
//! name before the store sees the form; the store only records that name.

use crate::error::UploadError;
use axum::extract::Multipart;
use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use group_directory_types::NewGroup;
use rand::Rng;
use std::path::Path;
use tokio::io::AsyncWriteExt;

pub const IMAGE_FIELD: &str = "image";

/// Reads the submission form. On error any image already written is removed.
pub async fn read_group_form(
    mut multipart: Multipart,
    uploads_dir: &Path,
    max_bytes: usize,
) -> Result<NewGroup, UploadError> {
    let mut form = NewGroup::default();

    let result: Result<(), UploadError> = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(multipart_error)?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                IMAGE_FIELD => {
                    if let Some(stored) = save_image(field, uploads_dir, max_bytes).await? {
                        if let Some(previous) = form.image_file.replace(stored) {
                            remove_upload(uploads_dir, &previous).await;
                        }
                    }
                }
                "username" => form.username = read_text(field).await?,
                "groupName" => form.group_name = read_text(field).await?,
                "groupLink" => form.group_link = read_text(field).await?,
                other => log::debug!("[UPLOADS] Ignoring unknown form field '{}'", other),
            }
        }
        Ok(())
    }
    .await;

    if let Err(e) = result {
        if let Some(stored) = form.image_file.take() {
            remove_upload(uploads_dir, &stored).await;
        }
        return Err(e);
    }
    Ok(form)
}

async fn read_text(field: Field<'_>) -> Result<String, UploadError> {
    field
        .text()
        .await
        .map_err(multipart_error)
}

/// Streams one image part to disk. Parts without a file name or without
/// content are what browsers send for an empty file input; they yield `None`.
async fn save_image(
    mut field: Field<'_>,
    uploads_dir: &Path,
    max_bytes: usize,
) -> Result<Option<String>, UploadError> {
    let original = match field.file_name() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return Ok(None),
    };

    tokio::fs::create_dir_all(uploads_dir).await?;
    let stored = unique_file_name(&original);
    let path = uploads_dir.join(&stored);
    let mut file = tokio::fs::File::create(&path).await?;

    let mut written = 0usize;
    let outcome: Result<(), UploadError> = async {
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(multipart_error)?
        {
            written += chunk.len();
            if written > max_bytes {
                return Err(UploadError::TooLarge(max_bytes));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
    .await;
    drop(file);

    if let Err(e) = outcome {
        let _ = tokio::fs::remove_file(&path).await;
        return Err(e);
    }
    if written == 0 {
        let _ = tokio::fs::remove_file(&path).await;
        return Ok(None);
    }

    log::info!("[UPLOADS] Stored image '{}' as {} ({} bytes)", original, stored, written);
    Ok(Some(stored))
}

/// Body-limit rejections keep their 413 meaning; everything else is a
/// malformed form.
fn multipart_error(e: MultipartError) -> UploadError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::BodyTooLarge(e.body_text())
    } else {
        UploadError::Multipart(e.body_text())
    }
}

/// Deletes an uploaded image that will not be referenced by any group.
pub async fn remove_upload(uploads_dir: &Path, name: &str) {
    let path = uploads_dir.join(name);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        log::warn!("[UPLOADS] Failed to remove orphaned upload {}: {}", path.display(), e);
    }
}

/// `<unix millis>-<random>` plus the original extension when it is a plain
/// alphanumeric one.
pub fn unique_file_name(original: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let nonce: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{}-{}{}", millis, nonce, safe_extension(original))
}

fn safe_extension(original: &str) -> String {
    Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}
