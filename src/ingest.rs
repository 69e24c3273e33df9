//! Upload handling.
//!
//! Single files are stored as-is. Zip archives are unpacked into a scratch
//! directory and every member file is stored as its own row, typed by
//! [`mime::infer_from_extension`]. The scratch directory is a
//! [`tempfile::TempDir`] guard, so it is removed on every exit path.
//!
//! Archive members are inserted one by one. If a member fails, members
//! already inserted stay in the database.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::Config;
use crate::mime;
use crate::models::UploadedFile;
use crate::store;

/// Upload problems caused by the input rather than the system.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid zip archive: {0}")]
    InvalidArchive(#[from] zip::result::ZipError),
    #[error("file type not accepted: {0} (allowed: txt, py, md, jpg, png, zip)")]
    NotAccepted(String),
}

/// Stores one file unchanged.
pub async fn upload_file(
    config: &Config,
    file_name: &str,
    file_type: &str,
    content: &[u8],
) -> Result<UploadedFile> {
    let id = store::insert_file(config, file_name, file_type, content).await?;
    tracing::info!(id, file_name, file_type, bytes = content.len(), "stored file");
    Ok(UploadedFile {
        id,
        file_name: file_name.to_string(),
        file_type: file_type.to_string(),
    })
}

/// Unpacks a zip archive and stores every member file.
///
/// Members are stored under their base name, in file-name order of the
/// extracted tree. Directory structure is not kept.
pub async fn upload_archive(config: &Config, archive_bytes: &[u8]) -> Result<Vec<UploadedFile>> {
    upload_archive_in(config, archive_bytes, &std::env::temp_dir()).await
}

/// [`upload_archive`] with the scratch directory created under `scratch_parent`.
pub async fn upload_archive_in(
    config: &Config,
    archive_bytes: &[u8],
    scratch_parent: &Path,
) -> Result<Vec<UploadedFile>> {
    let bytes = archive_bytes.to_vec();
    let parent = scratch_parent.to_path_buf();
    let (scratch, members) =
        tokio::task::spawn_blocking(move || extract_to_scratch(&bytes, &parent)).await??;

    let mut uploaded = Vec::with_capacity(members.len());
    for path in members {
        let content = tokio::fs::read(&path).await?;
        let file_name = base_name(&path);
        let file_type = mime::infer_from_extension(&file_name);
        uploaded.push(upload_file(config, &file_name, file_type, &content).await?);
    }

    tracing::info!(members = uploaded.len(), "archive processed");
    drop(scratch);
    Ok(uploaded)
}

/// Routes one upload: archives are expanded, anything else is stored as-is.
///
/// `declared_type` is the client-supplied MIME type. When it is missing,
/// blank, or `application/octet-stream`, the type is inferred from the name.
pub async fn upload(
    config: &Config,
    file_name: &str,
    declared_type: Option<&str>,
    content: &[u8],
) -> Result<Vec<UploadedFile>> {
    if !mime::is_accepted_upload(file_name) {
        return Err(IngestError::NotAccepted(file_name.to_string()).into());
    }

    if mime::is_archive(file_name, declared_type) {
        return upload_archive(config, content).await;
    }

    let file_type = match declared_type.map(str::trim) {
        Some(t) if !t.is_empty() && t != mime::OCTET_STREAM => t,
        _ => mime::infer_upload_type(file_name),
    };
    Ok(vec![upload_file(config, file_name, file_type, content).await?])
}

/// Uploads local files from disk, as the CLI does.
pub async fn upload_paths(config: &Config, paths: &[PathBuf]) -> Result<Vec<UploadedFile>> {
    let mut uploaded = Vec::new();
    for path in paths {
        let content = tokio::fs::read(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read {}: {}", path.display(), e)
        })?;
        let file_name = base_name(path);
        uploaded.extend(upload(config, &file_name, None, &content).await?);
    }
    Ok(uploaded)
}

/// Writes the archive into a fresh scratch directory under `parent`, extracts
/// it there, and lists the extracted files. The returned guard owns the
/// directory; an early return drops it and removes the directory.
fn extract_to_scratch(archive_bytes: &[u8], parent: &Path) -> Result<(TempDir, Vec<PathBuf>)> {
    let scratch = TempDir::new_in(parent)?;
    let archive_path = scratch.path().join("upload.zip");
    std::fs::write(&archive_path, archive_bytes)?;

    let extract_dir = scratch.path().join("extracted");
    std::fs::create_dir_all(&extract_dir)?;

    let file = std::fs::File::open(&archive_path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(IngestError::from)?;
    archive.extract(&extract_dir).map_err(IngestError::from)?;

    let mut members = Vec::new();
    for entry in WalkDir::new(&extract_dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            members.push(entry.into_path());
        }
    }

    Ok((scratch, members))
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
