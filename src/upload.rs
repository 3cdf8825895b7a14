//! Upload intake: admits untrusted files from a holding folder into the
//! permanent source folder.
//!
//! Each regular file directly inside the upload folder goes through
//! `received → validated → (rejected | accepted-and-relocated)`:
//!
//! 1. extension must be in the allow-list (case-insensitive)
//! 2. size must not exceed the ceiling
//! 3. text must extract: `.pdf`/`.docx`/`.pptx`/`.xlsx` through
//!    [`crate::extract`], `.txt` read directly, anything else counts as an
//!    extraction failure
//! 4. only then is the file moved into the data folder, never over an
//!    existing file of the same name
//!
//! A rejected file is logged, left where it is, and the intake moves on to
//! the next one. The extracted text is not attached to any document; accepted
//! files enter the index on the next ingestion run that lists them.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::UploadConfig;
use crate::error::IntakeError;
use crate::extract::DocumentFormat;
use crate::reader::extract_file;

pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Allow-list and size ceiling applied to every artifact.
#[derive(Debug, Clone)]
pub struct IntakePolicy {
    allowed_extensions: Vec<String>,
    max_file_bytes: u64,
}

impl IntakePolicy {
    /// Extensions may be given with or without the leading dot, in any case.
    pub fn new(allowed_extensions: &[String], max_file_bytes: u64) -> Self {
        Self {
            allowed_extensions: allowed_extensions
                .iter()
                .map(|e| normalize_extension(e))
                .collect(),
            max_file_bytes,
        }
    }

    pub fn allows(&self, path: &Path) -> bool {
        extension_of(path)
            .map(|ext| self.allowed_extensions.contains(&ext))
            .unwrap_or(false)
    }
}

impl From<&UploadConfig> for IntakePolicy {
    fn from(config: &UploadConfig) -> Self {
        Self::new(&config.allowed_extensions, config.max_file_bytes)
    }
}

fn normalize_extension(ext: &str) -> String {
    format!(".{}", ext.trim().trim_start_matches('.').to_lowercase())
}

/// Lowercased extension with its leading dot.
fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(normalize_extension)
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    DisallowedExtension,
    TooLarge { size: u64, limit: u64 },
    ExtractionFailed(String),
    RelocationFailed(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::DisallowedExtension => write!(f, "file type not allowed"),
            RejectReason::TooLarge { size, limit } => {
                write!(f, "file is {} bytes, limit is {}", size, limit)
            }
            RejectReason::ExtractionFailed(e) => write!(f, "text extraction failed: {}", e),
            RejectReason::RelocationFailed(e) => write!(f, "could not move file: {}", e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcceptedArtifact {
    pub name: String,
    pub destination: PathBuf,
    pub extracted_chars: usize,
}

#[derive(Debug, Clone)]
pub struct RejectedArtifact {
    pub path: PathBuf,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default)]
pub struct IntakeReport {
    pub accepted: Vec<AcceptedArtifact>,
    pub rejected: Vec<RejectedArtifact>,
}

/// Admits every artifact in `upload_dir` using the default size ceiling.
pub async fn admit(
    upload_dir: &Path,
    data_dir: &Path,
    allowed_extensions: &[String],
) -> Result<IntakeReport, IntakeError> {
    let policy = IntakePolicy::new(allowed_extensions, DEFAULT_MAX_FILE_BYTES);
    admit_with_policy(upload_dir, data_dir, &policy).await
}

pub async fn admit_with_policy(
    upload_dir: &Path,
    data_dir: &Path,
    policy: &IntakePolicy,
) -> Result<IntakeReport, IntakeError> {
    let artifacts = list_artifacts(upload_dir)?;
    std::fs::create_dir_all(data_dir).map_err(|source| IntakeError::DataFolder {
        path: data_dir.to_path_buf(),
        source,
    })?;

    let mut report = IntakeReport::default();
    for path in artifacts {
        match admit_one(&path, data_dir, policy).await {
            Ok(accepted) => {
                tracing::info!(file = %accepted.name, destination = %accepted.destination.display(), "upload admitted");
                report.accepted.push(accepted);
            }
            Err(reason) => {
                tracing::warn!(file = %path.display(), %reason, "upload rejected");
                report.rejected.push(RejectedArtifact { path, reason });
            }
        }
    }
    Ok(report)
}

/// Regular files directly inside `dir`, sorted by name. Symlinks are skipped.
fn list_artifacts(dir: &Path) -> Result<Vec<PathBuf>, IntakeError> {
    let folder_error = |source: std::io::Error| IntakeError::UploadFolder {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            folder_error(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            )
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

async fn admit_one(
    path: &Path,
    data_dir: &Path,
    policy: &IntakePolicy,
) -> Result<AcceptedArtifact, RejectReason> {
    if !policy.allows(path) {
        return Err(RejectReason::DisallowedExtension);
    }

    let size = tokio::fs::metadata(path)
        .await
        .map_err(|e| RejectReason::ExtractionFailed(e.to_string()))?
        .len();
    if size > policy.max_file_bytes {
        return Err(RejectReason::TooLarge {
            size,
            limit: policy.max_file_bytes,
        });
    }

    let text = extract_upload(path)
        .await
        .map_err(RejectReason::ExtractionFailed)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let destination = data_dir.join(&name);
    relocate(path, &destination)
        .await
        .map_err(|e| RejectReason::RelocationFailed(e.to_string()))?;

    Ok(AcceptedArtifact {
        name,
        destination,
        extracted_chars: text.chars().count(),
    })
}

async fn extract_upload(path: &Path) -> Result<String, String> {
    if extension_of(path).as_deref() == Some(".txt") {
        return tokio::fs::read_to_string(path)
            .await
            .map_err(|e| e.to_string());
    }
    match DocumentFormat::from_path(path) {
        Some(format) => extract_file(path, format).await.map_err(|e| e.to_string()),
        None => Err(format!(
            "no text extractor for {}",
            extension_of(path).unwrap_or_else(|| "files without an extension".to_string())
        )),
    }
}

/// Moves `from` to `to` without ever replacing an existing `to`.
///
/// A hard link claims the destination name atomically. Where links are not
/// possible (another filesystem) the bytes are copied into a file opened
/// with `create_new`. Either way the source is removed last, and a failure
/// after the destination exists removes the destination again.
async fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    match tokio::fs::hard_link(from, to).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(e),
        Err(e) => {
            tracing::debug!(error = %e, "hard link unavailable; copying");
            return move_by_copy(from, to).await;
        }
    }
    release_source(from, to).await
}

async fn move_by_copy(from: &Path, to: &Path) -> io::Result<()> {
    let mut src = tokio::fs::File::open(from).await?;
    let mut dst = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(to)
        .await?;

    let copied = async {
        tokio::io::copy(&mut src, &mut dst).await?;
        dst.sync_all().await
    }
    .await;
    drop(dst);
    if let Err(e) = copied {
        discard(to).await;
        return Err(e);
    }
    release_source(from, to).await
}

async fn release_source(from: &Path, to: &Path) -> io::Result<()> {
    if let Err(e) = tokio::fs::remove_file(from).await {
        discard(to).await;
        return Err(e);
    }
    Ok(())
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "could not remove partial copy");
    }
}

/// `docq admit`: runs the intake and prints what happened to each file.
pub async fn run_admit(
    config: &UploadConfig,
    upload_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let upload_dir = upload_dir.unwrap_or_else(|| config.upload_dir.clone());
    let data_dir = data_dir.unwrap_or_else(|| config.data_dir.clone());

    let report = admit_with_policy(&upload_dir, &data_dir, &IntakePolicy::from(config)).await?;

    println!("admit {}", upload_dir.display());
    for a in &report.accepted {
        println!("  accepted {} -> {}", a.name, a.destination.display());
    }
    for r in &report.rejected {
        println!("  rejected {}: {}", r.path.display(), r.reason);
    }
    println!("  accepted: {}", report.accepted.len());
    println!("  rejected: {}", report.rejected.len());
    println!("ok");
    Ok(())
}
