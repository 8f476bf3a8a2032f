//! Archiver — spec.md §4.7. Every input ends up in exactly one archive
//! category; the original path must not exist after a successful archive.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::warn;

use crate::error::{ArchiveError, ArchiveResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Processed,
    Ignored,
    Failed,
}

impl Category {
    fn label(self) -> &'static str {
        match self {
            Category::Processed => "processed",
            Category::Ignored => "ignored",
            Category::Failed => "failed",
        }
    }
}

pub struct Archiver {
    processed_dir: PathBuf,
    failed_dir: PathBuf,
    /// Falls back to `failed_dir` when the route has no dedicated ignored
    /// directory configured — spec.md §3 marks `ignoredPath` optional but
    /// every input still needs exactly one archive home.
    ignored_dir: PathBuf,
    timestamp_naming: bool,
}

impl Archiver {
    pub fn new(
        processed_dir: impl Into<PathBuf>,
        failed_dir: impl Into<PathBuf>,
        ignored_dir: Option<PathBuf>,
        timestamp_naming: bool,
    ) -> Self {
        let failed_dir = failed_dir.into();
        Self {
            processed_dir: processed_dir.into(),
            ignored_dir: ignored_dir.unwrap_or_else(|| failed_dir.clone()),
            failed_dir,
            timestamp_naming,
        }
    }

    fn dir_for(&self, category: Category) -> &Path {
        match category {
            Category::Processed => &self.processed_dir,
            Category::Ignored => &self.ignored_dir,
            Category::Failed => &self.failed_dir,
        }
    }

    /// Move `input_path` into `category`'s directory. For `Failed`,
    /// `reason` is written to a best-effort `.error` sidecar next to the
    /// archived file.
    pub async fn archive(
        &self,
        input_path: &Path,
        category: Category,
        reason: Option<&str>,
    ) -> ArchiveResult<PathBuf> {
        let dir = self.dir_for(category);
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| ArchiveError::DirCreate {
                path: dir.display().to_string(),
                source,
            })?;

        let target = self.unique_target(dir, input_path).await;
        move_file(input_path, &target).await?;

        if category == Category::Failed {
            let sidecar = sidecar_path(&target);
            if let Err(err) = tokio::fs::write(&sidecar, reason.unwrap_or("").as_bytes()).await {
                warn!(path = %sidecar.display(), error = %err, "failed to write .error sidecar");
            }
        }

        Ok(target)
    }

    /// Build the archive target name, applying timestamp-naming if enabled
    /// and a numeric collision suffix if the name is already taken.
    async fn unique_target(&self, dir: &Path, input_path: &Path) -> PathBuf {
        let file_name = input_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file");
        let (stem, ext) = split_stem_ext(file_name);

        let base_name = if self.timestamp_naming {
            let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
            format!("{stem}_{timestamp}")
        } else {
            stem.to_string()
        };

        let mut candidate = dir.join(with_ext(&base_name, ext));
        let mut counter = 1u32;
        while tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            candidate = dir.join(with_ext(&format!("{base_name}_{counter}"), ext));
            counter += 1;
        }
        candidate
    }
}

fn split_stem_ext(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(0) => (file_name, ""),
        Some(idx) => (&file_name[..idx], &file_name[idx + 1..]),
        None => (file_name, ""),
    }
}

fn with_ext(stem: &str, ext: &str) -> String {
    if ext.is_empty() {
        stem.to_string()
    } else {
        format!("{stem}.{ext}")
    }
}

fn sidecar_path(archived_path: &Path) -> PathBuf {
    let mut sidecar = archived_path.as_os_str().to_owned();
    sidecar.push(".error");
    PathBuf::from(sidecar)
}

/// Atomic rename first; on cross-device failure, copy then fsync then
/// delete. The source must not exist after a successful move.
async fn move_file(from: &Path, to: &Path) -> ArchiveResult<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if rename_err.raw_os_error() == Some(libc_exdev()) {
                copy_then_delete(from, to).await
            } else {
                Err(ArchiveError::Move {
                    from: from.display().to_string(),
                    to: to.display().to_string(),
                    source: rename_err,
                })
            }
        }
    }
}

#[cfg(unix)]
fn libc_exdev() -> i32 {
    18 // EXDEV
}

#[cfg(not(unix))]
fn libc_exdev() -> i32 {
    i32::MIN
}

async fn copy_then_delete(from: &Path, to: &Path) -> ArchiveResult<()> {
    tokio::fs::copy(from, to).await.map_err(|source| ArchiveError::Move {
        from: from.display().to_string(),
        to: to.display().to_string(),
        source,
    })?;

    let file = tokio::fs::File::open(to).await.map_err(|source| ArchiveError::Move {
        from: from.display().to_string(),
        to: to.display().to_string(),
        source,
    })?;
    file.sync_all().await.map_err(|source| ArchiveError::Move {
        from: from.display().to_string(),
        to: to.display().to_string(),
        source,
    })?;
    drop(file);

    tokio::fs::remove_file(from).await.map_err(|source| ArchiveError::Move {
        from: from.display().to_string(),
        to: to.display().to_string(),
        source,
    })?;
    Ok(())
}
