use crate::errors::{E2eError, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Suffixes Chrome and Firefox use for downloads still being written.
const PARTIAL_SUFFIXES: [&str; 3] = [".crdownload", ".part", ".tmp"];

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ArtifactFormat {
    Xlsx,
    Xls,
    Other(String),
}

impl ArtifactFormat {
    pub const EXCEL: [ArtifactFormat; 2] = [ArtifactFormat::Xlsx, ArtifactFormat::Xls];

    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "xlsx" => ArtifactFormat::Xlsx,
            "xls" => ArtifactFormat::Xls,
            other => ArtifactFormat::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactFormat::Xlsx => write!(f, ".xlsx"),
            ArtifactFormat::Xls => write!(f, ".xls"),
            ArtifactFormat::Other(ext) if ext.is_empty() => write!(f, "<none>"),
            ArtifactFormat::Other(ext) => write!(f, ".{}", ext),
        }
    }
}

/// A file produced by an export action. Its content is never interpreted.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    pub format: ArtifactFormat,
}

impl Artifact {
    pub async fn inspect(path: &Path) -> Result<Self> {
        let metadata = tokio::fs::metadata(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size_bytes: metadata.len(),
            format: ArtifactFormat::from_path(path),
        })
    }

    pub fn size_kb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0
    }

    /// Checks the file still exists, is non-empty and has an allowed extension.
    pub async fn verify(&self, allowed: &[ArtifactFormat]) -> Result<()> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Err(E2eError::assertion(
                format!("download {}", self.path.display()),
                "file to exist",
                "missing",
            ));
        }
        info!("File existence validation passed: {}", self.path.display());

        let size = tokio::fs::metadata(&self.path).await?.len();
        if size == 0 {
            return Err(E2eError::assertion(
                format!("download {}", self.file_name),
                "size > 0 bytes",
                "0 bytes",
            ));
        }
        info!("File size validation passed: {:.2} KB", size as f64 / 1024.0);

        if !allowed.contains(&self.format) {
            let expected = allowed
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" or ");
            return Err(E2eError::assertion(
                format!("download {}", self.file_name),
                format!("extension {}", expected),
                &self.format,
            ));
        }
        info!("File format validation passed: {}", self.file_name);
        Ok(())
    }
}

/// Detects a completed download by watching a directory.
///
/// Arm it before triggering the export so files already present are never
/// mistaken for the new one.
pub struct DownloadWatcher {
    dir: PathBuf,
    existing: HashSet<OsString>,
    poll_interval: Duration,
}

impl DownloadWatcher {
    pub async fn arm(dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let existing = list_files(dir).await?.into_iter().collect();
        Ok(Self {
            dir: dir.to_path_buf(),
            existing,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Waits for a new, fully written file. A file counts as complete once it
    /// carries no partial-download suffix, is non-empty, no new partial file
    /// sits next to it, and its size held still across two consecutive polls.
    pub async fn wait(&self, timeout: Duration) -> Result<Artifact> {
        let deadline = Instant::now() + timeout;
        let mut last_seen: Option<(OsString, u64)> = None;

        loop {
            let candidate = self.newest_candidate().await?;
            if let Some((name, size)) = candidate {
                if last_seen.as_ref() == Some(&(name.clone(), size)) {
                    let artifact = Artifact::inspect(&self.dir.join(&name)).await?;
                    info!(
                        "Download completed: {} ({:.2} KB)",
                        artifact.file_name,
                        artifact.size_kb()
                    );
                    return Ok(artifact);
                }
                debug!("Download candidate {:?} at {} bytes", name, size);
                last_seen = Some((name, size));
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(E2eError::DownloadTimeout {
                    dir: self.dir.display().to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn newest_candidate(&self) -> Result<Option<(OsString, u64)>> {
        let mut newest: Option<(OsString, u64, std::time::SystemTime)> = None;
        for name in list_files(&self.dir).await? {
            if self.existing.contains(&name) {
                continue;
            }
            if is_partial(&name) {
                // The browser may reserve the final name before the data lands.
                debug!("Download {:?} still in progress", name);
                return Ok(None);
            }
            let metadata = match tokio::fs::metadata(self.dir.join(&name)).await {
                Ok(m) => m,
                // Renamed away between listing and stat.
                Err(_) => continue,
            };
            if metadata.len() == 0 {
                continue;
            }
            let modified = metadata.modified()?;
            if newest.as_ref().map_or(true, |(_, _, t)| modified >= *t) {
                newest = Some((name, metadata.len(), modified));
            }
        }
        Ok(newest.map(|(name, size, _)| (name, size)))
    }
}

fn is_partial(name: &OsString) -> bool {
    let name = name.to_string_lossy();
    PARTIAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

async fn list_files(dir: &Path) -> Result<Vec<OsString>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name());
        }
    }
    Ok(names)
}
