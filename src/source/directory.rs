use super::{PayloadBody, PayloadEntry};
use crate::error::{Error, Result};
use crate::normalizer::{NormalizationError, PayloadFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// A recipe repository checked out on the local filesystem
pub(super) struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Walk the directory tree, skipping hidden entries.
    ///
    /// Unreadable entries below the root are logged and skipped.
    pub async fn enumerate(&self) -> Result<Vec<PayloadEntry>> {
        let metadata = tokio::fs::metadata(&self.root).await.map_err(|e| {
            Error::RepositoryFetch(format!(
                "Repository directory {} is not readable: {e}",
                self.root.display()
            ))
        })?;
        if !metadata.is_dir() {
            return Err(Error::RepositoryFetch(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }

        let root = self.root.clone();
        let mut entries = tokio::task::spawn_blocking(move || walk(&root))
            .await
            .map_err(|e| Error::Internal(format!("Directory walk failed: {e}")))?;

        entries.sort_by(|a, b| a.location.cmp(&b.location));
        debug!(
            "Found {} candidate files under {}",
            entries.len(),
            self.root.display()
        );
        Ok(entries)
    }
}

fn walk(root: &Path) -> Vec<PayloadEntry> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    let mut entries = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                if let Some(entry) = entry_for(root, entry.path()) {
                    entries.push(entry);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable entry under {}: {}", root.display(), e),
        }
    }
    entries
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn entry_for(root: &Path, path: &Path) -> Option<PayloadEntry> {
    let relative = path.strip_prefix(root).ok()?;
    let location = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    let format = PayloadFormat::from_path(&location)?;

    Some(PayloadEntry {
        location,
        format,
        body: PayloadBody::File(path.to_path_buf()),
    })
}
/// Read one payload file, enforcing the size limit before reading
pub(super) async fn read_payload(path: &Path, max_bytes: usize) -> Result<String> {
    let size = tokio::fs::metadata(path).await?.len() as usize;
    if size > max_bytes {
        return Err(NormalizationError::TooLarge {
            size,
            max: max_bytes,
        }
        .into());
    }

    Ok(tokio::fs::read_to_string(path).await?)
}
