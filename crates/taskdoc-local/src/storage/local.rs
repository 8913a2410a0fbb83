use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use taskdoc_core::{Document, DocumentBackend, StoreError};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

pub const DEFAULT_TEMP_SUFFIX: &str = ".tmp";

/// Local filesystem storage for the document.
///
/// Layout:
/// ```text
/// {data_file}            committed document (pretty JSON)
/// {data_file}{suffix}    in-flight write, renamed over data_file on commit
/// ```
#[derive(Debug, Clone)]
pub struct LocalDocumentStorage {
    path: PathBuf,
    temp_path: PathBuf,
}

impl LocalDocumentStorage {
    /// Create a LocalDocumentStorage for the given data file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_temp_suffix(path, DEFAULT_TEMP_SUFFIX)
    }

    pub fn with_temp_suffix(path: impl AsRef<Path>, temp_suffix: &str) -> Self {
        let path = path.as_ref().to_path_buf();
        let temp_path = temp_path_for(&path, temp_suffix);
        Self { path, temp_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }
}

#[async_trait]
impl DocumentBackend for LocalDocumentStorage {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn load_document(&self) -> Result<Document, StoreError> {
        read_document(&self.path).await
    }

    async fn save_document(&self, document: &Document) -> Result<(), StoreError> {
        write_document(&self.path, &self.temp_path, document).await
    }
}

/// `path` with `suffix` appended to its file name.
pub fn temp_path_for(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Load the document at `path`; a missing file is the empty document.
#[instrument(level = "debug")]
pub async fn read_document(path: &Path) -> Result<Document, StoreError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No document at {}, starting empty", path.display());
            return Ok(Document::default());
        }
        Err(e) => {
            return Err(StoreError::ReadFailed(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    let document: Document = serde_json::from_slice(&bytes).map_err(|e| {
        StoreError::ReadFailed(format!("Failed to parse {}: {}", path.display(), e))
    })?;
    debug!(
        "Loaded document with {} users, {} tasks",
        document.users.len(),
        document.tasks.len()
    );
    Ok(document)
}

/// Replace the document at `path` by writing `temp_path` and renaming it over.
///
/// On failure the temporary file is removed (best effort) and the committed
/// file is left as it was.
#[instrument(skip(document), level = "debug", fields(users = document.users.len(), tasks = document.tasks.len()))]
pub async fn write_document(
    path: &Path,
    temp_path: &Path,
    document: &Document,
) -> Result<(), StoreError> {
    let result = write_and_rename(path, temp_path, document).await;
    if result.is_err() {
        if let Err(e) = fs::remove_file(temp_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Failed to remove temporary file {}: {}",
                    temp_path.display(),
                    e
                );
            }
        }
    }
    result
}

async fn write_and_rename(
    path: &Path,
    temp_path: &Path,
    document: &Document,
) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(document).map_err(|e| {
        StoreError::WriteFailed(format!("Failed to serialize document: {}", e))
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|e| {
            StoreError::WriteFailed(format!(
                "Failed to create data dir {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let mut file = fs::File::create(temp_path).await.map_err(|e| {
        StoreError::WriteFailed(format!("Failed to create {}: {}", temp_path.display(), e))
    })?;
    file.write_all(&json).await.map_err(|e| {
        StoreError::WriteFailed(format!("Failed to write {}: {}", temp_path.display(), e))
    })?;
    file.sync_all().await.map_err(|e| {
        StoreError::WriteFailed(format!("Failed to sync {}: {}", temp_path.display(), e))
    })?;
    drop(file);

    fs::rename(temp_path, path).await.map_err(|e| {
        StoreError::WriteFailed(format!("Failed to rename to {}: {}", path.display(), e))
    })?;

    debug!("Saved document to {} ({} bytes)", path.display(), json.len());
    Ok(())
}
