//! Filesystem adapters for metaloop.
//!
//! Implements the `FileSystem` trait from `metaloop-core` for real
//! filesystem I/O and wires it into the prompt service.

use std::path::{Path, PathBuf};

use metaloop_core::service::fs::FileSystem;
use metaloop_core::service::prompt::PromptService;

/// Local filesystem implementation of the `FileSystem` trait.
///
/// All operations go through `tokio::fs` for async I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

/// Prompt state stored under a directory on the local disk.
pub type FilePromptStore = PromptService<LocalFileSystem>;

/// Open the prompt directory. Files are created lazily on first load.
pub fn prompt_store(dir: impl Into<PathBuf>) -> FilePromptStore {
    PromptService::new(LocalFileSystem::new(), dir)
}

impl FileSystem for LocalFileSystem {
    async fn write_file(&self, path: &Path, content: &str) -> Result<(), std::io::Error> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await
    }

    async fn read_file(&self, path: &Path) -> Result<String, std::io::Error> {
        tokio::fs::read_to_string(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), std::io::Error> {
        tokio::fs::create_dir_all(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}
