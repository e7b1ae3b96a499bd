//! File operations for the local backend.
//!
//! Sandbox-absolute paths are resolved lexically below the sandbox root, so
//! `..` can never climb above it. Every access then checks the real location
//! with symlinks followed; a link pointing out of the root is rejected.

use crate::error::{CoreError, Result};
use crate::interpreter::{FileEntry, FileInterface, FileMetadata};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};

/// Maximum file size for read (10 MB).
/// Prevents memory exhaustion from reading huge files.
const MAX_READ_SIZE: u64 = 10 * 1024 * 1024;

/// Files of one local sandbox.
pub(crate) struct LocalFiles {
    root: PathBuf,
}

impl LocalFiles {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Map a sandbox path to a host path below the root.
    pub(crate) fn resolve(&self, path: &str) -> Result<PathBuf> {
        if path.contains('\0') {
            return Err(CoreError::InvalidPath(path.to_string()));
        }

        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(CoreError::InvalidPath(format!(
                            "{path} escapes the sandbox root"
                        )));
                    }
                    resolved.pop();
                    depth -= 1;
                }
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }
        Ok(resolved)
    }

    /// Follow symlinks in `host` and check that the result is still below the
    /// root.
    ///
    /// Missing trailing components are allowed (for writes); the deepest
    /// existing ancestor is canonicalized and the rest appended.
    async fn confine(&self, path: &str, host: &Path) -> Result<PathBuf> {
        let mut existing = host;
        let mut missing = Vec::new();
        let real = loop {
            match tokio::fs::canonicalize(existing).await {
                Ok(real) => break real,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    // A dangling symlink exists but cannot be canonicalized.
                    if tokio::fs::symlink_metadata(existing).await.is_ok() {
                        return Err(CoreError::InvalidPath(format!(
                            "{path} is a link outside the sandbox root"
                        )));
                    }
                    match (existing.file_name(), existing.parent()) {
                        (Some(name), Some(parent)) => {
                            missing.push(name.to_os_string());
                            existing = parent;
                        }
                        _ => return Err(io_error("resolve", path, e)),
                    }
                }
                Err(e) => return Err(io_error("resolve", path, e)),
            }
        };

        if !real.starts_with(&self.root) {
            return Err(CoreError::InvalidPath(format!(
                "{path} escapes the sandbox root"
            )));
        }
        Ok(missing.into_iter().rev().fold(real, |acc, name| acc.join(name)))
    }

    /// Resolve a sandbox path to its real host location below the root.
    async fn resolve_real(&self, path: &str) -> Result<PathBuf> {
        let host = self.resolve(path)?;
        self.confine(path, &host).await
    }

    /// Map a host path below the root back to a sandbox path.
    fn sandbox_path(&self, host: &Path) -> String {
        let relative = host.strip_prefix(&self.root).unwrap_or(host);
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        format!("/{}", parts.join("/"))
    }
}

fn io_error(action: &str, path: &str, e: std::io::Error) -> CoreError {
    CoreError::Io(std::io::Error::new(
        e.kind(),
        format!("failed to {action} '{path}': {e}"),
    ))
}

#[cfg(unix)]
fn permissions_of(metadata: &std::fs::Metadata) -> Option<String> {
    use std::os::unix::fs::PermissionsExt;
    Some(format!("{:o}", metadata.permissions().mode() & 0o7777))
}

#[cfg(not(unix))]
fn permissions_of(metadata: &std::fs::Metadata) -> Option<String> {
    Some(if metadata.permissions().readonly() { "r" } else { "rw" }.to_string())
}

#[async_trait]
impl FileInterface for LocalFiles {
    async fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        let dir = self.resolve_real(path).await?;
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| io_error("read directory", path, e))?;

        let mut result = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            let host_path = entry.path();
            result.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: self.sandbox_path(&host_path),
                is_dir: metadata.is_dir(),
                size: if metadata.is_file() { metadata.len() } else { 0 },
            });
        }

        // Sort by name for consistent output
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn read(&self, path: &str) -> Result<String> {
        let file = self.resolve_real(path).await?;
        let metadata = tokio::fs::metadata(&file)
            .await
            .map_err(|e| io_error("stat", path, e))?;

        if metadata.len() > MAX_READ_SIZE {
            return Err(CoreError::InvalidPath(format!(
                "file '{}' is too large ({} bytes, max {} bytes)",
                path,
                metadata.len(),
                MAX_READ_SIZE
            )));
        }

        let bytes = tokio::fs::read(&file)
            .await
            .map_err(|e| io_error("read", path, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        let file = self.resolve_real(path).await?;
        if file == self.root {
            return Err(CoreError::InvalidPath(format!("{path} is a directory")));
        }
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create directories for", path, e))?;
        }
        tokio::fs::write(&file, content)
            .await
            .map_err(|e| io_error("write", path, e))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        if target == self.root {
            return Err(CoreError::InvalidPath("cannot delete the sandbox root".into()));
        }
        // Only the parent is followed, so deleting a symlink removes the link.
        let (Some(parent), Some(name)) = (target.parent(), target.file_name()) else {
            return Err(CoreError::InvalidPath(path.to_string()));
        };
        let target = self.confine(path, parent).await?.join(name);
        let metadata = tokio::fs::symlink_metadata(&target)
            .await
            .map_err(|e| io_error("stat", path, e))?;
        if metadata.is_dir() {
            tokio::fs::remove_dir_all(&target).await
        } else {
            tokio::fs::remove_file(&target).await
        }
        .map_err(|e| io_error("delete", path, e))
    }

    async fn stat(&self, path: &str) -> Result<FileMetadata> {
        let target = self.resolve_real(path).await?;
        let metadata = tokio::fs::metadata(&target)
            .await
            .map_err(|e| io_error("stat", path, e))?;

        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string());

        Ok(FileMetadata {
            name,
            path: self.sandbox_path(&target),
            is_dir: metadata.is_dir(),
            size: if metadata.is_file() { metadata.len() } else { 0 },
            modified: metadata
                .modified()
                .ok()
                .map(|t| DateTime::<Utc>::from(t).to_rfc3339()),
            permissions: permissions_of(&metadata),
        })
    }
}
