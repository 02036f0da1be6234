//! Async loading boundary: script repositories and resource loaders.
//!
//! The engine itself is synchronous; everything that touches the file
//! system or a network sits behind these traits and runs on the host's
//! runtime before playback is driven.

use crate::engine::Engine;
use crate::error::Diagnostics;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// File extension script files are stored under.
pub const SCRIPT_EXTENSION: &str = "knr";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("script '{name}' not found")]
    NotFound { name: String },

    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("loading was cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("resource '{path}' not found")]
    NotFound { path: String },

    #[error("failed to load resource '{path}': {message}")]
    Failed { path: String, message: String },
}

/// Source of script texts, keyed by script name.
#[async_trait]
pub trait ScriptRepository: Send + Sync {
    async fn load_script(&self, name: &str) -> Result<String, RepositoryError>;

    async fn list_scripts(&self) -> Result<Vec<String>, RepositoryError>;
}

/// Host-side resource cache the engine hands preload paths to.
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    async fn preload(&self, path: &str) -> Result<(), LoadError>;

    async fn release(&self, path: &str);
}

/// Cooperative cancellation shared between the host and in-flight loads.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Scripts stored as `<root>/<name>.knr` files.
pub struct FileSystemScriptRepository {
    root: PathBuf,
}

impl FileSystemScriptRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn script_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{SCRIPT_EXTENSION}"))
    }
}

#[async_trait]
impl ScriptRepository for FileSystemScriptRepository {
    async fn load_script(&self, name: &str) -> Result<String, RepositoryError> {
        let path = self.script_path(name);
        if !path.exists() {
            return Err(RepositoryError::NotFound {
                name: name.to_string(),
            });
        }
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| RepositoryError::Io {
                path: path.display().to_string(),
                source,
            })
    }

    async fn list_scripts(&self) -> Result<Vec<String>, RepositoryError> {
        let mut entries =
            tokio::fs::read_dir(&self.root)
                .await
                .map_err(|source| RepositoryError::Io {
                    path: self.root.display().to_string(),
                    source,
                })?;
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| RepositoryError::Io {
                path: self.root.display().to_string(),
                source,
            })?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(SCRIPT_EXTENSION)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Load every script the repository lists into the engine, checking for
/// cancellation between scripts. Returns the merged diagnostics.
pub async fn load_scripts_into(
    engine: &mut Engine,
    repository: &dyn ScriptRepository,
    token: &CancellationToken,
) -> Result<Diagnostics, RepositoryError> {
    let mut all = Diagnostics::new();
    for name in repository.list_scripts().await? {
        if token.is_cancelled() {
            return Err(RepositoryError::Cancelled);
        }
        let text = repository.load_script(&name).await?;
        all.extend(engine.load_script(&name, &text));
    }
    Ok(all)
}

/// Preload a batch of resource paths, stopping early on cancellation.
/// Individual failures are logged, not fatal; a missing background must
/// not block playback.
pub async fn preload_all(
    loader: &dyn ResourceLoader,
    paths: &[String],
    token: &CancellationToken,
) {
    for path in paths {
        if token.is_cancelled() {
            return;
        }
        if let Err(err) = loader.preload(path).await {
            log::warn!("preload failed: {err}");
        }
    }
}
