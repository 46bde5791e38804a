//! Persisted root state document.
//!
//! One JSON document holds balances, the flat trade list, per-strategy
//! bookkeeping and the active strategy set. It is read once at open and
//! fully rewritten on every update. Updates are serialized by a single lock
//! that is held across the write, so concurrent writers never lose each
//! other's changes. File-backed writes run on the blocking pool.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::domain::StateDocument;
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct StateStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    path: Option<PathBuf>,
    document: Mutex<StateDocument>,
}

impl StateStore {
    /// Load `path`, or start from the default document when it is missing.
    #[allow(clippy::result_large_err)]
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let document = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let document: StateDocument = serde_json::from_str(&content).map_err(|e| {
                Error::Persistence(format!("corrupt state file {}: {e}", path.display()))
            })?;
            info!(
                path = %path.display(),
                strategies = document.strategies.len(),
                active = document.active_strategies.len(),
                "State loaded"
            );
            document
        } else {
            info!(path = %path.display(), "No state file, starting from defaults");
            StateDocument::default()
        };
        Ok(Self {
            inner: Arc::new(StoreInner {
                path: Some(path),
                document: Mutex::new(document),
            }),
        })
    }

    /// A store that never touches disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_document(StateDocument::default())
    }

    #[must_use]
    pub fn with_document(document: StateDocument) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path: None,
                document: Mutex::new(document),
            }),
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Apply `f` and persist the result.
    ///
    /// `f` runs on a copy; the in-memory document only changes once the
    /// write has succeeded.
    pub async fn update<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut StateDocument) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.inner.path.is_none() {
            return self.inner.apply(f);
        }
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.apply(f))
            .await
            .map_err(|e| Error::Persistence(format!("state write task failed: {e}")))?
    }

    /// Read without persisting.
    pub fn read<R>(&self, f: impl FnOnce(&StateDocument) -> R) -> R {
        f(&self.inner.document.lock())
    }

    #[must_use]
    pub fn snapshot(&self) -> StateDocument {
        self.inner.document.lock().clone()
    }
}

impl StoreInner {
    #[allow(clippy::result_large_err)]
    fn apply<R>(&self, f: impl FnOnce(&mut StateDocument) -> R) -> Result<R> {
        let mut document = self.document.lock();
        let mut next = document.clone();
        let result = f(&mut next);
        if let Some(path) = &self.path {
            write_atomic(path, &next)?;
        }
        *document = next;
        Ok(result)
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("path", &self.inner.path)
            .finish_non_exhaustive()
    }
}

/// Write to a temp file beside `path`, then rename over it.
#[allow(clippy::result_large_err)]
fn write_atomic(path: &Path, document: &StateDocument) -> Result<()> {
    let json = serde_json::to_string_pretty(document)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)?;

    let cleanup_and_err = |e| {
        let _ = fs::remove_file(&temp_path);
        e
    };

    file.write_all(json.as_bytes()).map_err(cleanup_and_err)?;
    file.sync_all().map_err(cleanup_and_err)?;
    fs::rename(&temp_path, path).map_err(cleanup_and_err)?;

    debug!(path = %path.display(), bytes = json.len(), "State persisted");
    Ok(())
}
