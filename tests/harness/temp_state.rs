use std::path::PathBuf;

use arbengine::adapter::store::StateStore;
use tempfile::TempDir;

/// State file in a temporary directory, removed on drop.
pub struct TempState {
    dir: TempDir,
}

impl TempState {
    pub fn create() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("state.json")
    }

    /// Open (or reopen) the store backed by this file.
    pub fn open(&self) -> StateStore {
        StateStore::open(self.path()).expect("open state store")
    }
}
