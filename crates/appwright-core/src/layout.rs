//! On-disk artifact layout.
//!
//! Every pipeline stage persists its artifact under one data root, keyed by
//! project id:
//!
//! ```text
//! <root>/specs/<project_id>_live.json
//! <root>/specs/<project_id>_frozen.json
//! <root>/plans/<project_id>.json
//! <root>/workspace/<project_id>/...
//! ```
//!
//! The layout performs no locking; concurrent writers racing on the same
//! project id are the caller's problem (single-writer-per-project-id is an
//! external invariant).

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Resolves artifact paths under a single data root.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    /// Default data root, relative to the working directory.
    pub const DEFAULT_ROOT: &'static str = "data";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the live Spec artifact.
    pub fn spec_live_path(&self, project_id: &str) -> PathBuf {
        self.root.join("specs").join(format!("{project_id}_live.json"))
    }

    /// Path of the frozen Spec snapshot.
    pub fn spec_frozen_path(&self, project_id: &str) -> PathBuf {
        self.root
            .join("specs")
            .join(format!("{project_id}_frozen.json"))
    }

    /// Path of the Plan artifact.
    pub fn plan_path(&self, project_id: &str) -> PathBuf {
        self.root.join("plans").join(format!("{project_id}.json"))
    }

    /// Root of the generated-code workspace for a project.
    pub fn workspace_dir(&self, project_id: &str) -> PathBuf {
        self.root.join("workspace").join(project_id)
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ROOT)
    }
}

/// Write a value as pretty-printed JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(value)?;
    std::fs::write(path, contents)
}

/// Read and deserialize a JSON artifact.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> io::Result<T> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(io::Error::from)
}
