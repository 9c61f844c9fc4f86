//! File-backed persistence for live Specs and frozen snapshots.
//!
//! Artifacts live under `<data_root>/specs/` as pretty-printed JSON, one
//! live document and at most one frozen snapshot per project id. `load`
//! initializes a blank Spec on first access; `load_frozen` is the only
//! operation that fails on absence.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::layout::{self, DataLayout};
use crate::spec::{FrozenSpec, Intent, Spec};

/// Errors from Spec persistence.
#[derive(Debug, Error)]
pub enum SpecStoreError {
    /// No frozen snapshot exists for the project.
    #[error("no frozen spec found for project {project_id:?}")]
    FrozenNotFound { project_id: String },

    /// Reading or writing a spec artifact failed.
    #[error("spec artifact I/O failed at {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Owns the living Spec's lifecycle: create, load, merge, freeze.
#[derive(Debug, Clone)]
pub struct SpecStore {
    layout: DataLayout,
}

impl SpecStore {
    pub fn new(layout: DataLayout) -> Self {
        Self { layout }
    }

    /// Load the live Spec, initializing (and persisting) a blank one if the
    /// project has none yet. Never fails on absence.
    pub fn load(&self, project_id: &str) -> Result<Spec, SpecStoreError> {
        let path = self.layout.spec_live_path(project_id);
        match layout::read_json::<Spec>(&path) {
            Ok(spec) => Ok(spec),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(project_id, "no live spec found, creating a blank one");
                let spec = Spec::blank(project_id);
                self.save(&spec)?;
                Ok(spec)
            }
            Err(source) => Err(SpecStoreError::Io { path, source }),
        }
    }

    /// Merge one intent into the live Spec and persist the result.
    ///
    /// Intents with an empty payload are logged and ignored; the Spec is
    /// returned unchanged (and still re-persisted -- merge is the write
    /// path, not a read).
    pub fn merge(&self, project_id: &str, intent: &Intent) -> Result<Spec, SpecStoreError> {
        let mut spec = self.load(project_id)?;
        if !spec.merge(intent) {
            warn!(project_id, "invalid intent ignored, spec unchanged");
        }
        self.save(&spec)?;
        Ok(spec)
    }

    /// Snapshot the current live Spec as the frozen artifact, overwriting
    /// any prior snapshot. The live Spec's own status is untouched.
    pub fn freeze(&self, project_id: &str) -> Result<FrozenSpec, SpecStoreError> {
        let live = self.load(project_id)?;
        let frozen = live.freeze();
        let path = self.layout.spec_frozen_path(project_id);
        layout::write_json(&path, &frozen)
            .map_err(|source| SpecStoreError::Io { path: path.clone(), source })?;
        info!(project_id, path = %path.display(), "frozen spec snapshot written");
        Ok(frozen)
    }

    /// Load the frozen snapshot, failing if none exists.
    pub fn load_frozen(&self, project_id: &str) -> Result<FrozenSpec, SpecStoreError> {
        let path = self.layout.spec_frozen_path(project_id);
        match layout::read_json::<FrozenSpec>(&path) {
            Ok(frozen) => Ok(frozen),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SpecStoreError::FrozenNotFound {
                project_id: project_id.to_string(),
            }),
            Err(source) => Err(SpecStoreError::Io { path, source }),
        }
    }

    fn save(&self, spec: &Spec) -> Result<(), SpecStoreError> {
        let path = self.layout.spec_live_path(&spec.project_id);
        layout::write_json(&path, spec)
            .map_err(|source| SpecStoreError::Io { path: path.clone(), source })?;
        debug!(project_id = %spec.project_id, path = %path.display(), "live spec saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Entity, Field, SpecStatus};

    fn test_store() -> (tempfile::TempDir, SpecStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SpecStore::new(DataLayout::new(dir.path()));
        (dir, store)
    }

    #[test]
    fn load_initializes_blank_spec_on_first_access() {
        let (_dir, store) = test_store();
        let spec = store.load("p1").unwrap();
        assert_eq!(spec, Spec::blank("p1"));
        // The blank spec is persisted, not just returned.
        assert_eq!(store.load("p1").unwrap(), spec);
    }

    #[test]
    fn merge_persists_after_every_call() {
        let (_dir, store) = test_store();
        store
            .merge("p1", &Intent::FeatureRequest("Home".to_string()))
            .unwrap();
        let reloaded = store.load("p1").unwrap();
        assert_eq!(reloaded.pages, vec!["Home"]);
    }

    #[test]
    fn merge_entity_intent_round_trips_through_disk() {
        let (_dir, store) = test_store();
        let entity = Entity {
            name: "Dog".to_string(),
            fields: vec![Field::new("name", "text")],
        };
        store.merge("p1", &Intent::Entity(entity.clone())).unwrap();
        store
            .merge(
                "p1",
                &Intent::Entity(Entity {
                    name: "Dog".to_string(),
                    fields: vec![Field::new("age", "number")],
                }),
            )
            .unwrap();

        let spec = store.load("p1").unwrap();
        assert_eq!(spec.entities.len(), 1);
        assert_eq!(spec.entities[0].fields.len(), 2);
    }

    #[test]
    fn invalid_intent_leaves_persisted_spec_unchanged() {
        let (_dir, store) = test_store();
        store
            .merge("p1", &Intent::FeatureRequest("Home".to_string()))
            .unwrap();
        let spec = store
            .merge("p1", &Intent::Integration(String::new()))
            .unwrap();
        assert_eq!(spec.integrations, Vec::<String>::new());
        assert_eq!(store.load("p1").unwrap(), spec);
    }

    #[test]
    fn freeze_writes_snapshot_and_leaves_live_status() {
        let (_dir, store) = test_store();
        store
            .merge("p1", &Intent::FeatureRequest("Home".to_string()))
            .unwrap();
        let frozen = store.freeze("p1").unwrap();

        assert_eq!(frozen.as_spec().metadata.status, SpecStatus::Frozen);
        assert_eq!(store.load("p1").unwrap().metadata.status, SpecStatus::Live);

        let loaded = store.load_frozen("p1").unwrap();
        assert_eq!(loaded, frozen);
    }

    #[test]
    fn double_freeze_without_merges_yields_equal_snapshots() {
        let (_dir, store) = test_store();
        store
            .merge("p1", &Intent::Constraint("offline-first".to_string()))
            .unwrap();
        let first = store.freeze("p1").unwrap();
        let second = store.freeze("p1").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn freeze_then_merge_does_not_touch_snapshot() {
        let (_dir, store) = test_store();
        store.freeze("p1").unwrap();
        store
            .merge("p1", &Intent::FeatureRequest("Later".to_string()))
            .unwrap();
        let frozen = store.load_frozen("p1").unwrap();
        assert!(frozen.as_spec().pages.is_empty());
    }

    #[test]
    fn load_frozen_without_snapshot_is_not_found() {
        let (_dir, store) = test_store();
        let err = store.load_frozen("p1").unwrap_err();
        assert!(matches!(err, SpecStoreError::FrozenNotFound { .. }));
    }
}
