//! Derived build stage.
//!
//! One project moves through a one-directional pipeline:
//!
//! ```text
//! SPEC_LIVE -> (freeze) -> SPEC_FROZEN -> (synthesize) -> PLAN_READY
//!           -> (generate) -> CODE_PARTIAL | CODE_COMPLETE
//! ```
//!
//! The stage is never stored; it is computed from which artifacts exist on
//! disk, so re-running an earlier stage regenerates only that stage's own
//! artifact and later artifacts keep counting.

use std::io;

use serde::Serialize;

use crate::layout::DataLayout;
use crate::plan::{load_plan, resolve_file_tree};

/// Where a project currently sits in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    SpecLive,
    SpecFrozen,
    PlanReady,
    CodePartial,
    CodeComplete,
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BuildStage::SpecLive => "spec_live",
            BuildStage::SpecFrozen => "spec_frozen",
            BuildStage::PlanReady => "plan_ready",
            BuildStage::CodePartial => "code_partial",
            BuildStage::CodeComplete => "code_complete",
        };
        write!(f, "{name}")
    }
}

/// Compute a project's stage from its artifacts.
///
/// A plan promotes past `SpecFrozen`; generated files promote to
/// `CodeComplete` once every path the plan resolves to exists in the
/// workspace, or `CodePartial` when only some do.
pub fn build_stage(layout: &DataLayout, project_id: &str) -> io::Result<BuildStage> {
    let plan = match load_plan(layout, project_id) {
        Ok(plan) => Some(plan),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };

    if let Some(plan) = plan {
        let workspace = layout.workspace_dir(project_id);
        let paths = resolve_file_tree(&plan.file_tree);

        if workspace.exists() && !paths.is_empty() {
            let present = paths
                .iter()
                .filter(|p| workspace.join(p).exists())
                .count();
            if present == paths.len() {
                return Ok(BuildStage::CodeComplete);
            }
            if present > 0 {
                return Ok(BuildStage::CodePartial);
            }
        }
        return Ok(BuildStage::PlanReady);
    }

    if layout.spec_frozen_path(project_id).exists() {
        return Ok(BuildStage::SpecFrozen);
    }
    Ok(BuildStage::SpecLive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    use crate::plan::{FileTree, Plan, store_plan};
    use crate::spec::store::SpecStore;

    fn plan_with_files(paths: &[&str]) -> Plan {
        Plan {
            stack: IndexMap::new(),
            dependencies: IndexMap::new(),
            file_tree: FileTree::Flat(paths.iter().map(|p| p.to_string()).collect()),
            api_routes: vec![],
            entities: vec![],
            tasks: vec!["t".to_string()],
        }
    }

    #[test]
    fn stage_progresses_with_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let store = SpecStore::new(layout.clone());

        assert_eq!(build_stage(&layout, "p1").unwrap(), BuildStage::SpecLive);

        store.freeze("p1").unwrap();
        assert_eq!(build_stage(&layout, "p1").unwrap(), BuildStage::SpecFrozen);

        store_plan(&layout, "p1", &plan_with_files(&["a.py", "b.py"])).unwrap();
        assert_eq!(build_stage(&layout, "p1").unwrap(), BuildStage::PlanReady);

        let workspace = layout.workspace_dir("p1");
        std::fs::create_dir_all(&workspace).unwrap();
        assert_eq!(build_stage(&layout, "p1").unwrap(), BuildStage::PlanReady);

        std::fs::write(workspace.join("a.py"), "pass\n").unwrap();
        assert_eq!(build_stage(&layout, "p1").unwrap(), BuildStage::CodePartial);

        std::fs::write(workspace.join("b.py"), "pass\n").unwrap();
        assert_eq!(build_stage(&layout, "p1").unwrap(), BuildStage::CodeComplete);
    }

    #[test]
    fn empty_plan_file_tree_stays_plan_ready() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        store_plan(&layout, "p1", &plan_with_files(&[])).unwrap();
        std::fs::create_dir_all(layout.workspace_dir("p1")).unwrap();
        assert_eq!(build_stage(&layout, "p1").unwrap(), BuildStage::PlanReady);
    }
}
