//! The Plan: a structured technical blueprint derived from a frozen Spec.
//!
//! Validation happens on the raw provider JSON before deserialization so a
//! bad plan can name every missing or malformed field instead of dying on
//! the first serde error. A validated Plan is persisted per project id,
//! overwriting any prior plan -- there is no plan versioning.

pub mod resolve;
pub mod synthesize;

pub use resolve::resolve_file_tree;
pub use synthesize::PlanSynthesizer;

use std::io;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::layout::{self, DataLayout};
use crate::provider::ProviderError;
use crate::spec::store::SpecStoreError;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The file listing of a plan: either a flat ordered path list or an
/// insertion-ordered mapping of category to paths.
///
/// Category values are kept as raw JSON: a category whose value is not a
/// path list survives deserialization and is skipped by the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileTree {
    Flat(Vec<String>),
    Categorized(IndexMap<String, Value>),
}

impl Default for FileTree {
    fn default() -> Self {
        FileTree::Flat(Vec::new())
    }
}

/// A validated project plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Role -> technology name (e.g. "frontend" -> "Next.js 14").
    pub stack: IndexMap<String, String>,
    /// Ecosystem -> ordered package list.
    pub dependencies: IndexMap<String, Vec<String>>,
    pub file_tree: FileTree,
    #[serde(default)]
    pub api_routes: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    pub tasks: Vec<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from plan synthesis and persistence.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Missing frozen Spec, propagated unchanged from the spec store.
    #[error(transparent)]
    Spec(#[from] SpecStoreError),

    /// Generation failed (fatal provider error, exhausted retries, or
    /// unusable structured output).
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The generated plan is missing required fields or malformed.
    #[error("plan validation failed: {}", issues.join("; "))]
    Validation { issues: Vec<String> },

    /// Reading or writing the plan artifact failed.
    #[error("plan artifact I/O failed at {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Top-level keys every plan must carry.
pub const REQUIRED_PLAN_FIELDS: [&str; 4] = ["stack", "dependencies", "file_tree", "tasks"];

/// Validate raw provider output as a [`Plan`].
///
/// Collects every missing required field and a malformed `file_tree` shape
/// into one [`PlanError::Validation`] rather than failing piecemeal.
pub fn validate_plan(value: &Value) -> Result<Plan, PlanError> {
    let Some(object) = value.as_object() else {
        return Err(PlanError::Validation {
            issues: vec!["plan is not a JSON object".to_string()],
        });
    };

    let mut issues = Vec::new();

    for key in REQUIRED_PLAN_FIELDS {
        if !object.contains_key(key) {
            issues.push(format!("missing required field: {key}"));
        }
    }

    if let Some(file_tree) = object.get("file_tree") {
        if !file_tree.is_array() && !file_tree.is_object() {
            issues.push(
                "file_tree must be a sequence of paths or a mapping of category to paths"
                    .to_string(),
            );
        }
    }

    if !issues.is_empty() {
        return Err(PlanError::Validation { issues });
    }

    serde_json::from_value(value.clone()).map_err(|e| PlanError::Validation {
        issues: vec![format!("plan does not match the expected shape: {e}")],
    })
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Persist a plan, overwriting any prior plan for the project id.
pub fn store_plan(layout: &DataLayout, project_id: &str, plan: &Plan) -> io::Result<PathBuf> {
    let path = layout.plan_path(project_id);
    layout::write_json(&path, plan)?;
    Ok(path)
}

/// Load the persisted plan for a project id.
///
/// Absence surfaces as `io::ErrorKind::NotFound`; callers map it to their
/// own not-found variant.
pub fn load_plan(layout: &DataLayout, project_id: &str) -> io::Result<Plan> {
    layout::read_json(&layout.plan_path(project_id))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
