//! Spec-side commands: mint project ids, merge intents, freeze, status.

use std::path::Path;

use anyhow::{Context, Result, bail};

use appwright_core::spec::store::SpecStore;
use appwright_core::spec::Intent;
use appwright_core::{DataLayout, build_stage};

/// Execute `appwright new`: print a fresh project id.
pub fn cmd_new() -> Result<()> {
    println!("{}", uuid::Uuid::new_v4());
    Ok(())
}

/// Execute `appwright merge`: parse one intent and merge it into the
/// project's live Spec.
///
/// The intent JSON comes from the positional argument or `--file`, exactly
/// one of the two.
pub fn cmd_merge(
    layout: &DataLayout,
    project_id: &str,
    intent_json: Option<&str>,
    intent_file: Option<&Path>,
) -> Result<()> {
    let raw = match (intent_json, intent_file) {
        (Some(json), None) => json.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read intent file {}", path.display()))?,
        (Some(_), Some(_)) => bail!("pass the intent inline or with --file, not both"),
        (None, None) => bail!("no intent given; pass JSON inline or with --file"),
    };

    let intent: Intent = serde_json::from_str(&raw)
        .context("intent is not a recognized intent object (expected {\"type\": ..., \"data\": ...})")?;

    let store = SpecStore::new(layout.clone());
    let spec = store.merge(project_id, &intent)?;

    println!(
        "Merged into {project_id}: {} entities, {} pages, {} integrations, {} constraints, {} acceptance criteria",
        spec.entities.len(),
        spec.pages.len(),
        spec.integrations.len(),
        spec.constraints.len(),
        spec.acceptance.len(),
    );
    Ok(())
}

/// Execute `appwright freeze`: snapshot the live Spec for building.
pub fn cmd_freeze(layout: &DataLayout, project_id: &str) -> Result<()> {
    let store = SpecStore::new(layout.clone());
    let frozen = store.freeze(project_id)?;
    println!(
        "Frozen spec written to {} ({} entities, {} pages)",
        layout.spec_frozen_path(project_id).display(),
        frozen.as_spec().entities.len(),
        frozen.as_spec().pages.len(),
    );
    Ok(())
}

/// Execute `appwright status`: show where the project sits in the pipeline.
pub fn cmd_status(layout: &DataLayout, project_id: &str) -> Result<()> {
    let stage = build_stage(layout, project_id)?;
    println!("{project_id}: {stage}");

    if layout.spec_live_path(project_id).exists() {
        println!("  spec:      {}", layout.spec_live_path(project_id).display());
    }
    if layout.spec_frozen_path(project_id).exists() {
        println!("  frozen:    {}", layout.spec_frozen_path(project_id).display());
    }
    if layout.plan_path(project_id).exists() {
        println!("  plan:      {}", layout.plan_path(project_id).display());
    }
    if layout.workspace_dir(project_id).exists() {
        println!("  workspace: {}", layout.workspace_dir(project_id).display());
    }
    Ok(())
}
