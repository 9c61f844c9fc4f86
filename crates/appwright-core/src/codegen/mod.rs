//! Per-file code generation from a persisted Plan.
//!
//! Paths are processed strictly in file-tree order, one at a time. Each
//! file's generation is isolated: any failure (provider error, bad path,
//! write error) is logged, counted, and the batch moves on. Only a missing
//! plan or an unusable workspace aborts the stage. There is no rollback:
//! re-running overwrites regenerated files and never cleans up strays from
//! earlier plans.

pub mod hints;

use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::layout::DataLayout;
use crate::plan::{Plan, load_plan, resolve_file_tree};
use crate::provider::{CompletionRequest, GenerationClient, GenerationProvider, ProviderError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Summary of one generation batch.
///
/// `file_count + failed_count` always equals the number of paths the plan's
/// file tree resolved to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    pub file_count: usize,
    /// Successfully generated paths, in original file-tree order.
    pub files: Vec<String>,
    pub workspace_path: PathBuf,
    pub failed_count: usize,
}

/// Stage-level errors. Per-file failures are not errors; they surface only
/// through [`Manifest::failed_count`].
#[derive(Debug, Error)]
pub enum CodegenError {
    /// No persisted plan for the project.
    #[error("no plan found for project {project_id:?}")]
    PlanMissing { project_id: String },

    /// The plan artifact exists but could not be read.
    #[error("plan artifact could not be read at {path:?}")]
    PlanUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The workspace root could not be created.
    #[error("workspace setup failed at {path:?}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One file's failure, absorbed by the batch loop.
#[derive(Debug, Error)]
enum FileGenError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("write failed: {0}")]
    Io(#[from] io::Error),

    #[error("refusing path outside the workspace: {0:?}")]
    UnsafePath(String),
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Generates one source file per resolved file-tree entry.
#[derive(Debug, Clone)]
pub struct CodeGenerator<P> {
    layout: DataLayout,
    client: GenerationClient<P>,
}

impl<P: GenerationProvider> CodeGenerator<P> {
    /// Sampling temperature for code output: slightly creative, mostly
    /// deterministic.
    const CODE_TEMPERATURE: f32 = 0.3;
    /// Output bound per file.
    const CODE_MAX_TOKENS: u32 = 4096;

    pub fn new(layout: DataLayout, client: GenerationClient<P>) -> Self {
        Self { layout, client }
    }

    /// Generate every file in the project's plan, returning the batch
    /// manifest. Fails only when the plan is missing/unreadable or the
    /// workspace root cannot be created.
    pub async fn generate(&self, project_id: &str) -> Result<Manifest, CodegenError> {
        let plan = match load_plan(&self.layout, project_id) {
            Ok(plan) => plan,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CodegenError::PlanMissing {
                    project_id: project_id.to_string(),
                });
            }
            Err(source) => {
                return Err(CodegenError::PlanUnreadable {
                    path: self.layout.plan_path(project_id),
                    source,
                });
            }
        };

        let workspace = self.layout.workspace_dir(project_id);
        std::fs::create_dir_all(&workspace).map_err(|source| CodegenError::Workspace {
            path: workspace.clone(),
            source,
        })?;

        let paths = resolve_file_tree(&plan.file_tree);
        info!(project_id, total = paths.len(), workspace = %workspace.display(), "generating files");

        let mut files = Vec::new();
        let mut failed_count = 0usize;

        for (index, rel_path) in paths.iter().enumerate() {
            info!(n = index + 1, total = paths.len(), file = %rel_path, "generating file");
            match self.generate_file(&workspace, rel_path, &plan).await {
                Ok(()) => files.push(rel_path.clone()),
                Err(e) => {
                    warn!(file = %rel_path, error = %e, "file generation failed, continuing");
                    failed_count += 1;
                }
            }
        }

        info!(
            project_id,
            created = files.len(),
            failed = failed_count,
            "code generation complete"
        );

        Ok(Manifest {
            file_count: files.len(),
            files,
            workspace_path: workspace,
            failed_count,
        })
    }

    async fn generate_file(
        &self,
        workspace: &Path,
        rel_path: &str,
        plan: &Plan,
    ) -> Result<(), FileGenError> {
        let target = resolve_target(workspace, rel_path)?;

        let request = CompletionRequest::new(build_file_prompt(rel_path, plan))
            .with_system(build_system_prompt(plan, hints::instructions_for(rel_path)))
            .with_temperature(Self::CODE_TEMPERATURE)
            .with_max_tokens(Self::CODE_MAX_TOKENS);

        let raw = self.client.generate_text(&request).await?;
        let code = strip_code_fence(&raw);

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, &code)?;
        debug!(file = %rel_path, bytes = code.len(), "file written");

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Join a plan-supplied relative path onto the workspace root.
///
/// Absolute paths and `..` components would escape the workspace; a plan
/// that emits one gets a per-file failure instead of a write.
fn resolve_target(workspace: &Path, rel_path: &str) -> Result<PathBuf, FileGenError> {
    let rel = Path::new(rel_path);
    let escapes = rel.is_absolute()
        || rel
            .components()
            .any(|c| matches!(c, Component::ParentDir));
    if escapes {
        return Err(FileGenError::UnsafePath(rel_path.to_string()));
    }
    Ok(workspace.join(rel))
}

fn build_system_prompt(plan: &Plan, hints: &str) -> String {
    let frontend = plan.stack.get("frontend").map(String::as_str).unwrap_or("N/A");
    let backend = plan.stack.get("backend").map(String::as_str).unwrap_or("N/A");

    format!(
        "You are an expert software engineer.\n\
         Generate production-ready code following best practices.\n\
         Tech stack: {frontend} / {backend}\n\n\
         CRITICAL RULES:\n\
         - Return ONLY raw code - NO markdown code blocks (no ```)\n\
         - NO explanations, NO comments outside the code itself\n\
         - Start directly with the first line of code (imports, etc.)\n\
         - Use proper imports and types\n\
         - Include brief inline comments for complex logic only\n\
         - Make it functional and production-ready\n\
         {hints}"
    )
}

fn build_file_prompt(rel_path: &str, plan: &Plan) -> String {
    let plan_json =
        serde_json::to_string_pretty(plan).expect("plan serialization cannot fail");

    format!(
        "Generate code for this file: {rel_path}\n\n\
         PROJECT PLAN:\n{plan_json}\n\n\
         REQUIREMENTS:\n\
         - File path: {rel_path}\n\
         - Use the tech stack, entities, API routes, and dependencies from the plan above\n\
         - Make sure imports reference the correct paths based on file location\n\
         - Include proper error handling where appropriate\n\
         - Follow framework conventions for the stack being used\n\n\
         Return ONLY the code content for this file, nothing else."
    )
}

/// Strip an enclosing fenced-block wrapper if present.
///
/// Removes a first line that is a fence marker (with or without a language
/// tag) and a trailing bare marker line; the interior content, including
/// its internal whitespace, is preserved exactly.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let mut lines: Vec<&str> = trimmed.lines().collect();
    lines.remove(0);
    if lines.last().is_some_and(|last| last.trim() == "```") {
        lines.pop();
    }
    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
