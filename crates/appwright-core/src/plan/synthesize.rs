//! Plan synthesis: turn a frozen Spec into a validated, persisted Plan.
//!
//! The synthesizer embeds the full frozen Spec as structured context in a
//! single generation request and instructs the provider to answer with
//! nothing but a JSON object in the Plan shape. Prompt assembly is pure so
//! it can be tested without a provider.

use tracing::{debug, info};

use crate::layout::DataLayout;
use crate::provider::{CompletionRequest, GenerationClient, GenerationProvider};
use crate::spec::{FrozenSpec, store::SpecStore};

use super::{Plan, PlanError, store_plan, validate_plan};

// ---------------------------------------------------------------------------
// Prompt construction
// ---------------------------------------------------------------------------

/// System instruction for the plan request.
const SYSTEM_PROMPT: &str = "You are an expert full-stack software architect. \
     Given a structured app specification, output ONLY a valid JSON object. \
     No markdown, no code blocks, no explanation - just raw JSON.";

/// Example of the expected plan object, included verbatim in the prompt.
const PLAN_SHAPE: &str = r#"{
  "stack": {
    "frontend": "Next.js 14",
    "backend": "FastAPI",
    "auth": "Supabase Auth",
    "database": "PostgreSQL"
  },
  "dependencies": {
    "frontend": ["react", "next", "tailwindcss"],
    "backend": ["fastapi", "sqlalchemy", "pydantic"]
  },
  "file_tree": [
    "README.md",
    "frontend/package.json",
    "frontend/app/layout.tsx",
    "frontend/app/page.tsx",
    "frontend/lib/api-client.ts",
    "backend/main.py",
    "backend/requirements.txt",
    "backend/models/item.py",
    "backend/api/items.py"
  ],
  "api_routes": ["/api/items", "/api/health"],
  "entities": ["Item", "User"],
  "tasks": [
    "Set up Next.js project with TypeScript",
    "Configure FastAPI backend",
    "Create database models",
    "Build dashboard UI"
  ]
}"#;

/// Output rules appended after the shape example.
const PLAN_RULES: &str = r#"IMPORTANT RULES:
1. file_tree should be a flat array of full paths (e.g. "frontend/app/page.tsx")
2. Include frontend/ and backend/ prefixes for proper folder separation
3. Keep the file list focused - include ~10-20 essential files, not every possible file
4. Include key config files (package.json, requirements.txt, tsconfig.json)
5. Include main components, pages, models, and API routes
6. Don't generate exhaustive lists - focus on core functionality"#;

/// Build the user prompt for plan synthesis.
///
/// Embeds the frozen Spec as pretty JSON, optional free-text guidance, the
/// expected object shape, and the output rules.
pub fn build_plan_prompt(spec: &FrozenSpec, guidance: Option<&str>) -> String {
    let spec_json = serde_json::to_string_pretty(spec.as_spec())
        .expect("spec serialization cannot fail");

    let mut prompt = String::with_capacity(4096);

    prompt.push_str("Based on this specification, generate a complete project plan.\n\n");
    prompt.push_str("SPECIFICATION:\n");
    prompt.push_str(&spec_json);
    prompt.push_str("\n\nCONTEXT:\n");
    match guidance {
        Some(text) if !text.is_empty() => prompt.push_str(text),
        _ => prompt.push_str("No additional context"),
    }
    prompt.push_str("\n\nReturn ONLY a JSON object with this exact structure:\n\n");
    prompt.push_str(PLAN_SHAPE);
    prompt.push_str("\n\n");
    prompt.push_str(PLAN_RULES);
    prompt.push_str("\n\nReturn ONLY the JSON object, nothing else.");

    prompt
}

// ---------------------------------------------------------------------------
// Synthesizer
// ---------------------------------------------------------------------------

/// Produces a validated Plan from a project's frozen Spec.
#[derive(Debug, Clone)]
pub struct PlanSynthesizer<P> {
    layout: DataLayout,
    store: SpecStore,
    client: GenerationClient<P>,
}

impl<P: GenerationProvider> PlanSynthesizer<P> {
    pub fn new(layout: DataLayout, client: GenerationClient<P>) -> Self {
        let store = SpecStore::new(layout.clone());
        Self {
            layout,
            store,
            client,
        }
    }

    /// Synthesize and persist a Plan for the project.
    ///
    /// Fails with the spec store's not-found error when no frozen Spec
    /// exists -- no generation call is made in that case. A plan that fails
    /// validation is never persisted.
    pub async fn synthesize(
        &self,
        project_id: &str,
        guidance: Option<&str>,
    ) -> Result<Plan, PlanError> {
        let frozen = self.store.load_frozen(project_id)?;
        info!(project_id, "loaded frozen spec, requesting plan");

        let request = CompletionRequest::new(build_plan_prompt(&frozen, guidance))
            .with_system(SYSTEM_PROMPT);

        let raw = self.client.generate_structured(&request).await?;
        debug!(project_id, "plan candidate received, validating");

        let plan = validate_plan(&raw)?;

        let path = store_plan(&self.layout, project_id, &plan).map_err(|source| PlanError::Io {
            path: self.layout.plan_path(project_id),
            source,
        })?;
        info!(project_id, path = %path.display(), "plan stored");

        Ok(plan)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Intent, Spec};

    fn sample_frozen() -> FrozenSpec {
        let mut spec = Spec::blank("p1");
        spec.merge(&Intent::FeatureRequest("Dashboard".to_string()));
        spec.merge(&Intent::Integration("stripe".to_string()));
        spec.freeze()
    }

    #[test]
    fn prompt_embeds_the_frozen_spec() {
        let prompt = build_plan_prompt(&sample_frozen(), None);
        assert!(prompt.contains("SPECIFICATION:"));
        assert!(prompt.contains("\"Dashboard\""));
        assert!(prompt.contains("\"stripe\""));
        assert!(prompt.contains("\"status\": \"frozen\""));
    }

    #[test]
    fn prompt_contains_shape_and_rules() {
        let prompt = build_plan_prompt(&sample_frozen(), None);
        assert!(prompt.contains("\"stack\""));
        assert!(prompt.contains("\"file_tree\""));
        assert!(prompt.contains("IMPORTANT RULES"));
        assert!(prompt.contains("flat array of full paths"));
        assert!(prompt.ends_with("Return ONLY the JSON object, nothing else."));
    }

    #[test]
    fn prompt_includes_guidance_when_present() {
        let prompt = build_plan_prompt(&sample_frozen(), Some("Use SQLite, not Postgres"));
        assert!(prompt.contains("Use SQLite, not Postgres"));
        assert!(!prompt.contains("No additional context"));
    }

    #[test]
    fn prompt_defaults_context_when_guidance_absent_or_empty() {
        for guidance in [None, Some("")] {
            let prompt = build_plan_prompt(&sample_frozen(), guidance);
            assert!(prompt.contains("No additional context"));
        }
    }
}
