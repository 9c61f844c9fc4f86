//! HTTP façade over the pipeline.
//!
//! Thin request/response mapping only: every route delegates straight to
//! the core components. Partial code generation is still a 200 with partial
//! statistics; only hard stage failures map to error statuses (missing
//! artifacts -> 404, plan validation -> 422, everything else -> 500).

use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::info;

use appwright_core::codegen::{CodeGenerator, CodegenError, Manifest};
use appwright_core::plan::{Plan, PlanError, PlanSynthesizer};
use appwright_core::provider::{GenerationClient, GenerationProvider};
use appwright_core::spec::store::{SpecStore, SpecStoreError};
use appwright_core::spec::{FrozenSpec, Intent, Spec};
use appwright_core::{DataLayout, build_stage};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<SpecStoreError> for AppError {
    fn from(e: SpecStoreError) -> Self {
        match e {
            SpecStoreError::FrozenNotFound { .. } => AppError::not_found(e.to_string()),
            SpecStoreError::Io { .. } => AppError::internal(e.to_string()),
        }
    }
}

impl From<PlanError> for AppError {
    fn from(e: PlanError) -> Self {
        match e {
            PlanError::Spec(SpecStoreError::FrozenNotFound { .. }) => {
                AppError::not_found(e.to_string())
            }
            PlanError::Validation { .. } => AppError::unprocessable(e.to_string()),
            other => AppError::internal(other.to_string()),
        }
    }
}

impl From<CodegenError> for AppError {
    fn from(e: CodegenError) -> Self {
        match e {
            CodegenError::PlanMissing { .. } => AppError::not_found(e.to_string()),
            other => AppError::internal(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// State and router
// ---------------------------------------------------------------------------

/// Shared state: the artifact layout plus the generation client.
#[derive(Clone)]
pub struct ServeState<P> {
    pub layout: DataLayout,
    pub client: GenerationClient<P>,
}

/// Build the router over any provider (the binary uses Anthropic; tests
/// inject a scripted fake).
pub fn build_router<P>(state: ServeState<P>) -> Router
where
    P: GenerationProvider + Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(health))
        .route("/spec/{id}", get(get_spec::<P>))
        .route("/spec/{id}/merge", post(merge_intent::<P>))
        .route("/spec/{id}/freeze", post(freeze_spec::<P>))
        .route("/plan/{id}", post(plan_project::<P>))
        .route("/generate/{id}", post(generate_project::<P>))
        .route("/build/{id}", post(build_project::<P>))
        .route("/status/{id}", get(project_status::<P>))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Execute `appwright serve`.
pub async fn run<P>(state: ServeState<P>, port: u16) -> Result<()>
where
    P: GenerationProvider + Clone + Send + Sync + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "appwright serving");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct BuildBody {
    /// Optional free-text guidance forwarded to plan synthesis.
    #[serde(default)]
    context: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": "appwright" }))
}

async fn get_spec<P: GenerationProvider + Clone + Send + Sync + 'static>(
    State(state): State<ServeState<P>>,
    Path(project_id): Path<String>,
) -> Result<Json<Spec>, AppError> {
    let spec = SpecStore::new(state.layout.clone()).load(&project_id)?;
    Ok(Json(spec))
}

async fn merge_intent<P: GenerationProvider + Clone + Send + Sync + 'static>(
    State(state): State<ServeState<P>>,
    Path(project_id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<Spec>, AppError> {
    // Boundary validation: unrecognized intent shapes are rejected here;
    // empty payloads are dropped leniently inside the store.
    let intent: Intent = serde_json::from_value(body)
        .map_err(|e| AppError::unprocessable(format!("unrecognized intent: {e}")))?;

    let spec = SpecStore::new(state.layout.clone()).merge(&project_id, &intent)?;
    Ok(Json(spec))
}

async fn freeze_spec<P: GenerationProvider + Clone + Send + Sync + 'static>(
    State(state): State<ServeState<P>>,
    Path(project_id): Path<String>,
) -> Result<Json<FrozenSpec>, AppError> {
    let frozen = SpecStore::new(state.layout.clone()).freeze(&project_id)?;
    Ok(Json(frozen))
}

async fn plan_project<P: GenerationProvider + Clone + Send + Sync + 'static>(
    State(state): State<ServeState<P>>,
    Path(project_id): Path<String>,
    body: Option<Json<BuildBody>>,
) -> Result<Json<Plan>, AppError> {
    let context = body.and_then(|Json(b)| b.context);
    let synthesizer = PlanSynthesizer::new(state.layout.clone(), state.client.clone());
    let plan = synthesizer.synthesize(&project_id, context.as_deref()).await?;
    Ok(Json(plan))
}

async fn generate_project<P: GenerationProvider + Clone + Send + Sync + 'static>(
    State(state): State<ServeState<P>>,
    Path(project_id): Path<String>,
) -> Result<Json<Manifest>, AppError> {
    let generator = CodeGenerator::new(state.layout.clone(), state.client.clone());
    let manifest = generator.generate(&project_id).await?;
    Ok(Json(manifest))
}

async fn build_project<P: GenerationProvider + Clone + Send + Sync + 'static>(
    State(state): State<ServeState<P>>,
    Path(project_id): Path<String>,
    body: Option<Json<BuildBody>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let context = body.and_then(|Json(b)| b.context);

    let synthesizer = PlanSynthesizer::new(state.layout.clone(), state.client.clone());
    let plan = synthesizer.synthesize(&project_id, context.as_deref()).await?;

    let generator = CodeGenerator::new(state.layout.clone(), state.client.clone());
    let manifest = generator.generate(&project_id).await?;

    Ok(Json(json!({ "plan": plan, "manifest": manifest })))
}

async fn project_status<P: GenerationProvider + Clone + Send + Sync + 'static>(
    State(state): State<ServeState<P>>,
    Path(project_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let stage = build_stage(&state.layout, &project_id)
        .map_err(|e| AppError::internal(e.to_string()))?;
    Ok(Json(json!({ "project_id": project_id, "stage": stage })))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
