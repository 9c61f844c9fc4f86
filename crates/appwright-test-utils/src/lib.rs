//! Shared test utilities for appwright integration tests.
//!
//! Provides a scripted in-process generation provider and provisioner so
//! pipeline tests run without a network, plus small fixture helpers for
//! tempdir-backed data layouts.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use appwright_core::deploy::{ProvisionError, Provisioner};
use appwright_core::provider::{CompletionRequest, GenerationProvider, ProviderError};
use appwright_core::DataLayout;

// ---------------------------------------------------------------------------
// Fake generation provider
// ---------------------------------------------------------------------------

/// Generation provider that replays a scripted queue of outcomes, in order.
///
/// An exhausted script answers with a fatal 500 so a test that under-scripts
/// fails loudly instead of hanging on retries.
#[derive(Clone, Default)]
pub struct FakeProvider {
    responses: Arc<Mutex<VecDeque<Result<String, ProviderError>>>>,
    calls: Arc<AtomicUsize>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful text response.
    pub fn push_text(&self, text: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(text.into()));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: ProviderError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Number of completion calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for FakeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeProvider")
            .field("queued", &self.responses.lock().unwrap().len())
            .field("calls", &self.calls())
            .finish()
    }
}

#[async_trait]
impl GenerationProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ProviderError::Api {
                    status: 500,
                    message: "fake provider script exhausted".to_string(),
                })
            })
    }
}

// ---------------------------------------------------------------------------
// Fake provisioner
// ---------------------------------------------------------------------------

/// Provisioner that reports the repository available at a fixed URL after a
/// configurable number of "not yet" answers.
#[derive(Debug, Clone)]
pub struct FakeProvisioner {
    clone_url: String,
    not_ready_checks: Arc<AtomicUsize>,
}

impl FakeProvisioner {
    pub fn ready_at(clone_url: impl Into<String>, after_checks: usize) -> Self {
        Self {
            clone_url: clone_url.into(),
            not_ready_checks: Arc::new(AtomicUsize::new(after_checks)),
        }
    }
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn submit(&self, _project_id: &str) -> Result<(), ProvisionError> {
        Ok(())
    }

    async fn verify(&self, _project_id: &str) -> Result<Option<String>, ProvisionError> {
        let remaining = self.not_ready_checks.load(Ordering::SeqCst);
        if remaining > 0 {
            self.not_ready_checks.store(remaining - 1, Ordering::SeqCst);
            Ok(None)
        } else {
            Ok(Some(self.clone_url.clone()))
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A data layout rooted in a fresh tempdir. Keep the guard alive for the
/// duration of the test.
pub fn temp_layout() -> (tempfile::TempDir, DataLayout) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let layout = DataLayout::new(dir.path());
    (dir, layout)
}

/// A minimal valid plan JSON with the given flat file tree.
pub fn sample_plan_json(files: &[&str]) -> String {
    serde_json::json!({
        "stack": {"frontend": "Next.js 14", "backend": "FastAPI"},
        "dependencies": {"frontend": ["react"], "backend": ["fastapi"]},
        "file_tree": files,
        "api_routes": ["/api/items"],
        "entities": ["Item"],
        "tasks": ["Set up project"],
    })
    .to_string()
}
