//! Deployment: provision a remote repository, then push the generated
//! workspace to it.
//!
//! The composition reports one of three outcomes rather than raising:
//! `Success` (repo created, code pushed), `Partial` (repo created, push
//! failed), `Error` (nothing usable happened). Callers embed the report in
//! their response; only missing configuration fails before any call.

pub mod provision;
pub mod push;

pub use provision::{
    GithubProvisioner, ProvisionError, ProvisionPolicy, Provisioner, await_repository,
};
pub use push::{PushCredentials, PushError, authenticated_remote, push_workspace};

use serde::Serialize;
use tracing::{error, info};

use crate::layout::DataLayout;

/// Three-outcome deployment contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStatus {
    Success,
    Partial,
    Error,
}

impl std::fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployStatus::Success => write!(f, "success"),
            DeployStatus::Partial => write!(f, "partial"),
            DeployStatus::Error => write!(f, "error"),
        }
    }
}

/// Outcome of one deployment attempt.
#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    pub status: DeployStatus,
    pub message: String,
    pub repo_url: Option<String>,
}

impl DeployReport {
    fn error(message: impl Into<String>) -> Self {
        Self {
            status: DeployStatus::Error,
            message: message.into(),
            repo_url: None,
        }
    }
}

/// Provision a remote repository for the project and push its workspace.
pub async fn deploy_project(
    layout: &DataLayout,
    project_id: &str,
    provisioner: &dyn Provisioner,
    credentials: &PushCredentials,
    policy: ProvisionPolicy,
) -> DeployReport {
    let workspace = layout.workspace_dir(project_id);
    if !workspace.exists() {
        return DeployReport::error(format!(
            "workspace not found: {} -- generate code first",
            workspace.display()
        ));
    }

    info!(project_id, "submitting provisioning request");
    if let Err(e) = provisioner.submit(project_id).await {
        error!(project_id, error = %e, "provisioning request failed");
        return DeployReport::error(e.to_string());
    }

    let clone_url = match await_repository(provisioner, project_id, policy).await {
        Ok(url) => url,
        Err(e) => {
            error!(project_id, error = %e, "repository never became available");
            return DeployReport::error(e.to_string());
        }
    };

    let remote = authenticated_remote(&clone_url, credentials);
    match push_workspace(&workspace, &remote) {
        Ok(()) => {
            info!(project_id, clone_url = %clone_url, "deployment complete");
            DeployReport {
                status: DeployStatus::Success,
                message: "repository created and code pushed".to_string(),
                repo_url: Some(clone_url),
            }
        }
        Err(e) => {
            error!(project_id, error = %e, "code push failed after provisioning");
            DeployReport {
                status: DeployStatus::Partial,
                message: format!("repository created but code push failed: {e}"),
                repo_url: Some(clone_url),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
