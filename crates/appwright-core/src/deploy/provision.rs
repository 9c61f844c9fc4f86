//! Remote-repository provisioning.
//!
//! Provisioning is asynchronous on the remote side: we submit a request,
//! then poll a verification check until the repository exists or the check
//! budget runs out. The seam is a trait so deploys can be tested without a
//! network.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

/// Errors from the provisioning collaborator.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The provisioning request could not be submitted.
    #[error("provisioning request failed: {0}")]
    Submit(String),

    /// A verification check failed outright (not "not there yet").
    #[error("verification check failed: {0}")]
    Verify(String),

    /// The repository never became visible within the check budget.
    #[error("repository did not appear after {attempts} checks")]
    NeverAppeared { attempts: u32 },
}

/// Creates a remote repository and answers existence checks.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Submit the provisioning request. Fire-and-forget; completion is
    /// observed through [`Self::verify`].
    async fn submit(&self, project_id: &str) -> Result<(), ProvisionError>;

    /// Check whether the repository exists yet; `Some(clone_url)` once it
    /// does.
    async fn verify(&self, project_id: &str) -> Result<Option<String>, ProvisionError>;
}

/// Poll budget for [`await_repository`].
#[derive(Debug, Clone, Copy)]
pub struct ProvisionPolicy {
    pub max_checks: u32,
    pub check_delay: Duration,
}

impl Default for ProvisionPolicy {
    fn default() -> Self {
        Self {
            max_checks: 5,
            check_delay: Duration::from_secs(2),
        }
    }
}

/// Poll the verification check until the repository exists.
///
/// Failed checks are retried just like "not there yet" answers; only an
/// exhausted budget fails, with [`ProvisionError::NeverAppeared`].
pub async fn await_repository(
    provisioner: &dyn Provisioner,
    project_id: &str,
    policy: ProvisionPolicy,
) -> Result<String, ProvisionError> {
    for attempt in 1..=policy.max_checks {
        match provisioner.verify(project_id).await {
            Ok(Some(clone_url)) => {
                info!(project_id, attempt, clone_url = %clone_url, "repository verified");
                return Ok(clone_url);
            }
            Ok(None) => {
                info!(project_id, attempt, max = policy.max_checks, "repository not visible yet");
            }
            Err(e) => {
                warn!(project_id, attempt, error = %e, "verification check failed");
            }
        }
        if attempt < policy.max_checks {
            tokio::time::sleep(policy.check_delay).await;
        }
    }

    Err(ProvisionError::NeverAppeared {
        attempts: policy.max_checks,
    })
}

// ---------------------------------------------------------------------------
// GitHub-backed provisioner
// ---------------------------------------------------------------------------

/// Provisioner that submits to a provisioning endpoint and verifies through
/// the GitHub repositories API.
#[derive(Clone)]
pub struct GithubProvisioner {
    client: reqwest::Client,
    /// Provisioning-request endpoint (the remote agent that creates repos).
    endpoint: String,
    username: String,
    token: String,
    api_base: String,
}

impl GithubProvisioner {
    const DEFAULT_API_BASE: &'static str = "https://api.github.com";

    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            username: username.into(),
            token: token.into(),
            api_base: Self::DEFAULT_API_BASE.to_string(),
        }
    }

    /// Override the API base URL (tests, GitHub Enterprise).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

impl std::fmt::Debug for GithubProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubProvisioner")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Provisioner for GithubProvisioner {
    async fn submit(&self, project_id: &str) -> Result<(), ProvisionError> {
        let body = serde_json::json!({
            "project_id": project_id,
            "github_username": self.username,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProvisionError::Submit(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProvisionError::Submit(format!(
                "provisioning endpoint answered {}",
                response.status()
            )));
        }

        info!(project_id, endpoint = %self.endpoint, "provisioning request submitted");
        Ok(())
    }

    async fn verify(&self, project_id: &str) -> Result<Option<String>, ProvisionError> {
        let url = format!("{}/repos/{}/{}", self.api_base, self.username, project_id);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, format!("token {}", self.token))
            .header(reqwest::header::ACCEPT, "application/vnd.github.v3+json")
            .header(reqwest::header::USER_AGENT, "appwright")
            .send()
            .await
            .map_err(|e| ProvisionError::Verify(e.to_string()))?;

        match response.status().as_u16() {
            200 => {
                let value: Value = response
                    .json()
                    .await
                    .map_err(|e| ProvisionError::Verify(e.to_string()))?;
                Ok(value["clone_url"].as_str().map(str::to_string))
            }
            404 => Ok(None),
            status => Err(ProvisionError::Verify(format!(
                "repository API answered {status}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
