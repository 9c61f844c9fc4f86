//! Build-side commands: synthesize a plan, generate code, run the full
//! build (plan -> code -> optional deploy).

use anyhow::{Result, bail};

use appwright_core::codegen::{CodeGenerator, Manifest};
use appwright_core::deploy::{DeployStatus, ProvisionPolicy, deploy_project};
use appwright_core::plan::PlanSynthesizer;
use appwright_core::provider::{AnthropicProvider, GenerationClient};
use appwright_core::resolve_file_tree;

use crate::config::AppwrightConfig;

fn generation_client(config: &AppwrightConfig) -> Result<GenerationClient<AnthropicProvider>> {
    Ok(GenerationClient::new(AnthropicProvider::new(config.provider()?)))
}

/// Execute `appwright plan`: synthesize and persist a plan from the frozen
/// spec.
pub async fn cmd_plan(
    config: &AppwrightConfig,
    project_id: &str,
    context: Option<&str>,
) -> Result<()> {
    let client = generation_client(config)?;
    let synthesizer = PlanSynthesizer::new(config.layout.clone(), client);

    let plan = synthesizer.synthesize(project_id, context).await?;
    let files = resolve_file_tree(&plan.file_tree);
    println!(
        "Plan ready for {project_id}: {} files, {} tasks -> {}",
        files.len(),
        plan.tasks.len(),
        config.layout.plan_path(project_id).display(),
    );
    Ok(())
}

/// Execute `appwright generate`: generate every file in the project's plan.
pub async fn cmd_generate(config: &AppwrightConfig, project_id: &str) -> Result<()> {
    let client = generation_client(config)?;
    let generator = CodeGenerator::new(config.layout.clone(), client);

    let manifest = generator.generate(project_id).await?;
    print_manifest(&manifest);
    Ok(())
}

/// Execute `appwright build`: plan -> code -> optional deploy.
///
/// Per-file generation failures do not fail the build; they are reported as
/// partial statistics. Only a hard stage failure (missing frozen spec,
/// invalid plan, provider failure, failed deployment) errors out.
pub async fn cmd_build(
    config: &AppwrightConfig,
    project_id: &str,
    context: Option<&str>,
    deploy: bool,
) -> Result<()> {
    let client = generation_client(config)?;

    println!("[1/3] Synthesizing plan for {project_id}...");
    let synthesizer = PlanSynthesizer::new(config.layout.clone(), client.clone());
    let plan = synthesizer.synthesize(project_id, context).await?;
    let total = resolve_file_tree(&plan.file_tree).len();
    println!("      plan ready with {total} files");

    println!("[2/3] Generating code...");
    let generator = CodeGenerator::new(config.layout.clone(), client);
    let manifest = generator.generate(project_id).await?;
    print_manifest(&manifest);

    if !deploy {
        println!("[3/3] Deploy skipped (pass --deploy to push)");
        return Ok(());
    }

    println!("[3/3] Deploying...");
    let (credentials, provisioner) = config.deploy()?;
    let report = deploy_project(
        &config.layout,
        project_id,
        &provisioner,
        &credentials,
        ProvisionPolicy::default(),
    )
    .await;

    match report.status {
        DeployStatus::Success | DeployStatus::Partial => {
            println!("      {}: {}", report.status, report.message);
            if let Some(url) = report.repo_url {
                println!("      repo: {url}");
            }
            Ok(())
        }
        DeployStatus::Error => bail!("deployment failed: {}", report.message),
    }
}

fn print_manifest(manifest: &Manifest) {
    let total = manifest.file_count + manifest.failed_count;
    println!(
        "      generated {}/{} files ({} failed) -> {}",
        manifest.file_count,
        total,
        manifest.failed_count,
        manifest.workspace_path.display(),
    );
}
