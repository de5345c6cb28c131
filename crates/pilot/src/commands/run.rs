//! Run command handlers.
//!
//! `run` gates on LLM reachability and then reconciles offline edits;
//! `check-llm` only probes.

use crate::runner::{Runner, RunnerConfig};
use pilot_core::orchestrator::IMPORT_BUTTON;
use pilot_core::{AutoUi, BoxedUi, ConsoleUi};
use std::sync::Arc;
use tracing::{error, info};

/// Check LLM access, then reconcile the workspace with the project state.
///
/// Fails without touching the workspace when any provider is unreachable.
pub async fn run_project(config: RunnerConfig, yes: bool) -> anyhow::Result<()> {
    let runner = Runner::new(config).await?;
    runner.cancel_on_ctrl_c();

    let ui: BoxedUi = if yes {
        Arc::new(AutoUi::answering(IMPORT_BUTTON))
    } else {
        Arc::new(ConsoleUi::stdio())
    };
    let orchestrator = runner.orchestrator(ui);

    if !orchestrator.test_llm_access().await {
        error!(project_id = %runner.project_id(), "LLM is not reachable");
        anyhow::bail!(
            "LLM access check failed. Check your API keys and the `llm` section of the configuration."
        );
    }

    orchestrator.offline_changes_check().await?;
    let state = runner.state_manager().current_state().await;
    info!(project_id = %runner.project_id(), state_id = %state.id, "Project ready");

    println!(
        "Project {} is at state {} ({} files).",
        runner.project_id(),
        state.id,
        state.files.len()
    );
    Ok(())
}

/// Probe every configured provider and report each result.
pub async fn check_llm(config: RunnerConfig) -> anyhow::Result<()> {
    let runner = Runner::new(config).await?;
    let prober = runner.prober();

    if prober.provider_count() == 0 {
        anyhow::bail!("No LLM provider configured.");
    }

    let results = prober.probe_all().await;
    println!("{:<14} {:<32} {:<8} {:>8}", "PROVIDER", "MODEL", "STATUS", "TIME");
    println!("{}", "-".repeat(65));
    for result in &results {
        let status = if result.is_success() { "ok" } else { "failed" };
        println!(
            "{:<14} {:<32} {:<8} {:>6}ms",
            result.provider,
            result.model,
            status,
            result.duration.as_millis()
        );
        if let Some(error) = &result.error {
            println!("  {error}");
        }
    }

    if results.iter().all(|r| r.is_success()) {
        println!("LLM access OK.");
        Ok(())
    } else {
        anyhow::bail!("LLM access check failed.")
    }
}
