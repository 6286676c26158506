//! converge: reconcile an infrastructure manifest against a provider account.
//!
//! This binary:
//! - Loads `infra.yaml` and merges `variables.yaml` when present
//! - Loads the account snapshot the simulated provider works on
//! - Reconciles every declared resource kind concurrently
//! - Prints one status line per kind and saves the account

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use converge::outcome::{Outcome, PlannedAction};
use converge::{
    ApprovalMode, Coordinator, EngineConfig, Manifest, ResourceReconciler, RetryPolicy,
    SimulatedProvider,
};

/// Declarative infrastructure reconciler
#[derive(Parser, Debug)]
#[command(name = "converge", version, about)]
struct Args {
    /// Infrastructure manifest
    #[arg(long, default_value = "infra.yaml")]
    manifest: PathBuf,

    /// Variables merged into empty manifest fields (optional file)
    #[arg(long, default_value = "variables.yaml")]
    variables: PathBuf,

    /// JSON snapshot of the provider account (created if missing)
    #[arg(long, default_value = "account.json")]
    account_state: PathBuf,

    /// Apply updates without asking for confirmation
    #[arg(long)]
    auto_approve: bool,

    /// Attempts per provider call, including the first
    #[arg(long, default_value = "3")]
    retry_attempts: u32,

    /// Delay between attempts in milliseconds
    #[arg(long, default_value = "2000")]
    retry_delay_ms: u64,

    /// Report pending changes without applying them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "converge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let manifest = Manifest::load_with_variables(&args.manifest, Some(args.variables.as_path()))
        .with_context(|| format!("Failed to load manifest {}", args.manifest.display()))?;
    let desired = manifest.desired_state();

    let provider = Arc::new(
        SimulatedProvider::load(&args.account_state, &manifest.region)
            .await
            .context("Failed to load account state")?,
    );

    let approval = if args.auto_approve {
        ApprovalMode::Auto
    } else {
        ApprovalMode::Prompt
    };
    let config = EngineConfig::default()
        .with_retry(RetryPolicy::new(
            args.retry_attempts,
            Duration::from_millis(args.retry_delay_ms),
        ))
        .with_approval(approval)
        .with_dry_run(args.dry_run);
    info!(
        "Starting converge: region {}, {} attempt(s) per call, dry run {}",
        manifest.region, config.retry.max_attempts, config.dry_run
    );

    let gate = config.approval.gate();
    let reconciler = ResourceReconciler::new(provider.clone(), gate, Arc::new(config));
    let report = Coordinator::new(Arc::new(reconciler)).run(&desired).await;

    if report.is_empty() {
        warn!("{} declares no resources", args.manifest.display());
    }
    for entry in &report.reports {
        println!("{entry}");
        if let Outcome::Planned(PlannedAction::Update { changes, .. }) = &entry.outcome {
            for line in changes.lines() {
                println!("  {line}");
            }
        }
    }

    let changed = report.reports.iter().filter(|r| r.outcome.mutated()).count();
    info!("{} of {} kind(s) changed the account", changed, report.len());

    if args.dry_run {
        info!("Dry run, account state left unchanged");
    } else {
        provider
            .save(&args.account_state)
            .await
            .context("Failed to save account state")?;
    }

    if report.has_failures() {
        warn!("{} of {} kind(s) failed", report.failed_count(), report.len());
        anyhow::bail!(
            "{} of {} resource kind(s) failed to reconcile",
            report.failed_count(),
            report.len()
        );
    }

    Ok(())
}
