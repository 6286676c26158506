//! Concurrency coordinator - one reconciliation task per declared kind.
//!
//! Tasks share nothing mutable; each reports its outcome over a channel. A
//! failing (or panicking) kind never stops the others.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::desired::DesiredState;
use crate::error::ReconcileError;
use crate::outcome::{KindReport, Outcome, RunReport};
use crate::reconciler::Reconciler;
use crate::resource::ResourceKind;

pub struct Coordinator {
    reconciler: Arc<dyn Reconciler>,
}

impl Coordinator {
    pub fn new(reconciler: Arc<dyn Reconciler>) -> Self {
        Self { reconciler }
    }

    /// Reconcile every declared kind concurrently and wait for all of them.
    pub async fn run(&self, desired: &DesiredState) -> RunReport {
        let specs = desired.declared();
        if specs.is_empty() {
            info!("Nothing declared, nothing to reconcile");
            return RunReport::default();
        }
        info!("Reconciling {} resource kind(s)", specs.len());

        let (tx, mut rx) = mpsc::channel::<KindReport>(specs.len());
        let mut handles: Vec<(ResourceKind, String, tokio::task::JoinHandle<()>)> =
            Vec::with_capacity(specs.len());

        for spec in specs {
            let kind = spec.kind();
            let name = spec.name().to_string();
            let reconciler = Arc::clone(&self.reconciler);
            let tx = tx.clone();
            let task_name = name.clone();

            let handle = tokio::spawn(async move {
                let outcome = reconciler.reconcile(&spec).await;
                let report = KindReport {
                    kind,
                    name: task_name,
                    outcome,
                };
                if tx.send(report).await.is_err() {
                    error!("Report channel closed before {} finished", kind);
                }
            });
            handles.push((kind, name, handle));
        }
        drop(tx);

        let mut reports = Vec::with_capacity(handles.len());
        while let Some(report) = rx.recv().await {
            if let Some(e) = report.outcome.error() {
                error!("{} {} failed: {}", report.kind, report.name, e);
            } else {
                info!("{}", report);
            }
            reports.push(report);
        }

        for (kind, name, handle) in handles {
            if let Err(e) = handle.await {
                error!("Reconciliation task for {} {} aborted: {}", kind, name, e);
                reports.push(KindReport {
                    kind,
                    name,
                    outcome: Outcome::Failed(ReconcileError::TaskAborted(e.to_string())),
                });
            }
        }

        reports.sort_by_key(|r| r.kind);
        let report = RunReport { reports };
        info!(
            "Run finished: {} kind(s), {} failed",
            report.len(),
            report.failed_count()
        );
        report
    }
}
