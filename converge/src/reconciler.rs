//! Per-resource reconciliation state machine.
//!
//! Single resources: fetch, then create when nothing is live, otherwise diff
//! and (after approval) update. Instance fleets: fetch every live member and
//! scale to the desired count. Each pass ends in exactly one [`Outcome`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::approval::{ApprovalGate, ApprovalRequest};
use crate::config::EngineConfig;
use crate::diff::ChangeSet;
use crate::error::{ReconcileError, Result};
use crate::fetcher::StateFetcher;
use crate::fleet::{FleetPlan, FleetSizer};
use crate::outcome::{Outcome, PlannedAction};
use crate::provider::ProviderGateway;
use crate::resource::{InstanceSpec, ResourceSpec};

/// Drives one declared resource toward its desired state.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Run a single pass. Failures are reported in the outcome, never raised.
    async fn reconcile(&self, desired: &ResourceSpec) -> Outcome;
}

/// Reconciler backed by a provider gateway and an approval gate.
pub struct ResourceReconciler {
    provider: Arc<dyn ProviderGateway>,
    approval: Arc<dyn ApprovalGate>,
    config: Arc<EngineConfig>,
}

impl ResourceReconciler {
    pub fn new(
        provider: Arc<dyn ProviderGateway>,
        approval: Arc<dyn ApprovalGate>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            provider,
            approval,
            config,
        }
    }

    fn fetcher(&self) -> StateFetcher<'_> {
        StateFetcher::new(&*self.provider, &self.config.retry)
    }

    async fn reconcile_single(&self, desired: &ResourceSpec) -> Result<Outcome> {
        let observed = self
            .fetcher()
            .fetch(desired)
            .await
            .map_err(|e| ReconcileError::provider("describe", e))?;

        let Some(observed) = observed else {
            info!("{} {} not found", desired.kind(), desired.name());
            return self.create(desired).await;
        };

        let changes = desired.diff(&observed.spec);
        if changes.is_empty() {
            info!(
                "{} {} ({}) is up to date",
                desired.kind(),
                desired.name(),
                observed.id
            );
            return Ok(Outcome::Converged);
        }
        info!(
            "{} {} ({}) has {} change(s)",
            desired.kind(),
            desired.name(),
            observed.id,
            changes.len()
        );

        if self.config.dry_run {
            return Ok(Outcome::Planned(PlannedAction::Update {
                id: observed.id,
                changes,
            }));
        }

        if !self.approve(desired, &observed.id, &changes).await? {
            warn!(
                "Changes to {} {} were not approved, skipping update",
                desired.kind(),
                desired.name()
            );
            return Ok(Outcome::ApprovalRejected {
                id: observed.id,
                changes,
            });
        }

        let operation = format!("update {} {}", desired.kind(), desired.name());
        self.config
            .retry
            .run(&operation, || {
                self.provider.update(&observed.id, desired, &changes)
            })
            .await
            .map_err(|e| ReconcileError::provider("update", e))?;
        info!("Updated {} {} ({})", desired.kind(), desired.name(), observed.id);

        Ok(Outcome::Updated {
            id: observed.id,
            changes,
        })
    }

    /// First-time creation. Not gated by approval.
    async fn create(&self, desired: &ResourceSpec) -> Result<Outcome> {
        if self.config.dry_run {
            return Ok(Outcome::Planned(PlannedAction::Create));
        }

        info!("Creating {} {}", desired.kind(), desired.name());
        let operation = format!("create {} {}", desired.kind(), desired.name());
        let id = self
            .config
            .retry
            .run(&operation, || self.provider.create(desired))
            .await
            .map_err(|e| ReconcileError::provider("create", e))?;
        info!("Created {} {} ({})", desired.kind(), desired.name(), id);

        Ok(Outcome::Created { id })
    }

    /// Count-based reconciliation. Not gated by approval.
    async fn reconcile_fleet(&self, spec: &InstanceSpec, replicas: u32) -> Result<Outcome> {
        let members = self
            .fetcher()
            .fetch_fleet(&spec.name)
            .await
            .map_err(|e| ReconcileError::provider("describe", e))?;

        let plan = FleetPlan::new(&members, replicas);
        info!(
            "Fleet {}: {} live, {} desired",
            spec.name, plan.observed, plan.desired
        );
        if plan.delta.is_zero() {
            info!("Fleet {} is at its desired size", spec.name);
            return Ok(Outcome::Converged);
        }

        if self.config.dry_run {
            return Ok(Outcome::Planned(PlannedAction::Scale(plan)));
        }

        let result = FleetSizer::new(&*self.provider, &self.config.retry)
            .scale(spec, &plan)
            .await?;
        Ok(Outcome::Scaled(result))
    }

    /// Ask the gate on a blocking thread so a terminal prompt does not stall
    /// the runtime.
    async fn approve(&self, desired: &ResourceSpec, id: &str, changes: &ChangeSet) -> Result<bool> {
        let gate = Arc::clone(&self.approval);
        let kind = desired.kind();
        let name = desired.name().to_string();
        let id = id.to_string();
        let changes = changes.clone();

        let approved = tokio::task::spawn_blocking(move || {
            gate.approve(&ApprovalRequest {
                kind,
                name: &name,
                id: &id,
                changes: &changes,
            })
        })
        .await
        .map_err(|e| ReconcileError::ApprovalInterrupted(e.to_string()))?;

        info!(
            "Approval for {} {}: {}",
            kind,
            desired.name(),
            if approved { "granted" } else { "declined" }
        );
        Ok(approved)
    }
}

#[async_trait]
impl Reconciler for ResourceReconciler {
    async fn reconcile(&self, desired: &ResourceSpec) -> Outcome {
        info!("Reconciling {} {}", desired.kind(), desired.name());

        let result = match desired.validate() {
            Err(e) => Err(e),
            Ok(()) => match (desired, desired.fleet_replicas()) {
                (ResourceSpec::Instance(spec), Some(replicas)) => {
                    self.reconcile_fleet(spec, replicas).await
                }
                _ => self.reconcile_single(desired).await,
            },
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to reconcile {} {}: {}", desired.kind(), desired.name(), e);
                Outcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::fleet::FleetDelta;
    use crate::provider::SimulatedProvider;
    use crate::resource::{instance, object_store, ObjectStoreSpec, ResourceKind};
    use crate::retry::RetryPolicy;

    /// Fixed answer, counts how often it was asked.
    struct CountingGate {
        answer: bool,
        asked: AtomicUsize,
    }

    impl CountingGate {
        fn new(answer: bool) -> Arc<Self> {
            Arc::new(Self {
                answer,
                asked: AtomicUsize::new(0),
            })
        }
    }

    impl ApprovalGate for CountingGate {
        fn approve(&self, _request: &ApprovalRequest<'_>) -> bool {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    fn make_reconciler(
        provider: &Arc<SimulatedProvider>,
        gate: &Arc<CountingGate>,
        dry_run: bool,
    ) -> ResourceReconciler {
        let config = EngineConfig::default()
            .with_retry(RetryPolicy::immediate(3))
            .with_dry_run(dry_run);
        ResourceReconciler::new(provider.clone(), gate.clone(), Arc::new(config))
    }

    fn fleet(replicas: u32) -> ResourceSpec {
        let mut spec = instance::tests::sample();
        spec.replicas = Some(replicas);
        ResourceSpec::Instance(spec)
    }

    #[tokio::test]
    async fn test_create_then_converge() {
        let provider = Arc::new(SimulatedProvider::new("us-east-1"));
        let gate = CountingGate::new(true);
        let reconciler = make_reconciler(&provider, &gate, false);
        let bucket = ResourceSpec::ObjectStore(object_store::tests::sample());

        let first = reconciler.reconcile(&bucket).await;
        assert!(matches!(first, Outcome::Created { .. }));

        let second = reconciler.reconcile(&bucket).await;
        assert!(matches!(second, Outcome::Converged));
        assert_eq!(gate.asked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_approved_update() {
        let provider = Arc::new(SimulatedProvider::new("us-east-1"));
        let live = instance::tests::sample();
        let id = provider.insert(ResourceSpec::Instance(live.clone())).await;

        let gate = CountingGate::new(true);
        let reconciler = make_reconciler(&provider, &gate, false);
        let desired = ResourceSpec::Instance(InstanceSpec {
            instance_type: "t3.large".to_string(),
            ..live
        });

        match reconciler.reconcile(&desired).await {
            Outcome::Updated { id: updated, changes } => {
                assert_eq!(updated, id);
                assert!(changes.touches("instance_type"));
            }
            other => panic!("expected update, got {other:?}"),
        }
        assert_eq!(gate.asked.load(Ordering::SeqCst), 1);
        assert!(matches!(
            reconciler.reconcile(&desired).await,
            Outcome::Converged
        ));
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_account_untouched() {
        let provider = Arc::new(SimulatedProvider::new("us-east-1"));
        provider
            .insert(ResourceSpec::ObjectStore(object_store::tests::sample()))
            .await;
        let before = provider.snapshot().await;

        let gate = CountingGate::new(false);
        let reconciler = make_reconciler(&provider, &gate, false);
        let desired = ResourceSpec::ObjectStore(ObjectStoreSpec {
            acl: "public-read".to_string(),
            ..object_store::tests::sample()
        });

        let outcome = reconciler.reconcile(&desired).await;
        assert!(matches!(outcome, Outcome::ApprovalRejected { .. }));
        assert_eq!(provider.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_invalid_spec_fails_before_provider() {
        let provider = Arc::new(SimulatedProvider::new("us-east-1"));
        let gate = CountingGate::new(true);
        let reconciler = make_reconciler(&provider, &gate, false);
        let desired = ResourceSpec::Instance(InstanceSpec {
            subnet_id: String::new(),
            ..instance::tests::sample()
        });

        let outcome = reconciler.reconcile(&desired).await;
        assert!(matches!(
            outcome,
            Outcome::Failed(ReconcileError::Validation {
                kind: ResourceKind::Instance,
                ..
            })
        ));
        assert!(provider.snapshot().await.resources.is_empty());
    }

    #[tokio::test]
    async fn test_fleet_grows_without_approval() {
        let provider = Arc::new(SimulatedProvider::new("us-east-1"));
        let gate = CountingGate::new(false);
        let reconciler = make_reconciler(&provider, &gate, false);

        match reconciler.reconcile(&fleet(3)).await {
            Outcome::Scaled(result) => {
                assert_eq!(result.delta, FleetDelta(3));
                assert_eq!(result.created.len(), 3);
            }
            other => panic!("expected scale, got {other:?}"),
        }
        assert_eq!(gate.asked.load(Ordering::SeqCst), 0);
        assert!(matches!(
            reconciler.reconcile(&fleet(3)).await,
            Outcome::Converged
        ));
    }

    #[tokio::test]
    async fn test_dry_run_plans_without_mutating() {
        let provider = Arc::new(SimulatedProvider::new("us-east-1"));
        provider.insert(fleet(1)).await;
        let before = provider.snapshot().await;

        let gate = CountingGate::new(true);
        let reconciler = make_reconciler(&provider, &gate, true);

        match reconciler.reconcile(&fleet(4)).await {
            Outcome::Planned(PlannedAction::Scale(plan)) => {
                assert_eq!(plan.delta, FleetDelta(3))
            }
            other => panic!("expected plan, got {other:?}"),
        }
        let bucket = ResourceSpec::ObjectStore(object_store::tests::sample());
        assert!(matches!(
            reconciler.reconcile(&bucket).await,
            Outcome::Planned(PlannedAction::Create)
        ));
        assert_eq!(provider.snapshot().await, before);
    }
}
