//! Reconciliation outcomes and the per-run report.

use std::fmt;

use crate::diff::ChangeSet;
use crate::error::ReconcileError;
use crate::fleet::{FleetPlan, ScaleResult};
use crate::resource::ResourceKind;

/// What a dry run would have done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    Create,
    Update { id: String, changes: ChangeSet },
    Scale(FleetPlan),
}

/// Terminal state of one reconciliation pass.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Observed state already matches. No mutating call was made.
    Converged,
    Created { id: String },
    Updated { id: String, changes: ChangeSet },
    Scaled(ScaleResult),
    /// The operator declined. No mutating call was made.
    ApprovalRejected { id: String, changes: ChangeSet },
    /// Dry run stopped after planning.
    Planned(PlannedAction),
    Failed(ReconcileError),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// Whether this pass changed the account.
    pub fn mutated(&self) -> bool {
        matches!(
            self,
            Outcome::Created { .. } | Outcome::Updated { .. } | Outcome::Scaled(_)
        )
    }

    pub fn error(&self) -> Option<&ReconcileError> {
        match self {
            Outcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Converged => write!(f, "up to date"),
            Outcome::Created { id } => write!(f, "created {id}"),
            Outcome::Updated { id, changes } => {
                write!(f, "updated {id} ({} change(s))", changes.len())
            }
            Outcome::Scaled(result) => write!(
                f,
                "scaled {} (created {}, terminated {})",
                result.delta,
                result.created.len(),
                result.terminated.len()
            ),
            Outcome::ApprovalRejected { id, changes } => write!(
                f,
                "{} change(s) to {id} not approved, skipped",
                changes.len()
            ),
            Outcome::Planned(PlannedAction::Create) => write!(f, "would create"),
            Outcome::Planned(PlannedAction::Update { id, changes }) => {
                write!(f, "would update {id} ({} change(s))", changes.len())
            }
            Outcome::Planned(PlannedAction::Scale(plan)) => write!(
                f,
                "would scale {} ({} -> {})",
                plan.delta, plan.observed, plan.desired
            ),
            Outcome::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Outcome of one declared kind.
#[derive(Debug, Clone)]
pub struct KindReport {
    pub kind: ResourceKind,
    pub name: String,
    pub outcome: Outcome,
}

impl fmt::Display for KindReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.name, self.outcome)
    }
}

/// Aggregated outcomes of a run, ordered by kind.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub reports: Vec<KindReport>,
}

impl RunReport {
    pub fn get(&self, kind: ResourceKind) -> Option<&KindReport> {
        self.reports.iter().find(|r| r.kind == kind)
    }

    pub fn failures(&self) -> impl Iterator<Item = &KindReport> {
        self.reports.iter().filter(|r| r.outcome.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}
