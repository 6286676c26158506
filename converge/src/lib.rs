//! converge: reconciles declared cloud resources with a provider account.
//!
//! Each declared resource kind is reconciled concurrently:
//! - fetch the live state through the provider gateway (retried)
//! - create it when absent, or diff and update it after approval
//! - scale instance fleets to their desired count
//! - report one outcome per kind

pub mod approval;
pub mod config;
pub mod coordinator;
pub mod desired;
pub mod diff;
pub mod error;
pub mod fetcher;
pub mod fleet;
pub mod manifest;
pub mod outcome;
pub mod provider;
pub mod reconciler;
pub mod resource;
pub mod retry;

pub use approval::{ApprovalGate, ApprovalRequest, AutoApprove, PromptApproval};
pub use config::{ApprovalMode, EngineConfig};
pub use coordinator::Coordinator;
pub use desired::DesiredState;
pub use diff::{Change, ChangeSet};
pub use error::{ManifestError, ProviderError, ReconcileError};
pub use fleet::{FleetDelta, FleetPlan};
pub use manifest::Manifest;
pub use outcome::{KindReport, Outcome, PlannedAction, RunReport};
pub use provider::{IdentityFilter, ProviderGateway, SimulatedProvider};
pub use reconciler::{Reconciler, ResourceReconciler};
pub use resource::{ObservedState, ResourceKind, ResourceSpec};
pub use retry::RetryPolicy;
