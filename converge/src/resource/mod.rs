//! Resource catalog.
//!
//! A fixed set of kinds, each with a desired-state struct that also serves as
//! the shape of the observed state. Per-kind behavior (validation, diffing)
//! lives with each struct; [`ResourceSpec`] dispatches over the catalog.

pub mod database;
pub mod identity_role;
pub mod instance;
pub mod load_balancer;
pub mod object_store;
pub mod scaling_group;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diff::ChangeSet;
use crate::error::ReconcileError;

pub use database::{Credentials, DatabaseSpec};
pub use identity_role::{IdentityRoleSpec, InlinePolicy};
pub use instance::InstanceSpec;
pub use load_balancer::{HealthCheck, Listener, ListenerAction, LoadBalancerSpec, TargetGroup};
pub use object_store::ObjectStoreSpec;
pub use scaling_group::ScalingGroupSpec;

/// Kinds of resource converge knows how to reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Instance,
    ObjectStore,
    ManagedDatabase,
    LoadBalancer,
    ScalingGroup,
    IdentityRole,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Instance,
        ResourceKind::ObjectStore,
        ResourceKind::ManagedDatabase,
        ResourceKind::LoadBalancer,
        ResourceKind::ScalingGroup,
        ResourceKind::IdentityRole,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Instance => "instance",
            ResourceKind::ObjectStore => "object_store",
            ResourceKind::ManagedDatabase => "managed_database",
            ResourceKind::LoadBalancer => "load_balancer",
            ResourceKind::ScalingGroup => "scaling_group",
            ResourceKind::IdentityRole => "identity_role",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind capabilities shared by every entry in the catalog.
pub trait Resource {
    const KIND: ResourceKind;

    /// Identity name. Empty means the kind is not declared.
    fn name(&self) -> &str;

    /// Check required fields before any provider call is issued.
    fn validate(&self) -> Result<(), String>;

    /// Compare `observed` against `self` (the desired state).
    fn diff(&self, observed: &Self) -> ChangeSet;
}

/// Desired (or observed) configuration of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceSpec {
    Instance(InstanceSpec),
    ObjectStore(ObjectStoreSpec),
    ManagedDatabase(DatabaseSpec),
    LoadBalancer(LoadBalancerSpec),
    ScalingGroup(ScalingGroupSpec),
    IdentityRole(IdentityRoleSpec),
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::Instance(_) => InstanceSpec::KIND,
            ResourceSpec::ObjectStore(_) => ObjectStoreSpec::KIND,
            ResourceSpec::ManagedDatabase(_) => DatabaseSpec::KIND,
            ResourceSpec::LoadBalancer(_) => LoadBalancerSpec::KIND,
            ResourceSpec::ScalingGroup(_) => ScalingGroupSpec::KIND,
            ResourceSpec::IdentityRole(_) => IdentityRoleSpec::KIND,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ResourceSpec::Instance(s) => s.name(),
            ResourceSpec::ObjectStore(s) => s.name(),
            ResourceSpec::ManagedDatabase(s) => s.name(),
            ResourceSpec::LoadBalancer(s) => s.name(),
            ResourceSpec::ScalingGroup(s) => s.name(),
            ResourceSpec::IdentityRole(s) => s.name(),
        }
    }

    /// A spec with an empty name is skipped entirely.
    pub fn is_declared(&self) -> bool {
        !self.name().is_empty()
    }

    /// Desired replica count when this is a fleet-style instance.
    pub fn fleet_replicas(&self) -> Option<u32> {
        match self {
            ResourceSpec::Instance(s) => s.replicas,
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), ReconcileError> {
        let result = match self {
            ResourceSpec::Instance(s) => s.validate(),
            ResourceSpec::ObjectStore(s) => s.validate(),
            ResourceSpec::ManagedDatabase(s) => s.validate(),
            ResourceSpec::LoadBalancer(s) => s.validate(),
            ResourceSpec::ScalingGroup(s) => s.validate(),
            ResourceSpec::IdentityRole(s) => s.validate(),
        };
        result.map_err(|message| ReconcileError::validation(self.kind(), message))
    }

    /// Change set from `observed` toward `self`.
    pub fn diff(&self, observed: &ResourceSpec) -> ChangeSet {
        match (self, observed) {
            (ResourceSpec::Instance(d), ResourceSpec::Instance(o)) => d.diff(o),
            (ResourceSpec::ObjectStore(d), ResourceSpec::ObjectStore(o)) => d.diff(o),
            (ResourceSpec::ManagedDatabase(d), ResourceSpec::ManagedDatabase(o)) => d.diff(o),
            (ResourceSpec::LoadBalancer(d), ResourceSpec::LoadBalancer(o)) => d.diff(o),
            (ResourceSpec::ScalingGroup(d), ResourceSpec::ScalingGroup(o)) => d.diff(o),
            (ResourceSpec::IdentityRole(d), ResourceSpec::IdentityRole(o)) => d.diff(o),
            (d, o) => {
                let mut changes = ChangeSet::new();
                changes.scalar("kind", &o.kind(), &d.kind());
                changes
            }
        }
    }
}

/// Provider-reported lifecycle of a live resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
    Available,
}

impl LifecycleState {
    /// States that count toward an instance fleet.
    pub const LIVE_INSTANCE: [LifecycleState; 4] = [
        LifecycleState::Running,
        LifecycleState::Pending,
        LifecycleState::Stopping,
        LifecycleState::Stopped,
    ];

    pub fn is_live_instance(&self) -> bool {
        Self::LIVE_INSTANCE.contains(self)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Pending => "pending",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
            LifecycleState::ShuttingDown => "shutting-down",
            LifecycleState::Terminated => "terminated",
            LifecycleState::Available => "available",
        };
        f.write_str(s)
    }
}

/// Live snapshot of one resource as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedState {
    /// Provider-assigned identity (instance id, bucket name, ARN).
    pub id: String,
    pub lifecycle: LifecycleState,
    pub spec: ResourceSpec,
}

impl ObservedState {
    pub fn kind(&self) -> ResourceKind {
        self.spec.kind()
    }
}
