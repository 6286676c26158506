//! Desired state - at most one declared resource per kind.

use serde::{Deserialize, Serialize};

use crate::resource::{
    DatabaseSpec, IdentityRoleSpec, InstanceSpec, LoadBalancerSpec, ObjectStoreSpec, ResourceSpec,
    ScalingGroupSpec,
};

/// Immutable input of one run. Built once, then shared read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesiredState {
    pub instance: Option<InstanceSpec>,
    pub object_store: Option<ObjectStoreSpec>,
    pub managed_database: Option<DatabaseSpec>,
    pub load_balancer: Option<LoadBalancerSpec>,
    pub scaling_group: Option<ScalingGroupSpec>,
    pub identity_role: Option<IdentityRoleSpec>,
}

impl DesiredState {
    /// Declared resources in kind order. Blocks with an empty name are skipped.
    pub fn declared(&self) -> Vec<ResourceSpec> {
        let all = [
            self.instance.clone().map(ResourceSpec::Instance),
            self.object_store.clone().map(ResourceSpec::ObjectStore),
            self.managed_database.clone().map(ResourceSpec::ManagedDatabase),
            self.load_balancer.clone().map(ResourceSpec::LoadBalancer),
            self.scaling_group.clone().map(ResourceSpec::ScalingGroup),
            self.identity_role.clone().map(ResourceSpec::IdentityRole),
        ];
        all.into_iter()
            .flatten()
            .filter(ResourceSpec::is_declared)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.declared().is_empty()
    }
}
