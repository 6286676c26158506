//! Compute instance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Resource, ResourceKind};
use crate::diff::ChangeSet;

/// A compute instance, or a fleet of identical instances when `replicas` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceSpec {
    pub name: String,
    pub instance_type: String,
    pub image_id: String,
    pub key_name: String,
    pub subnet_id: String,
    pub security_groups: Vec<String>,
    pub monitoring: bool,
    pub tags: BTreeMap<String, String>,
    /// Fleet size. `None` reconciles a single instance by field diff.
    pub replicas: Option<u32>,
}

impl InstanceSpec {
    /// Whether `self` (live) launched from the same configuration as `desired`.
    /// Used to pick among several live instances sharing a name.
    pub fn same_launch_config(&self, desired: &InstanceSpec) -> bool {
        let mut live = self.security_groups.clone();
        let mut want = desired.security_groups.clone();
        live.sort();
        want.sort();

        self.instance_type == desired.instance_type
            && self.image_id == desired.image_id
            && self.key_name == desired.key_name
            && self.subnet_id == desired.subnet_id
            && live == want
    }

    /// Tags applied at launch, including the identity tag.
    pub fn launch_tags(&self) -> BTreeMap<String, String> {
        let mut tags = self.tags.clone();
        tags.insert("Name".to_string(), self.name.clone());
        tags
    }
}

impl Resource for InstanceSpec {
    const KIND: ResourceKind = ResourceKind::Instance;

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("name is required".to_string());
        }
        if self.subnet_id.is_empty() {
            return Err("subnet ID is required".to_string());
        }
        if self.security_groups.is_empty() {
            return Err("security group IDs are required".to_string());
        }
        if self.image_id.is_empty() {
            return Err("machine image is required".to_string());
        }
        if self.replicas == Some(0) {
            return Err("desired count must be greater than 0".to_string());
        }
        Ok(())
    }

    fn diff(&self, observed: &Self) -> ChangeSet {
        let mut changes = ChangeSet::new();
        changes.scalar("instance_type", &observed.instance_type, &self.instance_type);
        changes.scalar("image_id", &observed.image_id, &self.image_id);
        changes.scalar("key_name", &observed.key_name, &self.key_name);
        changes.scalar("subnet_id", &observed.subnet_id, &self.subnet_id);
        changes.members(
            "security_groups",
            &observed.security_groups,
            &self.security_groups,
        );
        changes.scalar("monitoring", &observed.monitoring, &self.monitoring);
        changes.tags("tags", &observed.tags, &self.tags);
        changes
    }
}
