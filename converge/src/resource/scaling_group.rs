//! Auto scaling group.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Resource, ResourceKind};
use crate::diff::ChangeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingGroupSpec {
    pub name: String,
    pub min_size: u32,
    pub max_size: u32,
    pub desired_capacity: u32,
    pub launch_template: String,
    /// Subnet (zone) identifiers the group spans.
    pub zone_identifiers: Vec<String>,
    pub target_groups: Vec<String>,
    pub tags: BTreeMap<String, String>,
}

impl Resource for ScalingGroupSpec {
    const KIND: ResourceKind = ResourceKind::ScalingGroup;

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("name is required".to_string());
        }
        if self.launch_template.is_empty() {
            return Err("launch template is required".to_string());
        }
        if self.zone_identifiers.is_empty() {
            return Err("zone identifiers are required".to_string());
        }
        if self.min_size > self.max_size {
            return Err(format!(
                "min size {} exceeds max size {}",
                self.min_size, self.max_size
            ));
        }
        if self.desired_capacity < self.min_size || self.desired_capacity > self.max_size {
            return Err(format!(
                "desired capacity {} outside [{}, {}]",
                self.desired_capacity, self.min_size, self.max_size
            ));
        }
        Ok(())
    }

    fn diff(&self, observed: &Self) -> ChangeSet {
        let mut changes = ChangeSet::new();
        changes.scalar("min_size", &observed.min_size, &self.min_size);
        changes.scalar("max_size", &observed.max_size, &self.max_size);
        changes.scalar(
            "desired_capacity",
            &observed.desired_capacity,
            &self.desired_capacity,
        );
        changes.scalar("launch_template", &observed.launch_template, &self.launch_template);
        changes.members(
            "zone_identifiers",
            &observed.zone_identifiers,
            &self.zone_identifiers,
        );
        changes.members("target_groups", &observed.target_groups, &self.target_groups);
        changes.tags("tags", &observed.tags, &self.tags);
        changes
    }
}
