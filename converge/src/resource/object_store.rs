//! Object storage bucket.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Resource, ResourceKind};
use crate::diff::ChangeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreSpec {
    pub name: String,
    /// Canned access policy (`private`, `public-read`, ...).
    pub acl: String,
    pub tags: BTreeMap<String, String>,
}

impl Default for ObjectStoreSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            acl: "private".to_string(),
            tags: BTreeMap::new(),
        }
    }
}

impl Resource for ObjectStoreSpec {
    const KIND: ResourceKind = ResourceKind::ObjectStore;

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("bucket name is required".to_string());
        }
        if self.name.len() < 3 || self.name.len() > 63 {
            return Err(format!(
                "bucket name {} must be between 3 and 63 characters",
                self.name
            ));
        }
        if self.acl.is_empty() {
            return Err("access policy is required".to_string());
        }
        Ok(())
    }

    fn diff(&self, observed: &Self) -> ChangeSet {
        let mut changes = ChangeSet::new();
        changes.scalar("acl", &observed.acl, &self.acl);
        changes.tags("tags", &observed.tags, &self.tags);
        changes
    }
}
