//! Managed relational database instance.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Resource, ResourceKind};
use crate::diff::ChangeSet;

/// Master credentials. The password is never rendered in change sets.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSpec {
    pub name: String,
    pub engine: String,
    pub engine_version: String,
    pub instance_class: String,
    pub allocated_storage_gb: u32,
    pub credentials: Credentials,
    pub tags: BTreeMap<String, String>,
}

impl Resource for DatabaseSpec {
    const KIND: ResourceKind = ResourceKind::ManagedDatabase;

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("identifier is required".to_string());
        }
        if self.engine.is_empty() {
            return Err("engine is required".to_string());
        }
        if self.instance_class.is_empty() {
            return Err("instance class is required".to_string());
        }
        if self.allocated_storage_gb == 0 {
            return Err("allocated storage must be greater than 0".to_string());
        }
        if self.credentials.username.is_empty() {
            return Err("master username is required".to_string());
        }
        Ok(())
    }

    fn diff(&self, observed: &Self) -> ChangeSet {
        let mut changes = ChangeSet::new();
        changes.scalar("engine", &observed.engine, &self.engine);
        changes.scalar("engine_version", &observed.engine_version, &self.engine_version);
        changes.scalar("instance_class", &observed.instance_class, &self.instance_class);
        changes.scalar(
            "allocated_storage_gb",
            &observed.allocated_storage_gb,
            &self.allocated_storage_gb,
        );
        changes.scalar(
            "credentials.username",
            &observed.credentials.username,
            &self.credentials.username,
        );
        // Providers do not report the password back, so it is only set on create.
        changes.tags("tags", &observed.tags, &self.tags);
        changes
    }
}
