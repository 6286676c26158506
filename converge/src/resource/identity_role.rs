//! Identity role with trust policy and inline policies.

use serde::{Deserialize, Serialize};

use super::{Resource, ResourceKind};
use crate::diff::ChangeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InlinePolicy {
    pub name: String,
    /// Policy document (JSON text).
    pub document: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityRoleSpec {
    pub name: String,
    pub trust_policy: String,
    pub inline_policies: Vec<InlinePolicy>,
}

/// Canonical form of a JSON document so whitespace and key order do not
/// register as drift. Falls back to the raw text when it is not JSON.
fn canonical(document: &str) -> String {
    serde_json::from_str::<serde_json::Value>(document)
        .map(|v| v.to_string())
        .unwrap_or_else(|_| document.trim().to_string())
}

impl Resource for IdentityRoleSpec {
    const KIND: ResourceKind = ResourceKind::IdentityRole;

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("role name is required".to_string());
        }
        if self.trust_policy.trim().is_empty() {
            return Err("trust policy is required".to_string());
        }
        for (idx, policy) in self.inline_policies.iter().enumerate() {
            if policy.name.is_empty() {
                return Err(format!("inline policy #{idx} has no name"));
            }
            if self.inline_policies[..idx].iter().any(|p| p.name == policy.name) {
                return Err(format!("inline policy {} declared twice", policy.name));
            }
        }
        Ok(())
    }

    fn diff(&self, observed: &Self) -> ChangeSet {
        let mut changes = ChangeSet::new();
        changes.scalar(
            "trust_policy",
            &canonical(&observed.trust_policy),
            &canonical(&self.trust_policy),
        );

        for policy in &self.inline_policies {
            let field = format!("inline_policies[{}]", policy.name);
            match observed.inline_policies.iter().find(|p| p.name == policy.name) {
                Some(live) => changes.scalar(
                    &field,
                    &canonical(&live.document),
                    &canonical(&policy.document),
                ),
                None => changes.added(&field, &canonical(&policy.document)),
            }
        }
        for live in &observed.inline_policies {
            if !self.inline_policies.iter().any(|p| p.name == live.name) {
                changes.removed(
                    &format!("inline_policies[{}]", live.name),
                    &canonical(&live.document),
                );
            }
        }
        changes
    }
}
