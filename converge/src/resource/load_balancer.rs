//! Application load balancer with its listeners and target groups.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Resource, ResourceKind};
use crate::diff::ChangeSet;

/// Default action of a listener.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerAction {
    /// Action type, e.g. `forward`.
    #[serde(rename = "type")]
    pub action_type: String,
    /// Name of the target group the action points at.
    pub target_group: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Listener {
    pub protocol: String,
    pub port: u16,
    pub default_action: ListenerAction,
}

impl fmt::Display for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {}->{}",
            self.protocol, self.port, self.default_action.action_type, self.default_action.target_group
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheck {
    pub path: String,
    pub port: u16,
    pub interval_secs: u32,
    pub timeout_secs: u32,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            port: 80,
            interval_secs: 30,
            timeout_secs: 5,
            healthy_threshold: 5,
            unhealthy_threshold: 2,
        }
    }
}

impl HealthCheck {
    fn diff(&self, observed: &Self) -> ChangeSet {
        let mut changes = ChangeSet::new();
        changes.scalar("path", &observed.path, &self.path);
        changes.scalar("port", &observed.port, &self.port);
        changes.scalar("interval_secs", &observed.interval_secs, &self.interval_secs);
        changes.scalar("timeout_secs", &observed.timeout_secs, &self.timeout_secs);
        changes.scalar(
            "healthy_threshold",
            &observed.healthy_threshold,
            &self.healthy_threshold,
        );
        changes.scalar(
            "unhealthy_threshold",
            &observed.unhealthy_threshold,
            &self.unhealthy_threshold,
        );
        changes
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetGroup {
    pub name: String,
    pub protocol: String,
    pub port: u16,
    pub health_check: HealthCheck,
}

impl TargetGroup {
    fn diff(&self, observed: &Self) -> ChangeSet {
        let mut changes = ChangeSet::new();
        changes.scalar("protocol", &observed.protocol, &self.protocol);
        changes.scalar("port", &observed.port, &self.port);
        changes.nested("health_check", self.health_check.diff(&observed.health_check));
        changes
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadBalancerSpec {
    pub name: String,
    /// `internet-facing` or `internal`.
    pub scheme: String,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub listeners: Vec<Listener>,
    pub target_groups: Vec<TargetGroup>,
    pub tags: BTreeMap<String, String>,
}

impl Default for LoadBalancerSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            scheme: "internet-facing".to_string(),
            subnets: Vec::new(),
            security_groups: Vec::new(),
            listeners: Vec::new(),
            target_groups: Vec::new(),
            tags: BTreeMap::new(),
        }
    }
}

impl Resource for LoadBalancerSpec {
    const KIND: ResourceKind = ResourceKind::LoadBalancer;

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("name is required".to_string());
        }
        if self.subnets.len() < 2 {
            return Err("at least two subnets are required".to_string());
        }
        if self.security_groups.is_empty() {
            return Err("security group IDs are required".to_string());
        }
        for (idx, tg) in self.target_groups.iter().enumerate() {
            if tg.name.is_empty() {
                return Err(format!("target group #{idx} has no name"));
            }
            if self.target_groups[..idx].iter().any(|t| t.name == tg.name) {
                return Err(format!("target group {} declared twice", tg.name));
            }
        }
        for listener in &self.listeners {
            let target = &listener.default_action.target_group;
            if !target.is_empty() && !self.target_groups.iter().any(|tg| &tg.name == target) {
                return Err(format!(
                    "listener {}:{} forwards to undeclared target group {}",
                    listener.protocol, listener.port, target
                ));
            }
        }
        Ok(())
    }

    fn diff(&self, observed: &Self) -> ChangeSet {
        let mut changes = ChangeSet::new();
        changes.scalar("scheme", &observed.scheme, &self.scheme);
        changes.members("subnets", &observed.subnets, &self.subnets);
        changes.members(
            "security_groups",
            &observed.security_groups,
            &self.security_groups,
        );
        changes.sequence("listeners", &observed.listeners, &self.listeners);

        // Target groups are matched by name, in desired order.
        for tg in &self.target_groups {
            let field = format!("target_groups[{}]", tg.name);
            match observed.target_groups.iter().find(|o| o.name == tg.name) {
                Some(live) => changes.nested(&field, tg.diff(live)),
                None => changes.added(&field, "present"),
            }
        }
        for live in &observed.target_groups {
            if !self.target_groups.iter().any(|tg| tg.name == live.name) {
                changes.removed(&format!("target_groups[{}]", live.name), "present");
            }
        }

        changes.tags("tags", &observed.tags, &self.tags);
        changes
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample() -> LoadBalancerSpec {
        LoadBalancerSpec {
            name: "edge".to_string(),
            scheme: "internet-facing".to_string(),
            subnets: vec!["subnet-a".to_string(), "subnet-b".to_string()],
            security_groups: vec!["sg-lb".to_string()],
            listeners: vec![Listener {
                protocol: "HTTP".to_string(),
                port: 80,
                default_action: ListenerAction {
                    action_type: "forward".to_string(),
                    target_group: "web".to_string(),
                },
            }],
            target_groups: vec![TargetGroup {
                name: "web".to_string(),
                protocol: "HTTP".to_string(),
                port: 8080,
                health_check: HealthCheck::default(),
            }],
            tags: BTreeMap::new(),
        }
    }

    #[test]
    fn test_health_check_change_is_nested() {
        let observed = sample();
        let mut desired = sample();
        desired.target_groups[0].health_check.path = "/healthz".to_string();
        assert_eq!(
            desired.diff(&observed).lines(),
            vec!["target_groups[web].health_check.path: / -> /healthz"]
        );
    }

    #[test]
    fn test_listener_added() {
        let observed = sample();
        let mut desired = sample();
        desired.listeners.push(Listener {
            protocol: "HTTPS".to_string(),
            port: 443,
            default_action: ListenerAction {
                action_type: "forward".to_string(),
                target_group: "web".to_string(),
            },
        });
        assert_eq!(
            desired.diff(&observed).lines(),
            vec!["listeners[1]: <none> -> HTTPS:443 forward->web"]
        );
    }

    #[test]
    fn test_target_group_added_and_removed() {
        let observed = sample();
        let mut desired = sample();
        desired.target_groups[0].name = "api".to_string();
        desired.listeners.clear();
        let lines = desired.diff(&observed).lines();
        assert!(lines.contains(&"target_groups[api]: <none> -> present".to_string()));
        assert!(lines.contains(&"target_groups[web]: present -> <none>".to_string()));
    }

    #[test]
    fn test_subnet_order_does_not_matter() {
        let observed = sample();
        let mut desired = sample();
        desired.subnets.reverse();
        assert!(desired.diff(&observed).is_empty());
    }

    #[test]
    fn test_validate_rejects_duplicate_target_group() {
        let mut spec = sample();
        spec.target_groups.push(TargetGroup {
            port: 9090,
            ..spec.target_groups[0].clone()
        });
        assert_eq!(
            spec.validate().unwrap_err(),
            "target group web declared twice"
        );
    }

    #[test]
    fn test_identical_copy_with_several_target_groups_converges() {
        let mut spec = sample();
        spec.target_groups.push(TargetGroup {
            name: "api".to_string(),
            port: 9090,
            ..spec.target_groups[0].clone()
        });
        assert!(spec.validate().is_ok());
        assert!(spec.diff(&spec.clone()).is_empty());
    }

    #[test]
    fn test_validate_listener_target() {
        let mut spec = sample();
        spec.listeners[0].default_action.target_group = "missing".to_string();
        assert!(spec.validate().unwrap_err().contains("undeclared target group"));
    }
}
