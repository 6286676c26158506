//! Manifest loading - `infra.yaml` plus optional `variables.yaml`.
//!
//! The manifest is merged with its variables file, machine images are
//! resolved from the built-in catalog, and the result is validated before it
//! materializes into a [`DesiredState`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::desired::DesiredState;
use crate::error::ManifestError;
use crate::resource::{
    Credentials, DatabaseSpec, HealthCheck, IdentityRoleSpec, InlinePolicy, InstanceSpec,
    Listener, LoadBalancerSpec, ObjectStoreSpec, ScalingGroupSpec, TargetGroup,
};

/// The only provider the manifest may name.
pub const PROVIDER: &str = "aws";

/// Known machine images by (region, os).
const IMAGE_CATALOG: &[(&str, &str, &str)] =
    &[("us-east-1", "amazonLinux2", "ami-045602374a1982480")];

/// Machine image for `os` in `region`, if the catalog knows one.
pub fn image_for(region: &str, os: &str) -> Option<&'static str> {
    IMAGE_CATALOG
        .iter()
        .find(|(r, o, _)| *r == region && *o == os)
        .map(|(_, _, image)| *image)
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InstanceBlock {
    pub name: String,
    pub instance_type: String,
    pub ami: String,
    pub key_name: String,
    pub tags: BTreeMap<String, String>,
    #[serde(alias = "security_groups")]
    pub vpc_security_group_ids: Vec<String>,
    pub monitoring: bool,
    /// Present means fleet mode.
    pub desired_count: Option<u32>,
    pub os: String,
    pub subnet_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BucketBlock {
    pub name: String,
    pub acl: String,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseBlock {
    pub name: String,
    pub engine: String,
    pub engine_version: String,
    pub instance_class: String,
    pub allocated_storage: u32,
    pub username: String,
    pub password: String,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TargetGroupBlock {
    pub name: String,
    pub protocol: String,
    pub port: u16,
    pub health_check_path: Option<String>,
    pub health_check_port: Option<u16>,
    pub health_check_interval: Option<u32>,
    pub health_check_timeout: Option<u32>,
    pub healthy_threshold: Option<u32>,
    pub unhealthy_threshold: Option<u32>,
}

impl TargetGroupBlock {
    fn to_spec(&self) -> TargetGroup {
        let defaults = HealthCheck::default();
        TargetGroup {
            name: self.name.clone(),
            protocol: self.protocol.clone(),
            port: self.port,
            health_check: HealthCheck {
                path: self.health_check_path.clone().unwrap_or(defaults.path),
                port: self.health_check_port.unwrap_or(self.port),
                interval_secs: self.health_check_interval.unwrap_or(defaults.interval_secs),
                timeout_secs: self.health_check_timeout.unwrap_or(defaults.timeout_secs),
                healthy_threshold: self.healthy_threshold.unwrap_or(defaults.healthy_threshold),
                unhealthy_threshold: self
                    .unhealthy_threshold
                    .unwrap_or(defaults.unhealthy_threshold),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoadBalancerBlock {
    pub name: String,
    pub scheme: String,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub listeners: Vec<Listener>,
    pub target_groups: Vec<TargetGroupBlock>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScalingGroupBlock {
    pub name: String,
    pub min_size: u32,
    pub max_size: u32,
    pub desired_capacity: u32,
    pub launch_template: String,
    pub vpc_zone_identifier: Vec<String>,
    pub target_group_arns: Vec<String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PolicyBlock {
    pub name: String,
    pub policy: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RoleBlock {
    pub name: String,
    pub assume_role_policy: String,
    pub inline_policies: Vec<PolicyBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResourceBlocks {
    pub ec2_instance: Option<InstanceBlock>,
    pub s3_bucket: Option<BucketBlock>,
    pub rds_instance: Option<DatabaseBlock>,
    pub alb: Option<LoadBalancerBlock>,
    pub auto_scaling_group: Option<ScalingGroupBlock>,
    pub iam_role: Option<RoleBlock>,
}

/// Values that fill manifest fields left empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Variables {
    pub region: String,
    pub ec2_instance: InstanceVariables,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InstanceVariables {
    pub key_name: String,
    pub vpc_security_group_ids: Vec<String>,
    pub monitoring: bool,
    pub desired_count: Option<u32>,
    pub os: String,
    pub subnet_id: String,
}

impl Variables {
    /// Load a variables file. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Option<Self>, ManifestError> {
        match std::fs::read_to_string(path) {
            Ok(source) => {
                let vars = serde_yaml::from_str(&source).map_err(|source| ManifestError::Parse {
                    path: path.display().to_string(),
                    source,
                })?;
                debug!("Loaded variables from {}", path.display());
                Ok(Some(vars))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No variables file at {}", path.display());
                Ok(None)
            }
            Err(source) => Err(ManifestError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}

/// Parsed infrastructure manifest.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub provider: String,
    pub region: String,
    /// Fallback subnet for the instance block.
    pub subnet_id: String,
    pub resources: ResourceBlocks,
}

impl Manifest {
    pub fn parse(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let source = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&source).map_err(|source| ManifestError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load, merge variables, resolve images and validate.
    pub fn load_with_variables(
        manifest: &Path,
        variables: Option<&Path>,
    ) -> Result<Self, ManifestError> {
        let mut loaded = Self::load(manifest)?;
        if let Some(path) = variables
            && let Some(vars) = Variables::load(path)?
        {
            loaded.merge(&vars);
        }
        loaded.resolve_image()?;
        loaded.validate()?;
        info!(
            "Loaded manifest {} for region {}",
            manifest.display(),
            loaded.region
        );
        Ok(loaded)
    }

    /// Fill fields the manifest left empty from `vars`.
    pub fn merge(&mut self, vars: &Variables) {
        if self.region.is_empty() {
            self.region = vars.region.clone();
        }
        if self.subnet_id.is_empty() {
            self.subnet_id = vars.ec2_instance.subnet_id.clone();
        }
        let Some(instance) = self.resources.ec2_instance.as_mut() else {
            return;
        };
        let from = &vars.ec2_instance;
        if instance.key_name.is_empty() {
            instance.key_name = from.key_name.clone();
        }
        if instance.vpc_security_group_ids.is_empty() {
            instance.vpc_security_group_ids = from.vpc_security_group_ids.clone();
        }
        if !instance.monitoring {
            instance.monitoring = from.monitoring;
        }
        if instance.desired_count.is_none() {
            instance.desired_count = from.desired_count;
        }
        if instance.os.is_empty() {
            instance.os = from.os.clone();
        }
    }

    /// Pick the machine image from the catalog when only an OS is given.
    pub fn resolve_image(&mut self) -> Result<(), ManifestError> {
        let Some(instance) = self.resources.ec2_instance.as_mut() else {
            return Ok(());
        };
        if !instance.ami.is_empty() || instance.os.is_empty() {
            return Ok(());
        }
        match image_for(&self.region, &instance.os) {
            Some(image) => {
                debug!("Resolved {} in {} to {}", instance.os, self.region, image);
                instance.ami = image.to_string();
                Ok(())
            }
            None => Err(ManifestError::UnknownImage {
                region: self.region.clone(),
                os: instance.os.clone(),
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.provider != PROVIDER {
            return Err(ManifestError::UnsupportedProvider(self.provider.clone()));
        }
        if self.region.is_empty() {
            return Err(ManifestError::MissingRegion);
        }
        if let Some(instance) = &self.resources.ec2_instance
            && instance.desired_count == Some(0)
        {
            return Err(ManifestError::Invalid(
                "desired count must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Materialize the declared resources.
    pub fn desired_state(&self) -> DesiredState {
        let blocks = &self.resources;
        DesiredState {
            instance: blocks.ec2_instance.as_ref().map(|b| InstanceSpec {
                name: b.name.clone(),
                instance_type: b.instance_type.clone(),
                image_id: b.ami.clone(),
                key_name: b.key_name.clone(),
                subnet_id: if b.subnet_id.is_empty() {
                    self.subnet_id.clone()
                } else {
                    b.subnet_id.clone()
                },
                security_groups: b.vpc_security_group_ids.clone(),
                monitoring: b.monitoring,
                tags: b.tags.clone(),
                replicas: b.desired_count,
            }),
            object_store: blocks.s3_bucket.as_ref().map(|b| ObjectStoreSpec {
                name: b.name.clone(),
                acl: if b.acl.is_empty() {
                    ObjectStoreSpec::default().acl
                } else {
                    b.acl.clone()
                },
                tags: b.tags.clone(),
            }),
            managed_database: blocks.rds_instance.as_ref().map(|b| DatabaseSpec {
                name: b.name.clone(),
                engine: b.engine.clone(),
                engine_version: b.engine_version.clone(),
                instance_class: b.instance_class.clone(),
                allocated_storage_gb: b.allocated_storage,
                credentials: Credentials {
                    username: b.username.clone(),
                    password: b.password.clone(),
                },
                tags: b.tags.clone(),
            }),
            load_balancer: blocks.alb.as_ref().map(|b| LoadBalancerSpec {
                name: b.name.clone(),
                scheme: if b.scheme.is_empty() {
                    LoadBalancerSpec::default().scheme
                } else {
                    b.scheme.clone()
                },
                subnets: b.subnets.clone(),
                security_groups: b.security_groups.clone(),
                listeners: b.listeners.clone(),
                target_groups: b.target_groups.iter().map(TargetGroupBlock::to_spec).collect(),
                tags: b.tags.clone(),
            }),
            scaling_group: blocks.auto_scaling_group.as_ref().map(|b| ScalingGroupSpec {
                name: b.name.clone(),
                min_size: b.min_size,
                max_size: b.max_size,
                desired_capacity: b.desired_capacity,
                launch_template: b.launch_template.clone(),
                zone_identifiers: b.vpc_zone_identifier.clone(),
                target_groups: b.target_group_arns.clone(),
                tags: b.tags.clone(),
            }),
            identity_role: blocks.iam_role.as_ref().map(|b| IdentityRoleSpec {
                name: b.name.clone(),
                trust_policy: b.assume_role_policy.clone(),
                inline_policies: b
                    .inline_policies
                    .iter()
                    .map(|p| InlinePolicy {
                        name: p.name.clone(),
                        document: p.policy.clone(),
                    })
                    .collect(),
            }),
        }
    }
}
