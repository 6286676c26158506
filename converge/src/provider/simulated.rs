//! In-process provider account.
//!
//! Behaves like the control plane as far as reconciliation can tell:
//! provider-style identities, listings in creation order, terminated
//! instances that linger in listings, and not-found errors where the real
//! APIs raise them. The account can be persisted as JSON between runs.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{IdentityFilter, ProviderGateway};
use crate::diff::ChangeSet;
use crate::error::ProviderError;
use crate::resource::{LifecycleState, ObservedState, ResourceKind, ResourceSpec};

/// Placeholder account number used in generated ARNs.
const ACCOUNT_ID: &str = "000000000000";

/// Serialized account contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub region: String,
    /// Live and terminated resources, in creation order.
    pub resources: Vec<ObservedState>,
    /// Last time the account was written to disk.
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

/// Provider gateway backed by an in-memory account.
pub struct SimulatedProvider {
    account: Mutex<Account>,
}

impl SimulatedProvider {
    pub fn new(region: impl Into<String>) -> Self {
        Self::from_account(Account {
            region: region.into(),
            resources: Vec::new(),
            saved_at: None,
        })
    }

    pub fn from_account(account: Account) -> Self {
        Self {
            account: Mutex::new(account),
        }
    }

    /// Load an account snapshot. A missing file yields an empty account.
    pub async fn load(path: &Path, region: &str) -> anyhow::Result<Self> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let account: Account = serde_json::from_slice(&bytes)?;
                if account.region != region {
                    warn!(
                        "Account state {} belongs to region {}, not {}",
                        path.display(),
                        account.region,
                        region
                    );
                }
                info!(
                    "Loaded account state from {} ({} resources)",
                    path.display(),
                    account.resources.len()
                );
                Ok(Self::from_account(account))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No account state at {}, starting empty", path.display());
                Ok(Self::new(region))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the account snapshot.
    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        let mut account = self.account.lock().await;
        account.saved_at = Some(Utc::now());
        let json = serde_json::to_vec_pretty(&*account)?;
        tokio::fs::write(path, json).await?;
        debug!("Saved account state to {}", path.display());
        Ok(())
    }

    /// Copy of the current account contents.
    pub async fn snapshot(&self) -> Account {
        self.account.lock().await.clone()
    }

    /// Seed a live resource directly, bypassing create. Returns its identity.
    pub async fn insert(&self, spec: ResourceSpec) -> String {
        let mut account = self.account.lock().await;
        let id = generate_id(&account.region, &spec);
        let lifecycle = initial_lifecycle(spec.kind());
        account.resources.push(ObservedState {
            id: id.clone(),
            lifecycle,
            spec: live_form(&spec),
        });
        id
    }
}

fn initial_lifecycle(kind: ResourceKind) -> LifecycleState {
    match kind {
        ResourceKind::Instance => LifecycleState::Running,
        _ => LifecycleState::Available,
    }
}

fn short_hex(len: usize) -> String {
    uuid::Uuid::new_v4().simple().to_string()[..len].to_string()
}

fn generate_id(region: &str, spec: &ResourceSpec) -> String {
    match spec {
        ResourceSpec::Instance(_) => format!("i-{}", short_hex(17)),
        ResourceSpec::ObjectStore(s) => s.name.clone(),
        ResourceSpec::ManagedDatabase(s) => {
            format!("arn:aws:rds:{region}:{ACCOUNT_ID}:db:{}", s.name)
        }
        ResourceSpec::LoadBalancer(s) => format!(
            "arn:aws:elasticloadbalancing:{region}:{ACCOUNT_ID}:loadbalancer/app/{}/{}",
            s.name,
            short_hex(16)
        ),
        ResourceSpec::ScalingGroup(s) => format!(
            "arn:aws:autoscaling:{region}:{ACCOUNT_ID}:autoScalingGroup:{}:autoScalingGroupName/{}",
            uuid::Uuid::new_v4(),
            s.name
        ),
        ResourceSpec::IdentityRole(s) => format!("arn:aws:iam::{ACCOUNT_ID}:role/{}", s.name),
    }
}

/// What the provider reports back for a resource created from `spec`.
fn live_form(spec: &ResourceSpec) -> ResourceSpec {
    match spec {
        ResourceSpec::Instance(s) => {
            let mut live = s.clone();
            live.tags = s.launch_tags();
            live.replicas = None;
            ResourceSpec::Instance(live)
        }
        ResourceSpec::ManagedDatabase(s) => {
            let mut live = s.clone();
            live.credentials.password.clear();
            ResourceSpec::ManagedDatabase(live)
        }
        other => other.clone(),
    }
}

/// Instances are listed with an empty result; the other APIs raise not-found.
fn empty_describe(filter: &IdentityFilter) -> Result<Vec<ObservedState>, ProviderError> {
    match filter.kind {
        ResourceKind::Instance => Ok(Vec::new()),
        kind => Err(ProviderError::NotFound(format!("{kind} {}", filter.name))),
    }
}

#[async_trait]
impl ProviderGateway for SimulatedProvider {
    async fn describe(&self, filter: &IdentityFilter) -> Result<Vec<ObservedState>, ProviderError> {
        let account = self.account.lock().await;
        let matches: Vec<ObservedState> = account
            .resources
            .iter()
            .filter(|r| filter.matches(r))
            .filter(|r| filter.kind == ResourceKind::Instance || r.lifecycle != LifecycleState::Terminated)
            .cloned()
            .collect();
        debug!(
            "describe {} {}: {} match(es)",
            filter.kind,
            filter.name,
            matches.len()
        );

        if matches.is_empty() {
            return empty_describe(filter);
        }
        Ok(matches)
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<String, ProviderError> {
        let mut account = self.account.lock().await;

        if spec.kind() != ResourceKind::Instance {
            let exists = account.resources.iter().any(|r| {
                r.kind() == spec.kind()
                    && r.spec.name() == spec.name()
                    && r.lifecycle != LifecycleState::Terminated
            });
            if exists {
                return Err(ProviderError::Validation(format!(
                    "{} {} already exists",
                    spec.kind(),
                    spec.name()
                )));
            }
        }

        let id = generate_id(&account.region, spec);
        account.resources.push(ObservedState {
            id: id.clone(),
            lifecycle: initial_lifecycle(spec.kind()),
            spec: live_form(spec),
        });
        info!("Created {} {} ({})", spec.kind(), spec.name(), id);
        Ok(id)
    }

    async fn update(
        &self,
        id: &str,
        desired: &ResourceSpec,
        changes: &ChangeSet,
    ) -> Result<(), ProviderError> {
        let mut account = self.account.lock().await;
        let record = account
            .resources
            .iter_mut()
            .find(|r| r.id == id && r.lifecycle != LifecycleState::Terminated)
            .ok_or_else(|| ProviderError::NotFound(format!("{} {}", desired.kind(), id)))?;

        if record.kind() != desired.kind() {
            return Err(ProviderError::Validation(format!(
                "{id} is a {}, not a {}",
                record.kind(),
                desired.kind()
            )));
        }

        record.spec = live_form(desired);
        info!("Updated {} {} ({} change(s))", desired.kind(), id, changes.len());
        Ok(())
    }

    async fn terminate(&self, kind: ResourceKind, ids: &[String]) -> Result<(), ProviderError> {
        let mut account = self.account.lock().await;

        // The request is all-or-nothing: reject it before touching anything.
        for id in ids {
            let known = account
                .resources
                .iter()
                .any(|r| &r.id == id && r.kind() == kind && r.lifecycle != LifecycleState::Terminated);
            if !known {
                return Err(ProviderError::NotFound(format!("{kind} {id}")));
            }
        }

        match kind {
            ResourceKind::Instance => {
                for record in account.resources.iter_mut().filter(|r| ids.contains(&r.id)) {
                    record.lifecycle = LifecycleState::Terminated;
                }
            }
            _ => account.resources.retain(|r| !ids.contains(&r.id)),
        }
        info!("Terminated {} {}(s): {:?}", ids.len(), kind, ids);
        Ok(())
    }
}
