//! Provider gateway: the typed boundary to the cloud control plane.
//!
//! One method per verb, dispatched on the resource kind. Every call is a
//! single round trip; retries are layered on top by [`crate::retry`].

pub mod simulated;

use async_trait::async_trait;

use crate::diff::ChangeSet;
use crate::error::ProviderError;
use crate::resource::{LifecycleState, ObservedState, ResourceKind, ResourceSpec};

pub use simulated::SimulatedProvider;

/// Selects live resources of one kind by identity name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityFilter {
    pub kind: ResourceKind,
    pub name: String,
    /// Lifecycle states to include. Empty includes every state.
    pub states: Vec<LifecycleState>,
}

impl IdentityFilter {
    pub fn by_name(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            states: Vec::new(),
        }
    }

    /// Restrict to instances that still count toward a fleet.
    pub fn live_instances(name: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Instance,
            name: name.into(),
            states: LifecycleState::LIVE_INSTANCE.to_vec(),
        }
    }

    pub fn matches(&self, resource: &ObservedState) -> bool {
        resource.kind() == self.kind
            && resource.spec.name() == self.name
            && (self.states.is_empty() || self.states.contains(&resource.lifecycle))
    }
}

/// Request/response boundary to the control plane.
///
/// `describe` returns matches in the provider's enumeration order. A lookup
/// with no match may come back either as an empty list or as
/// [`ProviderError::NotFound`], depending on the API.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    async fn describe(&self, filter: &IdentityFilter) -> Result<Vec<ObservedState>, ProviderError>;

    /// Create one resource and return its provider-assigned identity.
    async fn create(&self, spec: &ResourceSpec) -> Result<String, ProviderError>;

    /// Apply `desired` to the live resource `id`. `changes` lists what differs.
    async fn update(
        &self,
        id: &str,
        desired: &ResourceSpec,
        changes: &ChangeSet,
    ) -> Result<(), ProviderError>;

    /// Terminate every listed resource in one request.
    async fn terminate(&self, kind: ResourceKind, ids: &[String]) -> Result<(), ProviderError>;
}
