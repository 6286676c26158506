//! Fleet sizer - reconciles a replicated instance by count.
//!
//! Planning is pure: the same observed listing and replica count always give
//! the same delta and the same victims. Scaling then issues one create per
//! missing instance, or one batched terminate for the surplus.

use std::fmt;

use tracing::{error, info};

use crate::error::{ProviderError, ReconcileError};
use crate::provider::ProviderGateway;
use crate::resource::{InstanceSpec, ObservedState, ResourceKind, ResourceSpec};
use crate::retry::RetryPolicy;

/// Desired replica count minus observed count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FleetDelta(pub i64);

impl FleetDelta {
    pub fn compute(observed: usize, desired: u32) -> Self {
        FleetDelta(i64::from(desired) - observed as i64)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Instances to launch (0 when shrinking).
    pub fn to_create(&self) -> usize {
        self.0.max(0) as usize
    }

    /// Instances to terminate (0 when growing).
    pub fn to_terminate(&self) -> usize {
        (-self.0).max(0) as usize
    }
}

impl fmt::Display for FleetDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 > 0 {
            write!(f, "+{}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Computed scaling decision for one observed snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetPlan {
    pub observed: usize,
    pub desired: u32,
    pub delta: FleetDelta,
    /// Identities selected for termination, in listing order.
    pub victims: Vec<String>,
}

impl FleetPlan {
    pub fn new(members: &[ObservedState], desired: u32) -> Self {
        let delta = FleetDelta::compute(members.len(), desired);
        Self {
            observed: members.len(),
            desired,
            delta,
            victims: select_victims(members, delta.to_terminate()),
        }
    }
}

/// The first `count` members in listing order, clipped to what exists.
pub fn select_victims(members: &[ObservedState], count: usize) -> Vec<String> {
    members.iter().take(count).map(|m| m.id.clone()).collect()
}

/// Result of a completed scale operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleResult {
    pub delta: FleetDelta,
    pub created: Vec<String>,
    pub terminated: Vec<String>,
}

/// Executes fleet plans against the gateway.
pub struct FleetSizer<'a> {
    provider: &'a dyn ProviderGateway,
    retry: &'a RetryPolicy,
}

impl<'a> FleetSizer<'a> {
    pub fn new(provider: &'a dyn ProviderGateway, retry: &'a RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// Apply `plan`. A zero delta issues no provider call.
    ///
    /// Growth stops at the first create that fails after its retries; the
    /// instances launched before it stay up.
    pub async fn scale(
        &self,
        spec: &InstanceSpec,
        plan: &FleetPlan,
    ) -> Result<ScaleResult, ReconcileError> {
        let mut result = ScaleResult {
            delta: plan.delta,
            created: Vec::new(),
            terminated: Vec::new(),
        };

        let to_create = plan.delta.to_create();
        if to_create > 0 {
            info!("Creating {} new {} instance(s)", to_create, spec.name);
            let request = ResourceSpec::Instance(spec.clone());
            for n in 1..=to_create {
                info!("Creating instance {} of {}", n, to_create);
                let operation = format!("create instance {} ({}/{})", spec.name, n, to_create);
                match self
                    .retry
                    .run(&operation, || self.provider.create(&request))
                    .await
                {
                    Ok(id) => result.created.push(id),
                    Err(source) => {
                        error!(
                            "Fleet {} stopped after {} of {} instance(s): {}",
                            spec.name,
                            result.created.len(),
                            to_create,
                            source
                        );
                        return Err(ReconcileError::PartialFleet {
                            created: result.created.len(),
                            requested: to_create,
                            source,
                        });
                    }
                }
            }
        }

        if !plan.victims.is_empty() {
            info!(
                "Terminating {} excess {} instance(s): {:?}",
                plan.victims.len(),
                spec.name,
                plan.victims
            );
            let operation = format!("terminate instances {}", spec.name);
            self.retry
                .run(&operation, || {
                    self.provider.terminate(ResourceKind::Instance, &plan.victims)
                })
                .await
                .map_err(|e: ProviderError| ReconcileError::provider("terminate", e))?;
            result.terminated = plan.victims.clone();
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::LifecycleState;

    fn members(ids: &[&str]) -> Vec<ObservedState> {
        ids.iter()
            .map(|id| ObservedState {
                id: id.to_string(),
                lifecycle: LifecycleState::Running,
                spec: ResourceSpec::Instance(InstanceSpec {
                    name: "web".to_string(),
                    ..Default::default()
                }),
            })
            .collect()
    }

    #[test]
    fn test_delta_signs() {
        assert_eq!(FleetDelta::compute(3, 3), FleetDelta(0));
        assert_eq!(FleetDelta::compute(2, 5), FleetDelta(3));
        assert_eq!(FleetDelta::compute(5, 2), FleetDelta(-3));
        assert_eq!(FleetDelta(3).to_create(), 3);
        assert_eq!(FleetDelta(3).to_terminate(), 0);
        assert_eq!(FleetDelta(-3).to_terminate(), 3);
        assert_eq!(FleetDelta(-3).to_create(), 0);
    }

    #[test]
    fn test_delta_display() {
        assert_eq!(FleetDelta(2).to_string(), "+2");
        assert_eq!(FleetDelta(-2).to_string(), "-2");
        assert_eq!(FleetDelta(0).to_string(), "0");
    }

    #[test]
    fn test_victims_are_earliest_listed() {
        let fleet = members(&["i-1", "i-2", "i-3", "i-4", "i-5"]);
        let plan = FleetPlan::new(&fleet, 2);
        assert_eq!(plan.delta, FleetDelta(-3));
        assert_eq!(plan.victims, vec!["i-1", "i-2", "i-3"]);
    }

    #[test]
    fn test_plan_is_idempotent() {
        let fleet = members(&["i-a", "i-b", "i-c", "i-d"]);
        assert_eq!(FleetPlan::new(&fleet, 1), FleetPlan::new(&fleet, 1));
    }

    #[test]
    fn test_victims_clipped_to_observed() {
        let fleet = members(&["i-1", "i-2"]);
        assert_eq!(select_victims(&fleet, 5), vec!["i-1", "i-2"]);
    }

    #[test]
    fn test_growth_selects_no_victims() {
        let fleet = members(&["i-1", "i-2"]);
        let plan = FleetPlan::new(&fleet, 5);
        assert_eq!(plan.delta, FleetDelta(3));
        assert!(plan.victims.is_empty());
    }
}
