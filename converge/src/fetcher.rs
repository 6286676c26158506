//! State fetcher - builds observed state from provider listings.

use tracing::debug;

use crate::error::ProviderError;
use crate::provider::{IdentityFilter, ProviderGateway};
use crate::resource::{ObservedState, ResourceKind, ResourceSpec};
use crate::retry::RetryPolicy;

/// Looks up live resources through the gateway, one retried call per lookup.
pub struct StateFetcher<'a> {
    provider: &'a dyn ProviderGateway,
    retry: &'a RetryPolicy,
}

impl<'a> StateFetcher<'a> {
    pub fn new(provider: &'a dyn ProviderGateway, retry: &'a RetryPolicy) -> Self {
        Self { provider, retry }
    }

    async fn describe(&self, filter: &IdentityFilter) -> Result<Vec<ObservedState>, ProviderError> {
        let operation = format!("describe {} {}", filter.kind, filter.name);
        match self
            .retry
            .run(&operation, || self.provider.describe(filter))
            .await
        {
            Ok(found) => Ok(found),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Observed state of a single-instance resource, or `None` when nothing
    /// live carries the desired name.
    ///
    /// When several live instances share the name, the first one launched
    /// from the desired configuration (type, image, key, subnet, groups) is
    /// preferred; otherwise the first listed.
    pub async fn fetch(&self, desired: &ResourceSpec) -> Result<Option<ObservedState>, ProviderError> {
        let filter = match desired.kind() {
            ResourceKind::Instance => IdentityFilter::live_instances(desired.name()),
            kind => IdentityFilter::by_name(kind, desired.name()),
        };
        let mut candidates = self.describe(&filter).await?;
        candidates.retain(|c| c.kind() != ResourceKind::Instance || c.lifecycle.is_live_instance());
        debug!(
            "{} {}: {} candidate(s)",
            desired.kind(),
            desired.name(),
            candidates.len()
        );

        let pick = match desired {
            ResourceSpec::Instance(want) if candidates.len() > 1 => candidates
                .iter()
                .position(|c| match &c.spec {
                    ResourceSpec::Instance(live) => live.same_launch_config(want),
                    _ => false,
                })
                .unwrap_or(0),
            _ => 0,
        };

        if candidates.is_empty() {
            Ok(None)
        } else {
            Ok(Some(candidates.swap_remove(pick)))
        }
    }

    /// Every live instance of a fleet, in provider enumeration order.
    /// Terminated and shutting-down instances are excluded.
    pub async fn fetch_fleet(&self, name: &str) -> Result<Vec<ObservedState>, ProviderError> {
        let mut members = self
            .describe(&IdentityFilter::live_instances(name))
            .await?;
        members.retain(|m| m.kind() == ResourceKind::Instance && m.lifecycle.is_live_instance());
        debug!("fleet {}: {} live instance(s)", name, members.len());
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SimulatedProvider;
    use crate::resource::{InstanceSpec, LoadBalancerSpec};

    fn web(instance_type: &str) -> InstanceSpec {
        InstanceSpec {
            name: "web".to_string(),
            instance_type: instance_type.to_string(),
            image_id: "ami-1".to_string(),
            subnet_id: "subnet-1".to_string(),
            security_groups: vec!["sg-1".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_not_found_is_none() {
        let provider = SimulatedProvider::new("us-east-1");
        let retry = RetryPolicy::immediate(3);
        let fetcher = StateFetcher::new(&provider, &retry);

        let lb = ResourceSpec::LoadBalancer(LoadBalancerSpec {
            name: "edge".to_string(),
            ..Default::default()
        });
        assert_eq!(fetcher.fetch(&lb).await.unwrap(), None);
        assert_eq!(
            fetcher
                .fetch(&ResourceSpec::Instance(web("t3.micro")))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_prefers_matching_launch_config() {
        let provider = SimulatedProvider::new("us-east-1");
        provider
            .insert(ResourceSpec::Instance(web("t3.small")))
            .await;
        let matching = provider
            .insert(ResourceSpec::Instance(web("t3.micro")))
            .await;

        let retry = RetryPolicy::immediate(3);
        let fetcher = StateFetcher::new(&provider, &retry);
        let found = fetcher
            .fetch(&ResourceSpec::Instance(web("t3.micro")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, matching);
    }

    #[tokio::test]
    async fn test_falls_back_to_first_listed() {
        let provider = SimulatedProvider::new("us-east-1");
        let first = provider
            .insert(ResourceSpec::Instance(web("t3.small")))
            .await;
        provider
            .insert(ResourceSpec::Instance(web("t3.medium")))
            .await;

        let retry = RetryPolicy::immediate(3);
        let fetcher = StateFetcher::new(&provider, &retry);
        let found = fetcher
            .fetch(&ResourceSpec::Instance(web("t3.large")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first);
    }

    #[tokio::test]
    async fn test_fleet_excludes_terminated() {
        let provider = SimulatedProvider::new("us-east-1");
        let a = provider.insert(ResourceSpec::Instance(web("t3.micro"))).await;
        let b = provider.insert(ResourceSpec::Instance(web("t3.micro"))).await;
        let c = provider.insert(ResourceSpec::Instance(web("t3.micro"))).await;
        provider
            .terminate(ResourceKind::Instance, &[b])
            .await
            .unwrap();

        let retry = RetryPolicy::immediate(3);
        let fetcher = StateFetcher::new(&provider, &retry);
        let ids: Vec<_> = fetcher
            .fetch_fleet("web")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![a, c]);
    }
}
