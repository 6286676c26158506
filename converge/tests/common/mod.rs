//! Test helpers for converge integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{self, Cursor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use converge::approval::ApprovalGate;
use converge::diff::ChangeSet;
use converge::resource::{InstanceSpec, ObjectStoreSpec};
use converge::{
    EngineConfig, IdentityFilter, ObservedState, PromptApproval, ProviderError, ProviderGateway,
    ResourceKind, ResourceReconciler, ResourceSpec, RetryPolicy, SimulatedProvider,
};

/// One call that reached the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Describe(ResourceKind),
    Create(ResourceKind),
    Update(String),
    Terminate(Vec<String>),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::Describe(_))
    }
}

/// Simulated account that records every call and injects failures.
pub struct RecordingProvider {
    inner: SimulatedProvider,
    calls: Mutex<Vec<Call>>,
    created: AtomicUsize,
    /// Creates beyond this many successful ones fail with a service error.
    create_budget: Option<usize>,
    /// Describes of this kind fail with the given error.
    describe_fault: Option<(ResourceKind, ProviderError)>,
    /// Updates left to fail with a throttling error before one goes through.
    update_faults: AtomicUsize,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self {
            inner: SimulatedProvider::new("us-east-1"),
            calls: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
            create_budget: None,
            describe_fault: None,
            update_faults: AtomicUsize::new(0),
        }
    }

    pub fn failing_creates_after(mut self, successes: usize) -> Self {
        self.create_budget = Some(successes);
        self
    }

    pub fn failing_describe(mut self, kind: ResourceKind, error: ProviderError) -> Self {
        self.describe_fault = Some((kind, error));
        self
    }

    pub fn failing_updates(self, times: usize) -> Self {
        self.update_faults.store(times, Ordering::SeqCst);
        self
    }

    pub fn inner(&self) -> &SimulatedProvider {
        &self.inner
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> usize {
        self.calls().iter().filter(|c| c.is_mutation()).count()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| matches(c)).count()
    }

    pub fn terminations(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Terminate(ids) => Some(ids),
                _ => None,
            })
            .collect()
    }

    /// Instances still counted toward the `web` fleet.
    pub async fn live_instances(&self) -> Vec<String> {
        self.inner
            .snapshot()
            .await
            .resources
            .into_iter()
            .filter(|r| r.kind() == ResourceKind::Instance && r.lifecycle.is_live_instance())
            .map(|r| r.id)
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ProviderGateway for RecordingProvider {
    async fn describe(&self, filter: &IdentityFilter) -> Result<Vec<ObservedState>, ProviderError> {
        self.record(Call::Describe(filter.kind));
        if let Some((kind, error)) = &self.describe_fault
            && *kind == filter.kind
        {
            return Err(error.clone());
        }
        self.inner.describe(filter).await
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<String, ProviderError> {
        self.record(Call::Create(spec.kind()));
        if let Some(budget) = self.create_budget
            && self.created.load(Ordering::SeqCst) >= budget
        {
            return Err(ProviderError::Service("insufficient capacity".to_string()));
        }
        let id = self.inner.create(spec).await?;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn update(
        &self,
        id: &str,
        desired: &ResourceSpec,
        changes: &ChangeSet,
    ) -> Result<(), ProviderError> {
        self.record(Call::Update(id.to_string()));
        if self
            .update_faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ProviderError::Throttled("rate exceeded".to_string()));
        }
        self.inner.update(id, desired, changes).await
    }

    async fn terminate(&self, kind: ResourceKind, ids: &[String]) -> Result<(), ProviderError> {
        self.record(Call::Terminate(ids.to_vec()));
        self.inner.terminate(kind, ids).await
    }
}

/// Terminal prompt fed with a scripted answer.
pub fn answering(answer: &str) -> Arc<dyn ApprovalGate> {
    Arc::new(PromptApproval::new(
        Box::new(Cursor::new(answer.as_bytes().to_vec())),
        Box::new(io::sink()),
    ))
}

pub fn make_reconciler(
    provider: &Arc<RecordingProvider>,
    approval: Arc<dyn ApprovalGate>,
) -> ResourceReconciler {
    let config = EngineConfig::default().with_retry(RetryPolicy::immediate(3));
    ResourceReconciler::new(provider.clone(), approval, Arc::new(config))
}

pub fn web_instance() -> InstanceSpec {
    InstanceSpec {
        name: "web".to_string(),
        instance_type: "t3.micro".to_string(),
        image_id: "ami-045602374a1982480".to_string(),
        key_name: "deploy".to_string(),
        subnet_id: "subnet-1".to_string(),
        security_groups: vec!["sg-1".to_string()],
        monitoring: false,
        tags: BTreeMap::from([("env".to_string(), "dev".to_string())]),
        replicas: None,
    }
}

pub fn web_fleet(replicas: u32) -> ResourceSpec {
    ResourceSpec::Instance(InstanceSpec {
        replicas: Some(replicas),
        ..web_instance()
    })
}

pub fn assets_bucket() -> ObjectStoreSpec {
    ObjectStoreSpec {
        name: "assets-bucket".to_string(),
        ..Default::default()
    }
}

/// Seed `count` running `web` instances and return their ids in listing order.
pub async fn seed_fleet(provider: &RecordingProvider, count: usize) -> Vec<String> {
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        ids.push(
            provider
                .inner()
                .insert(ResourceSpec::Instance(web_instance()))
                .await,
        );
    }
    ids
}
