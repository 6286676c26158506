//! Engine configuration shared by every reconciliation task.

use std::sync::Arc;

use crate::approval::{ApprovalGate, AutoApprove, PromptApproval};
use crate::retry::RetryPolicy;

/// How non-empty change sets get approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalMode {
    /// Ask on the terminal and require an exact `yes`.
    #[default]
    Prompt,
    /// Apply every change set without asking.
    Auto,
}

impl ApprovalMode {
    /// Gate implementing this mode on the process terminal.
    pub fn gate(&self) -> Arc<dyn ApprovalGate> {
        match self {
            ApprovalMode::Prompt => Arc::new(PromptApproval::stdio()),
            ApprovalMode::Auto => Arc::new(AutoApprove),
        }
    }
}

/// Immutable settings for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub retry: RetryPolicy,
    pub approval: ApprovalMode,
    /// Stop after diffing and report what would change.
    pub dry_run: bool,
}

impl EngineConfig {
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_approval(mut self, approval: ApprovalMode) -> Self {
        self.approval = approval;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
