//! Provisioning steps and their outcomes

/// The six provisioning steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    SubscriptionBinding,
    WorkspaceResolution,
    ApplicationIdentity,
    Tables,
    DataCollectionRule,
    RoleAssignment,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::SubscriptionBinding,
        Step::WorkspaceResolution,
        Step::ApplicationIdentity,
        Step::Tables,
        Step::DataCollectionRule,
        Step::RoleAssignment,
    ];

    /// 1-based position
    pub fn number(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0) + 1
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SubscriptionBinding => "Subscription binding",
            Self::WorkspaceResolution => "Workspace resolution",
            Self::ApplicationIdentity => "Application identity",
            Self::Tables => "Custom tables",
            Self::DataCollectionRule => "Data collection rule",
            Self::RoleAssignment => "Role assignment",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}/{}] {}", self.number(), Self::ALL.len(), self.name())
    }
}

/// What a step did to a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// A new resource was created
    Created,
    /// An existing resource was found and used
    Reused,
    /// Found before acting; nothing submitted
    Skipped,
    /// The provider reported an idempotency conflict; treated as success
    AlreadyExists,
    /// A read-only step completed
    Resolved,
    /// Submitted and accepted (deployments)
    Deployed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Created => write!(f, "created"),
            StepStatus::Reused => write!(f, "reused"),
            StepStatus::Skipped => write!(f, "skipped (exists)"),
            StepStatus::AlreadyExists => write!(f, "already exists"),
            StepStatus::Resolved => write!(f, "resolved"),
            StepStatus::Deployed => write!(f, "deployed"),
        }
    }
}

/// One resource-level result within a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: Step,
    pub status: StepStatus,
    /// Resource the record is about (name or id)
    pub subject: String,
}

impl StepRecord {
    pub fn new(step: Step, status: StepStatus, subject: impl Into<String>) -> Self {
        Self {
            step,
            status,
            subject: subject.into(),
        }
    }

    /// True when this run changed something in the cloud
    pub fn is_change(&self) -> bool {
        matches!(
            self.status,
            StepStatus::Created | StepStatus::Deployed
        )
    }
}

/// Counts over a run's records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub changed: usize,
    pub unchanged: usize,
}

impl RunSummary {
    pub fn from_records(records: &[StepRecord]) -> Self {
        let changed = records.iter().filter(|r| r.is_change()).count();
        Self {
            changed,
            unchanged: records.len() - changed,
        }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} changed, {} unchanged", self.changed, self.unchanged)
    }
}

/// Receives progress while the pipeline runs
pub trait ProgressObserver: Send + Sync {
    fn step_started(&self, _step: Step) {}
    fn record(&self, _record: &StepRecord) {}
}

/// Observer that ignores everything
impl ProgressObserver for () {}
