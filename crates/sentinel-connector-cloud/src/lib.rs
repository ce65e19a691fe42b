//! Sentinel Connector provisioning core
//!
//! Azure-agnostic workflow that provisions the Obsidian → Microsoft Sentinel
//! integration in Azure Government. All remote calls go through the
//! [`ManagementApi`] seam; `sentinel-connector-azure` implements it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │               sentinel-connector                 │
//! │        (config → session → provision)            │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │            sentinel-connector-cloud              │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │   Provisioner (6 steps, fail-fast)        │   │
//! │  │   trait ManagementApi { ... }             │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ Table / DCR  │  │ Idempotency  │            │
//! │  │   schemas    │  │  contracts   │            │
//! │  └──────────────┘  └──────────────┘            │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼────────┐
//!           │ azure (az CLI, │
//!           │ ARM, Graph)    │
//!           └────────────────┘
//! ```

pub mod api;
pub mod dcr;
pub mod error;
pub mod idempotency;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod session;
pub mod step;

// Re-exports
pub use api::{
    Application, ClientSecret, DataCollectionRule, Deployment, DeploymentStatus, ManagementApi,
    ProvisioningState, RoleAssignment, ServicePrincipal, SubscriptionInfo, WorkspaceRef,
};
pub use dcr::{DCR_API_VERSION, DataFlow, DcrDescriptor};
pub use error::{CloudError, Result};
pub use idempotency::{IdempotencyContract, ROLE_ASSIGNMENT, TABLE_CREATION};
pub use pipeline::{
    AppIdentity, MONITORING_METRICS_PUBLISHER_ROLE_ID, PollConfig, ProvisionOutcome, Provisioner,
    SECRET_VALIDITY_DAYS,
};
pub use report::CredentialReport;
pub use schema::{
    ACTIVITY_STREAM, ACTIVITY_TABLE, Column, ColumnType, THREAT_STREAM, THREAT_TABLE,
    TableDefinition, TablePlan, TableSchema,
};
pub use session::{
    AccessToken, CloudEnvironment, Session, SessionProvider, SessionTarget, TARGET_ENVIRONMENT,
};
pub use step::{ProgressObserver, RunSummary, Step, StepRecord, StepStatus};
