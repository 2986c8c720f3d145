pub mod agent;
pub mod analytic;
pub mod cluster;
pub mod condition;
pub mod meta;
pub mod plan;
pub mod task;

pub use agent::{
    AgentId, CancelResponse, TaskSummary, TransferAssignment, TransferAssignmentRequest,
    TransferAssignmentResponse, TransferCompleteRequest, TransferCompleteResponse,
};
pub use analytic::{
    Analytic, AnalyticNamespace, AnalyticPersistentVolume, AnalyticSpec, AnalyticStatus,
    PLAN_LABEL,
};
pub use cluster::{
    Cluster, ClusterSpec, ConfigMap, EndpointType, PersistentVolumeClaim, Transfer,
    TransferEndpoint, TransferPhase,
};
pub use condition::{Category, Condition, Conditions};
pub use meta::{ObjectKey, ObjectMeta, OwnerReference, MIGRATION_KIND};
pub use plan::{Migration, MigrationSpec, Plan, PlanSpec, PlanStatus};
pub use task::{MigrationTask, MigrationTaskSpec, MigrationTaskStatus, PvcToMigrate};
