//! Planning module for endpoint deployments.
//!
//! This module turns a deployment request into an explicit, ordered
//! resource graph:
//! - Role resolution (reuse or synthesize with scoped permissions)
//! - Artifact resolution (explicit or latest approved)
//! - Timestamped name generation
//! - Graph assembly with dependency edges

mod graph;
mod naming;
mod orchestrator;
mod plan;
mod resources;
mod role;

pub use graph::GraphBuilder;
pub use naming::{
    Clock, FixedClock, FixedIdSource, IdSource, NameGenerator, RandomIdSource, SystemClock,
    TIMESTAMP_FORMAT,
};
pub use orchestrator::DeploymentPlanner;
pub use plan::{
    Advisory, ArtifactOrigin, DeploymentPlan, Dependency, NodeId, PermissionScope, PlanOutputs,
    PlanParts, ResolvedArtifact, ResourceKind, ResourceNode, attribute_ref, invocation_url,
};
pub use resources::MODEL_NAME_KEY;
pub use role::{
    BASELINE_SIDS, BucketGrant, Effect, PolicyStatement, ResolvedRole, RoleDefinition,
    SERVICE_PRINCIPAL, ScopedReadGrant, resolve_role,
};
