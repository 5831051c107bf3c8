//! The deployment planner.
//!
//! `plan()` runs a sequential pipeline: role resolution, artifact
//! resolution, name generation, graph assembly. It holds no mutable state,
//! so concurrent invocations are independent.

use tracing::{debug, info, warn};

use crate::config::{ArtifactSource, DeploymentRequest, RequestHasher};
use crate::error::{ConfigError, Result};
use crate::registry::ArtifactRegistry;

use super::graph::GraphBuilder;
use super::naming::{Clock, IdSource, NameGenerator, RandomIdSource, SystemClock};
use super::plan::{
    Advisory, ArtifactOrigin, DeploymentPlan, PlanParts, ResolvedArtifact, ResourceKind,
};
use super::resources;
use super::role::{BucketGrant, ResolvedRole, ScopedReadGrant, resolve_role};

/// Builds deployment plans from requests.
pub struct DeploymentPlanner {
    /// Registry used for latest-approved lookups.
    registry: Box<dyn ArtifactRegistry>,
    /// Grants bucket reads to synthesized roles.
    bucket_grant: Box<dyn BucketGrant>,
    /// Time source for naming.
    clock: Box<dyn Clock>,
    /// Plan id source.
    ids: Box<dyn IdSource>,
    /// Request fingerprinting.
    hasher: RequestHasher,
}

impl std::fmt::Debug for DeploymentPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentPlanner")
            .field("registry", &self.registry.registry_type())
            .finish_non_exhaustive()
    }
}

impl DeploymentPlanner {
    /// Creates a planner with the default grant, wall clock and random ids.
    #[must_use]
    pub fn new(registry: Box<dyn ArtifactRegistry>) -> Self {
        Self {
            registry,
            bucket_grant: Box::new(ScopedReadGrant),
            clock: Box::new(SystemClock),
            ids: Box::new(RandomIdSource),
            hasher: RequestHasher::new(),
        }
    }

    /// Replaces the bucket grant mechanism.
    #[must_use]
    pub fn with_bucket_grant(mut self, grant: Box<dyn BucketGrant>) -> Self {
        self.bucket_grant = grant;
        self
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the plan id source.
    #[must_use]
    pub fn with_id_source(mut self, ids: Box<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    /// Builds the plan for one request.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the request names no usable artifact
    /// source (before any lookup), or a lookup failure from the registry or
    /// the bucket grant.
    pub async fn plan(&self, request: &DeploymentRequest) -> Result<DeploymentPlan> {
        let Some(source) = request.artifact_source() else {
            return Err(ConfigError::MissingArtifactSource {
                deployment_id: request.id.clone(),
            }
            .into());
        };

        let created_at = self.clock.now();
        let names = NameGenerator::new(request.id.as_str(), created_at);
        info!(
            "Planning deployment '{}' in {} at {}",
            request.id,
            request.context.region,
            names.timestamp()
        );

        let mut advisories: Vec<Advisory> = Vec::new();
        let role = resolve_role(
            request,
            &names.name(ResourceKind::Role),
            self.bucket_grant.as_ref(),
            &mut advisories,
        )?;

        let artifact = self.resolve_artifact(request, source).await?;
        debug!("Deploying artifact {}", artifact.arn);

        let mut graph = GraphBuilder::new().with_tags(request.resource_tags());
        if let ResolvedRole::Synthesized(definition) = &role {
            graph.push(resources::role_node(definition)?)?;
        }
        graph.push(resources::security_group_node(
            names.name(ResourceKind::SecurityGroup),
            &request.network,
        ))?;
        graph.push(resources::encryption_key_node(
            names.name(ResourceKind::EncryptionKey),
            &request.context,
        ))?;

        let model_name = names.name(ResourceKind::Model);
        graph.push(resources::model_node(
            model_name.clone(),
            &role,
            &artifact.arn,
            &request.network,
        ))?;

        let config_name = names.name(ResourceKind::EndpointConfig);
        graph.push(resources::endpoint_config_node(
            config_name.clone(),
            &model_name,
            &request.variant,
        ))?;
        graph.push(resources::endpoint_node(
            names.name(ResourceKind::Endpoint),
            &config_name,
        ))?;

        for advisory in &advisories {
            if matches!(advisory, Advisory::BroadPermission { .. }) {
                warn!("{advisory}");
            }
        }

        let plan = DeploymentPlan::assemble(PlanParts {
            plan_id: self.ids.plan_id(),
            deployment_id: request.id.clone(),
            created_at,
            request_hash: self.hasher.hash_request(request),
            region: request.context.region.clone(),
            role,
            artifact,
            nodes: graph.finish(),
            advisories,
        });

        info!(
            "Plan {} ready: {} resources, endpoint {}",
            plan.plan_id(),
            plan.node_count(),
            plan.outputs().endpoint_name
        );
        Ok(plan)
    }

    async fn resolve_artifact(
        &self,
        request: &DeploymentRequest,
        source: ArtifactSource<'_>,
    ) -> Result<ResolvedArtifact> {
        match source {
            ArtifactSource::Explicit(arn) => Ok(ResolvedArtifact {
                arn: arn.to_string(),
                origin: ArtifactOrigin::Explicit,
            }),
            ArtifactSource::LatestApproved { group } => {
                debug!(
                    "Resolving latest approved artifact of {group} via {}",
                    self.registry.registry_type()
                );
                let arn = self
                    .registry
                    .get_latest_approved(&request.context.region, group)
                    .await?;
                Ok(ResolvedArtifact {
                    arn,
                    origin: ArtifactOrigin::LatestApproved {
                        group: group.to_string(),
                    },
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeploymentContext, NetworkConfig};
    use crate::error::{LookupError, PlannerError};
    use crate::planner::naming::{FixedClock, FixedIdSource};
    use crate::planner::plan::PermissionScope;
    use crate::planner::role::{BASELINE_SIDS, RoleDefinition};
    use crate::registry::{MockArtifactRegistry, StaticRegistry};
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, secs)
            .single()
            .expect("valid timestamp")
    }

    fn request() -> DeploymentRequest {
        DeploymentRequest::new(
            "churn",
            DeploymentContext::new("us-east-1", "111122223333"),
            NetworkConfig::new("vpc-1", vec![String::from("subnet-a")]),
        )
        .with_variant_param("instance_type", serde_json::json!("ml.m5.large"))
        .with_variant_param("initial_instance_count", serde_json::json!(1))
    }

    fn planner(registry: Box<dyn ArtifactRegistry>, secs: u32) -> DeploymentPlanner {
        DeploymentPlanner::new(registry)
            .with_clock(Box::new(FixedClock::new(at(secs))))
            .with_id_source(Box::new(FixedIdSource::new(Uuid::nil())))
    }

    fn unused_registry() -> Box<dyn ArtifactRegistry> {
        let mut registry = MockArtifactRegistry::new();
        registry.expect_get_latest_approved().never();
        registry.expect_registry_type().return_const("mock");
        Box::new(registry)
    }

    /// Counts grant calls and delegates to the scoped grant.
    struct CountingGrant(Arc<AtomicUsize>);

    impl BucketGrant for CountingGrant {
        fn grant_read(&self, role: &mut RoleDefinition, bucket_arn: &str) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            ScopedReadGrant.grant_read(role, bucket_arn)
        }
    }

    #[tokio::test]
    async fn test_reference_role_with_explicit_artifact() {
        let req = request()
            .with_execution_role("arn:role:X")
            .with_model_package("pkg-1")
            .with_artifacts_bucket("arn:aws:s3:::assets");
        let calls = Arc::new(AtomicUsize::new(0));
        let plan = planner(unused_registry(), 4)
            .with_bucket_grant(Box::new(CountingGrant(Arc::clone(&calls))))
            .plan(&req)
            .await
            .expect("plan builds");

        let kinds: Vec<ResourceKind> = plan.nodes().iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::SecurityGroup,
                ResourceKind::EncryptionKey,
                ResourceKind::Model,
                ResourceKind::EndpointConfig,
                ResourceKind::Endpoint,
            ]
        );
        assert!(plan.role().is_reference());
        assert!(plan.role().statements().is_empty());
        assert!(plan.advisories().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(plan.artifact().origin, ArtifactOrigin::Explicit);
        assert!(plan.is_topologically_ordered());
    }

    #[tokio::test]
    async fn test_synthesized_role_with_group_lookup() {
        let mut registry = MockArtifactRegistry::new();
        registry
            .expect_get_latest_approved()
            .withf(|region, group| region == "us-east-1" && group == "grp-A")
            .times(1)
            .returning(|_, _| Ok(String::from("pkg-7")));
        registry.expect_registry_type().return_const("mock");

        let req = request().with_model_package_group("grp-A");
        let plan = planner(Box::new(registry), 4)
            .plan(&req)
            .await
            .expect("plan builds");

        let model = plan.node(ResourceKind::Model).expect("model node");
        assert_eq!(
            model.property("containers"),
            Some(&serde_json::json!([{ "model_package_name": "pkg-7" }]))
        );
        assert!(model.depends_on_kind(ResourceKind::Role));
        assert!(model.depends_on_kind(ResourceKind::SecurityGroup));

        let sids: Vec<&str> = plan.role().statements().iter().map(|s| s.sid.as_str()).collect();
        for sid in BASELINE_SIDS {
            assert!(sids.contains(&sid), "missing {sid}");
        }
        assert_eq!(plan.node_count(), 6);
        assert_eq!(plan.nodes()[0].kind, ResourceKind::Role);
        assert!(plan.is_topologically_ordered());
        assert_eq!(
            plan.artifact().origin,
            ArtifactOrigin::LatestApproved {
                group: String::from("grp-A")
            }
        );
    }

    #[tokio::test]
    async fn test_missing_artifact_source_fails_before_lookup() {
        let calls = Arc::new(AtomicUsize::new(0));
        let err = planner(unused_registry(), 4)
            .with_bucket_grant(Box::new(CountingGrant(Arc::clone(&calls))))
            .plan(&request().with_artifacts_bucket("arn:aws:s3:::assets"))
            .await
            .expect_err("no artifact source");

        assert!(err.is_missing_artifact());
        assert!(err.to_string().contains("artifact resolution"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_plans_one_second_apart() {
        let req = request().with_model_package("pkg-1");
        let first = planner(unused_registry(), 4).plan(&req).await.expect("first plan");
        let second = planner(unused_registry(), 5).plan(&req).await.expect("second plan");

        let a = &first.outputs().endpoint_name;
        let b = &second.outputs().endpoint_name;
        assert_eq!(a, "churn-endpoint-20240309070504");
        assert_eq!(b, "churn-endpoint-20240309070505");
        for (x, y) in first.nodes().iter().zip(second.nodes()) {
            assert_ne!(x.name, y.name);
        }
    }

    #[tokio::test]
    async fn test_single_timestamp_per_plan() {
        let plan = planner(unused_registry(), 4)
            .plan(&request().with_model_package("pkg-1"))
            .await
            .expect("plan builds");
        assert!(plan.nodes().iter().all(|n| n.name.ends_with("-20240309070504")));
        assert_eq!(plan.created_at(), at(4));
    }

    #[tokio::test]
    async fn test_bucket_scopes_grant_and_omission_warns() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scoped = planner(unused_registry(), 4)
            .with_bucket_grant(Box::new(CountingGrant(Arc::clone(&calls))))
            .plan(
                &request()
                    .with_model_package("pkg-1")
                    .with_artifacts_bucket("arn:aws:s3:::assets"),
            )
            .await
            .expect("plan builds");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!scoped.broad_permission_warnings().iter().any(|a| matches!(
            a,
            Advisory::BroadPermission { scope: PermissionScope::AssetBucket, .. }
        )));

        let unscoped = planner(unused_registry(), 4)
            .plan(&request().with_model_package("pkg-1"))
            .await
            .expect("plan builds");
        assert!(unscoped.broad_permission_warnings().iter().any(|a| matches!(
            a,
            Advisory::BroadPermission { scope: PermissionScope::AssetBucket, .. }
        )));
        assert!(unscoped.role().statements().iter().any(|s| s.is_unscoped()
            && s.actions.contains("s3:GetObject")));
    }

    #[tokio::test]
    async fn test_registry_failure_propagates() {
        let mut registry = MockArtifactRegistry::new();
        registry
            .expect_get_latest_approved()
            .returning(|_, group| Err(LookupError::registry(group, "throttled").into()));
        registry.expect_registry_type().return_const("mock");

        let err = planner(Box::new(registry), 4)
            .plan(&request().with_model_package_group("grp-A"))
            .await
            .expect_err("lookup fails");
        assert!(matches!(
            err,
            PlannerError::Lookup(LookupError::RegistryRequestFailed { .. })
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_project_tags_on_every_node() {
        let req = request()
            .with_model_package_group("grp-A")
            .with_project(Some(String::from("p-1")), Some(String::from("churn")));
        let registry = StaticRegistry::new().with_artifact("grp-A", "pkg-2");
        let plan = planner(Box::new(registry), 4).plan(&req).await.expect("plan builds");

        for node in plan.nodes() {
            assert_eq!(
                node.tags.get("sagemaker:project-name").map(String::as_str),
                Some("churn")
            );
        }
    }

    #[tokio::test]
    async fn test_endpoint_url_and_config_links() {
        let plan = planner(unused_registry(), 4)
            .plan(&request().with_model_package("pkg-1"))
            .await
            .expect("plan builds");

        assert_eq!(
            plan.outputs().endpoint_url,
            "https://runtime.sagemaker.us-east-1.amazonaws.com/endpoints/churn-endpoint-20240309070504/invocations"
        );
        let endpoint = plan.node(ResourceKind::Endpoint).expect("endpoint node");
        assert_eq!(
            endpoint.property("endpoint_config_name"),
            Some(&serde_json::json!("churn-conf-20240309070504"))
        );
        let config = plan.node(ResourceKind::EndpointConfig).expect("config node");
        let variant = &config.property("production_variants").expect("variants")[0];
        assert_eq!(variant["model_name"], "churn-model-20240309070504");
        assert_eq!(variant["instance_type"], "ml.m5.large");
    }
}
