//! Execution role resolution.
//!
//! A caller-supplied role is passed through untouched. Otherwise a role is
//! synthesized with a fixed baseline, plus asset-read and image-pull
//! permissions that are scoped when the caller names the bucket and
//! repository, and unscoped (with an advisory) when they do not.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::config::{DeploymentRequest, RoleSource};
use crate::error::Result;

use super::plan::{Advisory, NodeId, PermissionScope, ResourceKind, attribute_ref};

/// Service principal that assumes synthesized roles.
pub const SERVICE_PRINCIPAL: &str = "sagemaker.amazonaws.com";

/// Statement id: metric and log writes.
pub const SID_TELEMETRY: &str = "Telemetry";
/// Statement id: network interface lifecycle inside the deployment network.
pub const SID_NETWORK_INTERFACES: &str = "NetworkInterfaces";
/// Statement id: registry authorization token.
pub const SID_REGISTRY_AUTH: &str = "RegistryAuth";
/// Statement id: key usage inside the account's key namespace.
pub const SID_KEY_MANAGEMENT: &str = "KeyManagement";
/// Statement id: scoped asset bucket read, added by a [`BucketGrant`].
pub const SID_ASSET_BUCKET_READ: &str = "AssetBucketRead";
/// Statement id: unscoped asset read fallback.
pub const SID_ASSET_READ_ANY: &str = "AssetReadAnyBucket";
/// Statement id: container image pulls.
pub const SID_IMAGE_PULL: &str = "ImagePull";

/// The statement ids every synthesized role carries.
pub const BASELINE_SIDS: [&str; 4] = [
    SID_TELEMETRY,
    SID_NETWORK_INTERFACES,
    SID_REGISTRY_AUTH,
    SID_KEY_MANAGEMENT,
];

/// Audit rule suppressed for synthesized roles.
const SUPPRESSED_RULE: &str = "AwsSolutions-IAM5";

const TELEMETRY_ACTIONS: &[&str] = &[
    "cloudwatch:PutMetricData",
    "logs:CreateLogStream",
    "logs:PutLogEvents",
    "logs:CreateLogGroup",
    "logs:DescribeLogStreams",
];

const NETWORK_ACTIONS: &[&str] = &[
    "ec2:CreateNetworkInterface",
    "ec2:CreateNetworkInterfacePermission",
    "ec2:DeleteNetworkInterface",
    "ec2:DeleteNetworkInterfacePermission",
    "ec2:DescribeNetworkInterfaces",
    "ec2:DescribeVpcs",
    "ec2:DescribeDhcpOptions",
    "ec2:DescribeSubnets",
    "ec2:DescribeSecurityGroups",
];

const KEY_ACTIONS: &[&str] = &[
    "kms:Encrypt",
    "kms:ReEncrypt*",
    "kms:GenerateDataKey*",
    "kms:Decrypt",
    "kms:DescribeKey",
];

const ASSET_READ_FALLBACK_ACTIONS: &[&str] = &["s3:ListBucket", "s3:GetObject"];

const BUCKET_READ_ACTIONS: &[&str] = &["s3:GetObject*", "s3:GetBucket*", "s3:List*"];

const IMAGE_PULL_ACTIONS: &[&str] = &[
    "ecr:BatchCheckLayerAvailability",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
];

/// Effect of a permission statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Effect {
    /// Grants the actions.
    #[default]
    Allow,
}

/// One permission statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    /// Statement id.
    pub sid: String,
    /// Effect.
    pub effect: Effect,
    /// Actions granted.
    pub actions: BTreeSet<String>,
    /// Resource scope patterns.
    pub resources: Vec<String>,
    /// Optional condition block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
}

impl PolicyStatement {
    /// Creates an allow statement.
    #[must_use]
    pub fn allow(sid: &str, actions: &[&str], resources: Vec<String>) -> Self {
        Self {
            sid: sid.to_string(),
            effect: Effect::Allow,
            actions: actions.iter().map(|a| (*a).to_string()).collect(),
            resources,
            condition: None,
        }
    }

    /// Attaches a condition block.
    #[must_use]
    pub fn with_condition(mut self, condition: Value) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Returns true if the statement applies to every resource.
    #[must_use]
    pub fn is_unscoped(&self) -> bool {
        self.resources.iter().any(|r| r == "*")
    }
}

/// A role synthesized for the deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Generated role name.
    pub name: String,
    /// Principal allowed to assume the role.
    pub assumed_by: String,
    /// Permission statements.
    pub statements: Vec<PolicyStatement>,
}

impl RoleDefinition {
    /// Creates an empty role assumed by the serving service.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assumed_by: SERVICE_PRINCIPAL.to_string(),
            statements: Vec::new(),
        }
    }

    /// Adds a statement unless an identical one is already present.
    pub fn add_statement(&mut self, statement: PolicyStatement) {
        if !self.statements.contains(&statement) {
            self.statements.push(statement);
        }
    }

    /// Returns the statement with the given id.
    #[must_use]
    pub fn statement(&self, sid: &str) -> Option<&PolicyStatement> {
        self.statements.iter().find(|s| s.sid == sid)
    }
}

/// The execution role a plan uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolvedRole {
    /// A caller-supplied role reused as-is.
    Reference {
        /// Role identifier.
        arn: String,
    },
    /// A role created by the plan.
    Synthesized(RoleDefinition),
}

impl ResolvedRole {
    /// Returns true for a pass-through reference.
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Reference { .. })
    }

    /// Returns the statements attached by the plan (none for a reference).
    #[must_use]
    pub fn statements(&self) -> &[PolicyStatement] {
        match self {
            Self::Reference { .. } => &[],
            Self::Synthesized(role) => &role.statements,
        }
    }

    /// Returns the value a dependent node uses for the role identifier.
    #[must_use]
    pub fn arn_value(&self) -> Value {
        match self {
            Self::Reference { arn } => Value::String(arn.clone()),
            Self::Synthesized(_) => attribute_ref(ResourceKind::Role, "arn"),
        }
    }
}

/// The mechanism that grants a role read access to a bucket.
pub trait BucketGrant: Send + Sync {
    /// Grants `role` read access to `bucket_arn`. Must be idempotent.
    ///
    /// # Errors
    ///
    /// Returns a lookup failure if the grant cannot be made.
    fn grant_read(&self, role: &mut RoleDefinition, bucket_arn: &str) -> Result<()>;
}

/// Grants read access with a statement scoped to the bucket and its objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopedReadGrant;

impl BucketGrant for ScopedReadGrant {
    fn grant_read(&self, role: &mut RoleDefinition, bucket_arn: &str) -> Result<()> {
        let bucket = bucket_arn.trim_end_matches('/');
        role.add_statement(PolicyStatement::allow(
            SID_ASSET_BUCKET_READ,
            BUCKET_READ_ACTIONS,
            vec![bucket.to_string(), format!("{bucket}/*")],
        ));
        Ok(())
    }
}

/// Resolves the execution role of a request.
///
/// Advisories for unscoped fallbacks are appended to `advisories`.
///
/// # Errors
///
/// Returns an error if the bucket grant fails.
pub fn resolve_role(
    request: &DeploymentRequest,
    role_name: &str,
    grant: &dyn BucketGrant,
    advisories: &mut Vec<Advisory>,
) -> Result<ResolvedRole> {
    match request.role_source() {
        RoleSource::Existing(arn) => {
            debug!("Reusing execution role {arn}");
            Ok(ResolvedRole::Reference {
                arn: arn.to_string(),
            })
        }
        RoleSource::Synthesize => {
            debug!("Synthesizing execution role {role_name}");
            let role = synthesize_role(request, role_name, grant, advisories)?;
            Ok(ResolvedRole::Synthesized(role))
        }
    }
}

/// Builds a new role with the baseline and the asset/image permissions.
fn synthesize_role(
    request: &DeploymentRequest,
    role_name: &str,
    grant: &dyn BucketGrant,
    advisories: &mut Vec<Advisory>,
) -> Result<RoleDefinition> {
    let context = &request.context;
    let node = NodeId::from(ResourceKind::Role);
    let mut role = RoleDefinition::new(role_name);

    role.add_statement(PolicyStatement::allow(
        SID_TELEMETRY,
        TELEMETRY_ACTIONS,
        vec![String::from("*")],
    ));
    role.add_statement(
        PolicyStatement::allow(SID_NETWORK_INTERFACES, NETWORK_ACTIONS, vec![String::from("*")])
            .with_condition(serde_json::json!({
                "ArnEqualsIfExists": { "ec2:Vpc": context.vpc_arn(&request.network.vpc_id) }
            })),
    );
    role.add_statement(PolicyStatement::allow(
        SID_REGISTRY_AUTH,
        &["ecr:GetAuthorizationToken"],
        vec![String::from("*")],
    ));
    role.add_statement(PolicyStatement::allow(
        SID_KEY_MANAGEMENT,
        KEY_ACTIONS,
        vec![context.key_namespace()],
    ));

    if let Some(bucket) = request.artifacts_bucket() {
        grant.grant_read(&mut role, bucket)?;
    } else {
        warn!("No model artifacts bucket supplied, granting asset reads on '*'");
        role.add_statement(PolicyStatement::allow(
            SID_ASSET_READ_ANY,
            ASSET_READ_FALLBACK_ACTIONS,
            vec![String::from("*")],
        ));
        advisories.push(Advisory::BroadPermission {
            node: node.clone(),
            scope: PermissionScope::AssetBucket,
            actions: to_strings(ASSET_READ_FALLBACK_ACTIONS),
        });
    }

    let repo_scope = if let Some(repo) = request.ecr_repo() {
        repo.to_string()
    } else {
        warn!("No image repository supplied, granting image pulls on '*'");
        advisories.push(Advisory::BroadPermission {
            node: node.clone(),
            scope: PermissionScope::ImageRepository,
            actions: to_strings(IMAGE_PULL_ACTIONS),
        });
        String::from("*")
    };
    role.add_statement(PolicyStatement::allow(
        SID_IMAGE_PULL,
        IMAGE_PULL_ACTIONS,
        vec![repo_scope],
    ));

    advisories.push(Advisory::AuditSuppression {
        node,
        rule: SUPPRESSED_RULE.to_string(),
        reason: String::from("Model execution role requires some generic permissions."),
    });

    Ok(role)
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeploymentContext, NetworkConfig};
    use crate::error::{LookupError, PlannerError};

    fn request() -> DeploymentRequest {
        DeploymentRequest::new(
            "churn",
            DeploymentContext::new("us-east-1", "111122223333"),
            NetworkConfig::new("vpc-1", vec![String::from("subnet-a")]),
        )
        .with_model_package("pkg-1")
    }

    fn broad_scopes(advisories: &[Advisory]) -> Vec<PermissionScope> {
        advisories
            .iter()
            .filter_map(|a| match a {
                Advisory::BroadPermission { scope, .. } => Some(*scope),
                Advisory::AuditSuppression { .. } => None,
            })
            .collect()
    }

    /// A grant that must never be consulted.
    struct ForbiddenGrant;

    impl BucketGrant for ForbiddenGrant {
        fn grant_read(&self, _role: &mut RoleDefinition, bucket_arn: &str) -> Result<()> {
            Err(PlannerError::Lookup(LookupError::BucketGrantFailed {
                bucket: bucket_arn.to_string(),
                message: String::from("grant must not be called"),
            }))
        }
    }

    #[test]
    fn test_existing_role_is_pure_reference() {
        let req = request()
            .with_execution_role("arn:role:X")
            .with_artifacts_bucket("arn:aws:s3:::assets");
        let mut advisories = Vec::new();

        let role = resolve_role(&req, "unused", &ForbiddenGrant, &mut advisories)
            .expect("reference role never consults the grant");

        assert!(role.is_reference());
        assert!(role.statements().is_empty());
        assert!(advisories.is_empty());
        assert_eq!(role.arn_value(), Value::String(String::from("arn:role:X")));
    }

    #[test]
    fn test_baseline_statements() {
        let mut advisories = Vec::new();
        let role = resolve_role(&request(), "churn-role-1", &ScopedReadGrant, &mut advisories)
            .expect("role synthesizes");

        let ResolvedRole::Synthesized(def) = role else {
            panic!("expected a synthesized role");
        };
        for sid in BASELINE_SIDS {
            assert!(def.statement(sid).is_some(), "missing baseline statement {sid}");
        }
        assert_eq!(def.assumed_by, SERVICE_PRINCIPAL);

        let keys = def.statement(SID_KEY_MANAGEMENT).expect("key statement");
        assert_eq!(keys.resources, vec!["arn:aws:kms:us-east-1:111122223333:key/*"]);

        let network = def.statement(SID_NETWORK_INTERFACES).expect("network statement");
        let condition = network.condition.as_ref().expect("network statement is conditioned");
        assert_eq!(
            condition["ArnEqualsIfExists"]["ec2:Vpc"],
            "arn:aws:ec2:us-east-1:111122223333:vpc/vpc-1"
        );
    }

    #[test]
    fn test_fallbacks_raise_broad_permission_advisories() {
        let mut advisories = Vec::new();
        let role = resolve_role(&request(), "churn-role-1", &ScopedReadGrant, &mut advisories)
            .expect("role synthesizes");

        let fallback = role
            .statements()
            .iter()
            .find(|s| s.sid == SID_ASSET_READ_ANY)
            .expect("unscoped asset statement");
        assert!(fallback.is_unscoped());
        assert!(fallback.actions.contains("s3:GetObject"));

        assert_eq!(
            broad_scopes(&advisories),
            vec![PermissionScope::AssetBucket, PermissionScope::ImageRepository]
        );
        assert!(
            advisories
                .iter()
                .any(|a| matches!(a, Advisory::AuditSuppression { rule, .. } if rule == SUPPRESSED_RULE))
        );
    }

    #[test]
    fn test_bucket_uses_scoped_grant() {
        let req = request()
            .with_artifacts_bucket("arn:aws:s3:::assets")
            .with_ecr_repo("arn:aws:ecr:us-east-1:111122223333:repository/churn");
        let mut advisories = Vec::new();
        let role = resolve_role(&req, "churn-role-1", &ScopedReadGrant, &mut advisories)
            .expect("role synthesizes");

        let statements = role.statements();
        assert!(statements.iter().all(|s| s.sid != SID_ASSET_READ_ANY));

        let read = statements
            .iter()
            .find(|s| s.sid == SID_ASSET_BUCKET_READ)
            .expect("scoped read statement");
        assert_eq!(read.resources, vec!["arn:aws:s3:::assets", "arn:aws:s3:::assets/*"]);

        let pull = statements
            .iter()
            .find(|s| s.sid == SID_IMAGE_PULL)
            .expect("image pull statement");
        assert!(!pull.is_unscoped());

        assert!(broad_scopes(&advisories).is_empty());
    }

    #[test]
    fn test_grant_failure_propagates() {
        let req = request().with_artifacts_bucket("arn:aws:s3:::assets");
        let mut advisories = Vec::new();
        let err = resolve_role(&req, "churn-role-1", &ForbiddenGrant, &mut advisories)
            .expect_err("grant failure aborts role resolution");
        assert!(err.to_string().contains("role resolution"));
    }

    #[test]
    fn test_scoped_grant_is_idempotent() {
        let mut role = RoleDefinition::new("r");
        ScopedReadGrant
            .grant_read(&mut role, "arn:aws:s3:::assets")
            .expect("grant succeeds");
        ScopedReadGrant
            .grant_read(&mut role, "arn:aws:s3:::assets")
            .expect("grant succeeds");
        assert_eq!(role.statements.len(), 1);
    }
}
