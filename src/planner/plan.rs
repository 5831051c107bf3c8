//! Deployment plan types.
//!
//! A plan is an ordered list of resource nodes with explicit dependency
//! edges, plus derived outputs and advisories. Plans are immutable once
//! assembled and are consumed by the provisioning engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use super::role::ResolvedRole;

/// Kinds of planned infrastructure objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Execution role assumed by the serving containers.
    Role,
    /// Security group guarding the model's network interfaces.
    SecurityGroup,
    /// Key encrypting endpoint storage.
    EncryptionKey,
    /// Model definition pointing at the artifact.
    Model,
    /// Endpoint configuration (serving variants).
    EndpointConfig,
    /// The serving endpoint.
    Endpoint,
}

impl ResourceKind {
    /// Every kind, in planning order.
    pub const ALL: [Self; 6] = [
        Self::Role,
        Self::SecurityGroup,
        Self::EncryptionKey,
        Self::Model,
        Self::EndpointConfig,
        Self::Endpoint,
    ];

    /// Suffix used in generated names.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::SecurityGroup => "sg",
            Self::EncryptionKey => "key",
            Self::Model => "model",
            Self::EndpointConfig => "conf",
            Self::Endpoint => "endpoint",
        }
    }

    /// Logical node identifier within a plan.
    #[must_use]
    pub const fn logical_id(self) -> &'static str {
        match self {
            Self::Role => "ModelExecutionRole",
            Self::SecurityGroup => "SecurityGroup",
            Self::EncryptionKey => "EndpointKey",
            Self::Model => "Model",
            Self::EndpointConfig => "EndpointConfig",
            Self::Endpoint => "Endpoint",
        }
    }

    /// Resource type understood by the provisioning engine.
    #[must_use]
    pub const fn engine_type(self) -> &'static str {
        match self {
            Self::Role => "AWS::IAM::Role",
            Self::SecurityGroup => "AWS::EC2::SecurityGroup",
            Self::EncryptionKey => "AWS::KMS::Key",
            Self::Model => "AWS::SageMaker::Model",
            Self::EndpointConfig => "AWS::SageMaker::EndpointConfig",
            Self::Endpoint => "AWS::SageMaker::Endpoint",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Role => "role",
            Self::SecurityGroup => "security-group",
            Self::EncryptionKey => "encryption-key",
            Self::Model => "model",
            Self::EndpointConfig => "endpoint-config",
            Self::Endpoint => "endpoint",
        };
        write!(f, "{s}")
    }
}

/// Identifier of a node within one plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<ResourceKind> for NodeId {
    fn from(kind: ResourceKind) -> Self {
        Self(kind.logical_id().to_string())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A dependency edge from one node to an earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum Dependency {
    /// The dependent reads attributes of the target node.
    Node {
        /// Target node.
        node: NodeId,
    },
    /// The dependent refers to the target only by its generated name; the
    /// engine re-resolves the name at apply time.
    Name {
        /// Target node.
        node: NodeId,
        /// Generated name of the target.
        name: String,
    },
}

impl Dependency {
    /// Creates a node-reference edge.
    #[must_use]
    pub fn on(kind: ResourceKind) -> Self {
        Self::Node { node: kind.into() }
    }

    /// Creates a name-reference edge.
    #[must_use]
    pub fn by_name(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::Name {
            node: kind.into(),
            name: name.into(),
        }
    }

    /// Returns the node this edge points at.
    #[must_use]
    pub const fn target(&self) -> &NodeId {
        match self {
            Self::Node { node } | Self::Name { node, .. } => node,
        }
    }
}

/// Builds a property value that the engine resolves from another node.
#[must_use]
pub fn attribute_ref(kind: ResourceKind, attribute: &str) -> Value {
    serde_json::json!({
        "ref": { "node": kind.logical_id(), "attribute": attribute }
    })
}

/// One planned infrastructure object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Node identifier within the plan.
    pub id: NodeId,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Generated unique name.
    pub name: String,
    /// Property bag handed to the engine.
    pub properties: BTreeMap<String, Value>,
    /// Edges to nodes that must exist first.
    pub depends_on: Vec<Dependency>,
    /// Tags applied to the resource.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ResourceNode {
    /// Creates a node with no properties or dependencies.
    #[must_use]
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            id: kind.into(),
            kind,
            name: name.into(),
            properties: BTreeMap::new(),
            depends_on: Vec::new(),
            tags: BTreeMap::new(),
        }
    }

    /// Sets a property.
    #[must_use]
    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Adds a dependency edge.
    #[must_use]
    pub fn depending_on(mut self, dependency: Dependency) -> Self {
        self.depends_on.push(dependency);
        self
    }

    /// Returns a property value.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Returns true if this node depends on `kind`.
    #[must_use]
    pub fn depends_on_kind(&self, kind: ResourceKind) -> bool {
        let target = NodeId::from(kind);
        self.depends_on.iter().any(|d| *d.target() == target)
    }
}

/// Where an unscoped permission was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionScope {
    /// Model asset reads.
    AssetBucket,
    /// Container image pulls.
    ImageRepository,
}

impl std::fmt::Display for PermissionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AssetBucket => write!(f, "asset bucket"),
            Self::ImageRepository => write!(f, "image repository"),
        }
    }
}

/// Advisory annotations carried alongside the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Advisory {
    /// A permission fell back to an unscoped (`*`) resource.
    BroadPermission {
        /// Node holding the statement.
        node: NodeId,
        /// What the permission should have been scoped to.
        scope: PermissionScope,
        /// Actions granted unscoped.
        actions: Vec<String>,
    },
    /// An audit rule is knowingly suppressed for a node.
    AuditSuppression {
        /// Node the suppression applies to.
        node: NodeId,
        /// Audit rule identifier.
        rule: String,
        /// Reason recorded for auditors.
        reason: String,
    },
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BroadPermission { node, scope, actions } => write!(
                f,
                "{node}: {} granted on '*' (no {scope} supplied)",
                actions.join(", ")
            ),
            Self::AuditSuppression { node, rule, reason } => {
                write!(f, "{node}: {rule} suppressed ({reason})")
            }
        }
    }
}

/// How the deployed artifact was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum ArtifactOrigin {
    /// Named in the request.
    Explicit,
    /// Resolved as the latest approved artifact of a group.
    LatestApproved {
        /// Artifact group that was queried.
        group: String,
    },
}

/// The artifact a plan deploys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedArtifact {
    /// Artifact identifier.
    pub arn: String,
    /// How it was obtained.
    pub origin: ArtifactOrigin,
}

/// Derived, informational outputs of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOutputs {
    /// Generated endpoint name.
    pub endpoint_name: String,
    /// Invocation URL of the endpoint.
    pub endpoint_url: String,
}

/// Builds the invocation URL of an endpoint.
#[must_use]
pub fn invocation_url(region: &str, endpoint_name: &str) -> String {
    format!("https://runtime.sagemaker.{region}.amazonaws.com/endpoints/{endpoint_name}/invocations")
}

/// A complete deployment plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    /// Unique plan identifier.
    plan_id: Uuid,
    /// Deployment the plan was built for.
    deployment_id: String,
    /// When the plan was created (the instant used for naming).
    created_at: DateTime<Utc>,
    /// Fingerprint of the request.
    request_hash: String,
    /// Target region.
    region: String,
    /// Resolved execution role.
    role: ResolvedRole,
    /// Resolved artifact.
    artifact: ResolvedArtifact,
    /// Nodes in dependency order.
    nodes: Vec<ResourceNode>,
    /// Derived outputs.
    outputs: PlanOutputs,
    /// Advisories raised while planning.
    advisories: Vec<Advisory>,
}

/// Parts a plan is assembled from.
#[derive(Debug)]
pub struct PlanParts {
    /// Unique plan identifier.
    pub plan_id: Uuid,
    /// Deployment the plan was built for.
    pub deployment_id: String,
    /// Planning instant.
    pub created_at: DateTime<Utc>,
    /// Fingerprint of the request.
    pub request_hash: String,
    /// Target region.
    pub region: String,
    /// Resolved execution role.
    pub role: ResolvedRole,
    /// Resolved artifact.
    pub artifact: ResolvedArtifact,
    /// Nodes in dependency order.
    pub nodes: Vec<ResourceNode>,
    /// Advisories raised while planning.
    pub advisories: Vec<Advisory>,
}

impl DeploymentPlan {
    /// Assembles a plan. The endpoint URL is derived from the endpoint node.
    #[must_use]
    pub fn assemble(parts: PlanParts) -> Self {
        let endpoint_name = parts
            .nodes
            .iter()
            .find(|n| n.kind == ResourceKind::Endpoint)
            .map(|n| n.name.clone())
            .unwrap_or_default();

        let outputs = PlanOutputs {
            endpoint_url: invocation_url(&parts.region, &endpoint_name),
            endpoint_name,
        };

        Self {
            plan_id: parts.plan_id,
            deployment_id: parts.deployment_id,
            created_at: parts.created_at,
            request_hash: parts.request_hash,
            region: parts.region,
            role: parts.role,
            artifact: parts.artifact,
            nodes: parts.nodes,
            outputs,
            advisories: parts.advisories,
        }
    }

    /// Returns the plan identifier.
    #[must_use]
    pub const fn plan_id(&self) -> Uuid {
        self.plan_id
    }

    /// Returns the deployment id.
    #[must_use]
    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    /// Returns the planning instant.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the request fingerprint.
    #[must_use]
    pub fn request_hash(&self) -> &str {
        &self.request_hash
    }

    /// Returns the target region.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Returns the resolved execution role.
    #[must_use]
    pub const fn role(&self) -> &ResolvedRole {
        &self.role
    }

    /// Returns the resolved artifact.
    #[must_use]
    pub const fn artifact(&self) -> &ResolvedArtifact {
        &self.artifact
    }

    /// Returns the nodes in dependency order.
    #[must_use]
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    /// Returns the derived outputs.
    #[must_use]
    pub const fn outputs(&self) -> &PlanOutputs {
        &self.outputs
    }

    /// Returns every advisory.
    #[must_use]
    pub fn advisories(&self) -> &[Advisory] {
        &self.advisories
    }

    /// Returns the number of nodes.
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the node of a given kind.
    #[must_use]
    pub fn node(&self, kind: ResourceKind) -> Option<&ResourceNode> {
        self.nodes.iter().find(|n| n.kind == kind)
    }

    /// Returns the broad-permission advisories.
    #[must_use]
    pub fn broad_permission_warnings(&self) -> Vec<&Advisory> {
        self.advisories
            .iter()
            .filter(|a| matches!(a, Advisory::BroadPermission { .. }))
            .collect()
    }

    /// Returns true if every node's dependencies appear earlier in the list.
    #[must_use]
    pub fn is_topologically_ordered(&self) -> bool {
        let mut seen: HashSet<&NodeId> = HashSet::new();
        for node in &self.nodes {
            if !node.depends_on.iter().all(|d| seen.contains(d.target())) {
                return false;
            }
            seen.insert(&node.id);
        }
        true
    }
}

impl std::fmt::Display for ResourceNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.name)?;
        if !self.depends_on.is_empty() {
            let targets: Vec<&str> = self.depends_on.iter().map(|d| d.target().as_str()).collect();
            write!(f, " (after {})", targets.join(", "))?;
        }
        Ok(())
    }
}

impl std::fmt::Display for DeploymentPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Deployment Plan for '{}' ({} resources):",
            self.deployment_id,
            self.nodes.len()
        )?;
        for (i, node) in self.nodes.iter().enumerate() {
            writeln!(f, "  {i}. {node}")?;
        }
        writeln!(f, "Endpoint URL: {}", self.outputs.endpoint_url)?;

        if !self.advisories.is_empty() {
            writeln!(f, "\nAdvisories:")?;
            for advisory in &self.advisories {
                writeln!(f, "  - {advisory}")?;
            }
        }

        Ok(())
    }
}
